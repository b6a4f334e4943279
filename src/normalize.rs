/// Schema normalization.
///
/// Maps a stored record onto one canonical event, whichever of the two
/// historical payload layouts produced it. Records matching neither layout
/// are not applicable and drop out of every report.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::cancel::CancelToken;
use crate::error::Result;
use crate::record::LogRecord;
use crate::resolve::{self, Field};
use crate::stats::Direction;

/// Event marker of the protocol-level producer (`data.event`).
pub const PROTOCOL_EVENT: &str = "WPP_MESSAGE_UPSERT";
/// Event marker of the conversational producer (`event`).
pub const CONVERSATIONAL_EVENT: &str = "MESSAGE_WHATSAPP";

const CANCEL_CHECK_INTERVAL: usize = 1024;

/// Known payload layouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Shape {
    /// Nested `client.store` plus a messaging-protocol upsert under `data`.
    Protocol,
    /// Flat `store` plus a `message` object.
    Conversational,
}

impl Shape {
    pub const ALL: [Shape; 2] = [Shape::Protocol, Shape::Conversational];

    /// Detect the layout of `payload`, if it is one we understand.
    pub fn detect(payload: &Value) -> Option<Self> {
        let marker = |path: &[&str], expected: &str| {
            resolve::walk(payload, path).and_then(Value::as_str) == Some(expected)
        };

        let shape = if marker(&["data", "event"], PROTOCOL_EVENT) {
            Shape::Protocol
        } else if marker(&["event"], CONVERSATIONAL_EVENT) {
            Shape::Conversational
        } else {
            return None;
        };

        resolve::resolve(payload, shape, Field::Store).map(|_| shape)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Protocol => "protocol",
            Self::Conversational => "conversational",
        }
    }
}

/// Canonical view of one stored record.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedEvent {
    pub record_id: String,
    pub store: String,
    pub timestamp: DateTime<Utc>,
    pub from_me: bool,
    pub conversation: Option<String>,
    pub is_group: bool,
    pub content: Option<String>,
    pub shape: Shape,
    pub message_kinds: Vec<String>,
    pub broadcast: bool,
    pub has_message: bool,
}

impl NormalizedEvent {
    pub fn direction(&self) -> Direction {
        Direction::from(self.from_me)
    }
}

/// Normalize one record, or `None` when its layout is not recognized.
pub fn normalize(record: &LogRecord) -> Option<NormalizedEvent> {
    let payload = &record.payload;
    let Some(shape) = Shape::detect(payload) else {
        tracing::trace!(record_id = %record.id, "Skipping record with unrecognized payload shape");
        return None;
    };

    let store = resolve::resolve_string(payload, shape, Field::Store)?;
    let from_me = resolve::resolve_bool(payload, shape, Field::FromMe, false);
    let conversation = resolve::resolve_peer(payload, shape, from_me);

    Some(NormalizedEvent {
        record_id: record.id.clone(),
        store,
        timestamp: resolve::resolve_timestamp(payload, shape, record.created_at),
        from_me,
        is_group: resolve::is_group_key(conversation.as_deref()),
        conversation,
        content: resolve::resolve_string(payload, shape, Field::Text),
        shape,
        message_kinds: resolve::resolve_kinds(payload, shape),
        broadcast: resolve::resolve_bool(payload, shape, Field::Broadcast, false),
        has_message: resolve::resolve(payload, shape, Field::Message).is_some(),
    })
}

/// Normalize a fetched batch, honoring `cancel` while scanning.
pub fn normalize_all(records: &[LogRecord], cancel: &CancelToken) -> Result<Vec<NormalizedEvent>> {
    normalize_checked(records, || cancel.check())
}

/// Runs `checkpoint` before every `CANCEL_CHECK_INTERVAL` records.
fn normalize_checked(
    records: &[LogRecord],
    mut checkpoint: impl FnMut() -> Result<()>,
) -> Result<Vec<NormalizedEvent>> {
    let mut events = Vec::with_capacity(records.len());
    for (idx, record) in records.iter().enumerate() {
        if idx % CANCEL_CHECK_INTERVAL == 0 {
            checkpoint()?;
        }
        if let Some(event) = normalize(record) {
            events.push(event);
        }
    }

    tracing::debug!(
        records = records.len(),
        events = events.len(),
        "Normalized record batch"
    );
    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn record(payload: Value) -> LogRecord {
        LogRecord {
            id: "1".to_string(),
            external_id: None,
            payload,
            created_at: Utc.with_ymd_and_hms(2025, 3, 15, 12, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_protocol_shape() {
        let event = normalize(&record(json!({
            "client": {"store": "store-1"},
            "data": {
                "event": "WPP_MESSAGE_UPSERT",
                "m": [{
                    "key": {"remoteJid": "1203@g.us", "fromMe": true},
                    "messageTimestamp": 1742032800,
                    "message": {"conversation": "hello"}
                }]
            }
        })))
        .unwrap();

        assert_eq!(event.shape, Shape::Protocol);
        assert_eq!(event.store, "store-1");
        assert!(event.from_me);
        assert!(event.is_group);
        assert_eq!(event.conversation.as_deref(), Some("1203@g.us"));
        assert_eq!(event.content.as_deref(), Some("hello"));
        assert_eq!(
            event.timestamp,
            Utc.with_ymd_and_hms(2025, 3, 15, 10, 0, 0).unwrap()
        );
        assert!(event.has_message);
    }

    #[test]
    fn test_conversational_shape_with_numeric_store() {
        let event = normalize(&record(json!({
            "event": "MESSAGE_WHATSAPP",
            "store": 42,
            "message": {
                "fromMe": false,
                "message": "oi",
                "otherInfo": {"author": "5511@c.us", "to": "me"}
            }
        })))
        .unwrap();

        assert_eq!(event.shape, Shape::Conversational);
        assert_eq!(event.store, "42");
        assert_eq!(event.direction(), Direction::Incoming);
        assert_eq!(event.conversation.as_deref(), Some("5511@c.us"));
        assert!(!event.is_group);
        // no embedded epoch: falls back to insertion time
        assert_eq!(event.timestamp, Utc.with_ymd_and_hms(2025, 3, 15, 12, 0, 0).unwrap());
    }

    #[test]
    fn test_unrecognized_shapes_are_inert() {
        assert!(normalize(&record(json!({"event": "SOMETHING_ELSE", "store": "s"}))).is_none());
        assert!(normalize(&record(json!({"event": "MESSAGE_WHATSAPP"}))).is_none());
        assert!(normalize(&record(json!({"data": {"event": "WPP_MESSAGE_UPSERT"}, "store": "s"}))).is_none());
        assert!(normalize(&record(json!("just a string"))).is_none());
    }

    #[test]
    fn test_normalize_all_honors_cancel() {
        let token = CancelToken::new();
        token.cancel();
        let records = vec![record(json!({"event": "MESSAGE_WHATSAPP", "store": "s"}))];
        assert!(normalize_all(&records, &token).is_err());
    }

    #[test]
    fn test_cancel_checked_between_batches() {
        let records = vec![
            record(json!({"event": "MESSAGE_WHATSAPP", "store": "s", "message": {"message": "x"}}));
            CANCEL_CHECK_INTERVAL + 1
        ];

        let mut checks = 0;
        let result = normalize_checked(&records, || {
            checks += 1;
            if checks > 1 {
                Err(crate::error::AnalyticsError::Cancelled)
            } else {
                Ok(())
            }
        });
        assert!(matches!(result, Err(crate::error::AnalyticsError::Cancelled)));
        assert_eq!(checks, 2);

        let mut checks = 0;
        let events = normalize_checked(&records[..CANCEL_CHECK_INTERVAL], || {
            checks += 1;
            Ok(())
        })
        .unwrap();
        assert_eq!(checks, 1);
        assert_eq!(events.len(), CANCEL_CHECK_INTERVAL);
    }
}
