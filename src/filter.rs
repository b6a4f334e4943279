/// Record selection: store, shape, window and the exclusion policy for
/// protocol/system noise.
use crate::normalize::{NormalizedEvent, Shape};
use crate::window::TimeWindow;

/// Pseudo-conversation carrying status updates, never a real chat.
pub const BROADCAST_CONVERSATION: &str = "status@broadcast";

/// Stub kinds emitted for membership changes, decryption placeholders and the like.
pub const EXCLUDED_STUB_KINDS: &[&str] = &[
    "CIPHERTEXT",
    "GROUP_CHANGE_ICON",
    "REVOKE",
    "FUTUREPROOF",
    "GROUP_CHANGE_DESCRIPTION",
    "GROUP_PARTICIPANT_DEMOTE",
    "GROUP_PARTICIPANT_PROMOTE",
    "GROUP_MEMBERSHIP_JOIN_APPROVAL_MODE",
    "GROUP_CHANGE_ANNOUNCE",
    "GROUP_PARTICIPANT_CHANGE_NUMBER",
    "GROUP_PARTICIPANT_REMOVE",
    "GROUP_PARTICIPANT_LEAVE",
    "GROUP_PARTICIPANT_ADD",
    "2",
];

/// Protocol message kinds: key exchange, history sync, edits, revocations.
pub const EXCLUDED_PROTOCOL_KINDS: &[&str] = &[
    "EPHEMERAL_SYNC_RESPONSE",
    "HISTORY_SYNC_NOTIFICATION",
    "INITIAL_SECURITY_NOTIFICATION_SETTING_SYNC",
    "APP_STATE_SYNC_KEY_SHARE",
    "REVOKE",
    "MESSAGE_EDIT",
    "PEER_DATA_OPERATION_REQUEST_RESPONSE_MESSAGE",
];

#[derive(Debug, Clone)]
pub struct FilterSpec {
    pub store: String,
    pub window: TimeWindow,
    pub shapes: Vec<Shape>,
}

impl FilterSpec {
    pub fn matches(&self, event: &NormalizedEvent) -> bool {
        event.store == self.store
            && self.shapes.contains(&event.shape)
            && self.window.contains(event.timestamp)
            && !is_excluded(event)
    }
}

/// Whether the shape-specific policy drops `event` as non-conversational.
pub fn is_excluded(event: &NormalizedEvent) -> bool {
    if event.conversation.as_deref() == Some(BROADCAST_CONVERSATION) {
        return true;
    }

    match event.shape {
        Shape::Protocol => event.message_kinds.iter().any(|kind| {
            EXCLUDED_STUB_KINDS.contains(&kind.as_str())
                || EXCLUDED_PROTOCOL_KINDS.contains(&kind.as_str())
        }),
        Shape::Conversational => !event.has_message || event.broadcast,
    }
}

pub fn filter_events(events: Vec<NormalizedEvent>, spec: &FilterSpec) -> Vec<NormalizedEvent> {
    let before = events.len();
    let kept: Vec<_> = events.into_iter().filter(|e| spec.matches(e)).collect();
    tracing::debug!(store = %spec.store, before, after = kept.len(), "Filtered events");
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn event(shape: Shape, hour: u32) -> NormalizedEvent {
        NormalizedEvent {
            record_id: "r".to_string(),
            store: "s1".to_string(),
            timestamp: Utc.with_ymd_and_hms(2025, 3, 15, hour, 0, 0).unwrap(),
            from_me: true,
            conversation: Some("5511@s.whatsapp.net".to_string()),
            is_group: false,
            content: Some("hi".to_string()),
            shape,
            message_kinds: Vec::new(),
            broadcast: false,
            has_message: true,
        }
    }

    fn spec() -> FilterSpec {
        FilterSpec {
            store: "s1".to_string(),
            window: TimeWindow::new(
                Utc.with_ymd_and_hms(2025, 3, 15, 0, 0, 0).unwrap(),
                Utc.with_ymd_and_hms(2025, 3, 15, 12, 0, 0).unwrap(),
            )
            .unwrap(),
            shapes: Shape::ALL.to_vec(),
        }
    }

    #[test]
    fn test_store_and_window() {
        let spec = spec();
        assert!(spec.matches(&event(Shape::Protocol, 1)));
        assert!(!spec.matches(&event(Shape::Protocol, 12)));

        let mut other = event(Shape::Conversational, 1);
        other.store = "s2".to_string();
        assert!(!spec.matches(&other));
    }

    #[test]
    fn test_shape_selection() {
        let mut spec = spec();
        spec.shapes = vec![Shape::Conversational];
        assert!(!spec.matches(&event(Shape::Protocol, 1)));
        assert!(spec.matches(&event(Shape::Conversational, 1)));
    }

    #[test]
    fn test_control_kinds_excluded() {
        let mut sync = event(Shape::Protocol, 1);
        sync.message_kinds = vec!["HISTORY_SYNC_NOTIFICATION".to_string()];
        assert!(is_excluded(&sync));

        let mut stub = event(Shape::Protocol, 1);
        stub.message_kinds = vec!["2".to_string()];
        assert!(is_excluded(&stub));

        let mut plain = event(Shape::Protocol, 1);
        plain.message_kinds = vec!["EPHEMERAL_SETTING".to_string()];
        assert!(!is_excluded(&plain));
    }

    #[test]
    fn test_broadcast_excluded() {
        let mut status = event(Shape::Protocol, 1);
        status.conversation = Some(BROADCAST_CONVERSATION.to_string());
        assert!(is_excluded(&status));

        let mut flagged = event(Shape::Conversational, 1);
        flagged.broadcast = true;
        assert!(is_excluded(&flagged));

        let mut empty = event(Shape::Conversational, 1);
        empty.has_message = false;
        assert!(is_excluded(&empty));
    }
}
