/// Stored log records and the JSON-lines ingestion format.
use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A raw event log as kept by the record store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
    pub payload: Value,
    pub created_at: DateTime<Utc>,
}

/// A record waiting to be inserted; the store assigns the id.
#[derive(Debug, Clone, PartialEq)]
pub struct NewRecord {
    pub external_id: Option<String>,
    pub payload: Value,
    pub created_at: DateTime<Utc>,
}

impl NewRecord {
    /// Parse one ingestion line.
    ///
    /// `externalId` and `createdAt` are lifted out of the object; every other
    /// key becomes the payload. A missing `createdAt` takes `now`.
    pub fn from_json_line(line: &str, now: DateTime<Utc>) -> Result<Self> {
        let value: Value = serde_json::from_str(line).context("Failed to parse ingestion line")?;
        let Value::Object(mut fields) = value else {
            return Err(anyhow!("ingestion line must be a JSON object"));
        };

        let external_id = match fields.remove("externalId") {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(s),
            Some(other) => Some(other.to_string()),
        };

        let created_at = match fields.remove("createdAt") {
            None | Some(Value::Null) => now,
            Some(Value::String(s)) => DateTime::parse_from_rfc3339(&s)
                .with_context(|| format!("Invalid createdAt: {}", s))?
                .with_timezone(&Utc),
            Some(other) => return Err(anyhow!("createdAt must be an RFC 3339 string, got {}", other)),
        };

        Ok(Self {
            external_id,
            payload: Value::Object(fields),
            created_at,
        })
    }
}
