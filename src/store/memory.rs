use std::sync::RwLock;

use super::{RecordQuery, RecordStore};
use crate::error::StoreError;
use crate::normalize::Shape;
use crate::record::{LogRecord, NewRecord};
use crate::resolve::{self, Field};

/// In-memory record store, used for JSON-lines input and tests.
#[derive(Debug, Default)]
pub struct InMemoryRecordStore {
    records: RwLock<Vec<LogRecord>>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record, assigning the next sequential id.
    pub fn insert(&self, record: NewRecord) -> Result<LogRecord, StoreError> {
        let mut records = self.records.write().map_err(|_| StoreError::Poisoned)?;
        let stored = LogRecord {
            id: (records.len() + 1).to_string(),
            external_id: record.external_id,
            payload: record.payload,
            created_at: record.created_at,
        };
        records.push(stored.clone());
        Ok(stored)
    }

    pub fn record_count(&self) -> Result<usize, StoreError> {
        let records = self.records.read().map_err(|_| StoreError::Poisoned)?;
        Ok(records.len())
    }

    fn find(&self, predicate: impl Fn(&LogRecord) -> bool) -> Result<Option<LogRecord>, StoreError> {
        let records = self.records.read().map_err(|_| StoreError::Poisoned)?;
        Ok(records.iter().find(|r| predicate(*r)).cloned())
    }
}

fn matches(record: &LogRecord, query: &RecordQuery) -> bool {
    let Some(shape) = Shape::detect(&record.payload) else {
        return false;
    };
    query.shapes.contains(&shape)
        && resolve::resolve_string(&record.payload, shape, Field::Store).as_deref()
            == Some(query.store.as_str())
        && query
            .window
            .contains(resolve::resolve_timestamp(&record.payload, shape, record.created_at))
}

impl RecordStore for InMemoryRecordStore {
    fn fetch(&self, query: &RecordQuery) -> Result<Vec<LogRecord>, StoreError> {
        let records = self.records.read().map_err(|_| StoreError::Poisoned)?;
        Ok(records.iter().filter(|r| matches(r, query)).cloned().collect())
    }

    fn find_by_id(&self, id: &str) -> Result<Option<LogRecord>, StoreError> {
        self.find(|r| r.id == id)
    }

    fn find_by_external_id(&self, external_id: &str) -> Result<Option<LogRecord>, StoreError> {
        self.find(|r| r.external_id.as_deref() == Some(external_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::window::TimeWindow;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    fn at(hour: u32) -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 15, hour, 0, 0).unwrap()
    }

    fn new_record(store: &str, hour: u32, external_id: Option<&str>) -> NewRecord {
        NewRecord {
            external_id: external_id.map(str::to_string),
            payload: json!({"event": "MESSAGE_WHATSAPP", "store": store, "message": {"message": "hi"}}),
            created_at: at(hour),
        }
    }

    #[test]
    fn test_fetch_prefilters() {
        let store = InMemoryRecordStore::new();
        store.insert(new_record("s1", 1, None)).unwrap();
        store.insert(new_record("s2", 1, None)).unwrap();
        store.insert(new_record("s1", 20, None)).unwrap();
        assert_eq!(store.record_count().unwrap(), 3);

        let query = RecordQuery {
            store: "s1".to_string(),
            shapes: vec![Shape::Conversational],
            window: TimeWindow::new(at(0), at(12)).unwrap(),
        };
        let fetched = store.fetch(&query).unwrap();
        assert_eq!(fetched.len(), 1);
        assert_eq!(fetched[0].id, "1");

        let query = RecordQuery {
            shapes: vec![Shape::Protocol],
            ..query
        };
        assert!(store.fetch(&query).unwrap().is_empty());
    }

    #[test]
    fn test_fetch_uses_event_time_over_insertion_time() {
        let store = InMemoryRecordStore::new();
        let mut backfilled = new_record("s1", 20, None);
        backfilled.payload["message"]["date"] = json!(at(2).timestamp());
        store.insert(backfilled).unwrap();
        let mut future = new_record("s1", 1, None);
        future.payload["message"]["date"] = json!(at(14).timestamp());
        store.insert(future).unwrap();

        let query = RecordQuery {
            store: "s1".to_string(),
            shapes: vec![Shape::Conversational],
            window: TimeWindow::new(at(0), at(12)).unwrap(),
        };
        let fetched = store.fetch(&query).unwrap();
        assert_eq!(fetched.len(), 1);
        assert_eq!(fetched[0].id, "1");
    }

    #[test]
    fn test_poisoned_lock_is_reported() {
        let store = std::sync::Arc::new(InMemoryRecordStore::new());
        let shared = store.clone();
        let _ = std::thread::spawn(move || {
            let _guard = shared.records.write().unwrap();
            panic!("poison the lock");
        })
        .join();

        assert!(matches!(store.record_count(), Err(StoreError::Poisoned)));
        assert!(matches!(store.find_by_id("1"), Err(StoreError::Poisoned)));
    }

    #[test]
    fn test_lookups() {
        let store = InMemoryRecordStore::new();
        store.insert(new_record("s1", 1, Some("ext-1"))).unwrap();

        assert!(store.find_by_id("1").unwrap().is_some());
        assert!(store.find_by_id("2").unwrap().is_none());
        assert_eq!(
            store.find_by_external_id("ext-1").unwrap().map(|r| r.id),
            Some("1".to_string())
        );
        assert!(store.find_by_external_id("missing").unwrap().is_none());
    }
}
