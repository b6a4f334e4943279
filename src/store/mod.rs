/// Record store collaborator.
///
/// The engine only reads: a coarse prefetch by store, shape and event time,
/// plus single-record lookups. Exact filtering happens in the engine.
pub mod memory;
pub mod sqlite;

pub use memory::InMemoryRecordStore;
pub use sqlite::SqliteRecordStore;

use crate::error::StoreError;
use crate::normalize::Shape;
use crate::record::LogRecord;
use crate::window::TimeWindow;

/// Prefetch predicate.
#[derive(Debug, Clone)]
pub struct RecordQuery {
    pub store: String,
    pub shapes: Vec<Shape>,
    /// Range on the event timestamp (falling back to `created_at` when the
    /// payload carries none), half-open.
    pub window: TimeWindow,
}

pub trait RecordStore: Send + Sync {
    /// All records that may belong to `query`; supersets are fine.
    fn fetch(&self, query: &RecordQuery) -> Result<Vec<LogRecord>, StoreError>;

    fn find_by_id(&self, id: &str) -> Result<Option<LogRecord>, StoreError>;

    fn find_by_external_id(&self, external_id: &str) -> Result<Option<LogRecord>, StoreError>;
}
