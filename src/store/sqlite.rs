/// SQLite-backed record store.
///
/// Payloads are kept as JSON text; prefetching uses SQLite's JSON functions to
/// narrow by shape marker, store and event time before anything is
/// deserialized.
use anyhow::Context;
use chrono::{DateTime, TimeZone, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use super::{RecordQuery, RecordStore};
use crate::error::StoreError;
use crate::normalize::{Shape, CONVERSATIONAL_EVENT, PROTOCOL_EVENT};
use crate::record::{LogRecord, NewRecord};

type RawRow = (i64, Option<String>, String, i64);

// `data.m` is either the message object or an array whose first element is.
const PROTOCOL_EPOCH_PATHS: &[&str] = &["$.data.m.messageTimestamp", "$.data.m[0].messageTimestamp"];
const CONVERSATIONAL_EPOCH_PATHS: &[&str] = &["$.message.date"];

/// Database handle for stored log records.
///
/// `rusqlite::Connection` is not `Sync`; access is serialized through a mutex.
pub struct SqliteRecordStore {
    conn: Mutex<Connection>,
}

impl SqliteRecordStore {
    /// Initialize or open the record database at `path`.
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database at {}", path.display()))?;
        Self::init(conn).context("Failed to create log_records schema")
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS log_records (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                external_id TEXT,
                payload TEXT NOT NULL,
                created_at INTEGER NOT NULL
            )",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_log_records_created_at ON log_records (created_at)",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_log_records_external_id ON log_records (external_id)",
            [],
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }

    /// Store a record and return it with its assigned id.
    pub fn insert(&self, record: &NewRecord) -> Result<LogRecord, StoreError> {
        let payload = serde_json::to_string(&record.payload)?;
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO log_records (external_id, payload, created_at) VALUES (?1, ?2, ?3)",
            params![
                record.external_id,
                payload,
                record.created_at.timestamp_millis()
            ],
        )?;

        Ok(LogRecord {
            id: conn.last_insert_rowid().to_string(),
            external_id: record.external_id.clone(),
            payload: record.payload.clone(),
            created_at: record.created_at,
        })
    }

    pub fn record_count(&self) -> Result<usize, StoreError> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM log_records", [], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    fn find_one(&self, column: &str, value: &dyn rusqlite::ToSql) -> Result<Option<LogRecord>, StoreError> {
        let conn = self.conn()?;
        let sql = format!(
            "SELECT id, external_id, payload, created_at FROM log_records WHERE {} = ?1 ORDER BY id LIMIT 1",
            column
        );
        let row = conn
            .query_row(&sql, [value], read_row)
            .optional()?;
        row.map(into_record).transpose()
    }
}

/// Embedded epoch in seconds, NULL unless one of `paths` holds a JSON number.
fn epoch_expr(paths: &[&str]) -> String {
    let terms: Vec<String> = paths
        .iter()
        .map(|path| {
            format!(
                "CASE WHEN json_type(payload, '{path}') IN ('integer', 'real') \
                 THEN CAST(json_extract(payload, '{path}') AS INTEGER) END"
            )
        })
        .collect();
    format!("COALESCE({}, NULL)", terms.join(", "))
}

/// True when any of `paths` exists, whatever its JSON type.
fn epoch_present_expr(paths: &[&str]) -> String {
    let terms: Vec<String> = paths
        .iter()
        .map(|path| format!("json_type(payload, '{path}')"))
        .collect();
    format!("(COALESCE({}, NULL) IS NOT NULL)", terms.join(", "))
}

/// Store and shape match, then a superset of the event-time window.
///
/// A numeric epoch is compared directly. Without an epoch the record falls
/// back to its insertion time. An epoch that is present but not numeric is
/// left for the engine to settle after normalization.
fn shape_clause(shape: Shape) -> String {
    let (marker, event, store, epoch_paths) = match shape {
        Shape::Protocol => ("$.data.event", PROTOCOL_EVENT, "$.client.store", PROTOCOL_EPOCH_PATHS),
        Shape::Conversational => (
            "$.event",
            CONVERSATIONAL_EVENT,
            "$.store",
            CONVERSATIONAL_EPOCH_PATHS,
        ),
    };
    format!(
        "(json_extract(payload, '{marker}') = '{event}' \
         AND CAST(json_extract(payload, '{store}') AS TEXT) = ?3 \
         AND ((created_at >= ?1 AND created_at < ?2) \
              OR IFNULL({epoch} BETWEEN ?4 AND ?5, {present})))",
        epoch = epoch_expr(epoch_paths),
        present = epoch_present_expr(epoch_paths),
    )
}

fn read_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawRow> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
}

fn into_record((id, external_id, payload, created_at): RawRow) -> Result<LogRecord, StoreError> {
    let created_at: DateTime<Utc> = Utc
        .timestamp_millis_opt(created_at)
        .single()
        .ok_or(StoreError::Timestamp(created_at))?;

    Ok(LogRecord {
        id: id.to_string(),
        external_id,
        payload: serde_json::from_str(&payload)?,
        created_at,
    })
}

impl RecordStore for SqliteRecordStore {
    fn fetch(&self, query: &RecordQuery) -> Result<Vec<LogRecord>, StoreError> {
        if query.shapes.is_empty() {
            return Ok(Vec::new());
        }

        let clauses: Vec<String> = query.shapes.iter().map(|s| shape_clause(*s)).collect();
        let sql = format!(
            "SELECT id, external_id, payload, created_at
             FROM log_records
             WHERE {}
             ORDER BY created_at, id",
            clauses.join(" OR ")
        );

        let conn = self.conn()?;
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(
                params![
                    query.window.start.timestamp_millis(),
                    query.window.end.timestamp_millis(),
                    query.store,
                    query.window.start.timestamp(),
                    query.window.end.timestamp()
                ],
                read_row,
            )?
            .collect::<Result<Vec<_>, _>>()?;
        drop(stmt);
        drop(conn);

        tracing::debug!(store = %query.store, rows = rows.len(), "Fetched records from sqlite");
        rows.into_iter().map(into_record).collect()
    }

    fn find_by_id(&self, id: &str) -> Result<Option<LogRecord>, StoreError> {
        let Ok(rowid) = id.parse::<i64>() else {
            return Ok(None);
        };
        self.find_one("id", &rowid)
    }

    fn find_by_external_id(&self, external_id: &str) -> Result<Option<LogRecord>, StoreError> {
        self.find_one("external_id", &external_id)
    }
}
