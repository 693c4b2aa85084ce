use chrono::{DateTime, Local};
use rusqlite::{params, Connection};
use std::cell::{Cell, RefCell};
use std::path::{Path, PathBuf};
use std::rc::Rc;

use crate::error::StorageError;
use crate::recorder::SessionRecord;

/// Persistence for the session history.
pub trait HistoryStore {
    fn load_history(&self) -> Result<Vec<SessionRecord>, StorageError>;
    /// Persists the full history. Callers only ever append to it.
    fn save_history(&mut self, records: &[SessionRecord]) -> Result<(), StorageError>;
}

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS session_history (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        timestamp TEXT NOT NULL,
        duration_seconds INTEGER NOT NULL,
        words_written INTEGER NOT NULL,
        completed BOOLEAN NOT NULL,
        created_at DATETIME DEFAULT CURRENT_TIMESTAMP
    );
    CREATE INDEX IF NOT EXISTS idx_session_history_timestamp ON session_history(timestamp);
"#;

/// SQLite-backed history. Rows are only ever inserted.
///
/// Each store remembers how much of the caller's history it has written,
/// so several processes can append to one file without skipping records.
#[derive(Debug)]
pub struct SqliteHistoryStore {
    conn: Connection,
    path: Option<PathBuf>,
    persisted: Cell<usize>,
}

impl SqliteHistoryStore {
    /// Opens (and creates if needed) the database at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(&path).map_err(|source| StorageError::Open {
            path: path.clone(),
            source,
        })?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn,
            path: Some(path),
            persisted: Cell::new(0),
        })
    }

    pub fn open_in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn,
            path: None,
            persisted: Cell::new(0),
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

impl HistoryStore for SqliteHistoryStore {
    fn load_history(&self) -> Result<Vec<SessionRecord>, StorageError> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT timestamp, duration_seconds, words_written, completed
            FROM session_history
            ORDER BY id ASC
            "#,
        )?;

        let rows = stmt.query_map([], |row| {
            let timestamp_str: String = row.get(0)?;
            let timestamp = DateTime::parse_from_rfc3339(&timestamp_str)
                .map_err(|e| {
                    rusqlite::Error::FromSqlConversionFailure(
                        0,
                        rusqlite::types::Type::Text,
                        Box::new(e),
                    )
                })?
                .with_timezone(&Local);

            Ok(SessionRecord {
                timestamp,
                duration_seconds: row.get::<_, i64>(1)?.max(0) as u64,
                words_written: row.get::<_, i64>(2)?.max(0) as u64,
                completed: row.get(3)?,
            })
        })?;

        let mut records = Vec::new();
        for record in rows {
            records.push(record?);
        }
        self.persisted.set(records.len());
        Ok(records)
    }

    /// Inserts the tail of `records` this store has not written yet.
    fn save_history(&mut self, records: &[SessionRecord]) -> Result<(), StorageError> {
        let stored = self.persisted.get();
        if stored >= records.len() {
            return Ok(());
        }

        let tx = self.conn.transaction()?;
        for record in &records[stored..] {
            tx.execute(
                r#"
                INSERT INTO session_history
                (timestamp, duration_seconds, words_written, completed)
                VALUES (?1, ?2, ?3, ?4)
                "#,
                params![
                    record.timestamp.to_rfc3339(),
                    record.duration_seconds as i64,
                    record.words_written as i64,
                    record.completed,
                ],
            )?;
        }
        tx.commit()?;
        self.persisted.set(records.len());
        Ok(())
    }
}

/// In-memory store. Clones share the same records, and saves can be made
/// to fail on demand.
#[derive(Debug, Clone, Default)]
pub struct MemoryHistoryStore {
    records: Rc<RefCell<Vec<SessionRecord>>>,
    failing: Rc<Cell<bool>>,
}

impl MemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<SessionRecord> {
        self.records.borrow().clone()
    }

    pub fn fail_saves(&self, fail: bool) {
        self.failing.set(fail);
    }
}

impl HistoryStore for MemoryHistoryStore {
    fn load_history(&self) -> Result<Vec<SessionRecord>, StorageError> {
        Ok(self.records())
    }

    fn save_history(&mut self, records: &[SessionRecord]) -> Result<(), StorageError> {
        if self.failing.get() {
            return Err(StorageError::Unavailable("store rejected the write".into()));
        }
        *self.records.borrow_mut() = records.to_vec();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recorder::SessionRecorder;
    use tempfile::tempdir;

    fn record(words: u64, completed: bool) -> SessionRecord {
        SessionRecord::new(words, words * 2, completed)
    }

    #[test]
    fn test_empty_database_loads_nothing() {
        let store = SqliteHistoryStore::open_in_memory().unwrap();
        assert!(store.load_history().unwrap().is_empty());
    }

    #[test]
    fn test_save_then_load_preserves_order() {
        let mut store = SqliteHistoryStore::open_in_memory().unwrap();
        let records = vec![record(10, true), record(3, false), record(250, true)];
        store.save_history(&records).unwrap();

        let loaded = store.load_history().unwrap();
        assert_eq!(loaded, records);
    }

    #[test]
    fn test_save_only_appends_new_tail() {
        let mut store = SqliteHistoryStore::open_in_memory().unwrap();
        let mut records = vec![record(1, true)];
        store.save_history(&records).unwrap();

        records.push(record(2, false));
        store.save_history(&records).unwrap();
        store.save_history(&records).unwrap();

        assert_eq!(store.load_history().unwrap().len(), 2);
    }

    #[test]
    fn test_file_database_survives_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("history.db");
        {
            let mut store = SqliteHistoryStore::open(&path).unwrap();
            store.save_history(&[record(7, true)]).unwrap();
            assert_eq!(store.path(), Some(path.as_path()));
        }
        let store = SqliteHistoryStore::open(&path).unwrap();
        let loaded = store.load_history().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].words_written, 7);
    }

    #[test]
    fn test_two_recorders_on_one_file_keep_every_record() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("history.db");

        let open = || SessionRecorder::load(Box::new(SqliteHistoryStore::open(&path).unwrap()));
        let mut first = open().unwrap();
        let mut second = open().unwrap();

        assert!(first.record(100, 60, true).persisted.is_ok());
        assert!(second.record(200, 90, false).persisted.is_ok());
        assert!(first.record(300, 120, true).persisted.is_ok());

        let stored = SqliteHistoryStore::open(&path).unwrap().load_history().unwrap();
        let words: Vec<u64> = stored.iter().map(|r| r.words_written).collect();
        assert_eq!(words, vec![100, 200, 300]);
    }

    #[test]
    fn test_memory_store_can_fail() {
        let mut store = MemoryHistoryStore::new();
        store.fail_saves(true);
        assert!(matches!(
            store.save_history(&[record(1, true)]),
            Err(StorageError::Unavailable(_))
        ));
        store.fail_saves(false);
        store.save_history(&[record(1, true)]).unwrap();
        assert_eq!(store.records().len(), 1);
    }
}
