use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::error::StorageError;
use crate::history::HistoryStore;

/// Outcome of one finished session. Never changed once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub timestamp: DateTime<Local>,
    pub duration_seconds: u64,
    pub words_written: u64,
    pub completed: bool,
}

impl SessionRecord {
    pub fn new(words_written: u64, duration_seconds: u64, completed: bool) -> Self {
        Self {
            timestamp: Local::now(),
            duration_seconds,
            words_written,
            completed,
        }
    }
}

/// A freshly appended record and whether it reached the store.
#[derive(Debug)]
pub struct Recorded {
    pub record: SessionRecord,
    pub persisted: Result<(), StorageError>,
}

pub type HistoryObserver = Box<dyn FnMut(&[SessionRecord])>;

/// Append-only session history backed by a [`HistoryStore`].
pub struct SessionRecorder {
    history: Vec<SessionRecord>,
    store: Box<dyn HistoryStore>,
    observers: Vec<HistoryObserver>,
}

impl SessionRecorder {
    pub fn new(store: Box<dyn HistoryStore>) -> Self {
        Self {
            history: Vec::new(),
            store,
            observers: Vec::new(),
        }
    }

    /// Starts from whatever the store already holds.
    pub fn load(store: Box<dyn HistoryStore>) -> Result<Self, StorageError> {
        let history = store.load_history()?;
        Ok(Self {
            history,
            store,
            observers: Vec::new(),
        })
    }

    pub fn history(&self) -> &[SessionRecord] {
        &self.history
    }

    /// Observers receive the full history after every append.
    pub fn subscribe(&mut self, observer: HistoryObserver) {
        self.observers.push(observer);
    }

    /// Appends a record, persists the history and notifies observers.
    /// The record stays in memory even when saving fails.
    pub fn record(&mut self, words_written: u64, duration_seconds: u64, completed: bool) -> Recorded {
        let record = SessionRecord::new(words_written, duration_seconds, completed);
        self.history.push(record.clone());

        let persisted = self.store.save_history(&self.history);
        if let Err(ref e) = persisted {
            tracing::warn!(error = %e, "session history not saved");
        }

        for observer in self.observers.iter_mut() {
            observer(&self.history);
        }

        Recorded { record, persisted }
    }
}

impl std::fmt::Debug for SessionRecorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRecorder")
            .field("history", &self.history.len())
            .field("observers", &self.observers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::MemoryHistoryStore;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn test_record_appends_in_order() {
        let store = MemoryHistoryStore::new();
        let mut recorder = SessionRecorder::new(Box::new(store.clone()));

        recorder.record(120, 300, true);
        recorder.record(0, 12, false);

        let history = recorder.history();
        assert_eq!(history.len(), 2);
        assert!(history[0].completed);
        assert_eq!(history[1].words_written, 0);
        assert_eq!(store.records(), history);
    }

    #[test]
    fn test_failed_save_keeps_record_and_notifies() {
        let store = MemoryHistoryStore::new();
        store.fail_saves(true);
        let mut recorder = SessionRecorder::new(Box::new(store.clone()));

        let seen = Rc::new(Cell::new(0));
        let counter = seen.clone();
        recorder.subscribe(Box::new(move |history| counter.set(history.len())));

        let recorded = recorder.record(42, 60, true);
        assert!(recorded.persisted.is_err());
        assert_eq!(recorded.record.words_written, 42);
        assert_eq!(recorder.history().len(), 1);
        assert_eq!(seen.get(), 1);
        assert!(store.records().is_empty());
    }

    #[test]
    fn test_load_starts_from_stored_history() {
        let store = MemoryHistoryStore::new();
        {
            let mut first = SessionRecorder::new(Box::new(store.clone()));
            first.record(10, 10, true);
        }
        let recorder = SessionRecorder::load(Box::new(store)).unwrap();
        assert_eq!(recorder.history().len(), 1);
    }
}
