//! Crash-recovery slot backends.

use std::path::Path;
use std::sync::{Arc, Mutex};

use rusqlite::{params, Connection};

use super::Checkpoint;
use crate::error::CheckpointError;

const CHECKPOINT_KEY: &str = "active_session_checkpoint";

/// Storage for the single recovery slot.
///
/// Implementations are driven from a blocking writer task, never from the
/// session actor.
pub trait CheckpointStore: Send + 'static {
    fn load(&self) -> Result<Option<Checkpoint>, CheckpointError>;
    fn save(&mut self, checkpoint: &Checkpoint) -> Result<(), CheckpointError>;
    fn clear(&mut self) -> Result<(), CheckpointError>;
}

/// Checkpoint slot stored as one JSON row in a SQLite `kv` table.
pub struct SqliteCheckpointStore {
    conn: Connection,
}

impl SqliteCheckpointStore {
    /// Open (or create) the database at `path`.
    ///
    /// # Errors
    /// Returns an error if the parent directory cannot be created or the
    /// database cannot be opened or migrated.
    pub fn open(path: &Path) -> Result<Self, CheckpointError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        let store = Self { conn };
        store.migrate()?;
        Ok(store)
    }

    /// Open an in-memory database (for testing).
    ///
    /// # Errors
    /// Returns an error if the schema cannot be created.
    pub fn open_memory() -> Result<Self, CheckpointError> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.migrate()?;
        Ok(store)
    }

    fn migrate(&self) -> Result<(), rusqlite::Error> {
        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS kv (
                key   TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );",
        )
    }

    fn kv_get(&self, key: &str) -> Result<Option<String>, rusqlite::Error> {
        let mut stmt = self.conn.prepare("SELECT value FROM kv WHERE key = ?1")?;
        let mut rows = stmt.query(params![key])?;
        match rows.next()? {
            Some(row) => Ok(Some(row.get(0)?)),
            None => Ok(None),
        }
    }
}

impl CheckpointStore for SqliteCheckpointStore {
    fn load(&self) -> Result<Option<Checkpoint>, CheckpointError> {
        match self.kv_get(CHECKPOINT_KEY)? {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    fn save(&mut self, checkpoint: &Checkpoint) -> Result<(), CheckpointError> {
        let json = serde_json::to_string(checkpoint)?;
        self.conn.execute(
            "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
            params![CHECKPOINT_KEY, json],
        )?;
        Ok(())
    }

    fn clear(&mut self) -> Result<(), CheckpointError> {
        self.conn
            .execute("DELETE FROM kv WHERE key = ?1", params![CHECKPOINT_KEY])?;
        Ok(())
    }
}

/// In-process slot. Clones share the same slot, so a test can keep one
/// clone to inspect what the service wrote.
#[derive(Debug, Clone, Default)]
pub struct MemoryCheckpointStore {
    slot: Arc<Mutex<Option<Checkpoint>>>,
}

impl MemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_checkpoint(checkpoint: Checkpoint) -> Self {
        Self {
            slot: Arc::new(Mutex::new(Some(checkpoint))),
        }
    }

    pub fn current(&self) -> Option<Checkpoint> {
        self.slot
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn set(&self, value: Option<Checkpoint>) {
        *self
            .slot
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = value;
    }
}

impl CheckpointStore for MemoryCheckpointStore {
    fn load(&self) -> Result<Option<Checkpoint>, CheckpointError> {
        Ok(self.current())
    }

    fn save(&mut self, checkpoint: &Checkpoint) -> Result<(), CheckpointError> {
        self.set(Some(checkpoint.clone()));
        Ok(())
    }

    fn clear(&mut self) -> Result<(), CheckpointError> {
        self.set(None);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{Clock, ManualClock};
    use crate::config::TimerConfig;
    use crate::repository::SessionRepository;
    use crate::session::SessionSettings;
    use chrono::Utc;

    fn checkpoint() -> Checkpoint {
        let clock = ManualClock::new(Utc::now());
        let mut repo = SessionRepository::new();
        repo.start(
            25,
            SessionSettings::from(&TimerConfig::default()),
            clock.now().unwrap(),
        )
        .unwrap();
        repo.checkpoint().unwrap()
    }

    #[test]
    fn sqlite_slot_holds_one_checkpoint() {
        let mut store = SqliteCheckpointStore::open_memory().unwrap();
        assert!(store.load().unwrap().is_none());

        let first = checkpoint();
        store.save(&first).unwrap();
        let second = checkpoint();
        store.save(&second).unwrap();
        assert_eq!(store.load().unwrap(), Some(second));

        store.clear().unwrap();
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn sqlite_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("lightime.db");
        let saved = checkpoint();
        {
            let mut store = SqliteCheckpointStore::open(&path).unwrap();
            store.save(&saved).unwrap();
        }
        let store = SqliteCheckpointStore::open(&path).unwrap();
        assert_eq!(store.load().unwrap(), Some(saved));
    }

    #[test]
    fn corrupt_row_is_reported() {
        let store = SqliteCheckpointStore::open_memory().unwrap();
        store
            .conn
            .execute(
                "INSERT INTO kv (key, value) VALUES (?1, ?2)",
                params![CHECKPOINT_KEY, "{not json"],
            )
            .unwrap();
        assert!(matches!(store.load(), Err(CheckpointError::Corrupt(_))));
    }

    #[test]
    fn memory_clones_share_the_slot() {
        let store = MemoryCheckpointStore::new();
        let mut writer = store.clone();
        writer.save(&checkpoint()).unwrap();
        assert!(store.current().is_some());
        writer.clear().unwrap();
        assert!(store.current().is_none());
    }
}
