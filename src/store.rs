use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

pub type StoreResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// Durable key-value store behind the settings registry.
pub trait SettingsStore: Send + Sync {
    fn get(&self, key: &str) -> StoreResult<Option<String>>;

    fn set(&self, key: &str, value: &str) -> StoreResult<()>;

    /// Write several keys as one unit. The default falls back to
    /// sequential `set` calls.
    fn set_all(&self, entries: &[(&str, String)]) -> StoreResult<()> {
        for (key, value) in entries {
            self.set(key, value)?;
        }
        Ok(())
    }

    /// Flush pending writes to durable storage.
    fn sync(&self) -> StoreResult<()> {
        Ok(())
    }
}

pub struct SqliteSettingsStore {
    conn: Mutex<Connection>,
}

impl SqliteSettingsStore {
    pub fn open(path: &Path) -> StoreResult<Self> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> StoreResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS settings (
                key         TEXT PRIMARY KEY,
                value       TEXT NOT NULL,
                updated_at  INTEGER NOT NULL
            );",
        )?;
        Ok(())
    }

    fn upsert(conn: &Connection, key: &str, value: &str, now: i64) -> rusqlite::Result<usize> {
        conn.execute(
            "INSERT INTO settings (key, value, updated_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET
                value      = ?2,
                updated_at = ?3",
            params![key, value, now],
        )
    }

    #[cfg(test)]
    fn updated_at(&self, key: &str) -> StoreResult<Option<i64>> {
        let conn = self.conn.lock().unwrap();
        let ts = conn
            .query_row(
                "SELECT updated_at FROM settings WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(ts)
    }
}

impl SettingsStore for SqliteSettingsStore {
    fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let conn = self.conn.lock().unwrap();
        let value = conn
            .query_row(
                "SELECT value FROM settings WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        let conn = self.conn.lock().unwrap();
        Self::upsert(&conn, key, value, Utc::now().timestamp())?;
        Ok(())
    }

    fn set_all(&self, entries: &[(&str, String)]) -> StoreResult<()> {
        let mut conn = self.conn.lock().unwrap();
        let now = Utc::now().timestamp();
        let tx = conn.transaction()?;
        for (key, value) in entries {
            Self::upsert(&tx, key, value, now)?;
        }
        tx.commit()?;
        Ok(())
    }

    fn sync(&self) -> StoreResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.cache_flush()?;
        Ok(())
    }
}

/// Process-local store, used when no durable path is configured.
#[derive(Default)]
pub struct MemorySettingsStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemorySettingsStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SettingsStore for MemorySettingsStore {
    fn get(&self, key: &str) -> StoreResult<Option<String>> {
        Ok(self.values.lock().unwrap().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        self.values
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn set_all(&self, entries: &[(&str, String)]) -> StoreResult<()> {
        let mut values = self.values.lock().unwrap();
        for (key, value) in entries {
            values.insert(key.to_string(), value.clone());
        }
        Ok(())
    }
}
