//! Stale-fallback recall store: persists the last successful response
//! bundle per query hash so a request can still return something when
//! every provider fails (spec §6 "Persisted state", §7 propagation
//! policy). Grounded on the connection-locking discipline of the
//! teacher's `memory::store::SqliteMemoryStore`.

use std::sync::{Arc, Mutex};

use rusqlite::{params, Connection};

use crate::error::{Error, Result};

/// Recent-index cap (spec §6: "recent index of hashes capped at 120").
pub const MAX_RECENT_HASHES: usize = 120;

#[derive(Debug, Clone)]
pub struct StaleFallbackEntry {
    pub hash: String,
    pub response_json: String,
    pub stored_at: chrono::DateTime<chrono::Utc>,
}

pub struct FallbackStore {
    conn: Arc<Mutex<Connection>>,
}

impl FallbackStore {
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path).map_err(|e| Error::cache(e.to_string()))?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.with_conn(|conn| {
            conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS stale_fallback (
                    hash TEXT PRIMARY KEY,
                    response_json TEXT NOT NULL,
                    stored_at TEXT NOT NULL
                );",
            )
        })?;
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::open(":memory:")
    }

    fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> rusqlite::Result<T>) -> Result<T> {
        let conn = self.conn.lock().expect("fallback store mutex poisoned");
        f(&conn).map_err(|e| Error::cache(e.to_string()))
    }

    /// Store (or overwrite) the entry for `hash`, then trim the table
    /// down to [`MAX_RECENT_HASHES`] rows by recency.
    pub fn put(&self, hash: &str, response_json: &str) -> Result<()> {
        let now = chrono::Utc::now().to_rfc3339();
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO stale_fallback (hash, response_json, stored_at)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT(hash) DO UPDATE SET response_json = excluded.response_json,
                     stored_at = excluded.stored_at",
                params![hash, response_json, now],
            )?;
            conn.execute(
                "DELETE FROM stale_fallback WHERE hash NOT IN (
                    SELECT hash FROM stale_fallback ORDER BY stored_at DESC LIMIT ?1
                )",
                params![MAX_RECENT_HASHES as i64],
            )?;
            Ok(())
        })
    }

    /// Look up the entry for an exact hash match (spec §7: "an entry
    /// matches the exact hash").
    pub fn get(&self, hash: &str) -> Result<Option<StaleFallbackEntry>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT hash, response_json, stored_at FROM stale_fallback WHERE hash = ?1",
                params![hash],
                |row| {
                    let stored_at: String = row.get(2)?;
                    Ok(StaleFallbackEntry {
                        hash: row.get(0)?,
                        response_json: row.get(1)?,
                        stored_at: chrono::DateTime::parse_from_rfc3339(&stored_at)
                            .map(|dt| dt.with_timezone(&chrono::Utc))
                            .unwrap_or_else(|_| chrono::Utc::now()),
                    })
                },
            )
            .map(Some)
            .or_else(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                other => Err(other),
            })
        })
    }

    pub fn len(&self) -> Result<usize> {
        self.with_conn(|conn| {
            conn.query_row("SELECT COUNT(*) FROM stale_fallback", [], |row| row.get(0))
        })
        .map(|n: i64| n as usize)
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_then_get_round_trips() {
        let store = FallbackStore::open_in_memory().unwrap();
        store.put("hash-1", "{\"cases\":[]}").unwrap();
        let entry = store.get("hash-1").unwrap().unwrap();
        assert_eq!(entry.response_json, "{\"cases\":[]}");
    }

    #[test]
    fn unknown_hash_returns_none() {
        let store = FallbackStore::open_in_memory().unwrap();
        assert!(store.get("nope").unwrap().is_none());
    }

    #[test]
    fn caps_at_max_recent_hashes() {
        let store = FallbackStore::open_in_memory().unwrap();
        for i in 0..(MAX_RECENT_HASHES + 10) {
            store.put(&format!("hash-{i}"), "{}").unwrap();
        }
        assert_eq!(store.len().unwrap(), MAX_RECENT_HASHES);
    }
}
