// src/store.rs
// Durable record of "already notified" fingerprints. SQLite behind a mutex;
// one cycle runs at a time in-process, but the UNIQUE constraint still guards
// against a second instance racing us on insert.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use std::collections::HashSet;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use crate::fingerprint::Fingerprint;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Time-indexed set of emitted fingerprints.
pub trait FingerprintStore: Send + Sync {
    /// All fingerprints with `recorded_at >= window_start`. Empty set, not an
    /// error, when nothing qualifies.
    fn recent(&self, window_start: DateTime<Utc>) -> Result<HashSet<Fingerprint>, StoreError>;

    /// Record `digests` with `recorded_at = now`, in one transaction.
    /// Re-inserting a digest that is already present is a no-op.
    fn insert(&self, digests: &HashSet<Fingerprint>) -> Result<(), StoreError>;

    /// Delete every entry with `recorded_at < older_than`. Returns the number
    /// of rows removed; zero qualifying rows is fine.
    fn purge(&self, older_than: DateTime<Utc>) -> Result<usize, StoreError>;
}

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

fn acquire(conn: &Mutex<Connection>) -> MutexGuard<'_, Connection> {
    match conn.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            tracing::warn!("store mutex was poisoned, recovering");
            poisoned.into_inner()
        }
    }
}

impl SqliteStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        Self::init(conn)
    }

    /// Scratch store for tests and tooling.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS hashes (
                 id          INTEGER PRIMARY KEY AUTOINCREMENT,
                 hash        TEXT NOT NULL UNIQUE,
                 recorded_at INTEGER NOT NULL
             );
             CREATE INDEX IF NOT EXISTS idx_hashes_recorded_at
                 ON hashes (recorded_at);",
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Insert with an explicit `recorded_at`. Test/tooling hook; the trait's
    /// `insert` always stamps the current time.
    pub fn insert_at(
        &self,
        digests: &HashSet<Fingerprint>,
        recorded_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut conn = acquire(&self.conn);
        let tx = conn.transaction()?;
        {
            let mut stmt =
                tx.prepare("INSERT OR IGNORE INTO hashes (hash, recorded_at) VALUES (?1, ?2)")?;
            for digest in digests {
                stmt.execute(params![digest.as_str(), recorded_at.timestamp()])?;
            }
        }
        tx.commit()?;
        Ok(())
    }
}

impl FingerprintStore for SqliteStore {
    fn recent(&self, window_start: DateTime<Utc>) -> Result<HashSet<Fingerprint>, StoreError> {
        let conn = acquire(&self.conn);
        let mut stmt = conn.prepare("SELECT hash FROM hashes WHERE recorded_at >= ?1")?;
        let rows = stmt.query_map(params![window_start.timestamp()], |row| {
            row.get::<_, String>(0)
        })?;
        let mut out = HashSet::new();
        for row in rows {
            out.insert(Fingerprint::from_stored(row?));
        }
        Ok(out)
    }

    fn insert(&self, digests: &HashSet<Fingerprint>) -> Result<(), StoreError> {
        self.insert_at(digests, Utc::now())
    }

    fn purge(&self, older_than: DateTime<Utc>) -> Result<usize, StoreError> {
        let mut conn = acquire(&self.conn);
        let tx = conn.transaction()?;
        let removed = tx.execute(
            "DELETE FROM hashes WHERE recorded_at < ?1",
            params![older_than.timestamp()],
        )?;
        tx.commit()?;
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn set(values: &[&str]) -> HashSet<Fingerprint> {
        values
            .iter()
            .map(|v| Fingerprint::of_payload(v))
            .collect()
    }

    #[test]
    fn insert_is_idempotent() {
        let store = SqliteStore::open_in_memory().unwrap();
        let digests = set(&["a"]);
        store.insert(&digests).unwrap();
        store.insert(&digests).unwrap();
        let all = store.recent(Utc::now() - Duration::hours(1)).unwrap();
        assert_eq!(all.len(), 1);
    }

    #[test]
    fn recent_respects_window_start() {
        let store = SqliteStore::open_in_memory().unwrap();
        let now = Utc::now();
        store.insert_at(&set(&["old"]), now - Duration::days(10)).unwrap();
        store.insert_at(&set(&["fresh"]), now - Duration::hours(1)).unwrap();

        let recent = store.recent(now - Duration::days(7)).unwrap();
        assert_eq!(recent.len(), 1);
        assert!(recent.contains(&Fingerprint::of_payload("fresh")));

        // Empty store region is an empty set, not an error.
        assert!(store.recent(now + Duration::hours(1)).unwrap().is_empty());
    }

    #[test]
    fn purge_removes_only_expired() {
        let store = SqliteStore::open_in_memory().unwrap();
        let now = Utc::now();
        store.insert_at(&set(&["old"]), now - Duration::days(10)).unwrap();
        store.insert_at(&set(&["fresh"]), now - Duration::hours(1)).unwrap();

        let removed = store.purge(now - Duration::days(7)).unwrap();
        assert_eq!(removed, 1);
        let left = store.recent(now - Duration::days(30)).unwrap();
        assert_eq!(left.len(), 1);
        assert!(left.contains(&Fingerprint::of_payload("fresh")));

        // No qualifying rows: still fine.
        assert_eq!(store.purge(now - Duration::days(7)).unwrap(), 0);
    }
}
