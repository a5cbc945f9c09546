//! Persisted-store facade with degrade-to-miss semantics.
//!
//! Every storage failure -- the database failing to open, a read/write
//! error, a corrupt JSON blob -- is caught here, logged, and treated as a
//! cache miss or a dropped write.  No caller above this type ever receives
//! a storage error.

use std::path::Path;
use std::sync::Mutex;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::warn;

use gather_store::Database;

/// Durable key-value storage that never fails upward.
pub struct PersistedStore {
    // `None` when the device store could not be opened; the facade then
    // behaves as a permanently empty cache.
    db: Mutex<Option<Database>>,
}

impl PersistedStore {
    /// Open the platform-default store.  An open failure is logged and
    /// tolerated; the store runs empty.
    pub fn open_default() -> Self {
        match Database::new() {
            Ok(db) => Self {
                db: Mutex::new(Some(db)),
            },
            Err(e) => {
                warn!(error = %e, "persisted store unavailable, running without it");
                Self {
                    db: Mutex::new(None),
                }
            }
        }
    }

    /// Open a store at an explicit path.
    pub fn open_at(path: &Path) -> Self {
        match Database::open_at(path) {
            Ok(db) => Self {
                db: Mutex::new(Some(db)),
            },
            Err(e) => {
                warn!(path = %path.display(), error = %e, "persisted store unavailable");
                Self {
                    db: Mutex::new(None),
                }
            }
        }
    }

    /// In-memory store for tests and storage-less fallback.
    pub fn in_memory() -> Self {
        match Database::in_memory() {
            Ok(db) => Self {
                db: Mutex::new(Some(db)),
            },
            Err(e) => {
                warn!(error = %e, "in-memory store unavailable");
                Self {
                    db: Mutex::new(None),
                }
            }
        }
    }

    fn with_db<T>(
        &self,
        op: &'static str,
        f: impl FnOnce(&Database) -> Result<T, gather_store::StoreError>,
    ) -> Option<T> {
        let guard = match self.db.lock() {
            Ok(g) => g,
            Err(e) => {
                warn!(op, error = %e, "store lock poisoned, treating as miss");
                return None;
            }
        };
        let db = guard.as_ref()?;
        match f(db) {
            Ok(v) => Some(v),
            Err(e) => {
                warn!(op, error = %e, "store operation failed, treating as miss");
                None
            }
        }
    }

    /// Read and decode a JSON value.  Any failure is a miss.
    pub fn get_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let bytes = self.with_db("get", |db| db.get(key))??;
        match serde_json::from_slice(&bytes) {
            Ok(v) => Some(v),
            Err(e) => {
                warn!(key, error = %e, "corrupt cache value, treating as miss");
                None
            }
        }
    }

    /// Encode and write a JSON value.  Failures are logged and dropped.
    pub fn set_json<T: Serialize>(&self, key: &str, value: &T) {
        let bytes = match serde_json::to_vec(value) {
            Ok(b) => b,
            Err(e) => {
                warn!(key, error = %e, "failed to encode cache value, dropping write");
                return;
            }
        };
        self.with_db("set", |db| db.set(key, &bytes));
    }

    /// Remove a key.  Failures are logged and dropped.
    pub fn remove(&self, key: &str) {
        self.with_db("remove", |db| db.remove(key));
    }

    /// Remove every key under a prefix.  Failures are logged and dropped.
    pub fn remove_matching_prefix(&self, prefix: &str) {
        self.with_db("remove_prefix", |db| db.remove_matching_prefix(prefix));
    }

    /// Remove everything.  Failures are logged and dropped.
    pub fn clear_all(&self) {
        self.with_db("clear_all", |db| db.clear_all());
    }
}
