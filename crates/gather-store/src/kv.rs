//! Key-value operations over the `kv` table.
//!
//! Values are opaque byte blobs (in practice always JSON).  There is no
//! transactional guarantee across keys: callers that update two keys
//! together accept the risk of partial application and must be idempotent
//! to torn writes.

use chrono::Utc;
use rusqlite::{params, OptionalExtension};

use crate::database::Database;
use crate::error::Result;

impl Database {
    /// Fetch the value stored under `key`, or `None` if absent.
    pub fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let value = self
            .conn()
            .query_row(
                "SELECT value FROM kv WHERE key = ?1",
                params![key],
                |row| row.get::<_, Vec<u8>>(0),
            )
            .optional()?;
        Ok(value)
    }

    /// Insert or replace the value stored under `key`.
    pub fn set(&self, key: &str, value: &[u8]) -> Result<()> {
        self.conn().execute(
            "INSERT INTO kv (key, value, updated_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET
                 value = excluded.value,
                 updated_at = excluded.updated_at",
            params![key, value, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    /// Remove a single key.  Returns `true` if a row was deleted.
    pub fn remove(&self, key: &str) -> Result<bool> {
        let affected = self
            .conn()
            .execute("DELETE FROM kv WHERE key = ?1", params![key])?;
        Ok(affected > 0)
    }

    /// Remove every key starting with `prefix`.  Returns the number of
    /// rows deleted.
    pub fn remove_matching_prefix(&self, prefix: &str) -> Result<usize> {
        let affected = self.conn().execute(
            "DELETE FROM kv WHERE key LIKE ?1 ESCAPE '\\'",
            params![like_prefix(prefix)],
        )?;
        Ok(affected)
    }

    /// Remove every stored key.
    pub fn clear_all(&self) -> Result<()> {
        self.conn().execute("DELETE FROM kv", [])?;
        Ok(())
    }

    /// List all keys starting with `prefix`, in lexicographic order.
    /// Diagnostics helper.
    pub fn list_keys(&self, prefix: &str) -> Result<Vec<String>> {
        let mut stmt = self
            .conn()
            .prepare("SELECT key FROM kv WHERE key LIKE ?1 ESCAPE '\\' ORDER BY key ASC")?;

        let rows = stmt.query_map(params![like_prefix(prefix)], |row| row.get::<_, String>(0))?;

        let mut keys = Vec::new();
        for row in rows {
            keys.push(row?);
        }
        Ok(keys)
    }
}

/// Turn a literal key prefix into a `LIKE` pattern, escaping the wildcard
/// characters so they match themselves.
fn like_prefix(prefix: &str) -> String {
    let mut pattern = String::with_capacity(prefix.len() + 1);
    for c in prefix.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

#[cfg(test)]
mod tests {
    use crate::database::Database;

    #[test]
    fn set_get_remove_round_trip() {
        let db = Database::in_memory().unwrap();

        assert!(db.get("auth_token").unwrap().is_none());

        db.set("auth_token", b"tok_abc").unwrap();
        assert_eq!(db.get("auth_token").unwrap().unwrap(), b"tok_abc");

        // Upsert replaces.
        db.set("auth_token", b"tok_def").unwrap();
        assert_eq!(db.get("auth_token").unwrap().unwrap(), b"tok_def");

        assert!(db.remove("auth_token").unwrap());
        assert!(!db.remove("auth_token").unwrap());
        assert!(db.get("auth_token").unwrap().is_none());
    }

    #[test]
    fn prefix_removal_only_touches_matching_keys() {
        let db = Database::in_memory().unwrap();

        db.set("starred_events_cache_1", b"[1,2]").unwrap();
        db.set("starred_events_cache_2", b"[3]").unwrap();
        db.set("user_events_cache_1", b"[4]").unwrap();

        let removed = db.remove_matching_prefix("starred_events_cache_").unwrap();
        assert_eq!(removed, 2);
        assert!(db.get("starred_events_cache_1").unwrap().is_none());
        assert_eq!(db.get("user_events_cache_1").unwrap().unwrap(), b"[4]");
    }

    #[test]
    fn clear_all_empties_store() {
        let db = Database::in_memory().unwrap();
        db.set("a", b"1").unwrap();
        db.set("b", b"2").unwrap();
        db.clear_all().unwrap();
        assert!(db.list_keys("").unwrap().is_empty());
    }

    #[test]
    fn values_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kv.db");

        {
            let db = Database::open_at(&path).unwrap();
            db.set("event_detail_cache_42", b"{\"id\":42}").unwrap();
        }

        let db = Database::open_at(&path).unwrap();
        assert_eq!(
            db.get("event_detail_cache_42").unwrap().unwrap(),
            b"{\"id\":42}"
        );
    }
}
