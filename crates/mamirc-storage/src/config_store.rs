//! Key/value configuration database
//!
//! A single `main(key, value)` table of text pairs. Every writable database
//! carries a reserved `file type` row identifying it as a MamIRC
//! configuration file; that row cannot be changed through this API.

use std::path::Path;

use rusqlite::{params, Connection, OpenFlags, OptionalExtension};
use tracing::{debug, info};

use crate::error::StorageError;

/// Reserved key identifying the file
pub const FILE_TYPE_KEY: &str = "file type";

/// Value stored under [`FILE_TYPE_KEY`]
pub const FILE_TYPE_VALUE: &str = "MamIRC configuration";

/// Handle on a configuration database
pub struct ConfigStore {
    conn: Connection,
}

impl ConfigStore {
    /// Open an existing configuration database without write access
    pub fn open_read_only(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(StorageError::not_found(path.display().to_string()));
        }
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        Ok(Self { conn })
    }

    /// Open a configuration database for writing, creating it if needed
    pub fn open_or_create(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref();
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS main(
                key TEXT NOT NULL PRIMARY KEY,
                value TEXT NOT NULL
            )",
        )?;
        conn.execute(
            "INSERT OR IGNORE INTO main VALUES(?1, ?2)",
            params![FILE_TYPE_KEY, FILE_TYPE_VALUE],
        )?;

        info!(path = %path.display(), "Opened configuration database");
        Ok(Self { conn })
    }

    /// All pairs, ordered by key
    pub fn list(&self) -> Result<Vec<(String, String)>, StorageError> {
        let mut stmt = self
            .conn
            .prepare("SELECT key, value FROM main ORDER BY key ASC")?;
        let pairs = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(pairs)
    }

    /// Value stored under `key`, if any
    pub fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let value = self
            .conn
            .query_row("SELECT value FROM main WHERE key = ?1", params![key], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(value)
    }

    /// Insert or replace the value under `key`
    pub fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        Self::check_writable_key(key)?;
        self.conn.execute(
            "INSERT OR REPLACE INTO main VALUES(?1, ?2)",
            params![key, value],
        )?;
        debug!(key, "Set configuration value");
        Ok(())
    }

    /// Delete `key`, returning whether it existed
    pub fn delete(&self, key: &str) -> Result<bool, StorageError> {
        Self::check_writable_key(key)?;
        let removed = self
            .conn
            .execute("DELETE FROM main WHERE key = ?1", params![key])?;
        debug!(key, removed, "Deleted configuration value");
        Ok(removed > 0)
    }

    /// Reject keys that callers may not change; needs no open database
    pub fn check_writable_key(key: &str) -> Result<(), StorageError> {
        if key == FILE_TYPE_KEY {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_set_get_delete() {
        let temp_dir = TempDir::new().unwrap();
        let store = ConfigStore::open_or_create(temp_dir.path().join("config.sqlite")).unwrap();

        assert_eq!(store.get("nickname").unwrap(), None);
        store.set("nickname", "nayuki").unwrap();
        store.set("nickname", "mamirc").unwrap();
        assert_eq!(store.get("nickname").unwrap().as_deref(), Some("mamirc"));

        assert!(store.delete("nickname").unwrap());
        assert!(!store.delete("nickname").unwrap());
        assert_eq!(store.get("nickname").unwrap(), None);
    }

    #[test]
    fn test_file_type_row_is_reserved() {
        let temp_dir = TempDir::new().unwrap();
        let store = ConfigStore::open_or_create(temp_dir.path().join("config.sqlite")).unwrap();

        assert_eq!(store.get(FILE_TYPE_KEY).unwrap().as_deref(), Some(FILE_TYPE_VALUE));
        assert!(matches!(
            store.set(FILE_TYPE_KEY, "other"),
            Err(StorageError::InvalidKey(_))
        ));
        assert!(matches!(
            store.delete(FILE_TYPE_KEY),
            Err(StorageError::InvalidKey(_))
        ));
    }

    #[test]
    fn test_reserved_key_check_without_a_database() {
        assert!(matches!(
            ConfigStore::check_writable_key(FILE_TYPE_KEY),
            Err(StorageError::InvalidKey(key)) if key == FILE_TYPE_KEY
        ));
        assert!(ConfigStore::check_writable_key("web port").is_ok());
    }

    #[test]
    fn test_list_is_ordered_and_read_only_open_works() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.sqlite");
        {
            let store = ConfigStore::open_or_create(&path).unwrap();
            store.set("web port", "11972").unwrap();
            store.set("archive path", "MamircArchive.sqlite").unwrap();
        }

        let store = ConfigStore::open_read_only(&path).unwrap();
        let keys: Vec<String> = store.list().unwrap().into_iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["archive path", "file type", "web port"]);
        assert!(store.set("web port", "1").is_err());
    }

    #[test]
    fn test_read_only_open_requires_existing_file() {
        let temp_dir = TempDir::new().unwrap();
        let result = ConfigStore::open_read_only(temp_dir.path().join("missing.sqlite"));
        assert!(matches!(result, Err(StorageError::NotFound(_))));
    }
}
