//! Database connection management.
//!
//! The [`Database`] struct owns a [`rusqlite::Connection`] and guarantees that
//! migrations are run before any other operation.

use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use rusqlite::{params, Connection, OptionalExtension};

use crate::error::{Result, StoreError};
use crate::migrations;

/// Wrapper around a [`rusqlite::Connection`].
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Platform data directory for Lacquer:
    /// - Linux:   `~/.local/share/lacquer`
    /// - macOS:   `~/Library/Application Support/app.lacquer.lacquer`
    /// - Windows: `{FOLDERID_RoamingAppData}\lacquer\lacquer\data`
    pub fn data_dir() -> Result<PathBuf> {
        let project_dirs =
            ProjectDirs::from("app", "lacquer", "lacquer").ok_or(StoreError::NoDataDir)?;
        Ok(project_dirs.data_dir().to_path_buf())
    }

    /// Open (or create) the default application database.
    pub fn new() -> Result<Self> {
        let data_dir = Self::data_dir()?;
        std::fs::create_dir_all(&data_dir)?;

        let db_path = data_dir.join("lacquer.db");

        tracing::info!(path = %db_path.display(), "opening database");

        Self::open_at(&db_path)
    }

    /// Open (or create) a database at an explicit path.
    pub fn open_at(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;

        Self::init(conn)
    }

    /// Open a throwaway database that lives only as long as the handle.
    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        migrations::run_migrations(&conn)?;
        Ok(Self { conn })
    }

    /// Return a reference to the underlying `rusqlite::Connection`.
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Return the filesystem path of the open database (if any).
    pub fn path(&self) -> Option<PathBuf> {
        self.conn
            .path()
            .filter(|p| !p.is_empty())
            .map(PathBuf::from)
    }

    /// Read the raw value stored under `key`.
    pub fn get_value(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM kv_store WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    /// Overwrite the value stored under `key`.
    pub fn put_value(&self, key: &str, value: &str) -> Result<()> {
        self.conn.execute(
            "INSERT INTO kv_store (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![key, value, chrono::Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    pub fn delete_value(&self, key: &str) -> Result<bool> {
        let affected = self
            .conn
            .execute("DELETE FROM kv_store WHERE key = ?1", params![key])?;
        Ok(affected > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("test.db");

        let db = Database::open_at(&path).expect("should open");
        assert!(db.path().is_some());
        assert!(path.exists());
    }

    #[test]
    fn in_memory_has_no_path() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.path().is_none());
    }

    #[test]
    fn values_overwrite() {
        let db = Database::open_in_memory().unwrap();
        assert_eq!(db.get_value("k").unwrap(), None);

        db.put_value("k", "one").unwrap();
        db.put_value("k", "two").unwrap();
        assert_eq!(db.get_value("k").unwrap().as_deref(), Some("two"));

        assert!(db.delete_value("k").unwrap());
        assert!(!db.delete_value("k").unwrap());
        assert_eq!(db.get_value("k").unwrap(), None);
    }

    #[test]
    fn reopen_keeps_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.db");

        Database::open_at(&path).unwrap().put_value("k", "v").unwrap();
        let db = Database::open_at(&path).unwrap();
        assert_eq!(db.get_value("k").unwrap().as_deref(), Some("v"));
    }
}
