//! v001 -- Initial schema creation.
//!
//! Creates the `kv_store` table that holds the persisted state document.

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
const UP_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS kv_store (
    key        TEXT PRIMARY KEY NOT NULL,
    value      TEXT NOT NULL,             -- JSON document
    updated_at TEXT NOT NULL              -- RFC-3339
);
"#;

/// Apply the v001 migration.
pub fn up(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(UP_SQL)
}
