//! # lacquer-store
//!
//! Local persistence for Lacquer, backed by SQLite.
//!
//! The whole state tree is stored as one JSON document in a key/value
//! table and rewritten on every change. The crate also owns the backup
//! file format.

pub mod backup;
pub mod database;
pub mod migrations;
pub mod snapshot;

mod error;

pub use backup::{backup_file_name, export_backup, parse_backup, save_backup_to_dir};
pub use database::Database;
pub use error::{Result, StoreError};
pub use snapshot::{decode_state, LocalPersistence};
