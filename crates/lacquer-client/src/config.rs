//! Client configuration loaded from environment variables.
//!
//! Every setting has a default, so the CLI works with zero configuration
//! against the platform data directory.

use std::path::PathBuf;
use std::time::Duration;

use lacquer_store::{Database, Result as StoreResult};
use lacquer_sync::{MergePolicy, MirrorConfig};
use tracing::warn;

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// SQLite database file.
    /// Env: `LACQUER_DB_PATH`
    /// Default: `lacquer.db` in the platform data directory.
    pub db_path: Option<PathBuf>,

    /// Base URL of the remote document service.
    /// Env: `LACQUER_REMOTE_URL`
    /// Default: none (the `sync` command refuses to start).
    pub remote_url: Option<String>,

    /// Env: `LACQUER_SYNC_DEBOUNCE_MS`
    /// Default: `300`
    pub sync_debounce: Duration,

    /// How often the HTTP remote re-reads each feed.
    /// Env: `LACQUER_POLL_INTERVAL_MS`
    /// Default: `2000`
    pub poll_interval: Duration,

    /// Env: `LACQUER_MERGE_POLICY` (`replace`, `last-write-wins`)
    /// Default: `replace`
    pub merge_policy: MergePolicy,

    /// Env: `LACQUER_BACKUP_DIR`
    /// Default: `backups/` in the platform data directory.
    pub backup_dir: Option<PathBuf>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            db_path: None,
            remote_url: None,
            sync_debounce: Duration::from_millis(300),
            poll_interval: Duration::from_millis(2000),
            merge_policy: MergePolicy::Replace,
            backup_dir: None,
        }
    }
}

impl ClientConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build a config from an arbitrary variable source, falling back to
    /// defaults for anything missing or unparseable.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(path) = lookup("LACQUER_DB_PATH").filter(|v| !v.trim().is_empty()) {
            config.db_path = Some(PathBuf::from(path));
        }

        if let Some(url) = lookup("LACQUER_REMOTE_URL").filter(|v| !v.trim().is_empty()) {
            config.remote_url = Some(url.trim().to_string());
        }

        if let Some(ms) = lookup("LACQUER_SYNC_DEBOUNCE_MS") {
            match ms.trim().parse::<u64>() {
                Ok(ms) => config.sync_debounce = Duration::from_millis(ms),
                Err(_) => warn!(value = %ms, "Invalid LACQUER_SYNC_DEBOUNCE_MS, using default"),
            }
        }

        if let Some(ms) = lookup("LACQUER_POLL_INTERVAL_MS") {
            match ms.trim().parse::<u64>() {
                Ok(ms) if ms > 0 => config.poll_interval = Duration::from_millis(ms),
                _ => warn!(value = %ms, "Invalid LACQUER_POLL_INTERVAL_MS, using default"),
            }
        }

        if let Some(policy) = lookup("LACQUER_MERGE_POLICY") {
            match policy.parse::<MergePolicy>() {
                Ok(policy) => config.merge_policy = policy,
                Err(e) => warn!(value = %policy, error = %e, "Invalid LACQUER_MERGE_POLICY, using default"),
            }
        }

        if let Some(dir) = lookup("LACQUER_BACKUP_DIR").filter(|v| !v.trim().is_empty()) {
            config.backup_dir = Some(PathBuf::from(dir));
        }

        config
    }

    pub fn open_database(&self) -> StoreResult<Database> {
        match &self.db_path {
            Some(path) => Database::open_at(path),
            None => Database::new(),
        }
    }

    pub fn backup_dir(&self) -> StoreResult<PathBuf> {
        match &self.backup_dir {
            Some(dir) => Ok(dir.clone()),
            None => Ok(Database::data_dir()?.join("backups")),
        }
    }

    pub fn mirror_config(&self) -> MirrorConfig {
        MirrorConfig {
            debounce: self.sync_debounce,
            policy: self.merge_policy,
        }
    }
}
