//! Merging remote snapshots into local state.
//!
//! The mirror knows the previous remote snapshot but not the exact local
//! tree at the moment its action is applied. So the merge runs inside the
//! reducer, against the current state, with the previous snapshot shipped
//! alongside the new one.
//!
//! Per record, with `local`, `synced` (previous snapshot) and `remote`:
//!
//! | local vs synced | remote vs synced | result |
//! |---|---|---|
//! | not in synced | absent | local (not echoed yet) |
//! | equal | any | remote |
//! | differs | equal | local (edit not pushed yet) |
//! | differs | differs | policy decides |

use std::collections::{HashMap, HashSet};
use std::str::FromStr;

use serde_json::{Map, Value};

use crate::models::{Manicure, Polish, Record, Tool};
use crate::settings::Settings;

/// How a conflict is resolved: a record changed both locally and remotely
/// since the last sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MergePolicy {
    /// The remote copy wins, and records deleted here come back while the
    /// remote still has them.
    #[default]
    Replace,
    /// The pending local edit wins, and local deletes stick unless the
    /// remote copy changed since the last sync.
    LastWriteWins,
}

impl FromStr for MergePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "replace" => Ok(Self::Replace),
            "last-write-wins" | "lww" => Ok(Self::LastWriteWins),
            other => Err(format!("unknown merge policy: {other}")),
        }
    }
}

/// One remote collection snapshot together with the previous one.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteCollection<T> {
    pub policy: MergePolicy,
    pub records: Vec<T>,
    pub synced: HashMap<String, T>,
}

/// The remote settings document and the settings from the previous
/// snapshot (sync key stripped).
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteSettings {
    pub policy: MergePolicy,
    pub document: Map<String, Value>,
    pub synced: Option<Settings>,
}

/// Payload of [`Action::MergeRemote`](crate::Action::MergeRemote).
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteUpdate {
    Polishes(RemoteCollection<Polish>),
    Tools(RemoteCollection<Tool>),
    Manicures(RemoteCollection<Manicure>),
    Settings(RemoteSettings),
}

/// Merge a remote collection snapshot into `local`.
///
/// Keeps local display order: records new to this device come first in
/// snapshot order, followed by the surviving local records in their
/// existing order.
pub fn merge_records<T: Record>(
    policy: MergePolicy,
    local: &[T],
    synced: &HashMap<String, T>,
    remote: &[T],
) -> Vec<T> {
    let local_ids: HashSet<&str> = local.iter().map(Record::id).collect();
    let remote_by_id: HashMap<&str, &T> = remote.iter().map(|r| (r.id(), r)).collect();
    let changed_here = |record: &T| synced.get(record.id()).map_or(true, |s| !s.content_eq(record));

    let mut merged: Vec<T> = Vec::with_capacity(remote.len().max(local.len()));

    for record in remote {
        if local_ids.contains(record.id()) {
            continue;
        }
        // Deleted here and untouched over there.
        let deleted_here = policy == MergePolicy::LastWriteWins
            && synced.get(record.id()).is_some_and(|s| s.content_eq(record));
        if !deleted_here {
            merged.push(record.clone());
        }
    }

    for record in local {
        let dirty = changed_here(record);
        match remote_by_id.get(record.id()) {
            Some(theirs) => {
                let remote_moved = synced.get(record.id()).map_or(true, |s| !s.content_eq(theirs));
                let keep_local = dirty
                    && !record.content_eq(theirs)
                    && (!remote_moved || policy == MergePolicy::LastWriteWins);
                merged.push(if keep_local { record.clone() } else { (*theirs).clone() });
            }
            // Missing remotely: kept only while it still has to be pushed.
            None if dirty => merged.push(record.clone()),
            None => {}
        }
    }

    merged
}

/// Merge a remote settings document into `local`. The local sync key
/// always survives.
pub fn merge_settings(local: &Settings, update: &RemoteSettings) -> Settings {
    let theirs = local.merge_remote(&update.document);
    let Some(synced) = update.synced.as_ref() else {
        // First snapshot of the session: local settings were pushed on
        // activation and win.
        return local.clone();
    };
    if local.without_sync_key() == *synced {
        return theirs;
    }
    let remote_moved = theirs.without_sync_key() != *synced;
    if remote_moved && update.policy == MergePolicy::Replace {
        theirs
    } else {
        local.clone()
    }
}
