//! The local persistence adapter.
//!
//! One JSON document under [`STATE_STORAGE_KEY`] holds the entire
//! [`AppState`]. It is read once at boot and overwritten after every state
//! change. Neither direction is ever fatal: a missing or corrupt document
//! boots with defaults, and a failed write is logged and forgotten.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use lacquer_shared::constants::STATE_STORAGE_KEY;
use lacquer_shared::AppState;

use crate::database::Database;
use crate::error::Result;

/// Decode a stored document by merging its top-level fields over a fresh
/// default state. `null` fields keep the default; settings are normalized
/// on the way in.
pub fn decode_state(raw: Value, now: DateTime<Utc>) -> serde_json::Result<AppState> {
    let Value::Object(stored) = raw else {
        return Err(serde::de::Error::custom("state document is not a JSON object"));
    };

    let mut merged = match serde_json::to_value(AppState::new(now))? {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    for (field, value) in stored {
        if !value.is_null() {
            merged.insert(field, value);
        }
    }

    serde_json::from_value(Value::Object(merged))
}

/// Reads and writes the state document through a [`Database`].
pub struct LocalPersistence {
    db: Database,
}

impl LocalPersistence {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Load the persisted state, or `None` when nothing was saved yet.
    pub fn try_load(&self) -> Result<Option<AppState>> {
        let Some(raw) = self.db.get_value(STATE_STORAGE_KEY)? else {
            return Ok(None);
        };
        let value: Value = serde_json::from_str(&raw)?;
        Ok(Some(decode_state(value, Utc::now())?))
    }

    /// Boot-time hydration. Falls back to a fresh default state on any
    /// failure.
    pub fn load(&self) -> AppState {
        match self.try_load() {
            Ok(Some(state)) => {
                info!(
                    polishes = state.polishes.len(),
                    tools = state.tools.len(),
                    manicures = state.manicures.len(),
                    "Hydrated persisted state"
                );
                state
            }
            Ok(None) => {
                info!("No persisted state, starting fresh");
                AppState::new(Utc::now())
            }
            Err(e) => {
                warn!(error = %e, "Failed to load persisted state, starting fresh");
                AppState::new(Utc::now())
            }
        }
    }

    /// Serialize the whole state and overwrite the stored document.
    pub fn try_save(&self, state: &AppState) -> Result<()> {
        let json = serde_json::to_string(state)?;
        self.db.put_value(STATE_STORAGE_KEY, &json)?;
        debug!(bytes = json.len(), "Persisted state");
        Ok(())
    }

    /// Like [`try_save`](Self::try_save), but failures are only logged.
    pub fn save(&self, state: &AppState) {
        if let Err(e) = self.try_save(state) {
            warn!(error = %e, "Failed to persist state");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lacquer_shared::{reduce, Action, EntityAction, Polish, SettingsPatch};
    use serde_json::json;

    fn persistence() -> LocalPersistence {
        LocalPersistence::new(Database::open_in_memory().unwrap())
    }

    #[test]
    fn empty_store_boots_with_defaults() {
        let store = persistence();
        assert!(store.try_load().unwrap().is_none());

        let state = store.load();
        assert!(state.polishes.is_empty());
        assert_eq!(state.settings.wall_names, vec!["A", "B"]);
    }

    #[test]
    fn save_then_load() {
        let store = persistence();
        let mut state = AppState::new(Utc::now());
        state = reduce(&state, Action::Polish(EntityAction::Add(Polish::new("OPI", "Bubble Bath"))));
        state = reduce(&state, Action::SettingsUpdate(SettingsPatch::new().sync_key("HOME1")));

        store.save(&state);
        assert_eq!(store.load(), state);
    }

    #[test]
    fn save_overwrites() {
        let store = persistence();
        let first = reduce(
            &AppState::new(Utc::now()),
            Action::Polish(EntityAction::Add(Polish::new("OPI", "Bubble Bath"))),
        );
        store.save(&first);
        let second = reduce(&first, Action::Reset);
        store.save(&second);
        assert_eq!(store.load(), second);
    }

    #[test]
    fn corrupt_document_falls_back() {
        let store = persistence();
        store.database().put_value(STATE_STORAGE_KEY, "{not json").unwrap();
        assert!(store.try_load().is_err());

        let state = store.load();
        assert!(state.polishes.is_empty());
    }

    #[test]
    fn partial_document_merges_over_defaults() {
        let state = decode_state(
            json!({
                "polishes": [{ "id": "p1", "name": "Bubble Bath" }],
                "tools": null,
                "settings": { "wallCount": "3", "shelvesPerWall": 0 },
            }),
            Utc::now(),
        )
        .unwrap();

        assert_eq!(state.polishes.len(), 1);
        assert!(state.tools.is_empty());
        assert_eq!(state.settings.wall_names, vec!["A", "B", "C"]);
        assert_eq!(state.settings.shelves_per_wall, 1);
        assert_eq!(state.settings.slots_per_shelf, 21);
    }

    #[test]
    fn non_object_document_is_rejected() {
        assert!(decode_state(json!([1, 2]), Utc::now()).is_err());
    }
}
