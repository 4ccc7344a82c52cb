//! The domain reducer: `(AppState, Action) -> AppState`.
//!
//! Transitions are total and never touch the input tree, so callers can
//! keep earlier states around (the client store hands them out as `Arc`s).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

use crate::merge::{merge_records, merge_settings, RemoteUpdate};
use crate::models::{AppState, Manicure, Polish, Record, Tool};
use crate::settings::{Settings, SettingsPatch};

/// Everything that can change the state tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Replace the whole state.
    Hydrate(AppState),
    /// Replace only the top-level fields that are present.
    HydratePartial(PartialState),
    /// Merge a remote snapshot into the current state, record by record.
    MergeRemote(RemoteUpdate),
    /// Merge into settings, then normalize.
    SettingsUpdate(SettingsPatch),
    Polish(EntityAction<Polish>),
    Tool(EntityAction<Tool>),
    Manicure(EntityAction<Manicure>),
    /// Back to empty collections and default settings.
    Reset,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EntityAction<T> {
    /// Prepend to the collection.
    Add(T),
    /// Shallow-merge fields into the record with the patch's id.
    Update(RecordPatch),
    Delete(String),
}

/// Top-level fields for [`Action::HydratePartial`]. `None` leaves the
/// current value in place.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PartialState {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub polishes: Option<Vec<Polish>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<Tool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manicures: Option<Vec<Manicure>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub settings: Option<Settings>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl PartialState {
    pub fn polishes(polishes: Vec<Polish>) -> Self {
        Self {
            polishes: Some(polishes),
            ..Self::default()
        }
    }

    pub fn tools(tools: Vec<Tool>) -> Self {
        Self {
            tools: Some(tools),
            ..Self::default()
        }
    }

    pub fn manicures(manicures: Vec<Manicure>) -> Self {
        Self {
            manicures: Some(manicures),
            ..Self::default()
        }
    }

    pub fn settings(settings: Settings) -> Self {
        Self {
            settings: Some(settings),
            ..Self::default()
        }
    }

    fn apply(self, state: &AppState) -> AppState {
        AppState {
            polishes: self.polishes.unwrap_or_else(|| state.polishes.clone()),
            tools: self.tools.unwrap_or_else(|| state.tools.clone()),
            manicures: self.manicures.unwrap_or_else(|| state.manicures.clone()),
            settings: self.settings.unwrap_or_else(|| state.settings.clone()),
            created_at: self.created_at.unwrap_or(state.created_at),
        }
    }
}

/// A shallow field patch for one record, in wire (camelCase) field names.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RecordPatch {
    pub id: String,
    pub fields: Map<String, Value>,
}

impl RecordPatch {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            fields: Map::new(),
        }
    }

    pub fn set(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(field.to_string(), value.into());
        self
    }

    /// Patch carrying every field of `record`.
    pub fn from_record<T: Record>(record: &T) -> Self {
        let fields = match serde_json::to_value(record) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        };
        Self {
            id: record.id().to_string(),
            fields,
        }
    }

    /// Merge the patch over `existing`. The identifier never changes, and a
    /// patch that would produce an undecodable record is dropped.
    pub fn apply<T: Record>(&self, existing: &T) -> T {
        let Ok(Value::Object(mut merged)) = serde_json::to_value(existing) else {
            return existing.clone();
        };
        for (field, value) in &self.fields {
            if field != "id" {
                merged.insert(field.clone(), value.clone());
            }
        }
        match serde_json::from_value::<T>(Value::Object(merged)) {
            Ok(record) => record.normalized(),
            Err(e) => {
                warn!(id = %self.id, collection = %T::COLLECTION, error = %e, "Ignoring invalid record patch");
                existing.clone()
            }
        }
    }
}

/// Apply one action. Never panics and never mutates `state`.
pub fn reduce(state: &AppState, action: Action) -> AppState {
    match action {
        Action::Hydrate(next) => next,
        Action::HydratePartial(partial) => partial.apply(state),
        Action::MergeRemote(update) => merge_remote(state, update),
        Action::SettingsUpdate(patch) => {
            let mut next = state.clone();
            next.settings = patch.apply(&state.settings);
            next
        }
        Action::Polish(action) => {
            let mut next = state.clone();
            next.polishes = apply_entity(std::mem::take(&mut next.polishes), action);
            next
        }
        Action::Tool(action) => {
            let mut next = state.clone();
            next.tools = apply_entity(std::mem::take(&mut next.tools), action);
            next
        }
        Action::Manicure(action) => {
            let mut next = state.clone();
            next.manicures = apply_entity(std::mem::take(&mut next.manicures), action);
            next
        }
        Action::Reset => AppState::default(),
    }
}

fn merge_remote(state: &AppState, update: RemoteUpdate) -> AppState {
    let mut next = state.clone();
    match update {
        RemoteUpdate::Polishes(remote) => {
            next.polishes = merge_records(remote.policy, &state.polishes, &remote.synced, &remote.records);
        }
        RemoteUpdate::Tools(remote) => {
            next.tools = merge_records(remote.policy, &state.tools, &remote.synced, &remote.records);
        }
        RemoteUpdate::Manicures(remote) => {
            next.manicures = merge_records(remote.policy, &state.manicures, &remote.synced, &remote.records);
        }
        RemoteUpdate::Settings(remote) => next.settings = merge_settings(&state.settings, &remote),
    }
    next
}

fn apply_entity<T: Record>(mut records: Vec<T>, action: EntityAction<T>) -> Vec<T> {
    match action {
        EntityAction::Add(record) => {
            // Re-adding an existing id moves it to the front instead of
            // duplicating it.
            records.retain(|r| r.id() != record.id());
            records.insert(0, record.normalized());
        }
        EntityAction::Update(patch) => {
            if let Some(slot) = records.iter_mut().find(|r| r.id() == patch.id) {
                *slot = patch.apply(slot);
            }
        }
        EntityAction::Delete(id) => records.retain(|r| r.id() != id),
    }
    records
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merge::{MergePolicy, RemoteCollection, RemoteSettings};
    use crate::models::{Finish, Placement, ToolKind};
    use std::collections::HashMap;
    use chrono::NaiveDate;
    use serde_json::json;

    fn polish(id: &str, name: &str) -> Polish {
        Polish {
            id: id.into(),
            brand: "OPI".into(),
            name: name.into(),
            ..Polish::default()
        }
    }

    #[test]
    fn add_polish_scenario() {
        let record: Polish = serde_json::from_value(json!({
            "id": "p1",
            "brand": "OPI",
            "name": "Bubble Bath",
            "finish": "cream",
            "wall": "A",
            "shelf": 1,
            "position": 1,
        }))
        .unwrap();

        let state = reduce(&AppState::default(), Action::Polish(EntityAction::Add(record)));
        assert_eq!(state.polishes.len(), 1);
        assert_eq!(state.polishes[0].id, "p1");
        assert_eq!(state.polishes[0].finish, Finish::Cream);
        assert_eq!(state.polishes[0].placement, Some(Placement::new("A", 1, 1)));
    }

    #[test]
    fn add_prepends() {
        let mut state = AppState::default();
        for id in ["a", "b", "c"] {
            state = reduce(&state, Action::Polish(EntityAction::Add(polish(id, id))));
            assert_eq!(state.polishes[0].id, id);
        }
        let ids: Vec<_> = state.polishes.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "b", "a"]);
    }

    #[test]
    fn re_adding_keeps_ids_unique() {
        let state = reduce(&AppState::default(), Action::Polish(EntityAction::Add(polish("a", "one"))));
        let state = reduce(&state, Action::Polish(EntityAction::Add(polish("b", "two"))));
        let state = reduce(&state, Action::Polish(EntityAction::Add(polish("a", "three"))));
        assert_eq!(state.polishes.len(), 2);
        assert_eq!(state.polishes[0].name, "three");
    }

    #[test]
    fn update_merges_fields() {
        let state = reduce(&AppState::default(), Action::Polish(EntityAction::Add(polish("a", "Old"))));
        let patch = RecordPatch::new("a")
            .set("name", "New")
            .set("tags", json!(["pink", "pink", "sheer"]));
        let state = reduce(&state, Action::Polish(EntityAction::Update(patch)));
        assert_eq!(state.polishes[0].name, "New");
        assert_eq!(state.polishes[0].brand, "OPI");
        assert_eq!(state.polishes[0].tags, vec!["pink", "sheer"]);
    }

    #[test]
    fn update_cannot_change_id() {
        let state = reduce(&AppState::default(), Action::Tool(EntityAction::Add(Tool {
            id: "t1".into(),
            kind: ToolKind::Brush,
            ..Tool::default()
        })));
        let patch = RecordPatch::new("t1").set("id", "t2").set("notes", "detail brush");
        let state = reduce(&state, Action::Tool(EntityAction::Update(patch)));
        assert_eq!(state.tools[0].id, "t1");
        assert_eq!(state.tools[0].notes, "detail brush");
    }

    #[test]
    fn invalid_patch_is_ignored() {
        let state = reduce(&AppState::default(), Action::Polish(EntityAction::Add(polish("a", "Keep"))));
        let patch = RecordPatch::new("a").set("name", json!({ "nested": true }));
        let next = reduce(&state, Action::Polish(EntityAction::Update(patch)));
        assert_eq!(next, state);
    }

    #[test]
    fn move_and_clear_placement() {
        let state = reduce(&AppState::default(), Action::Polish(EntityAction::Add(polish("a", "x"))));
        let moved = reduce(
            &state,
            Action::Polish(EntityAction::Update(
                RecordPatch::new("a").set("wall", "B").set("shelf", 3).set("position", 7),
            )),
        );
        assert_eq!(moved.polishes[0].placement, Some(Placement::new("B", 3, 7)));

        let cleared = reduce(
            &moved,
            Action::Polish(EntityAction::Update(
                RecordPatch::new("a")
                    .set("wall", Value::Null)
                    .set("shelf", Value::Null)
                    .set("position", Value::Null),
            )),
        );
        assert_eq!(cleared.polishes[0].placement, None);
    }

    #[test]
    fn update_of_unknown_id_is_noop() {
        let state = reduce(&AppState::default(), Action::Polish(EntityAction::Add(polish("a", "x"))));
        let next = reduce(&state, Action::Polish(EntityAction::Update(RecordPatch::new("zzz").set("name", "y"))));
        assert_eq!(next, state);
    }

    #[test]
    fn delete_then_update_does_not_resurrect() {
        let mut state = AppState::default();
        state = reduce(&state, Action::Polish(EntityAction::Add(polish("a", "x"))));
        state = reduce(&state, Action::Polish(EntityAction::Add(polish("b", "y"))));
        let deleted = reduce(&state, Action::Polish(EntityAction::Delete("a".into())));
        let updated = reduce(
            &deleted,
            Action::Polish(EntityAction::Update(RecordPatch::new("a").set("name", "back"))),
        );
        assert_eq!(updated, deleted);
        assert!(updated.polish("a").is_none());
    }

    #[test]
    fn delete_missing_is_noop() {
        let state = reduce(&AppState::default(), Action::Polish(EntityAction::Add(polish("a", "x"))));
        assert_eq!(reduce(&state, Action::Polish(EntityAction::Delete("nope".into()))), state);
    }

    #[test]
    fn settings_update_grows_wall_names() {
        let state = reduce(
            &AppState::default(),
            Action::SettingsUpdate(SettingsPatch::new().wall_count(3)),
        );
        assert_eq!(state.settings.wall_names, vec!["A", "B", "C"]);
    }

    #[test]
    fn hydrate_partial_is_idempotent() {
        let mut state = AppState::default();
        state = reduce(&state, Action::Polish(EntityAction::Add(polish("a", "x"))));
        state = reduce(&state, Action::Tool(EntityAction::Add(Tool::new("File", ToolKind::File))));
        let payload = PartialState::polishes(vec![polish("r1", "remote")]);

        let once = reduce(&state, Action::HydratePartial(payload.clone()));
        let twice = reduce(&once, Action::HydratePartial(payload));
        assert_eq!(once, twice);
        assert_eq!(once.tools, state.tools);
        assert_eq!(once.polishes.len(), 1);
    }

    #[test]
    fn remote_settings_never_restore_a_cleared_key() {
        let keyed = reduce(&AppState::default(), Action::SettingsUpdate(SettingsPatch::new().sync_key("HOME1")));
        let synced = keyed.settings.without_sync_key();
        let mut document = keyed.settings.to_remote_document();
        document.insert("wallCount".into(), 3.into());

        // The key is cleared before the queued remote merge is applied.
        let cleared = reduce(&keyed, Action::SettingsUpdate(SettingsPatch::new().sync_key("")));
        let merged = reduce(
            &cleared,
            Action::MergeRemote(RemoteUpdate::Settings(RemoteSettings {
                policy: MergePolicy::Replace,
                document,
                synced: Some(synced),
            })),
        );
        assert_eq!(merged.settings.sync_key, "");
        assert_eq!(merged.settings.wall_count, 3);
    }

    #[test]
    fn remote_merge_keeps_records_added_after_the_snapshot() {
        let synced_state = reduce(&AppState::default(), Action::Polish(EntityAction::Add(polish("a", "x"))));
        let synced: HashMap<String, Polish> = synced_state.polishes.iter().map(|p| (p.id.clone(), p.clone())).collect();
        let state = reduce(&synced_state, Action::Polish(EntityAction::Add(polish("mine", "local"))));

        let merged = reduce(
            &state,
            Action::MergeRemote(RemoteUpdate::Polishes(RemoteCollection {
                policy: MergePolicy::Replace,
                records: vec![polish("theirs", "remote"), polish("a", "x")],
                synced,
            })),
        );
        let ids: Vec<&str> = merged.polishes.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["theirs", "mine", "a"]);
    }

    #[test]
    fn previous_state_is_untouched() {
        let before = reduce(&AppState::default(), Action::Polish(EntityAction::Add(polish("a", "x"))));
        let snapshot = before.clone();
        let _ = reduce(&before, Action::Polish(EntityAction::Delete("a".into())));
        let _ = reduce(&before, Action::Reset);
        assert_eq!(before, snapshot);
    }

    #[test]
    fn reset_restores_defaults() {
        let mut state = reduce(&AppState::default(), Action::Polish(EntityAction::Add(polish("a", "x"))));
        state = reduce(&state, Action::SettingsUpdate(SettingsPatch::new().sync_key("HOME1")));
        assert_eq!(reduce(&state, Action::Reset), AppState::default());
    }

    #[test]
    fn manicure_rating_clamped_on_add() {
        let mut mani = Manicure::new(NaiveDate::default());
        mani.rating = 11;
        let state = reduce(&AppState::default(), Action::Manicure(EntityAction::Add(mani)));
        assert_eq!(state.manicures[0].rating, 5);
    }
}
