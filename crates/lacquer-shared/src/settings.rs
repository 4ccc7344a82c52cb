//! Layout and sync settings, and the normalizer that keeps them valid.
//!
//! Settings arrive from many places: the persisted document, the remote
//! `meta/settings` document, a user patch, or nothing at all. Every path
//! funnels through [`normalize_settings`], which accepts any JSON value and
//! always yields a usable [`Settings`].

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Map, Value};

use crate::constants::{
    DEFAULT_COLOR_THEME, DEFAULT_SHELVES_PER_WALL, DEFAULT_SLOTS_PER_SHELF, DEFAULT_WALL_COUNT,
    MAX_LAYOUT_COUNT, UPDATED_AT_FIELD,
};

const SYNC_KEY_FIELD: &str = "syncKey";

/// Storage layout plus the household sync key.
///
/// Deserialization always runs through [`normalize_settings`], so a decoded
/// value upholds the same invariants as a freshly normalized one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub color_theme: String,
    pub wall_count: u32,
    pub shelves_per_wall: u32,
    pub slots_per_shelf: u32,
    /// Always exactly `wall_count` entries.
    pub wall_names: Vec<String>,
    /// Empty means local-only.
    pub sync_key: String,
}

impl Default for Settings {
    fn default() -> Self {
        normalize_settings(&Value::Null)
    }
}

impl<'de> Deserialize<'de> for Settings {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Value::deserialize(deserializer)?;
        Ok(normalize_settings(&raw))
    }
}

impl Settings {
    /// JSON object form, using the same field names as the wire format.
    pub fn to_value(&self) -> Value {
        json!({
            "colorTheme": self.color_theme,
            "wallCount": self.wall_count,
            "shelvesPerWall": self.shelves_per_wall,
            "slotsPerShelf": self.slots_per_shelf,
            "wallNames": self.wall_names,
            "syncKey": self.sync_key,
        })
    }

    /// The trimmed sync key, or `None` when running local-only.
    pub fn active_sync_key(&self) -> Option<&str> {
        let key = self.sync_key.trim();
        (!key.is_empty()).then_some(key)
    }

    /// Copy with the sync key cleared.
    pub fn without_sync_key(&self) -> Settings {
        Settings {
            sync_key: String::new(),
            ..self.clone()
        }
    }

    /// Document pushed to the remote settings slot. The sync key is never
    /// part of it.
    pub fn to_remote_document(&self) -> Map<String, Value> {
        let mut doc = match self.to_value() {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        doc.remove(SYNC_KEY_FIELD);
        doc
    }

    /// Overlay a remote settings document onto these settings.
    ///
    /// The local sync key always survives: a remote document can neither
    /// set nor clear it.
    pub fn merge_remote(&self, doc: &Map<String, Value>) -> Settings {
        let mut merged = match self.to_value() {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        for (field, value) in doc {
            if field == SYNC_KEY_FIELD || field == UPDATED_AT_FIELD {
                continue;
            }
            merged.insert(field.clone(), value.clone());
        }
        merged.insert(SYNC_KEY_FIELD.into(), Value::String(self.sync_key.clone()));
        normalize_settings(&Value::Object(merged))
    }

    /// Index of a wall by name.
    pub fn wall_index(&self, wall: &str) -> Option<usize> {
        self.wall_names.iter().position(|name| name == wall)
    }
}

/// Produce valid settings from an arbitrary, possibly partial JSON value.
///
/// Never fails: missing or non-numeric counts take their defaults, counts
/// below one become one, and blank wall names are replaced with generated
/// labels.
pub fn normalize_settings(input: &Value) -> Settings {
    let wall_count = coerce_count(input.get("wallCount"), DEFAULT_WALL_COUNT);
    let shelves_per_wall = coerce_count(input.get("shelvesPerWall"), DEFAULT_SHELVES_PER_WALL);
    let slots_per_shelf = coerce_count(input.get("slotsPerShelf"), DEFAULT_SLOTS_PER_SHELF);

    let existing = input.get("wallNames").and_then(Value::as_array);
    let wall_names = (0..wall_count as usize)
        .map(|index| {
            existing
                .and_then(|names| names.get(index))
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map_or_else(|| wall_label(index), str::to_string)
        })
        .collect();

    let sync_key = input
        .get(SYNC_KEY_FIELD)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    let color_theme = input
        .get("colorTheme")
        .and_then(Value::as_str)
        .filter(|theme| !theme.trim().is_empty())
        .unwrap_or(DEFAULT_COLOR_THEME)
        .to_string();

    Settings {
        color_theme,
        wall_count,
        shelves_per_wall,
        slots_per_shelf,
        wall_names,
        sync_key,
    }
}

/// Generated wall label: `A`..`Z`, then `W27`, `W28`, ...
pub fn wall_label(index: usize) -> String {
    match u8::try_from(index) {
        Ok(i) if i < 26 => char::from(b'A' + i).to_string(),
        _ => format!("W{}", index + 1),
    }
}

fn coerce_count(value: Option<&Value>, default: u32) -> u32 {
    let parsed = match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };

    match parsed {
        Some(n) if n.is_finite() => n.trunc().clamp(1.0, f64::from(MAX_LAYOUT_COUNT)) as u32,
        _ => default,
    }
}

/// Partial settings update, applied by merging over the current settings
/// and normalizing the result.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SettingsPatch(Map<String, Value>);

impl SettingsPatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set an arbitrary wire field.
    pub fn set(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.0.insert(field.to_string(), value.into());
        self
    }

    pub fn color_theme(self, theme: &str) -> Self {
        self.set("colorTheme", theme)
    }

    pub fn wall_count(self, count: u32) -> Self {
        self.set("wallCount", count)
    }

    pub fn shelves_per_wall(self, count: u32) -> Self {
        self.set("shelvesPerWall", count)
    }

    pub fn slots_per_shelf(self, count: u32) -> Self {
        self.set("slotsPerShelf", count)
    }

    pub fn wall_names(self, names: Vec<String>) -> Self {
        self.set("wallNames", names)
    }

    pub fn sync_key(self, key: &str) -> Self {
        self.set(SYNC_KEY_FIELD, key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn apply(&self, current: &Settings) -> Settings {
        let mut merged = match current.to_value() {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        for (field, value) in &self.0 {
            merged.insert(field.clone(), value.clone());
        }
        normalize_settings(&Value::Object(merged))
    }
}
