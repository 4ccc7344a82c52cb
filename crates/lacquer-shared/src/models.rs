//! Domain records and the aggregate application state.
//!
//! Every struct derives `Serialize` and `Deserialize` with camelCase field
//! names; the same shape is used for the persisted document, backups and
//! remote documents.

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::constants::{MAX_RATING, MIN_RATING};
use crate::error::PlacementError;
use crate::settings::Settings;

/// Generate a fresh record identifier.
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

// ---------------------------------------------------------------------------
// Record
// ---------------------------------------------------------------------------

/// The three record collections of the state tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Polishes,
    Tools,
    Manicures,
}

impl Collection {
    pub const ALL: [Collection; 3] = [Self::Polishes, Self::Tools, Self::Manicures];

    /// Name of the sub-collection in the remote store.
    pub fn remote_name(self) -> &'static str {
        match self {
            Self::Polishes => "polishes",
            Self::Tools => "tools",
            Self::Manicures => "manis",
        }
    }
}

impl std::fmt::Display for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.remote_name())
    }
}

/// Shared shape of [`Polish`], [`Tool`] and [`Manicure`].
///
/// The identifier is immutable once assigned and is the only key used for
/// upsert and merge.
pub trait Record: Clone + PartialEq + Serialize + DeserializeOwned + Send + Sync + 'static {
    const COLLECTION: Collection;

    /// Optional fields that are omitted when empty. Remote writes merge, so
    /// these go out as explicit `null` to clear a value set earlier.
    const CLEARABLE: &'static [&'static str] = &[];

    fn id(&self) -> &str;

    /// Server-assigned timestamp (ms since epoch) of the last remote write.
    fn updated_at(&self) -> Option<i64>;

    fn set_updated_at(&mut self, at: Option<i64>);

    /// This record's collection inside a state tree.
    fn collection(state: &AppState) -> &[Self];

    /// Enforce field-level invariants (tag set semantics, rating bounds).
    fn normalized(self) -> Self {
        self
    }

    /// Equality that ignores the server timestamp.
    fn content_eq(&self, other: &Self) -> bool {
        if self.updated_at() == other.updated_at() {
            return self == other;
        }
        let mut a = self.clone();
        let mut b = other.clone();
        a.set_updated_at(None);
        b.set_updated_at(None);
        a == b
    }
}

/// Trim, drop blanks and remove duplicates while keeping first-seen order.
pub fn normalize_tags(tags: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags {
        let tag = tag.trim();
        if !tag.is_empty() && !out.iter().any(|t| t == tag) {
            out.push(tag.to_string());
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Polish
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum Finish {
    #[default]
    Cream,
    Shimmer,
    Glitter,
    Metallic,
    Matte,
    Holographic,
    Jelly,
    Crelly,
    Magnetic,
    Chrome,
    Flakie,
    Other,
}

impl Finish {
    pub const ALL: [Finish; 12] = [
        Self::Cream,
        Self::Shimmer,
        Self::Glitter,
        Self::Metallic,
        Self::Matte,
        Self::Holographic,
        Self::Jelly,
        Self::Crelly,
        Self::Magnetic,
        Self::Chrome,
        Self::Flakie,
        Self::Other,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Cream => "cream",
            Self::Shimmer => "shimmer",
            Self::Glitter => "glitter",
            Self::Metallic => "metallic",
            Self::Matte => "matte",
            Self::Holographic => "holographic",
            Self::Jelly => "jelly",
            Self::Crelly => "crelly",
            Self::Magnetic => "magnetic",
            Self::Chrome => "chrome",
            Self::Flakie => "flakie",
            Self::Other => "other",
        }
    }
}

// Unknown finishes decode as `Other` rather than failing the whole record.
impl From<String> for Finish {
    fn from(value: String) -> Self {
        let value = value.trim();
        Self::ALL
            .into_iter()
            .find(|f| f.as_str().eq_ignore_ascii_case(value))
            .unwrap_or(Self::Other)
    }
}

impl FromStr for Finish {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from(s.to_string()))
    }
}

impl std::fmt::Display for Finish {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a polish lives: wall name, shelf and slot (both 1-based).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Placement {
    pub wall: String,
    pub shelf: u32,
    pub position: u32,
}

impl Placement {
    pub fn new(wall: impl Into<String>, shelf: u32, position: u32) -> Self {
        Self {
            wall: wall.into(),
            shelf,
            position,
        }
    }

    /// Check the placement against the configured layout.
    pub fn validate(&self, settings: &Settings) -> Result<(), PlacementError> {
        if settings.wall_index(&self.wall).is_none() {
            return Err(PlacementError::UnknownWall(self.wall.clone()));
        }
        if self.shelf < 1 || self.shelf > settings.shelves_per_wall {
            return Err(PlacementError::ShelfOutOfRange {
                shelf: self.shelf,
                max: settings.shelves_per_wall,
            });
        }
        if self.position < 1 || self.position > settings.slots_per_shelf {
            return Err(PlacementError::SlotOutOfRange {
                position: self.position,
                max: settings.slots_per_shelf,
            });
        }
        Ok(())
    }
}

/// A bottle of nail polish.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Polish {
    pub id: String,
    pub brand: String,
    pub name: String,
    /// Manufacturer shade code.
    pub code: String,
    pub barcode: String,
    /// Hex color string, e.g. `#f4c2c2`.
    pub color: String,
    pub finish: Finish,
    pub collection: String,
    /// Set semantics, display order preserved.
    pub tags: Vec<String>,
    pub notes: String,
    /// Embedded image as a data URI.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    /// Stored flat as `wall`, `shelf`, `position`.
    #[serde(flatten)]
    pub placement: Option<Placement>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<i64>,
}

impl Polish {
    pub fn new(brand: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            brand: brand.into(),
            name: name.into(),
            created_at: Utc::now(),
            ..Self::default()
        }
    }

    /// `Brand Name`, or whichever half is present.
    pub fn label(&self) -> String {
        match (self.brand.trim(), self.name.trim()) {
            ("", name) => name.to_string(),
            (brand, "") => brand.to_string(),
            (brand, name) => format!("{brand} {name}"),
        }
    }
}

impl Record for Polish {
    const COLLECTION: Collection = Collection::Polishes;
    const CLEARABLE: &'static [&'static str] = &["image", "wall", "shelf", "position"];

    fn id(&self) -> &str {
        &self.id
    }

    fn updated_at(&self) -> Option<i64> {
        self.updated_at
    }

    fn set_updated_at(&mut self, at: Option<i64>) {
        self.updated_at = at;
    }

    fn collection(state: &AppState) -> &[Self] {
        &state.polishes
    }

    fn normalized(mut self) -> Self {
        self.tags = normalize_tags(self.tags);
        self
    }
}

// ---------------------------------------------------------------------------
// Tool
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum ToolKind {
    Base,
    Top,
    Brush,
    Dotting,
    Stamper,
    Plate,
    File,
    Buffer,
    Cuticle,
    Lamp,
    Remover,
    #[default]
    Other,
}

impl ToolKind {
    pub const ALL: [ToolKind; 12] = [
        Self::Base,
        Self::Top,
        Self::Brush,
        Self::Dotting,
        Self::Stamper,
        Self::Plate,
        Self::File,
        Self::Buffer,
        Self::Cuticle,
        Self::Lamp,
        Self::Remover,
        Self::Other,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Base => "base",
            Self::Top => "top",
            Self::Brush => "brush",
            Self::Dotting => "dotting",
            Self::Stamper => "stamper",
            Self::Plate => "plate",
            Self::File => "file",
            Self::Buffer => "buffer",
            Self::Cuticle => "cuticle",
            Self::Lamp => "lamp",
            Self::Remover => "remover",
            Self::Other => "other",
        }
    }
}

impl From<String> for ToolKind {
    fn from(value: String) -> Self {
        let value = value.trim();
        Self::ALL
            .into_iter()
            .find(|k| k.as_str().eq_ignore_ascii_case(value))
            .unwrap_or(Self::Other)
    }
}

impl FromStr for ToolKind {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from(s.to_string()))
    }
}

impl std::fmt::Display for ToolKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Tool {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ToolKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub brand: Option<String>,
    pub notes: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<i64>,
}

impl Tool {
    pub fn new(name: impl Into<String>, kind: ToolKind) -> Self {
        Self {
            id: new_id(),
            name: name.into(),
            kind,
            ..Self::default()
        }
    }
}

impl Record for Tool {
    const COLLECTION: Collection = Collection::Tools;
    const CLEARABLE: &'static [&'static str] = &["brand", "image"];

    fn id(&self) -> &str {
        &self.id
    }

    fn updated_at(&self) -> Option<i64> {
        self.updated_at
    }

    fn set_updated_at(&mut self, at: Option<i64>) {
        self.updated_at = at;
    }

    fn collection(state: &AppState) -> &[Self] {
        &state.tools
    }
}

// ---------------------------------------------------------------------------
// Manicure
// ---------------------------------------------------------------------------

/// A logged manicure.
///
/// `polish_ids` and `tool_ids` are weak references: they are never owned
/// and may dangle once the referenced record is deleted. Resolve them with
/// [`AppState::resolve_manicure`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Manicure {
    pub id: String,
    pub date: NaiveDate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub polish_ids: Vec<String>,
    pub tool_ids: Vec<String>,
    pub steps: Vec<String>,
    pub notes: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    /// 1 to 5.
    pub rating: u8,
    pub wear_days: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<i64>,
}

impl Default for Manicure {
    fn default() -> Self {
        Self {
            id: String::new(),
            date: NaiveDate::default(),
            title: None,
            polish_ids: Vec::new(),
            tool_ids: Vec::new(),
            steps: Vec::new(),
            notes: String::new(),
            image: None,
            rating: 3,
            wear_days: 0,
            updated_at: None,
        }
    }
}

impl Manicure {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            id: new_id(),
            date,
            ..Self::default()
        }
    }
}

impl Record for Manicure {
    const COLLECTION: Collection = Collection::Manicures;
    const CLEARABLE: &'static [&'static str] = &["title", "image"];

    fn id(&self) -> &str {
        &self.id
    }

    fn updated_at(&self) -> Option<i64> {
        self.updated_at
    }

    fn set_updated_at(&mut self, at: Option<i64>) {
        self.updated_at = at;
    }

    fn collection(state: &AppState) -> &[Self] {
        &state.manicures
    }

    fn normalized(mut self) -> Self {
        self.rating = self.rating.clamp(MIN_RATING, MAX_RATING);
        self
    }
}

// ---------------------------------------------------------------------------
// AppState
// ---------------------------------------------------------------------------

/// The whole application state. Collections are ordered most-recent-first.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppState {
    pub polishes: Vec<Polish>,
    pub tools: Vec<Tool>,
    pub manicures: Vec<Manicure>,
    pub settings: Settings,
    pub created_at: DateTime<Utc>,
}

/// A manicure with its weak references looked up.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedManicure<'a> {
    pub manicure: &'a Manicure,
    pub polishes: Vec<&'a Polish>,
    pub tools: Vec<&'a Tool>,
}

impl AppState {
    /// Empty collections and default settings, stamped with `created_at`.
    pub fn new(created_at: DateTime<Utc>) -> Self {
        Self {
            created_at,
            ..Self::default()
        }
    }

    pub fn polish(&self, id: &str) -> Option<&Polish> {
        self.polishes.iter().find(|p| p.id == id)
    }

    pub fn tool(&self, id: &str) -> Option<&Tool> {
        self.tools.iter().find(|t| t.id == id)
    }

    pub fn manicure(&self, id: &str) -> Option<&Manicure> {
        self.manicures.iter().find(|m| m.id == id)
    }

    /// The polish occupying a slot, if any. Occupancy is not enforced, so
    /// the first match wins.
    pub fn polish_at(&self, wall: &str, shelf: u32, position: u32) -> Option<&Polish> {
        self.polishes.iter().find(|p| {
            p.placement
                .as_ref()
                .is_some_and(|pl| pl.wall == wall && pl.shelf == shelf && pl.position == position)
        })
    }

    /// Look up a manicure's polishes and tools, silently omitting any
    /// identifier whose record no longer exists.
    pub fn resolve_manicure<'a>(&'a self, manicure: &'a Manicure) -> ResolvedManicure<'a> {
        ResolvedManicure {
            manicure,
            polishes: manicure
                .polish_ids
                .iter()
                .filter_map(|id| self.polish(id))
                .collect(),
            tools: manicure.tool_ids.iter().filter_map(|id| self.tool(id)).collect(),
        }
    }
}
