//! # lacquer-shared
//!
//! Domain model and pure state transitions shared by every Lacquer crate.
//!
//! The whole application state is a single [`AppState`] tree. It is never
//! mutated in place: every writer goes through [`reduce`], which returns a
//! fresh tree and leaves the previous one untouched.

pub mod constants;
pub mod error;
pub mod image;
pub mod merge;
pub mod models;
pub mod reducer;
pub mod settings;

pub use error::{ImageError, PlacementError};
pub use merge::{merge_records, merge_settings, MergePolicy, RemoteCollection, RemoteSettings, RemoteUpdate};
pub use models::*;
pub use reducer::{reduce, Action, EntityAction, PartialState, RecordPatch};
pub use settings::{normalize_settings, wall_label, Settings, SettingsPatch};
