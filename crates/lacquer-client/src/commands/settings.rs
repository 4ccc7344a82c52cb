use anyhow::{bail, Result};
use lacquer_shared::{Action, AppState, Polish, Settings, SettingsPatch};
use tracing::{info, warn};

use crate::runtime::RuntimeHandle;

/// Requested settings changes; `None` leaves a field alone.
#[derive(Debug, Clone, Default)]
pub struct SettingsChange {
    pub color_theme: Option<String>,
    pub wall_count: Option<u32>,
    pub shelves_per_wall: Option<u32>,
    pub slots_per_shelf: Option<u32>,
    pub wall_names: Option<Vec<String>>,
    pub sync_key: Option<String>,
}

impl SettingsChange {
    pub fn to_patch(&self) -> SettingsPatch {
        let mut patch = SettingsPatch::new();
        if let Some(theme) = &self.color_theme {
            patch = patch.color_theme(theme);
        }
        if let Some(count) = self.wall_count {
            patch = patch.wall_count(count);
        }
        if let Some(count) = self.shelves_per_wall {
            patch = patch.shelves_per_wall(count);
        }
        if let Some(count) = self.slots_per_shelf {
            patch = patch.slots_per_shelf(count);
        }
        if let Some(names) = &self.wall_names {
            patch = patch.wall_names(names.clone());
        }
        if let Some(key) = &self.sync_key {
            patch = patch.sync_key(key);
        }
        patch
    }
}

/// Polishes whose placement no longer fits the layout.
pub fn misplaced_polishes(state: &AppState) -> Vec<&Polish> {
    state
        .polishes
        .iter()
        .filter(|p| {
            p.placement
                .as_ref()
                .is_some_and(|placement| placement.validate(&state.settings).is_err())
        })
        .collect()
}

pub async fn update_settings(runtime: &RuntimeHandle, change: SettingsChange) -> Result<Settings> {
    let patch = change.to_patch();
    if patch.is_empty() {
        bail!("nothing to change");
    }

    let state = runtime.dispatch(Action::SettingsUpdate(patch)).await?;
    let settings = &state.settings;
    info!(
        walls = settings.wall_count,
        shelves = settings.shelves_per_wall,
        slots = settings.slots_per_shelf,
        syncing = settings.active_sync_key().is_some(),
        "Settings updated"
    );

    let misplaced = misplaced_polishes(&state).len();
    if misplaced > 0 {
        warn!(count = misplaced, "Some polishes are placed outside the new layout");
    }
    Ok(settings.clone())
}

/// Drop every record and restore default settings.
pub async fn reset(runtime: &RuntimeHandle) -> Result<()> {
    runtime.dispatch(Action::Reset).await?;
    info!("State reset to defaults");
    Ok(())
}
