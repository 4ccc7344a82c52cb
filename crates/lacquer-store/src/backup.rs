use std::path::{Path, PathBuf};

use chrono::{NaiveDate, Utc};
use serde_json::Value;
use tracing::info;

use lacquer_shared::AppState;

use crate::error::{Result, StoreError};
use crate::snapshot::{decode_state, LocalPersistence};

/// Human-readable JSON backup of the full state.
pub fn export_backup(state: &AppState) -> Result<String> {
    Ok(serde_json::to_string_pretty(state)?)
}

/// `lacquer-backup-YYYY-MM-DD.json`
pub fn backup_file_name(date: NaiveDate) -> String {
    format!("lacquer-backup-{}.json", date.format("%Y-%m-%d"))
}

/// Parse a backup file. Anything that is not a state document is rejected.
pub fn parse_backup(json: &str) -> Result<AppState> {
    let value: Value =
        serde_json::from_str(json).map_err(|e| StoreError::InvalidBackup(e.to_string()))?;
    decode_state(value, Utc::now()).map_err(|e| StoreError::InvalidBackup(e.to_string()))
}

/// Write today's backup into `dir`, creating it if needed. Returns the file
/// path.
pub async fn save_backup_to_dir(dir: &Path, state: &AppState) -> Result<PathBuf> {
    let json = export_backup(state)?;

    tokio::fs::create_dir_all(dir).await?;
    let file_path = dir.join(backup_file_name(Utc::now().date_naive()));
    tokio::fs::write(&file_path, json.as_bytes()).await?;

    info!(
        path = %file_path.display(),
        polishes = state.polishes.len(),
        tools = state.tools.len(),
        manicures = state.manicures.len(),
        "Backup exported"
    );

    Ok(file_path)
}

impl LocalPersistence {
    /// Replace the persisted state with a backup.
    ///
    /// On a parse failure nothing is written. On success the stored
    /// document is overwritten and the imported state is returned; running
    /// processes must reload to pick it up.
    pub fn import_backup(&self, json: &str) -> Result<AppState> {
        let state = parse_backup(json)?;
        self.try_save(&state)?;

        info!(
            polishes = state.polishes.len(),
            tools = state.tools.len(),
            manicures = state.manicures.len(),
            "Backup imported"
        );

        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::Database;
    use chrono::Utc;
    use lacquer_shared::{
        reduce, Action, EntityAction, Manicure, Placement, Polish, SettingsPatch, Tool, ToolKind,
    };

    fn sample_state() -> AppState {
        let mut polish = Polish::new("OPI", "Bubble Bath");
        polish.tags = vec!["sheer".into(), "pink".into()];
        polish.placement = Some(Placement::new("A", 1, 1));
        polish.image = Some("data:image/png;base64,iVBORw0KGgo=".into());
        let tool = Tool::new("Dotting set", ToolKind::Dotting);
        let mut mani = Manicure::new(Utc::now().date_naive());
        mani.polish_ids = vec![polish.id.clone()];
        mani.tool_ids = vec![tool.id.clone()];
        mani.steps = vec!["base".into(), "two coats".into()];
        mani.wear_days = 6;

        let mut state = AppState::new(Utc::now());
        state = reduce(&state, Action::Polish(EntityAction::Add(polish)));
        state = reduce(&state, Action::Tool(EntityAction::Add(tool)));
        state = reduce(&state, Action::Manicure(EntityAction::Add(mani)));
        reduce(
            &state,
            Action::SettingsUpdate(SettingsPatch::new().wall_count(3).color_theme("pastel")),
        )
    }

    #[test]
    fn export_import_round_trip() {
        let state = sample_state();
        let json = export_backup(&state).unwrap();
        assert!(json.contains('\n'), "backup should be pretty-printed");

        let store = LocalPersistence::new(Database::open_in_memory().unwrap());
        let imported = store.import_backup(&json).unwrap();
        assert_eq!(imported, state);
        assert_eq!(store.load(), state);
    }

    #[test]
    fn bad_backup_changes_nothing() {
        let store = LocalPersistence::new(Database::open_in_memory().unwrap());
        let state = sample_state();
        store.save(&state);

        let err = store.import_backup("{ definitely not json").unwrap_err();
        assert!(matches!(err, StoreError::InvalidBackup(_)));
        let err = store.import_backup("\"a string\"").unwrap_err();
        assert!(matches!(err, StoreError::InvalidBackup(_)));

        assert_eq!(store.load(), state);
    }

    #[test]
    fn file_name_uses_date() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        assert_eq!(backup_file_name(date), "lacquer-backup-2024-03-09.json");
    }

    #[tokio::test]
    async fn saves_into_directory() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("backups");
        let state = sample_state();

        let path = save_backup_to_dir(&target, &state).await.unwrap();
        assert!(path.starts_with(&target));

        let json = std::fs::read_to_string(&path).unwrap();
        assert_eq!(parse_backup(&json).unwrap(), state);
    }
}
