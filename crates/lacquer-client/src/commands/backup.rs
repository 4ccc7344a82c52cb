use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use lacquer_shared::AppState;
use lacquer_store::{save_backup_to_dir, LocalPersistence};

use crate::runtime::RuntimeHandle;

/// Write the current state to `dir` as `lacquer-backup-YYYY-MM-DD.json`.
pub async fn export_to(runtime: &RuntimeHandle, dir: &Path) -> Result<PathBuf> {
    let state = runtime.state();
    save_backup_to_dir(dir, &state)
        .await
        .with_context(|| format!("writing backup to {}", dir.display()))
}

/// Overwrite the persisted state with a backup file.
///
/// Must run while no runtime holds the database; the next boot picks the
/// imported state up. A file that does not parse leaves storage untouched.
pub async fn import_from(persistence: &LocalPersistence, file: &Path) -> Result<AppState> {
    let json = tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("reading {}", file.display()))?;
    let state = persistence
        .import_backup(&json)
        .with_context(|| format!("importing {}", file.display()))?;
    Ok(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::polish::{add_polish, NewPolish};
    use crate::runtime::boot;
    use lacquer_store::Database;

    #[tokio::test]
    async fn export_then_import_on_another_device() {
        let dir = tempfile::tempdir().unwrap();

        let runtime = boot(LocalPersistence::new(Database::open_in_memory().unwrap()));
        let polish = add_polish(
            &runtime,
            NewPolish {
                brand: "Zoya".into(),
                name: "Purity".into(),
                ..NewPolish::default()
            },
        )
        .await
        .unwrap();
        let file = export_to(&runtime, dir.path()).await.unwrap();
        runtime.shutdown().await;
        assert!(file
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with("lacquer-backup-") && n.ends_with(".json")));

        let db_path = dir.path().join("other.db");
        let persistence = LocalPersistence::new(Database::open_at(&db_path).unwrap());
        let imported = import_from(&persistence, &file).await.unwrap();
        assert_eq!(imported.polish(&polish.id), Some(&polish));
        drop(persistence);

        let runtime = boot(LocalPersistence::new(Database::open_at(&db_path).unwrap()));
        assert_eq!(runtime.state().polish(&polish.id), Some(&polish));
        runtime.shutdown().await;
    }

    #[tokio::test]
    async fn broken_file_leaves_storage_alone() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("broken.json");
        std::fs::write(&file, "{ not json").unwrap();

        let persistence = LocalPersistence::new(Database::open_in_memory().unwrap());
        assert!(import_from(&persistence, &file).await.is_err());
        assert!(persistence.try_load().unwrap().is_none());
    }
}
