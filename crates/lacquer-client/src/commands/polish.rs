use std::path::PathBuf;

use anyhow::{bail, Result};
use lacquer_shared::image::embed_image;
use lacquer_shared::{Action, AppState, EntityAction, Finish, Placement, Polish, RecordPatch};
use serde_json::Value;
use tracing::{info, warn};

use super::{matches, patch_image};
use crate::runtime::RuntimeHandle;

#[derive(Debug, Clone, Default)]
pub struct NewPolish {
    pub brand: String,
    pub name: String,
    pub code: String,
    pub barcode: String,
    pub color: String,
    pub finish: Finish,
    pub collection: String,
    pub tags: Vec<String>,
    pub notes: String,
    pub image: Option<PathBuf>,
    pub placement: Option<Placement>,
}

/// Field changes for an existing polish. `None` leaves a field alone.
#[derive(Debug, Clone, Default)]
pub struct PolishEdit {
    pub brand: Option<String>,
    pub name: Option<String>,
    pub code: Option<String>,
    pub barcode: Option<String>,
    pub color: Option<String>,
    pub finish: Option<Finish>,
    pub collection: Option<String>,
    pub tags: Option<Vec<String>>,
    pub notes: Option<String>,
    pub image: Option<PathBuf>,
    pub remove_image: bool,
}

#[derive(Debug, Clone, Default)]
pub struct PolishFilter {
    /// Matched against brand, name, code and collection.
    pub query: Option<String>,
    pub finish: Option<Finish>,
    pub tag: Option<String>,
    pub wall: Option<String>,
}

impl PolishFilter {
    fn accepts(&self, polish: &Polish) -> bool {
        if let Some(query) = &self.query {
            let hit = [&polish.brand, &polish.name, &polish.code, &polish.collection]
                .iter()
                .any(|field| matches(field, query));
            if !hit {
                return false;
            }
        }
        if self.finish.is_some_and(|finish| polish.finish != finish) {
            return false;
        }
        if let Some(tag) = &self.tag {
            if !polish.tags.iter().any(|t| t.eq_ignore_ascii_case(tag)) {
                return false;
            }
        }
        if let Some(wall) = &self.wall {
            if polish.placement.as_ref().map(|p| &p.wall) != Some(wall) {
                return false;
            }
        }
        true
    }
}

pub fn list_polishes<'a>(state: &'a AppState, filter: &PolishFilter) -> Vec<&'a Polish> {
    state.polishes.iter().filter(|p| filter.accepts(p)).collect()
}

pub fn find_polish<'a>(state: &'a AppState, id: &str) -> Result<&'a Polish> {
    match state.polish(id) {
        Some(polish) => Ok(polish),
        None => bail!("no polish with id {id}"),
    }
}

pub async fn add_polish(runtime: &RuntimeHandle, input: NewPolish) -> Result<Polish> {
    let state = runtime.state();
    if let Some(placement) = &input.placement {
        check_placement(&state, placement, None)?;
    }

    let mut polish = Polish::new(input.brand, input.name);
    polish.code = input.code;
    polish.barcode = input.barcode;
    polish.color = input.color;
    polish.finish = input.finish;
    polish.collection = input.collection;
    polish.tags = input.tags;
    polish.notes = input.notes;
    polish.image = embed_image(input.image.as_deref()).await?;
    polish.placement = input.placement;

    let state = runtime
        .dispatch(Action::Polish(EntityAction::Add(polish.clone())))
        .await?;
    let polish = find_polish(&state, &polish.id)?.clone();

    info!(id = %polish.id, label = %polish.label(), "Added polish");
    Ok(polish)
}

pub async fn edit_polish(runtime: &RuntimeHandle, id: &str, edit: PolishEdit) -> Result<Polish> {
    find_polish(&runtime.state(), id)?;

    let mut patch = RecordPatch::new(id);
    let text_fields = [
        ("brand", edit.brand),
        ("name", edit.name),
        ("code", edit.code),
        ("barcode", edit.barcode),
        ("color", edit.color),
        ("collection", edit.collection),
        ("notes", edit.notes),
    ];
    for (field, value) in text_fields {
        if let Some(value) = value {
            patch = patch.set(field, value);
        }
    }
    if let Some(finish) = edit.finish {
        patch = patch.set("finish", finish.as_str());
    }
    if let Some(tags) = edit.tags {
        patch = patch.set("tags", tags);
    }
    let patch = patch_image(patch, edit.image.as_deref(), edit.remove_image).await?;

    let state = runtime
        .dispatch(Action::Polish(EntityAction::Update(patch)))
        .await?;
    let polish = find_polish(&state, id)?.clone();

    info!(id = %polish.id, "Edited polish");
    Ok(polish)
}

/// Place a polish on the wall, or take it off with `None`.
pub async fn move_polish(
    runtime: &RuntimeHandle,
    id: &str,
    placement: Option<Placement>,
) -> Result<Polish> {
    let state = runtime.state();
    find_polish(&state, id)?;

    let patch = match &placement {
        Some(placement) => {
            check_placement(&state, placement, Some(id))?;
            RecordPatch::new(id)
                .set("wall", placement.wall.clone())
                .set("shelf", placement.shelf)
                .set("position", placement.position)
        }
        None => RecordPatch::new(id)
            .set("wall", Value::Null)
            .set("shelf", Value::Null)
            .set("position", Value::Null),
    };

    let state = runtime
        .dispatch(Action::Polish(EntityAction::Update(patch)))
        .await?;
    let polish = find_polish(&state, id)?.clone();

    match &polish.placement {
        Some(p) => info!(id, wall = %p.wall, shelf = p.shelf, position = p.position, "Moved polish"),
        None => info!(id, "Removed polish from the wall"),
    }
    Ok(polish)
}

/// Returns `false` when nothing had that id.
pub async fn delete_polish(runtime: &RuntimeHandle, id: &str) -> Result<bool> {
    let existed = runtime.state().polish(id).is_some();
    runtime
        .dispatch(Action::Polish(EntityAction::Delete(id.to_string())))
        .await?;
    if existed {
        info!(id, "Deleted polish");
    }
    Ok(existed)
}

/// Reject placements outside the layout. A slot that is already taken is
/// only warned about.
fn check_placement(state: &AppState, placement: &Placement, moving: Option<&str>) -> Result<()> {
    placement.validate(&state.settings)?;
    if let Some(occupant) = state.polish_at(&placement.wall, placement.shelf, placement.position) {
        if Some(occupant.id.as_str()) != moving {
            warn!(
                wall = %placement.wall,
                shelf = placement.shelf,
                position = placement.position,
                occupant = %occupant.label(),
                "Slot is already taken"
            );
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::boot;
    use lacquer_store::{Database, LocalPersistence};

    fn runtime() -> RuntimeHandle {
        boot(LocalPersistence::new(Database::open_in_memory().unwrap()))
    }

    fn bubble_bath() -> NewPolish {
        NewPolish {
            brand: "OPI".into(),
            name: "Bubble Bath".into(),
            finish: Finish::Cream,
            tags: vec!["nude".into(), "sheer".into(), "nude".into()],
            placement: Some(Placement::new("A", 1, 1)),
            ..NewPolish::default()
        }
    }

    #[tokio::test]
    async fn add_places_and_dedups_tags() {
        let runtime = runtime();
        let polish = add_polish(&runtime, bubble_bath()).await.unwrap();

        assert_eq!(polish.tags, vec!["nude", "sheer"]);
        assert_eq!(runtime.state().polishes[0].id, polish.id);
        assert_eq!(
            runtime.state().polish_at("A", 1, 1).map(|p| p.id.clone()),
            Some(polish.id)
        );
    }

    #[tokio::test]
    async fn add_rejects_placement_outside_layout() {
        let runtime = runtime();
        let mut input = bubble_bath();
        input.placement = Some(Placement::new("Z", 1, 1));
        assert!(add_polish(&runtime, input).await.is_err());

        let mut input = bubble_bath();
        input.placement = Some(Placement::new("A", 9, 1));
        assert!(add_polish(&runtime, input).await.is_err());
        assert!(runtime.state().polishes.is_empty());
    }

    #[tokio::test]
    async fn add_embeds_image() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("swatch.png");
        std::fs::write(&path, [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0]).unwrap();

        let runtime = runtime();
        let mut input = bubble_bath();
        input.image = Some(path);
        let polish = add_polish(&runtime, input).await.unwrap();
        assert!(polish.image.unwrap().starts_with("data:image/png;base64,"));
    }

    #[tokio::test]
    async fn edit_patches_fields_and_removes_image() {
        let runtime = runtime();
        let polish = add_polish(&runtime, bubble_bath()).await.unwrap();
        runtime
            .dispatch(Action::Polish(EntityAction::Update(
                RecordPatch::new(&polish.id).set("image", "data:image/png;base64,AA=="),
            )))
            .await
            .unwrap();

        let edited = edit_polish(
            &runtime,
            &polish.id,
            PolishEdit {
                notes: Some("two coats".into()),
                finish: Some(Finish::Jelly),
                remove_image: true,
                ..PolishEdit::default()
            },
        )
        .await
        .unwrap();

        assert_eq!(edited.notes, "two coats");
        assert_eq!(edited.finish, Finish::Jelly);
        assert_eq!(edited.name, "Bubble Bath");
        assert!(edited.image.is_none());
    }

    #[tokio::test]
    async fn edit_unknown_id_fails() {
        let runtime = runtime();
        assert!(edit_polish(&runtime, "nope", PolishEdit::default()).await.is_err());
    }

    #[tokio::test]
    async fn move_and_unplace() {
        let runtime = runtime();
        let polish = add_polish(&runtime, bubble_bath()).await.unwrap();

        let moved = move_polish(&runtime, &polish.id, Some(Placement::new("B", 8, 21)))
            .await
            .unwrap();
        assert_eq!(moved.placement, Some(Placement::new("B", 8, 21)));
        assert!(runtime.state().polish_at("A", 1, 1).is_none());

        let unplaced = move_polish(&runtime, &polish.id, None).await.unwrap();
        assert!(unplaced.placement.is_none());
    }

    #[tokio::test]
    async fn delete_reports_missing_ids() {
        let runtime = runtime();
        let polish = add_polish(&runtime, bubble_bath()).await.unwrap();
        assert!(delete_polish(&runtime, &polish.id).await.unwrap());
        assert!(!delete_polish(&runtime, &polish.id).await.unwrap());
        assert!(runtime.state().polishes.is_empty());
    }

    #[tokio::test]
    async fn filters_combine() {
        let runtime = runtime();
        add_polish(&runtime, bubble_bath()).await.unwrap();
        add_polish(
            &runtime,
            NewPolish {
                brand: "Essie".into(),
                name: "Licorice".into(),
                finish: Finish::Cream,
                tags: vec!["dark".into()],
                placement: Some(Placement::new("B", 2, 3)),
                ..NewPolish::default()
            },
        )
        .await
        .unwrap();

        let state = runtime.state();
        let all = list_polishes(&state, &PolishFilter::default());
        assert_eq!(all.len(), 2);

        let filter = PolishFilter {
            query: Some("opi".into()),
            ..PolishFilter::default()
        };
        assert_eq!(list_polishes(&state, &filter)[0].name, "Bubble Bath");

        let filter = PolishFilter {
            finish: Some(Finish::Cream),
            wall: Some("B".into()),
            ..PolishFilter::default()
        };
        assert_eq!(list_polishes(&state, &filter)[0].name, "Licorice");

        let filter = PolishFilter {
            tag: Some("DARK".into()),
            query: Some("bubble".into()),
            ..PolishFilter::default()
        };
        assert!(list_polishes(&state, &filter).is_empty());
    }
}
