use std::path::PathBuf;

use anyhow::Result;
use chrono::NaiveDate;
use lacquer_shared::image::embed_image;
use lacquer_shared::{Action, AppState, EntityAction, Manicure, ResolvedManicure};
use tracing::{info, warn};

use crate::runtime::RuntimeHandle;

#[derive(Debug, Clone)]
pub struct NewManicure {
    pub date: NaiveDate,
    pub title: Option<String>,
    pub polish_ids: Vec<String>,
    pub tool_ids: Vec<String>,
    pub steps: Vec<String>,
    pub notes: String,
    pub image: Option<PathBuf>,
    pub rating: u8,
    pub wear_days: u32,
}

impl NewManicure {
    pub fn on(date: NaiveDate) -> Self {
        Self {
            date,
            title: None,
            polish_ids: Vec::new(),
            tool_ids: Vec::new(),
            steps: Vec::new(),
            notes: String::new(),
            image: None,
            rating: Manicure::default().rating,
            wear_days: 0,
        }
    }
}

/// Every manicure with its polish and tool references looked up, newest
/// first. References to deleted records are left out.
pub fn list_manicures(state: &AppState) -> Vec<ResolvedManicure<'_>> {
    state
        .manicures
        .iter()
        .map(|m| state.resolve_manicure(m))
        .collect()
}

pub async fn add_manicure(runtime: &RuntimeHandle, input: NewManicure) -> Result<Manicure> {
    let state = runtime.state();
    for id in &input.polish_ids {
        if state.polish(id).is_none() {
            warn!(id = %id, "Manicure references an unknown polish");
        }
    }
    for id in &input.tool_ids {
        if state.tool(id).is_none() {
            warn!(id = %id, "Manicure references an unknown tool");
        }
    }

    let mut manicure = Manicure::new(input.date);
    manicure.title = input.title.filter(|t| !t.trim().is_empty());
    manicure.polish_ids = input.polish_ids;
    manicure.tool_ids = input.tool_ids;
    manicure.steps = input.steps;
    manicure.notes = input.notes;
    manicure.image = embed_image(input.image.as_deref()).await?;
    manicure.rating = input.rating;
    manicure.wear_days = input.wear_days;

    let state = runtime
        .dispatch(Action::Manicure(EntityAction::Add(manicure.clone())))
        .await?;
    let manicure = state
        .manicure(&manicure.id)
        .cloned()
        .unwrap_or(manicure);

    info!(id = %manicure.id, date = %manicure.date, rating = manicure.rating, "Logged manicure");
    Ok(manicure)
}

pub async fn delete_manicure(runtime: &RuntimeHandle, id: &str) -> Result<bool> {
    let existed = runtime.state().manicure(id).is_some();
    runtime
        .dispatch(Action::Manicure(EntityAction::Delete(id.to_string())))
        .await?;
    if existed {
        info!(id, "Deleted manicure");
    }
    Ok(existed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::polish::{add_polish, delete_polish, NewPolish};
    use crate::runtime::boot;
    use lacquer_store::{Database, LocalPersistence};

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 9).unwrap()
    }

    #[tokio::test]
    async fn rating_is_clamped_and_refs_resolve() {
        let runtime = boot(LocalPersistence::new(Database::open_in_memory().unwrap()));
        let polish = add_polish(
            &runtime,
            NewPolish {
                brand: "OPI".into(),
                name: "Big Apple Red".into(),
                ..NewPolish::default()
            },
        )
        .await
        .unwrap();

        let mut input = NewManicure::on(date());
        input.polish_ids = vec![polish.id.clone(), "gone".into()];
        input.rating = 9;
        input.title = Some("  ".into());
        let manicure = add_manicure(&runtime, input).await.unwrap();

        assert_eq!(manicure.rating, 5);
        assert!(manicure.title.is_none());

        let state = runtime.state();
        let listed = list_manicures(&state);
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].polishes.len(), 1);
        assert_eq!(listed[0].polishes[0].id, polish.id);
    }

    #[tokio::test]
    async fn deleting_a_polish_leaves_dangling_reference() {
        let runtime = boot(LocalPersistence::new(Database::open_in_memory().unwrap()));
        let polish = add_polish(
            &runtime,
            NewPolish {
                name: "Lincoln Park After Dark".into(),
                ..NewPolish::default()
            },
        )
        .await
        .unwrap();
        let mut input = NewManicure::on(date());
        input.polish_ids = vec![polish.id.clone()];
        let manicure = add_manicure(&runtime, input).await.unwrap();

        delete_polish(&runtime, &polish.id).await.unwrap();

        let state = runtime.state();
        assert_eq!(state.manicure(&manicure.id).unwrap().polish_ids, vec![polish.id.clone()]);
        assert!(list_manicures(&state)[0].polishes.is_empty());

        assert!(delete_manicure(&runtime, &manicure.id).await.unwrap());
        assert!(runtime.state().manicures.is_empty());
    }
}
