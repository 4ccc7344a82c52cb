use std::path::PathBuf;

use anyhow::{bail, Result};
use lacquer_shared::image::embed_image;
use lacquer_shared::{Action, AppState, EntityAction, Tool, ToolKind};
use tracing::info;

use crate::runtime::RuntimeHandle;

#[derive(Debug, Clone, Default)]
pub struct NewTool {
    pub name: String,
    pub kind: ToolKind,
    pub brand: Option<String>,
    pub notes: String,
    pub image: Option<PathBuf>,
}

pub fn list_tools(state: &AppState, kind: Option<ToolKind>) -> Vec<&Tool> {
    state
        .tools
        .iter()
        .filter(|t| kind.map_or(true, |kind| t.kind == kind))
        .collect()
}

pub async fn add_tool(runtime: &RuntimeHandle, input: NewTool) -> Result<Tool> {
    if input.name.trim().is_empty() {
        bail!("a tool needs a name");
    }

    let mut tool = Tool::new(input.name.trim(), input.kind);
    tool.brand = input.brand.filter(|b| !b.trim().is_empty());
    tool.notes = input.notes;
    tool.image = embed_image(input.image.as_deref()).await?;

    runtime
        .dispatch(Action::Tool(EntityAction::Add(tool.clone())))
        .await?;

    info!(id = %tool.id, name = %tool.name, kind = %tool.kind, "Added tool");
    Ok(tool)
}

/// Manicures that referenced the tool keep the dangling id.
pub async fn delete_tool(runtime: &RuntimeHandle, id: &str) -> Result<bool> {
    let existed = runtime.state().tool(id).is_some();
    runtime
        .dispatch(Action::Tool(EntityAction::Delete(id.to_string())))
        .await?;
    if existed {
        info!(id, "Deleted tool");
    }
    Ok(existed)
}
