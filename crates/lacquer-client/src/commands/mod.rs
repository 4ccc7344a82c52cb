//! Operations behind the `lacquer` subcommands.
//!
//! Each function validates its input against the current state, builds one
//! [`Action`](lacquer_shared::Action), and waits for the runtime to apply
//! it. Nothing here prints; formatting lives in the CLI layer.

pub mod backup;
pub mod manicure;
pub mod polish;
pub mod settings;
pub mod sync;
pub mod tool;

use std::path::Path;

use anyhow::Result;
use lacquer_shared::image::embed_image;
use lacquer_shared::RecordPatch;

/// Update or clear the `image` field of `patch`.
pub(crate) async fn patch_image(
    patch: RecordPatch,
    image: Option<&Path>,
    remove: bool,
) -> Result<RecordPatch> {
    if remove {
        return Ok(patch.set("image", serde_json::Value::Null));
    }
    match embed_image(image).await? {
        Some(uri) => Ok(patch.set("image", uri)),
        None => Ok(patch),
    }
}

/// Case-insensitive substring match.
pub(crate) fn matches(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}
