//! Inline image embedding.
//!
//! Images are stored directly on the owning record as `data:` URIs. There
//! is no separate blob store, so every persisted or mirrored snapshot
//! carries the full image payload.

use std::path::Path;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

use crate::constants::MAX_IMAGE_SIZE;
use crate::error::ImageError;

/// Read an image file and encode it as a data URI.
///
/// `None` means no file was chosen and yields `None`.
pub async fn embed_image(path: Option<&Path>) -> Result<Option<String>, ImageError> {
    let Some(path) = path else {
        return Ok(None);
    };

    let size = tokio::fs::metadata(path).await?.len();
    if size > MAX_IMAGE_SIZE {
        return Err(ImageError::TooLarge {
            size,
            max: MAX_IMAGE_SIZE,
        });
    }

    let bytes = tokio::fs::read(path).await?;
    let mime = sniff_mime(&bytes)
        .or_else(|| mime_from_extension(path))
        .unwrap_or("application/octet-stream");

    tracing::debug!(path = %path.display(), mime, size, "Embedded image");

    Ok(Some(to_data_uri(mime, &bytes)))
}

pub fn to_data_uri(mime: &str, bytes: &[u8]) -> String {
    format!("data:{mime};base64,{}", STANDARD.encode(bytes))
}

/// Split a base64 data URI into its MIME type and decoded bytes.
pub fn decode_data_uri(uri: &str) -> Option<(String, Vec<u8>)> {
    let rest = uri.strip_prefix("data:")?;
    let (header, payload) = rest.split_once(',')?;
    let mime = header.strip_suffix(";base64")?;
    let bytes = STANDARD.decode(payload.trim()).ok()?;
    Some((mime.to_string(), bytes))
}

fn sniff_mime(bytes: &[u8]) -> Option<&'static str> {
    match bytes {
        [0x89, b'P', b'N', b'G', ..] => Some("image/png"),
        [0xFF, 0xD8, 0xFF, ..] => Some("image/jpeg"),
        [b'G', b'I', b'F', b'8', ..] => Some("image/gif"),
        [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'E', b'B', b'P', ..] => Some("image/webp"),
        _ => None,
    }
}

fn mime_from_extension(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        "heic" => Some("image/heic"),
        "svg" => Some("image/svg+xml"),
        _ => None,
    }
}
