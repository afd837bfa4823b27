use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use actionlens_contracts::upload::UploadFile;
use anyhow::{Context, Result};

/// Reads an image from disk the way a browser file picker would report it.
/// A missing file yields `Ok(None)` so it can flow into validation as "no
/// file selected".
pub fn load_upload(path: &Path) -> Result<Option<UploadFile>> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
        Err(err) => {
            return Err(err).with_context(|| format!("failed to read {}", path.display()));
        }
    };
    let name = path
        .file_name()
        .map(|value| value.to_string_lossy().to_string())
        .unwrap_or_else(|| "upload".to_string());
    let media_type = declared_media_type(path, &bytes);
    Ok(Some(UploadFile::new(name, media_type, bytes)))
}

/// Media type from the content signature, then the extension.
pub fn declared_media_type(path: &Path, bytes: &[u8]) -> String {
    if let Ok(format) = image::guess_format(bytes) {
        return format.to_mime_type().to_string();
    }
    let ext = path
        .extension()
        .and_then(|value| value.to_str())
        .map(|value| value.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "jpg" | "jpeg" | "jfif" => "image/jpeg",
        "png" => "image/png",
        "avif" => "image/avif",
        "webp" => "image/webp",
        "gif" => "image/gif",
        _ => "application/octet-stream",
    }
    .to_string()
}
