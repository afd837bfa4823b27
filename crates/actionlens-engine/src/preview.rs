use std::fmt;
use std::io::Cursor;

use actionlens_contracts::upload::UploadFile;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use image::ImageReader;
use sha2::{Digest, Sha256};

/// Display-only rendition of an upload.
#[derive(Clone, PartialEq, Eq)]
pub struct PreviewHandle {
    pub data_url: String,
    /// Hex SHA-256 of the upload bytes.
    pub fingerprint: String,
    pub dimensions: Option<(u32, u32)>,
}

impl PreviewHandle {
    pub fn short_fingerprint(&self) -> &str {
        &self.fingerprint[..self.fingerprint.len().min(12)]
    }
}

impl fmt::Debug for PreviewHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PreviewHandle")
            .field("fingerprint", &self.short_fingerprint())
            .field("dimensions", &self.dimensions)
            .field("data_url_len", &self.data_url.len())
            .finish()
    }
}

/// Encodes the upload as a data URL. Dimensions are read from the header
/// when the format is decodable and left empty otherwise.
pub fn derive_preview(file: &UploadFile) -> PreviewHandle {
    let media_type = if file.media_type.trim().is_empty() {
        "application/octet-stream"
    } else {
        file.media_type.trim()
    };
    PreviewHandle {
        data_url: format!("data:{media_type};base64,{}", BASE64.encode(&file.bytes)),
        fingerprint: fingerprint(&file.bytes),
        dimensions: read_dimensions(&file.bytes),
    }
}

pub fn fingerprint(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

fn read_dimensions(bytes: &[u8]) -> Option<(u32, u32)> {
    ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .ok()?
        .into_dimensions()
        .ok()
}
