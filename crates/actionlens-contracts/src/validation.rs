use thiserror::Error;

use crate::upload::UploadFile;

/// Largest accepted upload, 10 MiB.
pub const MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024;

pub const ACCEPTED_SUBTYPES: &[&str] = &["jpeg", "jpg", "png", "jfif", "avif"];

pub const ACCEPTED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "jfif", "avif"];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("No file selected")]
    Missing,
    #[error("Please upload a valid image file (JPG, PNG, JFIF, AVIF)")]
    UnsupportedType {
        media_type: String,
        file_name: String,
    },
    #[error("Image must be under 10MB")]
    TooLarge { size: u64 },
}

impl ValidationError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Missing => "missing",
            Self::UnsupportedType { .. } => "unsupported_type",
            Self::TooLarge { .. } => "too_large",
        }
    }
}

/// Checks a candidate upload. The size ceiling is checked before the type so
/// an oversized file always reports the size error.
pub fn validate(file: Option<&UploadFile>) -> Result<(), ValidationError> {
    let Some(file) = file else {
        return Err(ValidationError::Missing);
    };

    if file.size() > MAX_UPLOAD_BYTES {
        return Err(ValidationError::TooLarge { size: file.size() });
    }

    if !has_accepted_subtype(file) && !has_accepted_extension(file) {
        return Err(ValidationError::UnsupportedType {
            media_type: file.media_type.clone(),
            file_name: file.name.clone(),
        });
    }

    Ok(())
}

fn has_accepted_subtype(file: &UploadFile) -> bool {
    file.media_subtype()
        .map(|subtype| ACCEPTED_SUBTYPES.contains(&subtype.as_str()))
        .unwrap_or(false)
}

fn has_accepted_extension(file: &UploadFile) -> bool {
    file.extension()
        .map(|ext| ACCEPTED_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or(false)
}
