use std::fmt;

/// An image selected for analysis: raw bytes plus the metadata a browser or
/// file system reports for it.
#[derive(Clone, PartialEq, Eq)]
pub struct UploadFile {
    pub name: String,
    pub media_type: String,
    pub bytes: Vec<u8>,
}

impl UploadFile {
    pub fn new(name: impl Into<String>, media_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            media_type: media_type.into(),
            bytes,
        }
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    /// Lowercased subtype of the declared media type, without parameters:
    /// `image/JPEG; q=1` -> `jpeg`.
    pub fn media_subtype(&self) -> Option<String> {
        let essence = self.media_type.split(';').next()?.trim().to_ascii_lowercase();
        let (kind, subtype) = essence.split_once('/')?;
        if kind != "image" || subtype.is_empty() {
            return None;
        }
        Some(subtype.to_string())
    }

    /// Lowercased file-name extension without the dot.
    pub fn extension(&self) -> Option<String> {
        let (_, ext) = self.name.trim().rsplit_once('.')?;
        if ext.is_empty() {
            return None;
        }
        Some(ext.to_ascii_lowercase())
    }
}

impl fmt::Debug for UploadFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadFile")
            .field("name", &self.name)
            .field("media_type", &self.media_type)
            .field("size", &self.bytes.len())
            .finish()
    }
}
