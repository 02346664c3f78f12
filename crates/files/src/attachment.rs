//! Attachment values and data URL handling.

use crate::{FilesError, FilesResult};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::Path;

/// Media type recorded when the bytes do not match any known signature.
pub const DEFAULT_MEDIA_TYPE: &str = "application/octet-stream";

const DATA_URL_SCHEME: &str = "data:";
const BASE64_MARKER: &str = ";base64";

/// A file attached to an incident.
///
/// Field order is preserved as written by clients. Older records stored the data URL
/// under `url`, which is still accepted when reading.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Attachment {
    pub name: String,
    #[serde(alias = "url")]
    pub content: String,
}

/// Summary of an attachment's payload.
///
/// Computed on demand, never stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentMetadata {
    pub name: String,
    /// Media type declared in the data URL, if any
    pub media_type: Option<String>,
    pub size_bytes: u64,
    /// Hexadecimal SHA-256 digest of the decoded payload
    pub sha256: String,
}

struct DataUrl<'a> {
    media_type: Option<&'a str>,
    base64: bool,
    payload: &'a str,
}

fn split_data_url(content: &str) -> FilesResult<DataUrl<'_>> {
    let rest = content.strip_prefix(DATA_URL_SCHEME).ok_or_else(|| {
        FilesError::MalformedDataUrl("content must start with 'data:'".to_string())
    })?;
    let (header, payload) = rest.split_once(',').ok_or_else(|| {
        FilesError::MalformedDataUrl("missing ',' between header and payload".to_string())
    })?;

    let (header, base64) = match header.strip_suffix(BASE64_MARKER) {
        Some(h) => (h, true),
        None => (header, false),
    };

    // Parameters such as ";charset=utf-8" follow the media type.
    let media_type = header.split(';').next().filter(|m| !m.is_empty());

    Ok(DataUrl {
        media_type,
        base64,
        payload,
    })
}

impl Attachment {
    /// Encodes `bytes` as a base64 data URL.
    ///
    /// The media type is sniffed from magic bytes and falls back to
    /// [`DEFAULT_MEDIA_TYPE`].
    pub fn from_bytes(name: impl Into<String>, bytes: &[u8]) -> Self {
        let media_type = infer::get(bytes)
            .map(|kind| kind.mime_type())
            .unwrap_or(DEFAULT_MEDIA_TYPE);

        Self {
            name: name.into(),
            content: format!(
                "{DATA_URL_SCHEME}{media_type}{BASE64_MARKER},{}",
                STANDARD.encode(bytes)
            ),
        }
    }

    /// Reads `path` and encodes it, naming the attachment after the file.
    ///
    /// # Errors
    ///
    /// Returns `FilesError` if:
    /// - the path has no UTF-8 file name component
    /// - the file cannot be read
    pub fn from_path(path: &Path) -> FilesResult<Self> {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .filter(|n| !n.is_empty())
            .ok_or_else(|| FilesError::InvalidPath(path.display().to_string()))?;

        let bytes = fs::read(path).map_err(|e| {
            FilesError::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to read attachment {}: {}", path.display(), e),
            ))
        })?;

        Ok(Self::from_bytes(name, &bytes))
    }

    /// Media type declared in the data URL header.
    pub fn media_type(&self) -> Option<&str> {
        split_data_url(&self.content)
            .ok()
            .and_then(|url| url.media_type)
    }

    /// Decodes the payload back into bytes.
    ///
    /// Non-base64 data URLs are returned as their raw payload bytes.
    pub fn decode(&self) -> FilesResult<Vec<u8>> {
        let url = split_data_url(&self.content)?;
        if url.base64 {
            Ok(STANDARD.decode(url.payload)?)
        } else {
            Ok(url.payload.as_bytes().to_vec())
        }
    }

    pub fn metadata(&self) -> FilesResult<AttachmentMetadata> {
        let bytes = self.decode()?;

        Ok(AttachmentMetadata {
            name: self.name.clone(),
            media_type: self.media_type().map(str::to_owned),
            size_bytes: bytes.len() as u64,
            sha256: hex::encode(Sha256::digest(&bytes)),
        })
    }
}
