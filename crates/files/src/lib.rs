//! Clinic attachments
//!
//! Incident records carry their attachments inline: each attachment is a file name plus a
//! self-contained [data URL](https://www.rfc-editor.org/rfc/rfc2397) holding the bytes.
//!
//! ```text
//! { "name": "xray.png", "content": "data:image/png;base64,iVBORw0KGgo..." }
//! ```
//!
//! The store treats these values as opaque. This crate is the capture side: it turns local
//! files into attachments and inspects or decodes attachments already stored.
//!
//! ## Example Usage
//!
//! ```no_run
//! use clinic_files::Attachment;
//! use std::path::Path;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let attachment = Attachment::from_path(Path::new("scans/xray.png"))?;
//! let metadata = attachment.metadata()?;
//! println!("{} ({} bytes, {})", metadata.name, metadata.size_bytes, metadata.sha256);
//! # Ok(())
//! # }
//! ```

mod attachment;

pub use attachment::{Attachment, AttachmentMetadata, DEFAULT_MEDIA_TYPE};

/// Errors that can occur while encoding or decoding attachments
#[derive(Debug, thiserror::Error)]
pub enum FilesError {
    /// Source path has no usable file name
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// Content is not a `data:` URL
    #[error("Malformed data URL: {0}")]
    MalformedDataUrl(String),

    /// Base64 payload could not be decoded
    #[error("Invalid base64 payload: {0}")]
    InvalidPayload(#[from] base64::DecodeError),

    /// I/O error occurred
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type FilesResult<T> = Result<T, FilesError>;
