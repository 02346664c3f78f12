//! Record identifier utilities.
//!
//! Clinic records are identified by a short kind prefix followed by a random UUID in
//! *canonical* form: **32 lowercase hexadecimal characters** (no hyphens).
//!
//! ```text
//! p550e8400e29b41d4a716446655440000   # patient
//! i6ba7b8109dad11d180b400c04fd430c8   # incident
//! ```
//!
//! Identifiers loaded from storage are accepted verbatim (the demo dataset uses `p1`,
//! `i1`, ...), so [`RecordId`] only requires the value to be non-blank. Freshly
//! allocated identifiers always use the prefixed canonical form.
//!
//! Random v4 UUIDs replace the millisecond-clock identifiers older clients produced,
//! which collided whenever two records were created within the same tick.

mod service;

pub use service::{RecordId, RecordKind, UuidService};

/// Error type for UUID operations.
#[derive(Debug, thiserror::Error)]
pub enum UuidError {
    /// Invalid input provided
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Result type for UUID operations.
pub type UuidResult<T> = Result<T, UuidError>;
