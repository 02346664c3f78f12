//! Internal implementation of the identifier types.

use crate::{UuidError, UuidResult};
use std::{fmt, str::FromStr};

use ::uuid::Uuid;

/// Canonical UUID (32 lowercase hex characters, no hyphens).
///
/// Generated as a random (v4) UUID and always displayed in canonical form.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct UuidService(Uuid);

impl Default for UuidService {
    fn default() -> Self {
        Self::new()
    }
}

impl UuidService {
    /// Generates a new UUID in canonical form.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for UuidService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

/// The collection a record belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RecordKind {
    Patient,
    Incident,
}

impl RecordKind {
    /// Single-character prefix used for freshly allocated identifiers.
    pub fn prefix(self) -> char {
        match self {
            RecordKind::Patient => 'p',
            RecordKind::Incident => 'i',
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordKind::Patient => write!(f, "patient"),
            RecordKind::Incident => write!(f, "incident"),
        }
    }
}

/// Identifier of a patient or incident record.
///
/// Any non-blank string is a valid stored identifier; [`RecordId::allocate`] produces
/// `<prefix><canonical uuid>` for new records.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "String", into = "String"))]
pub struct RecordId(String);

impl RecordId {
    /// Allocates a fresh identifier for a record of `kind`.
    pub fn allocate(kind: RecordKind) -> Self {
        Self(format!("{}{}", kind.prefix(), UuidService::new()))
    }

    /// Wraps an existing identifier.
    ///
    /// # Errors
    ///
    /// Returns [`UuidError::InvalidInput`] if `input` is empty, blank, or has
    /// surrounding whitespace.
    pub fn parse(input: &str) -> UuidResult<Self> {
        if input.trim().is_empty() {
            return Err(UuidError::InvalidInput(
                "record id cannot be empty".to_string(),
            ));
        }
        if input.trim() != input {
            return Err(UuidError::InvalidInput(format!(
                "record id cannot have surrounding whitespace: '{}'",
                input
            )));
        }
        Ok(Self(input.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for RecordId {
    type Err = UuidError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RecordId::parse(s)
    }
}

impl TryFrom<String> for RecordId {
    type Error = UuidError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        RecordId::parse(&value)
    }
}

impl From<RecordId> for String {
    fn from(id: RecordId) -> Self {
        id.0
    }
}

impl AsRef<str> for RecordId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for RecordId {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for RecordId {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}
