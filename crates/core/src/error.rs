use clinic_uuid::RecordKind;

#[derive(Debug, thiserror::Error)]
pub enum ClinicError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("{kind} not found: {id}")]
    NotFound { kind: RecordKind, id: String },
    #[error("incident references unknown patient: {patient_id}")]
    InvalidReference { patient_id: String },
    #[error("could not allocate a unique {kind} id after {attempts} attempts (last: {id})")]
    DuplicateId {
        kind: RecordKind,
        id: String,
        attempts: usize,
    },

    #[error("invalid storage key: '{0}'")]
    InvalidKey(String),
    #[error("failed to create storage directory: {0}")]
    StorageDirCreation(std::io::Error),
    #[error("failed to read storage slot '{key}': {source}")]
    SlotRead {
        key: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write storage slot '{key}': {source}")]
    SlotWrite {
        key: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to serialize slot '{key}': {source}")]
    Serialization {
        key: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to deserialize slot '{key}': {source}")]
    Deserialization {
        key: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid patch: {0}")]
    InvalidPatch(serde_json::Error),

    #[error("invalid text: {0}")]
    Text(#[from] clinic_types::TextError),
    #[error("invalid amount: {0}")]
    Amount(#[from] clinic_types::AmountError),
    #[error("invalid identifier: {0}")]
    Uuid(#[from] clinic_uuid::UuidError),
    #[error("invalid date/time '{0}'")]
    InvalidTimestamp(String),
    #[error("attachment error: {0}")]
    Attachment(#[from] clinic_files::FilesError),

    #[error("no active session; log in first")]
    NotLoggedIn,
    #[error("this action requires the Admin role")]
    Forbidden,
}

pub type ClinicResult<T> = std::result::Result<T, ClinicError>;
