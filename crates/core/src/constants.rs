//! Constants used throughout the clinic core crate.
//!
//! Slot names and limits live here so the persisted layout stays consistent across
//! the store, the session service and their tests.

/// Default directory for the file-backed key-value store.
pub const DEFAULT_DATA_DIR: &str = "clinic_data";

/// Slot holding the JSON array of patients.
pub const PATIENTS_KEY: &str = "patients";

/// Slot holding the JSON array of incidents.
pub const INCIDENTS_KEY: &str = "incidents";

/// Slot holding the logged-in session.
pub const SESSION_KEY: &str = "currentUser";

/// File extension for slots written by the file backend.
pub const SLOT_FILE_EXTENSION: &str = "json";

/// Number of fresh identifiers tried before giving up with `DuplicateId`.
pub const ID_ALLOCATION_ATTEMPTS: usize = 5;

/// Upcoming appointments shown on the admin dashboard.
pub const DASHBOARD_UPCOMING_LIMIT: usize = 10;

/// Patients shown in the admin dashboard ranking.
pub const DASHBOARD_TOP_PATIENTS_LIMIT: usize = 5;
