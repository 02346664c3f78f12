//! # Clinic Core
//!
//! Core business logic for the clinic record store.
//!
//! This crate owns the two record collections and the rules between them:
//! - Patient and incident records with typed create and patch inputs
//! - [`ClinicStore`]: the six mutations, cascading patient deletion and persistence
//! - [`ClinicView`]: derived queries (upcoming, history, day view, rankings, dashboards)
//! - [`KeyValueStore`] backends: JSON slot files under the data directory, or memory
//! - [`SessionService`]: the demo sign-in used to pick between admin and patient views
//!
//! **No presentation concerns**: argument parsing and output formatting belong in the
//! `clinic` binary.

pub mod config;
pub mod constants;
pub mod error;
pub mod incident;
pub mod kv;
pub mod patient;
pub mod queries;
pub mod seed;
pub mod session;
pub mod store;
pub mod time;

pub use config::{CoreConfig, ReferencePolicy};
pub use error::{ClinicError, ClinicResult};
pub use incident::{Incident, IncidentPatch, IncidentStatus, NewIncident};
pub use kv::{FileKeyValueStore, KeyValueStore, MemoryKeyValueStore};
pub use patient::{NewPatient, Patient, PatientPatch};
pub use queries::{
    AdminDashboard, ClinicSummary, ClinicView, DayFilter, PatientDashboard, PatientRanking,
    PatientSummary,
};
pub use session::{Role, Session, SessionService};
pub use store::{CascadeRemoval, ClinicStore};

pub use clinic_files::{Attachment, AttachmentMetadata};
pub use clinic_types::{Cost, NonEmptyText};
pub use clinic_uuid::{RecordId, RecordKind};
