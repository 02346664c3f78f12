//! Demo dataset written when a slot has never been persisted.

use crate::constants::{INCIDENTS_KEY, PATIENTS_KEY};
use crate::incident::Incident;
use crate::patient::Patient;
use crate::{ClinicError, ClinicResult};

const DEMO_PATIENTS: &str = r#"[
  {"id": "p1", "name": "John Doe", "dateOfBirth": "1990-05-10", "contact": "1234567890", "healthInfo": "No allergies"},
  {"id": "p2", "name": "Jane Smith", "dateOfBirth": "1985-08-15", "contact": "0987654321", "healthInfo": "Allergic to penicillin"},
  {"id": "p3", "name": "Mike Johnson", "dateOfBirth": "1992-12-03", "contact": "5551234567", "healthInfo": "Diabetes"}
]"#;

const DEMO_INCIDENTS: &str = r#"[
  {
    "id": "i1", "patientId": "p1", "title": "Toothache",
    "description": "Upper molar pain", "comments": "Sensitive to cold",
    "appointmentDate": "2025-07-15T10:00:00", "cost": 80,
    "treatment": "Root canal therapy", "status": "Completed",
    "nextAppointmentDate": "2025-08-15T10:00:00", "attachments": []
  },
  {
    "id": "i2", "patientId": "p2", "title": "Dental Cleaning",
    "description": "Regular checkup and cleaning", "comments": "Good oral hygiene",
    "appointmentDate": "2025-07-20T14:00:00", "status": "Scheduled", "attachments": []
  },
  {
    "id": "i3", "patientId": "p1", "title": "Follow-up",
    "description": "Post-treatment checkup", "comments": "Check healing progress",
    "appointmentDate": "2025-07-25T11:00:00", "status": "Scheduled", "attachments": []
  },
  {
    "id": "i4", "patientId": "p3", "title": "Dental Implant",
    "description": "Single tooth implant", "comments": "Left lower molar replacement",
    "appointmentDate": "2025-07-30T09:00:00", "status": "Scheduled", "attachments": []
  }
]"#;

pub fn demo_patients() -> ClinicResult<Vec<Patient>> {
    serde_json::from_str(DEMO_PATIENTS).map_err(|source| ClinicError::Deserialization {
        key: PATIENTS_KEY.to_string(),
        source,
    })
}

pub fn demo_incidents() -> ClinicResult<Vec<Incident>> {
    serde_json::from_str(DEMO_INCIDENTS).map_err(|source| ClinicError::Deserialization {
        key: INCIDENTS_KEY.to_string(),
        source,
    })
}
