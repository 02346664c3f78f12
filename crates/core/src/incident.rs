//! Incident records: one appointment or treatment event for one patient.

use crate::patient::clearable;
use crate::time::{local_datetime, opt_local_datetime, patch_datetime, patch_opt_datetime};
use crate::{ClinicError, ClinicResult};
use chrono::NaiveDateTime;
use clinic_files::Attachment;
use clinic_types::{Cost, NonEmptyText};
use clinic_uuid::RecordId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Any status may move to any other.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IncidentStatus {
    #[default]
    Scheduled,
    Completed,
    Cancelled,
}

impl IncidentStatus {
    pub const ALL: [IncidentStatus; 3] = [
        IncidentStatus::Scheduled,
        IncidentStatus::Completed,
        IncidentStatus::Cancelled,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            IncidentStatus::Scheduled => "Scheduled",
            IncidentStatus::Completed => "Completed",
            IncidentStatus::Cancelled => "Cancelled",
        }
    }
}

impl fmt::Display for IncidentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for IncidentStatus {
    type Err = ClinicError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| {
                ClinicError::InvalidInput(format!(
                    "status must be one of Scheduled, Completed, Cancelled; got '{s}'"
                ))
            })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Incident {
    pub id: RecordId,
    pub patient_id: RecordId,
    pub title: NonEmptyText,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comments: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub treatment: Option<String>,
    #[serde(with = "local_datetime")]
    pub appointment_date: NaiveDateTime,
    #[serde(
        default,
        alias = "nextDate",
        with = "opt_local_datetime",
        skip_serializing_if = "Option::is_none"
    )]
    pub next_appointment_date: Option<NaiveDateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost: Option<Cost>,
    #[serde(default)]
    pub status: IncidentStatus,
    #[serde(default, alias = "files")]
    pub attachments: Vec<Attachment>,
}

impl Incident {
    /// Cost counted towards revenue: only completed incidents with a price.
    pub fn billable_cost(&self) -> Option<Cost> {
        match self.status {
            IncidentStatus::Completed => self.cost,
            _ => None,
        }
    }
}

/// Fields supplied by the caller when booking an incident.
#[derive(Debug, Clone, PartialEq)]
pub struct NewIncident {
    pub patient_id: RecordId,
    pub title: NonEmptyText,
    pub description: Option<String>,
    pub comments: Option<String>,
    pub treatment: Option<String>,
    pub appointment_date: NaiveDateTime,
    pub next_appointment_date: Option<NaiveDateTime>,
    pub cost: Option<Cost>,
    pub status: IncidentStatus,
    pub attachments: Vec<Attachment>,
}

impl NewIncident {
    /// A scheduled incident with only the required fields set.
    pub fn new(patient_id: RecordId, title: NonEmptyText, appointment_date: NaiveDateTime) -> Self {
        Self {
            patient_id,
            title,
            description: None,
            comments: None,
            treatment: None,
            appointment_date,
            next_appointment_date: None,
            cost: None,
            status: IncidentStatus::default(),
            attachments: Vec::new(),
        }
    }

    pub(crate) fn into_incident(self, id: RecordId) -> Incident {
        Incident {
            id,
            patient_id: self.patient_id,
            title: self.title,
            description: self.description,
            comments: self.comments,
            treatment: self.treatment,
            appointment_date: self.appointment_date,
            next_appointment_date: self.next_appointment_date,
            cost: self.cost,
            status: self.status,
            attachments: self.attachments,
        }
    }
}

/// Partial update of an incident.
///
/// `None` leaves a field unchanged; the `Option<Option<_>>` fields can be cleared with
/// `Some(None)` (JSON `null`). `attachments`, when present, replaces the whole list.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct IncidentPatch {
    #[serde(default)]
    pub patient_id: Option<RecordId>,
    #[serde(default)]
    pub title: Option<NonEmptyText>,
    #[serde(default, deserialize_with = "clearable")]
    pub description: Option<Option<String>>,
    #[serde(default, deserialize_with = "clearable")]
    pub comments: Option<Option<String>>,
    #[serde(default, deserialize_with = "clearable")]
    pub treatment: Option<Option<String>>,
    #[serde(default, deserialize_with = "patch_datetime")]
    pub appointment_date: Option<NaiveDateTime>,
    #[serde(default, alias = "nextDate", deserialize_with = "patch_opt_datetime")]
    pub next_appointment_date: Option<Option<NaiveDateTime>>,
    #[serde(default, deserialize_with = "clearable")]
    pub cost: Option<Option<Cost>>,
    #[serde(default)]
    pub status: Option<IncidentStatus>,
    #[serde(default, alias = "files")]
    pub attachments: Option<Vec<Attachment>>,
}

impl IncidentPatch {
    pub fn from_json(input: &str) -> ClinicResult<Self> {
        serde_json::from_str(input).map_err(ClinicError::InvalidPatch)
    }

    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    pub(crate) fn apply_to(self, incident: &mut Incident) {
        if let Some(patient_id) = self.patient_id {
            incident.patient_id = patient_id;
        }
        if let Some(title) = self.title {
            incident.title = title;
        }
        if let Some(description) = self.description {
            incident.description = description;
        }
        if let Some(comments) = self.comments {
            incident.comments = comments;
        }
        if let Some(treatment) = self.treatment {
            incident.treatment = treatment;
        }
        if let Some(appointment_date) = self.appointment_date {
            incident.appointment_date = appointment_date;
        }
        if let Some(next) = self.next_appointment_date {
            incident.next_appointment_date = next;
        }
        if let Some(cost) = self.cost {
            incident.cost = cost;
        }
        if let Some(status) = self.status {
            incident.status = status;
        }
        if let Some(attachments) = self.attachments {
            incident.attachments = attachments;
        }
    }
}
