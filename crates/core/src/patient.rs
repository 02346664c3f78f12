//! Patient records.
//!
//! A [`Patient`] is created from a [`NewPatient`] by the store, which assigns its id,
//! and later modified only through a [`PatientPatch`].

use crate::{ClinicError, ClinicResult};
use chrono::NaiveDate;
use clinic_types::NonEmptyText;
use clinic_uuid::RecordId;
use serde::{Deserialize, Deserializer, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Patient {
    pub id: RecordId,
    pub name: NonEmptyText,
    #[serde(alias = "dob")]
    pub date_of_birth: NaiveDate,
    /// Phone number or email address.
    pub contact: NonEmptyText,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub health_info: Option<String>,
}

/// Fields supplied by the caller when registering a patient.
#[derive(Debug, Clone, PartialEq)]
pub struct NewPatient {
    pub name: NonEmptyText,
    pub date_of_birth: NaiveDate,
    pub contact: NonEmptyText,
    pub health_info: Option<String>,
}

impl NewPatient {
    pub(crate) fn into_patient(self, id: RecordId) -> Patient {
        Patient {
            id,
            name: self.name,
            date_of_birth: self.date_of_birth,
            contact: self.contact,
            health_info: self.health_info,
        }
    }
}

/// Partial update of a patient.
///
/// `None` leaves a field unchanged. `health_info` is clearable: `Some(None)` removes it.
/// The id is not patchable.
///
/// Parsed from JSON with [`PatientPatch::from_json`], which rejects unknown fields:
///
/// ```text
/// {"contact": "555-0100", "healthInfo": null}
/// ```
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PatientPatch {
    #[serde(default)]
    pub name: Option<NonEmptyText>,
    #[serde(default, alias = "dob")]
    pub date_of_birth: Option<NaiveDate>,
    #[serde(default)]
    pub contact: Option<NonEmptyText>,
    #[serde(default, deserialize_with = "clearable")]
    pub health_info: Option<Option<String>>,
}

/// Present field (including `null`) becomes `Some(..)`; absent stays `None` via default.
pub(crate) fn clearable<'de, T, D>(d: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(d).map(Some)
}

impl PatientPatch {
    pub fn from_json(input: &str) -> ClinicResult<Self> {
        serde_json::from_str(input).map_err(ClinicError::InvalidPatch)
    }

    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    pub(crate) fn apply_to(self, patient: &mut Patient) {
        if let Some(name) = self.name {
            patient.name = name;
        }
        if let Some(date_of_birth) = self.date_of_birth {
            patient.date_of_birth = date_of_birth;
        }
        if let Some(contact) = self.contact {
            patient.contact = contact;
        }
        if let Some(health_info) = self.health_info {
            patient.health_info = health_info;
        }
    }
}
