//! The clinic store: patients, incidents and the integrity rules between them.
//!
//! ## Ownership
//!
//! [`ClinicStore`] exclusively owns both collections and is the only writer of the
//! `patients` and `incidents` slots. It is constructed once by the composition root and
//! handed to consumers by reference; there is no global instance.
//!
//! ## Persistence
//!
//! Every mutation builds the new collection(s) off to the side, writes them through the
//! [`KeyValueStore`], and only then replaces the in-memory state. A failed write
//! therefore leaves the store exactly as it was. A cascading delete writes both slots in
//! a single [`KeyValueStore::set_many`] call. After a failed write the touched slots are
//! rewritten from memory, so a backend that applied part of the write is brought back
//! in step with the store.
//!
//! ## Startup
//!
//! Each slot is loaded verbatim if present. A missing slot is seeded with the demo
//! dataset (or left empty when seeding is disabled) and persisted immediately.

use crate::config::{CoreConfig, ReferencePolicy};
use crate::constants::{ID_ALLOCATION_ATTEMPTS, INCIDENTS_KEY, PATIENTS_KEY};
use crate::incident::{Incident, IncidentPatch, NewIncident};
use crate::kv::KeyValueStore;
use crate::patient::{NewPatient, Patient, PatientPatch};
use crate::queries::ClinicView;
use crate::seed;
use crate::{ClinicError, ClinicResult};
use clinic_uuid::{RecordId, RecordKind};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;

/// What a patient deletion removed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CascadeRemoval {
    /// `None` when no patient had the id.
    pub patient: Option<Patient>,
    /// Incidents that referenced the id, in their original order.
    pub incidents: Vec<Incident>,
}

impl CascadeRemoval {
    pub fn is_empty(&self) -> bool {
        self.patient.is_none() && self.incidents.is_empty()
    }
}

pub struct ClinicStore<K: KeyValueStore> {
    cfg: Arc<CoreConfig>,
    kv: K,
    patients: Vec<Patient>,
    incidents: Vec<Incident>,
}

fn load_slot<T: DeserializeOwned>(
    kv: &impl KeyValueStore,
    key: &str,
) -> ClinicResult<Option<Vec<T>>> {
    let Some(raw) = kv.get(key)? else {
        return Ok(None);
    };
    serde_json::from_str(&raw)
        .map(Some)
        .map_err(|source| ClinicError::Deserialization {
            key: key.to_string(),
            source,
        })
}

fn encode_slot<T: Serialize>(key: &str, records: &[T]) -> ClinicResult<String> {
    serde_json::to_string(records).map_err(|source| ClinicError::Serialization {
        key: key.to_string(),
        source,
    })
}

/// Draws identifiers from `source` until one is not `taken`.
///
/// Gives up with [`ClinicError::DuplicateId`] after [`ID_ALLOCATION_ATTEMPTS`] draws,
/// which with random UUIDs means the source is broken.
pub(crate) fn allocate_unique_id(
    kind: RecordKind,
    taken: impl Fn(&RecordId) -> bool,
    mut source: impl FnMut(RecordKind) -> RecordId,
) -> ClinicResult<RecordId> {
    let mut last = None;
    for _attempt in 0..ID_ALLOCATION_ATTEMPTS {
        let id = source(kind);
        if !taken(&id) {
            return Ok(id);
        }
        tracing::warn!("generated {} id {} already in use; retrying", kind, id);
        last = Some(id);
    }

    Err(ClinicError::DuplicateId {
        kind,
        id: last.map(String::from).unwrap_or_default(),
        attempts: ID_ALLOCATION_ATTEMPTS,
    })
}

impl<K: KeyValueStore> ClinicStore<K> {
    /// Loads both collections from `kv`, seeding any slot that was never written.
    ///
    /// # Errors
    ///
    /// Returns `ClinicError` if a slot cannot be read or parsed, or if persisting a
    /// seeded slot fails.
    pub fn open(cfg: Arc<CoreConfig>, mut kv: K) -> ClinicResult<Self> {
        let stored_patients = load_slot::<Patient>(&kv, PATIENTS_KEY)?;
        let stored_incidents = load_slot::<Incident>(&kv, INCIDENTS_KEY)?;

        let mut seeded = Vec::new();

        let patients = match stored_patients {
            Some(patients) => patients,
            None => {
                let patients = if cfg.seed_demo_data() {
                    seed::demo_patients()?
                } else {
                    Vec::new()
                };
                seeded.push((PATIENTS_KEY, encode_slot(PATIENTS_KEY, &patients)?));
                patients
            }
        };

        let incidents = match stored_incidents {
            Some(incidents) => incidents,
            None => {
                let incidents = if cfg.seed_demo_data() {
                    seed::demo_incidents()?
                } else {
                    Vec::new()
                };
                seeded.push((INCIDENTS_KEY, encode_slot(INCIDENTS_KEY, &incidents)?));
                incidents
            }
        };

        if !seeded.is_empty() {
            kv.set_many(&seeded)?;
            let slots: Vec<_> = seeded.iter().map(|(key, _)| *key).collect();
            tracing::info!("initialised slots {:?}", slots);
        }

        tracing::info!(
            "clinic store opened with {} patients and {} incidents",
            patients.len(),
            incidents.len()
        );

        Ok(Self {
            cfg,
            kv,
            patients,
            incidents,
        })
    }

    pub fn config(&self) -> &CoreConfig {
        &self.cfg
    }

    pub fn patients(&self) -> &[Patient] {
        &self.patients
    }

    pub fn incidents(&self) -> &[Incident] {
        &self.incidents
    }

    pub fn patient(&self, id: &str) -> Option<&Patient> {
        self.patients.iter().find(|p| p.id.as_str() == id)
    }

    pub fn incident(&self, id: &str) -> Option<&Incident> {
        self.incidents.iter().find(|i| i.id.as_str() == id)
    }

    /// Read-only view for derived queries.
    pub fn view(&self) -> ClinicView<'_> {
        ClinicView::new(&self.patients, &self.incidents)
    }

    /// Releases the underlying key-value store.
    pub fn into_storage(self) -> K {
        self.kv
    }

    /// Writes the given collections, then makes them current.
    fn commit(
        &mut self,
        patients: Option<Vec<Patient>>,
        incidents: Option<Vec<Incident>>,
    ) -> ClinicResult<()> {
        let mut entries = Vec::with_capacity(2);
        if let Some(patients) = &patients {
            entries.push((PATIENTS_KEY, encode_slot(PATIENTS_KEY, patients)?));
        }
        if let Some(incidents) = &incidents {
            entries.push((INCIDENTS_KEY, encode_slot(INCIDENTS_KEY, incidents)?));
        }

        if let Err(e) = self.kv.set_many(&entries) {
            self.resync(patients.is_some(), incidents.is_some());
            return Err(e);
        }

        if let Some(patients) = patients {
            self.patients = patients;
        }
        if let Some(incidents) = incidents {
            self.incidents = incidents;
        }
        Ok(())
    }

    /// Rewrites the given slots from the in-memory collections after a failed write,
    /// in case the backend applied part of it.
    fn resync(&mut self, patients: bool, incidents: bool) {
        if let Err(e) = self.write_current(patients, incidents) {
            tracing::error!("failed to restore slots after a failed write: {}", e);
        }
    }

    fn write_current(&mut self, patients: bool, incidents: bool) -> ClinicResult<()> {
        let mut entries = Vec::with_capacity(2);
        if patients {
            entries.push((PATIENTS_KEY, encode_slot(PATIENTS_KEY, &self.patients)?));
        }
        if incidents {
            entries.push((INCIDENTS_KEY, encode_slot(INCIDENTS_KEY, &self.incidents)?));
        }
        self.kv.set_many(&entries)
    }

    fn check_reference(&self, patient_id: &RecordId) -> ClinicResult<()> {
        if self.patient(patient_id.as_str()).is_some() {
            return Ok(());
        }
        match self.cfg.reference_policy() {
            ReferencePolicy::Strict => {
                tracing::warn!("rejected incident for unknown patient {}", patient_id);
                Err(ClinicError::InvalidReference {
                    patient_id: patient_id.to_string(),
                })
            }
            ReferencePolicy::Permissive => {
                tracing::warn!("accepting incident for unknown patient {}", patient_id);
                Ok(())
            }
        }
    }

    /// Registers a patient under a freshly allocated id.
    pub fn add_patient(&mut self, new: NewPatient) -> ClinicResult<Patient> {
        let id = allocate_unique_id(
            RecordKind::Patient,
            |id| self.patient(id.as_str()).is_some(),
            RecordId::allocate,
        )?;
        let patient = new.into_patient(id);

        let mut patients = self.patients.clone();
        patients.push(patient.clone());
        self.commit(Some(patients), None)?;

        tracing::info!("added patient {}", patient.id);
        Ok(patient)
    }

    /// Applies `patch` to the patient with `id` and returns the updated record.
    ///
    /// # Errors
    ///
    /// [`ClinicError::NotFound`] if no patient has `id`; nothing is persisted.
    pub fn update_patient(&mut self, id: &str, patch: PatientPatch) -> ClinicResult<Patient> {
        let index = self
            .patients
            .iter()
            .position(|p| p.id.as_str() == id)
            .ok_or_else(|| ClinicError::NotFound {
                kind: RecordKind::Patient,
                id: id.to_string(),
            })?;

        if patch.is_empty() {
            return Ok(self.patients[index].clone());
        }

        let mut patients = self.patients.clone();
        patch.apply_to(&mut patients[index]);
        let updated = patients[index].clone();
        self.commit(Some(patients), None)?;

        tracing::info!("updated patient {}", id);
        Ok(updated)
    }

    /// Removes the patient with `id` together with every incident referencing it.
    ///
    /// Both slots are written in one step. An unknown id with no referencing incidents
    /// is a no-op and returns an empty [`CascadeRemoval`].
    pub fn delete_patient(&mut self, id: &str) -> ClinicResult<CascadeRemoval> {
        let mut patients = self.patients.clone();
        let patient = patients
            .iter()
            .position(|p| p.id.as_str() == id)
            .map(|index| patients.remove(index));

        let (removed, kept): (Vec<Incident>, Vec<Incident>) = self
            .incidents
            .iter()
            .cloned()
            .partition(|i| i.patient_id.as_str() == id);

        let removal = CascadeRemoval {
            patient,
            incidents: removed,
        };
        if removal.is_empty() {
            tracing::debug!("delete of unknown patient {} ignored", id);
            return Ok(removal);
        }

        let patients_changed = removal.patient.is_some();
        let incidents_changed = !removal.incidents.is_empty();
        self.commit(
            patients_changed.then_some(patients),
            incidents_changed.then_some(kept),
        )?;

        tracing::info!(
            "deleted patient {} and {} incident(s)",
            id,
            removal.incidents.len()
        );
        Ok(removal)
    }

    /// Books an incident under a freshly allocated id.
    ///
    /// # Errors
    ///
    /// [`ClinicError::InvalidReference`] if the patient does not exist and the
    /// configured [`ReferencePolicy`] is `Strict`.
    pub fn add_incident(&mut self, new: NewIncident) -> ClinicResult<Incident> {
        self.check_reference(&new.patient_id)?;

        let id = allocate_unique_id(
            RecordKind::Incident,
            |id| self.incident(id.as_str()).is_some(),
            RecordId::allocate,
        )?;
        let incident = new.into_incident(id);

        let mut incidents = self.incidents.clone();
        incidents.push(incident.clone());
        self.commit(None, Some(incidents))?;

        tracing::info!(
            "added incident {} for patient {}",
            incident.id,
            incident.patient_id
        );
        Ok(incident)
    }

    /// Applies `patch` to the incident with `id` and returns the updated record.
    ///
    /// Re-pointing `patientId` is subject to the same reference policy as creation.
    pub fn update_incident(&mut self, id: &str, patch: IncidentPatch) -> ClinicResult<Incident> {
        let index = self
            .incidents
            .iter()
            .position(|i| i.id.as_str() == id)
            .ok_or_else(|| ClinicError::NotFound {
                kind: RecordKind::Incident,
                id: id.to_string(),
            })?;

        if let Some(patient_id) = &patch.patient_id {
            self.check_reference(patient_id)?;
        }

        if patch.is_empty() {
            return Ok(self.incidents[index].clone());
        }

        let mut incidents = self.incidents.clone();
        patch.apply_to(&mut incidents[index]);
        let updated = incidents[index].clone();
        self.commit(None, Some(incidents))?;

        tracing::info!("updated incident {} (status {})", id, updated.status);
        Ok(updated)
    }

    /// Removes the incident with `id`; `None` if there was none.
    pub fn delete_incident(&mut self, id: &str) -> ClinicResult<Option<Incident>> {
        let Some(index) = self.incidents.iter().position(|i| i.id.as_str() == id) else {
            tracing::debug!("delete of unknown incident {} ignored", id);
            return Ok(None);
        };

        let mut incidents = self.incidents.clone();
        let removed = incidents.remove(index);
        self.commit(None, Some(incidents))?;

        tracing::info!("deleted incident {}", id);
        Ok(Some(removed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::incident::IncidentStatus;
    use crate::kv::{FileKeyValueStore, MemoryKeyValueStore};
    use crate::time::parse_local_datetime;
    use chrono::{Duration, NaiveDate, NaiveDateTime};
    use clinic_files::Attachment;
    use clinic_types::{Cost, NonEmptyText};
    use tempfile::TempDir;

    fn cfg(policy: ReferencePolicy, seed: bool) -> Arc<CoreConfig> {
        Arc::new(CoreConfig::new("clinic_data".into(), policy, seed).unwrap())
    }

    fn empty_store() -> ClinicStore<MemoryKeyValueStore> {
        ClinicStore::open(
            cfg(ReferencePolicy::Strict, false),
            MemoryKeyValueStore::new(),
        )
        .unwrap()
    }

    fn new_patient(name: &str) -> NewPatient {
        NewPatient {
            name: NonEmptyText::new(name).unwrap(),
            date_of_birth: NaiveDate::from_ymd_opt(1990, 5, 10).unwrap(),
            contact: NonEmptyText::new("1234567890").unwrap(),
            health_info: Some("No allergies".into()),
        }
    }

    fn new_incident(patient: &Patient, at: NaiveDateTime) -> NewIncident {
        NewIncident::new(
            patient.id.clone(),
            NonEmptyText::new("Checkup").unwrap(),
            at,
        )
    }

    fn t() -> NaiveDateTime {
        parse_local_datetime("2025-07-22T12:00:00").unwrap()
    }

    /// Key-value store whose writes can be made to fail.
    #[derive(Default)]
    struct FlakyStore {
        inner: MemoryKeyValueStore,
        fail_writes: bool,
        /// Applies only the first entry of the next multi-slot write, then fails it.
        fail_partway_once: bool,
    }

    impl KeyValueStore for FlakyStore {
        fn get(&self, key: &str) -> ClinicResult<Option<String>> {
            self.inner.get(key)
        }

        fn set_many(&mut self, entries: &[(&str, String)]) -> ClinicResult<()> {
            if self.fail_partway_once && entries.len() > 1 {
                self.fail_partway_once = false;
                self.inner.set_many(&entries[..1])?;
                return Err(ClinicError::SlotWrite {
                    key: entries[1].0.to_string(),
                    source: std::io::Error::new(std::io::ErrorKind::Other, "disk full"),
                });
            }
            if self.fail_writes {
                return Err(ClinicError::SlotWrite {
                    key: entries[0].0.to_string(),
                    source: std::io::Error::new(std::io::ErrorKind::Other, "disk full"),
                });
            }
            self.inner.set_many(entries)
        }

        fn remove(&mut self, key: &str) -> ClinicResult<()> {
            self.inner.remove(key)
        }
    }

    #[test]
    fn test_open_seeds_demo_data_and_persists_it() {
        let store = ClinicStore::open(
            cfg(ReferencePolicy::Strict, true),
            MemoryKeyValueStore::new(),
        )
        .unwrap();

        assert_eq!(store.patients().len(), 3);
        assert_eq!(store.incidents().len(), 4);

        let kv = store.into_storage();
        assert!(kv.get(PATIENTS_KEY).unwrap().is_some());
        assert!(kv.get(INCIDENTS_KEY).unwrap().is_some());
    }

    #[test]
    fn test_open_without_seeding_starts_empty() {
        let store = empty_store();

        assert!(store.patients().is_empty());
        assert!(store.incidents().is_empty());
        assert_eq!(
            store.into_storage().get(PATIENTS_KEY).unwrap().as_deref(),
            Some("[]")
        );
    }

    #[test]
    fn test_open_loads_existing_slots_verbatim() {
        let mut kv = MemoryKeyValueStore::new();
        kv.set(
            PATIENTS_KEY,
            r#"[{"id":"p7","name":"Solo","dob":"2000-01-01","contact":"x"}]"#.into(),
        )
        .unwrap();
        kv.set(INCIDENTS_KEY, "[]".into()).unwrap();

        let store = ClinicStore::open(cfg(ReferencePolicy::Strict, true), kv).unwrap();

        assert_eq!(store.patients().len(), 1);
        assert_eq!(store.patients()[0].id, "p7");
        assert!(store.incidents().is_empty());
    }

    #[test]
    fn test_open_seeds_only_missing_slot() {
        let mut kv = MemoryKeyValueStore::new();
        kv.set(PATIENTS_KEY, "[]".into()).unwrap();

        let store = ClinicStore::open(cfg(ReferencePolicy::Permissive, true), kv).unwrap();

        assert!(store.patients().is_empty());
        assert_eq!(store.incidents().len(), 4);
    }

    #[test]
    fn test_open_reports_corrupt_slot() {
        let mut kv = MemoryKeyValueStore::new();
        kv.set(INCIDENTS_KEY, "{not json".into()).unwrap();

        let result = ClinicStore::open(cfg(ReferencePolicy::Strict, true), kv);

        match result {
            Err(ClinicError::Deserialization { key, .. }) => assert_eq!(key, INCIDENTS_KEY),
            Err(e) => panic!("unexpected error: {e}"),
            Ok(_) => panic!("expected a deserialization error"),
        }
    }

    #[test]
    fn test_add_patient_then_lookup() {
        let mut store = empty_store();
        let added = store.add_patient(new_patient("John Doe")).unwrap();

        let found = store.patient(added.id.as_str()).unwrap();
        assert_eq!(found, &added);
        assert_eq!(found.name.as_str(), "John Doe");
        assert_eq!(found.contact.as_str(), "1234567890");
        assert_eq!(found.health_info.as_deref(), Some("No allergies"));
        assert!(found.id.as_str().starts_with('p'));
    }

    #[test]
    fn test_add_patient_ids_are_unique() {
        let mut store = empty_store();
        let a = store.add_patient(new_patient("A")).unwrap();
        let b = store.add_patient(new_patient("B")).unwrap();

        assert_ne!(a.id, b.id);
        assert_eq!(store.patients().len(), 2);
    }

    #[test]
    fn test_update_patient_changes_exactly_one_field() {
        let mut store = empty_store();
        let john = store.add_patient(new_patient("John Doe")).unwrap();
        let jane = store.add_patient(new_patient("Jane Smith")).unwrap();

        let patch = PatientPatch {
            contact: Some(NonEmptyText::new("555-0100").unwrap()),
            ..Default::default()
        };
        let updated = store.update_patient(john.id.as_str(), patch).unwrap();

        let mut expected = john.clone();
        expected.contact = NonEmptyText::new("555-0100").unwrap();
        assert_eq!(updated, expected);
        assert_eq!(store.patient(john.id.as_str()), Some(&expected));
        assert_eq!(store.patient(jane.id.as_str()), Some(&jane));
    }

    #[test]
    fn test_update_unknown_patient_is_not_found() {
        let mut store = empty_store();
        let result = store.update_patient("p404", PatientPatch::default());

        assert!(matches!(
            result,
            Err(ClinicError::NotFound {
                kind: RecordKind::Patient,
                ..
            })
        ));
    }

    #[test]
    fn test_delete_patient_cascades_exactly() {
        let mut store = empty_store();
        let john = store.add_patient(new_patient("John")).unwrap();
        let jane = store.add_patient(new_patient("Jane")).unwrap();
        store.add_incident(new_incident(&john, t())).unwrap();
        let janes = store.add_incident(new_incident(&jane, t())).unwrap();
        store.add_incident(new_incident(&john, t())).unwrap();

        let removal = store.delete_patient(john.id.as_str()).unwrap();

        assert_eq!(removal.patient.as_ref(), Some(&john));
        assert_eq!(removal.incidents.len(), 2);
        assert_eq!(store.patients(), &[jane.clone()][..]);
        assert_eq!(store.incidents(), &[janes][..]);
    }

    #[test]
    fn test_delete_patient_twice_is_noop() {
        let mut store = empty_store();
        let john = store.add_patient(new_patient("John")).unwrap();

        assert!(!store.delete_patient(john.id.as_str()).unwrap().is_empty());
        let second = store.delete_patient(john.id.as_str()).unwrap();
        assert!(second.is_empty());
    }

    #[test]
    fn test_delete_seeded_patient_scenario() {
        let mut kv = MemoryKeyValueStore::new();
        kv.set(
            PATIENTS_KEY,
            r#"[{"id":"p1","name":"John Doe","dateOfBirth":"1990-05-10","contact":"1234567890"}]"#
                .into(),
        )
        .unwrap();
        let tomorrow = crate::time::format_local_datetime(&(t() + Duration::days(1)));
        kv.set(
            INCIDENTS_KEY,
            format!(
                r#"[{{"id":"i1","patientId":"p1","title":"Checkup","status":"Scheduled","appointmentDate":"{tomorrow}"}}]"#
            ),
        )
        .unwrap();
        let mut store = ClinicStore::open(cfg(ReferencePolicy::Strict, true), kv).unwrap();

        store.delete_patient("p1").unwrap();

        assert!(store.patients().is_empty());
        assert!(store.incidents().is_empty());

        let kv = store.into_storage();
        assert_eq!(kv.get(PATIENTS_KEY).unwrap().as_deref(), Some("[]"));
        assert_eq!(kv.get(INCIDENTS_KEY).unwrap().as_deref(), Some("[]"));
    }

    #[test]
    fn test_no_incident_survives_its_patient_across_mixed_operations() {
        let mut store = ClinicStore::open(
            cfg(ReferencePolicy::Permissive, true),
            MemoryKeyValueStore::new(),
        )
        .unwrap();
        let extra = store.add_patient(new_patient("Extra")).unwrap();
        for n in 0..6 {
            let owner = store.patients()[n % store.patients().len()].clone();
            let added = store
                .add_incident(new_incident(&owner, t() + Duration::days(n as i64)))
                .unwrap();
            if n % 2 == 0 {
                let patch = IncidentPatch {
                    status: Some(IncidentStatus::Completed),
                    ..Default::default()
                };
                store.update_incident(added.id.as_str(), patch).unwrap();
            }
        }
        // Dangling reference accepted under the permissive policy.
        let ghost = RecordId::parse("p-ghost").unwrap();
        store
            .add_incident(NewIncident::new(
                ghost.clone(),
                NonEmptyText::new("Walk-in").unwrap(),
                t(),
            ))
            .unwrap();

        let ids: Vec<String> = ["p1", "p3", extra.id.as_str(), ghost.as_str()]
            .iter()
            .map(|s| s.to_string())
            .collect();
        for id in &ids {
            store.delete_patient(id).unwrap();
            assert!(store
                .incidents()
                .iter()
                .all(|i| i.patient_id.as_str() != id.as_str()));
            assert!(store.patient(id).is_none());
        }
        assert_eq!(store.patients().len(), 1);
        assert!(store.incidents().iter().all(|i| i.patient_id == "p2"));
    }

    #[test]
    fn test_strict_policy_rejects_dangling_reference() {
        let mut store = empty_store();
        let new = NewIncident::new(
            RecordId::parse("p404").unwrap(),
            NonEmptyText::new("Checkup").unwrap(),
            t(),
        );

        let result = store.add_incident(new);

        assert!(matches!(result, Err(ClinicError::InvalidReference { .. })));
        assert!(store.incidents().is_empty());
    }

    #[test]
    fn test_strict_policy_rejects_repointing_to_unknown_patient() {
        let mut store = empty_store();
        let john = store.add_patient(new_patient("John")).unwrap();
        let incident = store.add_incident(new_incident(&john, t())).unwrap();

        let patch = IncidentPatch {
            patient_id: Some(RecordId::parse("p404").unwrap()),
            ..Default::default()
        };
        let result = store.update_incident(incident.id.as_str(), patch);

        assert!(matches!(result, Err(ClinicError::InvalidReference { .. })));
        assert_eq!(store.incident(incident.id.as_str()), Some(&incident));
    }

    #[test]
    fn test_update_incident_merges_patch() {
        let mut store = empty_store();
        let john = store.add_patient(new_patient("John")).unwrap();
        let mut new = new_incident(&john, t());
        new.attachments = vec![Attachment::from_bytes("a.txt", b"a")];
        let incident = store.add_incident(new).unwrap();

        let patch = IncidentPatch::from_json(
            r#"{"status":"Completed","cost":120,"treatment":"Filling"}"#,
        )
        .unwrap();
        let updated = store.update_incident(incident.id.as_str(), patch).unwrap();

        assert_eq!(updated.status, IncidentStatus::Completed);
        assert_eq!(updated.cost, Some(Cost::new(120.0).unwrap()));
        assert_eq!(updated.treatment.as_deref(), Some("Filling"));
        assert_eq!(updated.title, incident.title);
        assert_eq!(updated.attachments, incident.attachments);
        assert_eq!(store.view().total_spent(john.id.as_str()).value(), 120.0);
    }

    #[test]
    fn test_update_unknown_incident_is_not_found() {
        let mut store = empty_store();
        let result = store.update_incident("i404", IncidentPatch::default());

        assert!(matches!(
            result,
            Err(ClinicError::NotFound {
                kind: RecordKind::Incident,
                ..
            })
        ));
    }

    #[test]
    fn test_delete_incident() {
        let mut store = empty_store();
        let john = store.add_patient(new_patient("John")).unwrap();
        let a = store.add_incident(new_incident(&john, t())).unwrap();
        let b = store.add_incident(new_incident(&john, t())).unwrap();

        assert_eq!(store.delete_incident(a.id.as_str()).unwrap(), Some(a.clone()));
        assert_eq!(store.delete_incident(a.id.as_str()).unwrap(), None);
        assert_eq!(store.incidents(), &[b][..]);
        assert_eq!(store.patients().len(), 1);
    }

    #[test]
    fn test_failed_write_leaves_state_unchanged() {
        let mut store =
            ClinicStore::open(cfg(ReferencePolicy::Strict, true), FlakyStore::default()).unwrap();
        let patients_before = store.patients().to_vec();
        let incidents_before = store.incidents().to_vec();

        store.kv.fail_writes = true;

        assert!(store.add_patient(new_patient("Nope")).is_err());
        assert!(store.delete_patient("p1").is_err());
        assert!(store.delete_incident("i2").is_err());
        let patch = PatientPatch {
            name: Some(NonEmptyText::new("Renamed").unwrap()),
            ..Default::default()
        };
        assert!(matches!(
            store.update_patient("p1", patch),
            Err(ClinicError::SlotWrite { .. })
        ));

        assert_eq!(store.patients(), &patients_before[..]);
        assert_eq!(store.incidents(), &incidents_before[..]);
    }

    #[test]
    fn test_partially_applied_cascade_is_rewritten_from_memory() {
        let config = cfg(ReferencePolicy::Strict, true);
        let mut store = ClinicStore::open(config.clone(), FlakyStore::default()).unwrap();
        let patients_before = store.patients().to_vec();
        let incidents_before = store.incidents().to_vec();

        store.kv.fail_partway_once = true;
        assert!(matches!(
            store.delete_patient("p1"),
            Err(ClinicError::SlotWrite { .. })
        ));
        assert_eq!(store.patients(), &patients_before[..]);

        let reloaded = ClinicStore::open(config, store.into_storage()).unwrap();
        assert_eq!(reloaded.patients(), &patients_before[..]);
        assert_eq!(reloaded.incidents(), &incidents_before[..]);
        for incident in reloaded.incidents() {
            assert!(reloaded.patient(incident.patient_id.as_str()).is_some());
        }
    }

    #[test]
    fn test_failed_file_cascade_leaves_disk_and_memory_in_step() {
        let dir = TempDir::new().unwrap();
        let config = cfg(ReferencePolicy::Strict, true);
        let mut store =
            ClinicStore::open(config.clone(), FileKeyValueStore::new(dir.path())).unwrap();
        let incidents_slot = dir.path().join("incidents.json");
        std::fs::remove_file(&incidents_slot).unwrap();
        std::fs::create_dir(&incidents_slot).unwrap();

        assert!(store.delete_patient("p1").is_err());
        assert!(store.patient("p1").is_some());

        std::fs::remove_dir(&incidents_slot).unwrap();
        let p2 = store.patient("p2").unwrap().clone();
        store.add_incident(new_incident(&p2, t())).unwrap();
        drop(store);

        let reloaded = ClinicStore::open(config, FileKeyValueStore::new(dir.path())).unwrap();
        assert!(reloaded.patient("p1").is_some());
        for incident in reloaded.incidents() {
            assert!(reloaded.patient(incident.patient_id.as_str()).is_some());
        }
    }

    #[test]
    fn test_reload_round_trip_preserves_order() {
        let dir = TempDir::new().unwrap();
        let config = cfg(ReferencePolicy::Strict, true);

        let mut store =
            ClinicStore::open(config.clone(), FileKeyValueStore::new(dir.path())).unwrap();
        let added = store.add_patient(new_patient("Zed")).unwrap();
        let mut new = new_incident(&added, t());
        new.next_appointment_date = Some(t() + Duration::days(30));
        new.cost = Some(Cost::new(42.5).unwrap());
        new.attachments = vec![
            Attachment::from_bytes("one.txt", b"1"),
            Attachment::from_bytes("two.txt", b"2"),
        ];
        store.add_incident(new).unwrap();
        let patients = store.patients().to_vec();
        let incidents = store.incidents().to_vec();
        drop(store);

        let reloaded = ClinicStore::open(config, FileKeyValueStore::new(dir.path())).unwrap();

        assert_eq!(reloaded.patients(), &patients[..]);
        assert_eq!(reloaded.incidents(), &incidents[..]);
    }

    #[test]
    fn test_allocate_unique_id_retries_then_fails() {
        let fixed = RecordId::parse("p1").unwrap();
        let result = allocate_unique_id(
            RecordKind::Patient,
            |id| id == &fixed,
            |_| RecordId::parse("p1").unwrap(),
        );
        assert!(matches!(
            result,
            Err(ClinicError::DuplicateId {
                attempts: ID_ALLOCATION_ATTEMPTS,
                ..
            })
        ));

        let mut draws = vec!["p2", "p1"];
        let result = allocate_unique_id(
            RecordKind::Patient,
            |id| id == &fixed,
            |_| RecordId::parse(draws.pop().unwrap()).unwrap(),
        );
        assert_eq!(result.unwrap(), "p2");
    }
}
