//! Derived, read-only views over the store's collections.
//!
//! Every query here is pure: it borrows the current snapshot and never mutates it.
//! Time-dependent queries take `now` explicitly so callers decide which clock (and which
//! local zone) applies.
//!
//! Ordering rules:
//! - upcoming lists are ascending by appointment date
//! - history lists are descending by appointment date
//! - day lists are ascending by appointment time
//! - patient rankings are descending by appointment count
//!
//! All sorts are stable, so ties keep insertion order.

use crate::constants::{DASHBOARD_TOP_PATIENTS_LIMIT, DASHBOARD_UPCOMING_LIMIT};
use crate::incident::{Incident, IncidentStatus};
use crate::patient::Patient;
use chrono::{NaiveDate, NaiveDateTime};
use clinic_types::Cost;

/// Which incidents count for a calendar day.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DayFilter {
    ScheduledOnly,
    AnyStatus,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PatientSummary {
    pub total_appointments: usize,
    pub completed_appointments: usize,
    pub total_spent: Cost,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PatientRanking<'a> {
    pub patient: &'a Patient,
    pub appointment_count: usize,
    pub total_spent: Cost,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ClinicSummary {
    pub total_patients: usize,
    pub upcoming_appointments: usize,
    /// Incidents still `Scheduled`, whether or not their date has passed.
    pub pending_treatments: usize,
    pub completed_treatments: usize,
    pub total_revenue: Cost,
}

#[derive(Clone, Debug, PartialEq)]
pub struct AdminDashboard<'a> {
    pub summary: ClinicSummary,
    pub upcoming: Vec<&'a Incident>,
    pub top_patients: Vec<PatientRanking<'a>>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct PatientDashboard<'a> {
    pub patient: &'a Patient,
    pub upcoming: Vec<&'a Incident>,
    pub history: Vec<&'a Incident>,
    /// Sum of costs over `history`.
    pub total_spent: Cost,
}

/// Borrowed snapshot of both collections.
#[derive(Clone, Copy, Debug)]
pub struct ClinicView<'a> {
    patients: &'a [Patient],
    incidents: &'a [Incident],
}

fn is_upcoming(incident: &Incident, now: NaiveDateTime) -> bool {
    incident.status == IncidentStatus::Scheduled && incident.appointment_date > now
}

fn sort_ascending(incidents: &mut [&Incident]) {
    incidents.sort_by(|a, b| a.appointment_date.cmp(&b.appointment_date));
}

fn sort_descending(incidents: &mut [&Incident]) {
    incidents.sort_by(|a, b| b.appointment_date.cmp(&a.appointment_date));
}

fn billable_total<'i>(incidents: impl IntoIterator<Item = &'i Incident>) -> Cost {
    incidents
        .into_iter()
        .filter_map(Incident::billable_cost)
        .sum()
}

impl<'a> ClinicView<'a> {
    pub fn new(patients: &'a [Patient], incidents: &'a [Incident]) -> Self {
        Self {
            patients,
            incidents,
        }
    }

    pub fn patients(&self) -> &'a [Patient] {
        self.patients
    }

    pub fn incidents(&self) -> &'a [Incident] {
        self.incidents
    }

    pub fn patient(&self, id: &str) -> Option<&'a Patient> {
        self.patients.iter().find(|p| p.id.as_str() == id)
    }

    pub fn incident(&self, id: &str) -> Option<&'a Incident> {
        self.incidents.iter().find(|i| i.id.as_str() == id)
    }

    /// Incidents owned by `patient_id`, in insertion order.
    pub fn incidents_for(&self, patient_id: &str) -> Vec<&'a Incident> {
        self.incidents
            .iter()
            .filter(|i| i.patient_id.as_str() == patient_id)
            .collect()
    }

    pub fn appointment_count(&self, patient_id: &str) -> usize {
        self.incidents
            .iter()
            .filter(|i| i.patient_id.as_str() == patient_id)
            .count()
    }

    /// Sum of cost over the patient's completed, priced incidents; zero if none.
    pub fn total_spent(&self, patient_id: &str) -> Cost {
        billable_total(
            self.incidents
                .iter()
                .filter(|i| i.patient_id.as_str() == patient_id),
        )
    }

    pub fn patient_summary(&self, patient_id: &str) -> PatientSummary {
        let owned = self.incidents_for(patient_id);
        PatientSummary {
            total_appointments: owned.len(),
            completed_appointments: owned
                .iter()
                .filter(|i| i.status == IncidentStatus::Completed)
                .count(),
            total_spent: billable_total(owned.iter().copied()),
        }
    }

    /// Scheduled incidents strictly after `now`, soonest first.
    pub fn upcoming(&self, now: NaiveDateTime) -> Vec<&'a Incident> {
        let mut upcoming: Vec<_> = self
            .incidents
            .iter()
            .filter(|i| is_upcoming(i, now))
            .collect();
        sort_ascending(&mut upcoming);
        upcoming
    }

    pub fn upcoming_for(&self, patient_id: &str, now: NaiveDateTime) -> Vec<&'a Incident> {
        let mut upcoming: Vec<_> = self
            .incidents
            .iter()
            .filter(|i| i.patient_id.as_str() == patient_id && is_upcoming(i, now))
            .collect();
        sort_ascending(&mut upcoming);
        upcoming
    }

    /// Completed incidents, most recent first.
    pub fn history(&self) -> Vec<&'a Incident> {
        let mut history: Vec<_> = self
            .incidents
            .iter()
            .filter(|i| i.status == IncidentStatus::Completed)
            .collect();
        sort_descending(&mut history);
        history
    }

    pub fn history_for(&self, patient_id: &str) -> Vec<&'a Incident> {
        let mut history: Vec<_> = self
            .incidents
            .iter()
            .filter(|i| {
                i.patient_id.as_str() == patient_id && i.status == IncidentStatus::Completed
            })
            .collect();
        sort_descending(&mut history);
        history
    }

    /// Incidents whose appointment falls on `day` (local calendar day).
    pub fn on_day(&self, day: NaiveDate, filter: DayFilter) -> Vec<&'a Incident> {
        let mut matches: Vec<_> = self
            .incidents
            .iter()
            .filter(|i| i.appointment_date.date() == day)
            .filter(|i| match filter {
                DayFilter::ScheduledOnly => i.status == IncidentStatus::Scheduled,
                DayFilter::AnyStatus => true,
            })
            .collect();
        sort_ascending(&mut matches);
        matches
    }

    /// Patients by descending appointment count.
    pub fn top_patients(&self, limit: usize) -> Vec<PatientRanking<'a>> {
        let mut ranking: Vec<_> = self
            .patients
            .iter()
            .map(|patient| PatientRanking {
                patient,
                appointment_count: self.appointment_count(patient.id.as_str()),
                total_spent: self.total_spent(patient.id.as_str()),
            })
            .collect();
        ranking.sort_by(|a, b| b.appointment_count.cmp(&a.appointment_count));
        ranking.truncate(limit);
        ranking
    }

    pub fn clinic_summary(&self, now: NaiveDateTime) -> ClinicSummary {
        let count = |status| self.incidents.iter().filter(|i| i.status == status).count();

        ClinicSummary {
            total_patients: self.patients.len(),
            upcoming_appointments: self.incidents.iter().filter(|i| is_upcoming(i, now)).count(),
            pending_treatments: count(IncidentStatus::Scheduled),
            completed_treatments: count(IncidentStatus::Completed),
            total_revenue: billable_total(self.incidents),
        }
    }

    pub fn admin_dashboard(&self, now: NaiveDateTime) -> AdminDashboard<'a> {
        let mut upcoming = self.upcoming(now);
        upcoming.truncate(DASHBOARD_UPCOMING_LIMIT);

        AdminDashboard {
            summary: self.clinic_summary(now),
            upcoming,
            top_patients: self.top_patients(DASHBOARD_TOP_PATIENTS_LIMIT),
        }
    }

    /// `None` if the patient does not exist.
    pub fn patient_dashboard(
        &self,
        patient_id: &str,
        now: NaiveDateTime,
    ) -> Option<PatientDashboard<'a>> {
        let patient = self.patient(patient_id)?;
        let history = self.history_for(patient_id);
        let total_spent = history.iter().filter_map(|i| i.cost).sum();

        Some(PatientDashboard {
            patient,
            upcoming: self.upcoming_for(patient_id, now),
            history,
            total_spent,
        })
    }

    /// Patients whose name contains `term` (case-insensitive) or whose contact contains
    /// it verbatim. An empty term matches everyone.
    pub fn search_patients(&self, term: &str) -> Vec<&'a Patient> {
        let needle = term.trim().to_lowercase();
        self.patients
            .iter()
            .filter(|p| {
                p.name.as_str().to_lowercase().contains(&needle)
                    || p.contact.as_str().contains(term.trim())
            })
            .collect()
    }

    /// Incidents whose title or owning patient's name contains `term`
    /// (case-insensitive), optionally restricted to one status.
    pub fn search_incidents(
        &self,
        term: &str,
        status: Option<IncidentStatus>,
    ) -> Vec<&'a Incident> {
        let needle = term.trim().to_lowercase();
        self.incidents
            .iter()
            .filter(|i| status.map_or(true, |s| i.status == s))
            .filter(|i| {
                let patient_matches = self
                    .patient(i.patient_id.as_str())
                    .is_some_and(|p| p.name.as_str().to_lowercase().contains(&needle));
                patient_matches || i.title.as_str().to_lowercase().contains(&needle)
            })
            .collect()
    }
}
