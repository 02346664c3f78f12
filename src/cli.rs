use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use chrono::{NaiveDate, NaiveDateTime};
use clap::{Args, Parser, Subcommand};

use clinic_core::time::{format_local_datetime, parse_local_datetime};
use clinic_core::{
    Attachment, ClinicStore, Cost, DayFilter, Incident, IncidentPatch, IncidentStatus,
    KeyValueStore, NewIncident, NewPatient, NonEmptyText, Patient, PatientPatch, RecordId,
    Session, SessionService,
};

#[derive(Parser)]
#[command(name = "clinic")]
#[command(about = "Dental clinic patient and incident records")]
pub struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in with a demo account
    Login { email: String, password: String },
    /// Sign out
    Logout,
    /// Show the signed-in account
    Whoami,
    /// Admin overview, or the patient's own dashboard
    Dashboard,
    /// Manage patients
    #[command(subcommand)]
    Patients(PatientCommands),
    /// Manage incidents
    #[command(subcommand)]
    Incidents(IncidentCommands),
    /// Scheduled appointments still ahead, soonest first
    ///
    /// Patients may use this with their own id as `--patient`.
    Upcoming {
        #[arg(long)]
        patient: Option<String>,
    },
    /// Completed incidents, most recent first
    ///
    /// Patients may use this with their own id as `--patient`.
    History {
        #[arg(long)]
        patient: Option<String>,
    },
    /// Appointments on one day (YYYY-MM-DD)
    Day {
        date: NaiveDate,
        /// Include completed and cancelled incidents
        #[arg(long)]
        all: bool,
    },
    /// Patients ranked by number of appointments
    Top {
        #[arg(long, default_value_t = 5)]
        limit: usize,
    },
}

#[derive(Subcommand)]
enum PatientCommands {
    /// List patients, optionally filtered by name or contact
    List {
        #[arg(long)]
        search: Option<String>,
    },
    /// Print one patient as JSON
    Show { id: String },
    /// Register a patient
    Add {
        name: NonEmptyText,
        /// Date of birth (YYYY-MM-DD)
        #[arg(long)]
        dob: NaiveDate,
        /// Phone number or email address
        #[arg(long)]
        contact: NonEmptyText,
        #[arg(long)]
        health_info: Option<String>,
    },
    /// Change fields of a patient
    Update {
        id: String,
        #[arg(long)]
        name: Option<NonEmptyText>,
        #[arg(long)]
        dob: Option<NaiveDate>,
        #[arg(long)]
        contact: Option<NonEmptyText>,
        #[arg(long, conflicts_with = "clear_health_info")]
        health_info: Option<String>,
        #[arg(long)]
        clear_health_info: bool,
        /// JSON patch, e.g. '{"contact":"555-0100"}'; flags win over patch fields
        #[arg(long)]
        patch: Option<String>,
    },
    /// Delete a patient and every incident that references them
    Delete {
        id: String,
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Args)]
struct IncidentFields {
    #[arg(long)]
    description: Option<String>,
    #[arg(long)]
    comments: Option<String>,
    #[arg(long)]
    treatment: Option<String>,
    /// Follow-up appointment (YYYY-MM-DDTHH:MM)
    #[arg(long, value_parser = parse_local_datetime)]
    next_date: Option<NaiveDateTime>,
    #[arg(long)]
    cost: Option<Cost>,
    #[arg(long)]
    status: Option<IncidentStatus>,
    /// File to attach; repeatable
    #[arg(long = "attach")]
    attachments: Vec<PathBuf>,
}

#[derive(Subcommand)]
enum IncidentCommands {
    /// List incidents
    List {
        #[arg(long)]
        patient: Option<String>,
        #[arg(long)]
        status: Option<IncidentStatus>,
        /// Match against title or patient name
        #[arg(long)]
        search: Option<String>,
    },
    /// Print one incident as JSON
    Show { id: String },
    /// Book an incident
    Add {
        patient_id: RecordId,
        title: NonEmptyText,
        /// Appointment (YYYY-MM-DDTHH:MM)
        #[arg(long, value_parser = parse_local_datetime)]
        date: NaiveDateTime,
        #[command(flatten)]
        fields: IncidentFields,
    },
    /// Change fields of an incident
    Update {
        id: String,
        #[arg(long)]
        patient_id: Option<RecordId>,
        #[arg(long)]
        title: Option<NonEmptyText>,
        #[arg(long, value_parser = parse_local_datetime)]
        date: Option<NaiveDateTime>,
        #[command(flatten)]
        fields: IncidentFields,
        #[arg(long, conflicts_with = "next_date")]
        clear_next_date: bool,
        #[arg(long, conflicts_with = "cost")]
        clear_cost: bool,
        /// JSON patch; `attachments` replaces the list, `--attach` appends to it
        #[arg(long)]
        patch: Option<String>,
    },
    /// Delete one incident
    Delete {
        id: String,
        #[arg(long)]
        yes: bool,
    },
    /// List an incident's attachments, optionally saving them to a directory
    Attachments {
        id: String,
        #[arg(long)]
        save_to: Option<PathBuf>,
    },
}

/// Everything a command needs, built once in `main`.
pub struct App<K: KeyValueStore> {
    pub store: ClinicStore<K>,
    pub sessions: SessionService<K>,
}

impl<K: KeyValueStore> App<K> {
    fn session(&self) -> anyhow::Result<&Session> {
        Ok(self.sessions.require()?)
    }

    fn admin(&self) -> anyhow::Result<()> {
        self.session()?.require_admin()?;
        Ok(())
    }

    /// Admins see any patient's lists; a patient session only its own.
    fn viewer_of(&self, patient: Option<&str>) -> anyhow::Result<()> {
        let session = self.session()?;
        match patient {
            Some(id) if session.can_view_patient(id) => Ok(()),
            _ => Ok(session.require_admin()?),
        }
    }
}

fn write_patient(out: &mut dyn Write, p: &Patient) -> anyhow::Result<()> {
    writeln!(
        out,
        "{}  {}  born {}  {}",
        p.id, p.name, p.date_of_birth, p.contact
    )?;
    Ok(())
}

fn write_incident(out: &mut dyn Write, i: &Incident) -> anyhow::Result<()> {
    let cost = i.cost.map(|c| format!("  {c}")).unwrap_or_default();
    writeln!(
        out,
        "{}  {}  {:<9}  {}  {}{}",
        i.id,
        format_local_datetime(&i.appointment_date),
        i.status,
        i.patient_id,
        i.title,
        cost
    )?;
    Ok(())
}

fn write_incidents<'a>(
    out: &mut dyn Write,
    incidents: impl IntoIterator<Item = &'a Incident>,
) -> anyhow::Result<()> {
    let mut any = false;
    for incident in incidents {
        write_incident(out, incident)?;
        any = true;
    }
    if !any {
        writeln!(out, "No incidents found.")?;
    }
    Ok(())
}

fn load_attachments(paths: &[PathBuf]) -> anyhow::Result<Vec<Attachment>> {
    paths
        .iter()
        .map(|path| {
            Attachment::from_path(path)
                .with_context(|| format!("failed to attach {}", path.display()))
        })
        .collect()
}

/// Writes decoded attachment payloads into `dir`, keeping only the file-name part of
/// each attachment name.
fn save_attachments(
    out: &mut dyn Write,
    dir: &Path,
    attachments: &[Attachment],
) -> anyhow::Result<()> {
    fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;
    for attachment in attachments {
        let Some(file_name) = Path::new(&attachment.name).file_name() else {
            bail!("attachment name '{}' is not a file name", attachment.name);
        };
        let target = dir.join(file_name);
        fs::write(&target, attachment.decode()?)
            .with_context(|| format!("failed to write {}", target.display()))?;
        writeln!(out, "saved {}", target.display())?;
    }
    Ok(())
}

fn build_patient_patch(
    patch: Option<String>,
    name: Option<NonEmptyText>,
    dob: Option<NaiveDate>,
    contact: Option<NonEmptyText>,
    health_info: Option<String>,
    clear_health_info: bool,
) -> anyhow::Result<PatientPatch> {
    let mut built = match patch {
        Some(raw) => PatientPatch::from_json(&raw)?,
        None => PatientPatch::default(),
    };
    if name.is_some() {
        built.name = name;
    }
    if dob.is_some() {
        built.date_of_birth = dob;
    }
    if contact.is_some() {
        built.contact = contact;
    }
    if let Some(info) = health_info {
        built.health_info = Some(Some(info));
    } else if clear_health_info {
        built.health_info = Some(None);
    }
    Ok(built)
}

fn run_patients<K: KeyValueStore>(
    command: PatientCommands,
    app: &mut App<K>,
    out: &mut dyn Write,
) -> anyhow::Result<()> {
    match command {
        PatientCommands::List { search } => {
            let view = app.store.view();
            let patients: Vec<&Patient> = match search {
                Some(term) => view.search_patients(&term),
                None => view.patients().iter().collect(),
            };
            if patients.is_empty() {
                writeln!(out, "No patients found.")?;
            }
            for patient in patients {
                write_patient(out, patient)?;
            }
        }
        PatientCommands::Show { id } => {
            let Some(patient) = app.store.patient(&id) else {
                bail!("patient not found: {id}");
            };
            let summary = app.store.view().patient_summary(&id);
            writeln!(out, "{}", serde_json::to_string_pretty(patient)?)?;
            writeln!(
                out,
                "appointments: {} ({} completed), total spent: {}",
                summary.total_appointments, summary.completed_appointments, summary.total_spent
            )?;
        }
        PatientCommands::Add {
            name,
            dob,
            contact,
            health_info,
        } => {
            let patient = app.store.add_patient(NewPatient {
                name,
                date_of_birth: dob,
                contact,
                health_info,
            })?;
            writeln!(out, "Added patient {}", patient.id)?;
        }
        PatientCommands::Update {
            id,
            name,
            dob,
            contact,
            health_info,
            clear_health_info,
            patch,
        } => {
            let patch =
                build_patient_patch(patch, name, dob, contact, health_info, clear_health_info)?;
            let patient = app.store.update_patient(&id, patch)?;
            write_patient(out, &patient)?;
        }
        PatientCommands::Delete { id, yes } => {
            if !yes {
                bail!("deleting patient {id} also deletes their incidents; re-run with --yes");
            }
            let removal = app.store.delete_patient(&id)?;
            if removal.is_empty() {
                writeln!(out, "Nothing to delete for patient {id}")?;
            } else {
                writeln!(
                    out,
                    "Deleted patient {id} and {} incident(s)",
                    removal.incidents.len()
                )?;
            }
        }
    }
    Ok(())
}

fn run_incidents<K: KeyValueStore>(
    command: IncidentCommands,
    app: &mut App<K>,
    out: &mut dyn Write,
) -> anyhow::Result<()> {
    match command {
        IncidentCommands::List {
            patient,
            status,
            search,
        } => {
            let view = app.store.view();
            let found = view.search_incidents(search.as_deref().unwrap_or(""), status);
            write_incidents(
                out,
                found.into_iter().filter(|i| {
                    patient
                        .as_deref()
                        .is_none_or(|p| i.patient_id.as_str() == p)
                }),
            )?;
        }
        IncidentCommands::Show { id } => {
            let Some(incident) = app.store.incident(&id) else {
                bail!("incident not found: {id}");
            };
            writeln!(out, "{}", serde_json::to_string_pretty(incident)?)?;
        }
        IncidentCommands::Add {
            patient_id,
            title,
            date,
            fields,
        } => {
            let mut new = NewIncident::new(patient_id, title, date);
            new.description = fields.description;
            new.comments = fields.comments;
            new.treatment = fields.treatment;
            new.next_appointment_date = fields.next_date;
            new.cost = fields.cost;
            new.status = fields.status.unwrap_or_default();
            new.attachments = load_attachments(&fields.attachments)?;

            let incident = app.store.add_incident(new)?;
            writeln!(out, "Added incident {}", incident.id)?;
        }
        IncidentCommands::Update {
            id,
            patient_id,
            title,
            date,
            fields,
            clear_next_date,
            clear_cost,
            patch,
        } => {
            let mut built = match patch {
                Some(raw) => IncidentPatch::from_json(&raw)?,
                None => IncidentPatch::default(),
            };
            if patient_id.is_some() {
                built.patient_id = patient_id;
            }
            if title.is_some() {
                built.title = title;
            }
            if date.is_some() {
                built.appointment_date = date;
            }
            if let Some(description) = fields.description {
                built.description = Some(Some(description));
            }
            if let Some(comments) = fields.comments {
                built.comments = Some(Some(comments));
            }
            if let Some(treatment) = fields.treatment {
                built.treatment = Some(Some(treatment));
            }
            if let Some(next) = fields.next_date {
                built.next_appointment_date = Some(Some(next));
            } else if clear_next_date {
                built.next_appointment_date = Some(None);
            }
            if let Some(cost) = fields.cost {
                built.cost = Some(Some(cost));
            } else if clear_cost {
                built.cost = Some(None);
            }
            if fields.status.is_some() {
                built.status = fields.status;
            }
            if !fields.attachments.is_empty() {
                let mut attachments = match built.attachments.take() {
                    Some(list) => list,
                    None => app
                        .store
                        .incident(&id)
                        .map(|i| i.attachments.clone())
                        .unwrap_or_default(),
                };
                attachments.extend(load_attachments(&fields.attachments)?);
                built.attachments = Some(attachments);
            }

            let incident = app.store.update_incident(&id, built)?;
            write_incident(out, &incident)?;
        }
        IncidentCommands::Delete { id, yes } => {
            if !yes {
                bail!("re-run with --yes to delete incident {id}");
            }
            match app.store.delete_incident(&id)? {
                Some(_) => writeln!(out, "Deleted incident {id}")?,
                None => writeln!(out, "Nothing to delete for incident {id}")?,
            }
        }
        IncidentCommands::Attachments { id, save_to } => {
            let Some(incident) = app.store.incident(&id) else {
                bail!("incident not found: {id}");
            };
            if incident.attachments.is_empty() {
                writeln!(out, "No attachments.")?;
            }
            for attachment in &incident.attachments {
                let meta = attachment.metadata()?;
                writeln!(
                    out,
                    "{}  {}  {} bytes  sha256:{}",
                    meta.name,
                    meta.media_type.as_deref().unwrap_or("unknown"),
                    meta.size_bytes,
                    meta.sha256
                )?;
            }
            if let Some(dir) = save_to {
                save_attachments(out, &dir, &incident.attachments)?;
            }
        }
    }
    Ok(())
}

fn run_dashboard<K: KeyValueStore>(
    app: &App<K>,
    now: NaiveDateTime,
    out: &mut dyn Write,
) -> anyhow::Result<()> {
    let session = app.session()?;
    let view = app.store.view();

    if session.is_admin() {
        let dashboard = view.admin_dashboard(now);
        let s = dashboard.summary;
        writeln!(out, "Patients:               {}", s.total_patients)?;
        writeln!(out, "Upcoming appointments:  {}", s.upcoming_appointments)?;
        writeln!(out, "Pending treatments:     {}", s.pending_treatments)?;
        writeln!(out, "Completed treatments:   {}", s.completed_treatments)?;
        writeln!(out, "Revenue:                {}", s.total_revenue)?;
        writeln!(out)?;
        writeln!(out, "Next appointments:")?;
        write_incidents(out, dashboard.upcoming)?;
        writeln!(out)?;
        writeln!(out, "Top patients:")?;
        for ranking in dashboard.top_patients {
            writeln!(
                out,
                "{}  {}  {} appointment(s)  {}",
                ranking.patient.id,
                ranking.patient.name,
                ranking.appointment_count,
                ranking.total_spent
            )?;
        }
        return Ok(());
    }

    let Some(patient_id) = &session.patient_id else {
        bail!("session for {} is not linked to a patient", session.email);
    };
    let Some(dashboard) = view.patient_dashboard(patient_id.as_str(), now) else {
        bail!("patient not found: {patient_id}");
    };
    write_patient(out, dashboard.patient)?;
    writeln!(out, "Total spent: {}", dashboard.total_spent)?;
    writeln!(out)?;
    writeln!(out, "Upcoming:")?;
    write_incidents(out, dashboard.upcoming)?;
    writeln!(out)?;
    writeln!(out, "History:")?;
    write_incidents(out, dashboard.history)?;
    Ok(())
}

/// Executes one parsed command against `app`, writing results to `out`.
///
/// `now` is the local wall-clock time used by upcoming and dashboard queries.
pub fn run<K: KeyValueStore>(
    cli: Cli,
    app: &mut App<K>,
    now: NaiveDateTime,
    out: &mut dyn Write,
) -> anyhow::Result<()> {
    let Some(command) = cli.command else {
        writeln!(out, "Use 'clinic --help' for commands")?;
        return Ok(());
    };

    match command {
        Commands::Login { email, password } => match app.sessions.login(&email, &password)? {
            Some(session) => writeln!(out, "Signed in as {} ({})", session.email, session.role)?,
            None => bail!("invalid email or password"),
        },
        Commands::Logout => {
            app.sessions.logout()?;
            writeln!(out, "Signed out")?;
        }
        Commands::Whoami => match app.sessions.current() {
            Some(session) => {
                let patient = session
                    .patient_id
                    .as_ref()
                    .map(|id| format!(", patient {id}"))
                    .unwrap_or_default();
                writeln!(out, "{} ({}{})", session.email, session.role, patient)?;
            }
            None => writeln!(out, "Not signed in")?,
        },
        Commands::Dashboard => run_dashboard(app, now, out)?,
        Commands::Patients(command) => {
            app.admin()?;
            run_patients(command, app, out)?;
        }
        Commands::Incidents(command) => {
            app.admin()?;
            run_incidents(command, app, out)?;
        }
        Commands::Upcoming { patient } => {
            app.viewer_of(patient.as_deref())?;
            let view = app.store.view();
            let upcoming = match patient {
                Some(id) => view.upcoming_for(&id, now),
                None => view.upcoming(now),
            };
            write_incidents(out, upcoming)?;
        }
        Commands::History { patient } => {
            app.viewer_of(patient.as_deref())?;
            let view = app.store.view();
            let history = match patient {
                Some(id) => view.history_for(&id),
                None => view.history(),
            };
            write_incidents(out, history)?;
        }
        Commands::Day { date, all } => {
            app.admin()?;
            let filter = if all {
                DayFilter::AnyStatus
            } else {
                DayFilter::ScheduledOnly
            };
            write_incidents(out, app.store.view().on_day(date, filter))?;
        }
        Commands::Top { limit } => {
            app.admin()?;
            for ranking in app.store.view().top_patients(limit) {
                writeln!(
                    out,
                    "{}  {}  {} appointment(s)",
                    ranking.patient.id, ranking.patient.name, ranking.appointment_count
                )?;
            }
        }
    }
    Ok(())
}
