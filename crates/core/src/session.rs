//! Demo sign-in.
//!
//! Credentials are checked against a fixed table in plain text; this is a demo gate for
//! choosing between the admin and patient views, not authentication. The signed-in
//! session is persisted in the `currentUser` slot so it survives between runs.

use crate::constants::SESSION_KEY;
use crate::kv::KeyValueStore;
use crate::{ClinicError, ClinicResult};
use clinic_uuid::RecordId;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    Admin,
    Patient,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Admin => f.write_str("Admin"),
            Role::Patient => f.write_str("Patient"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: String,
    pub role: Role,
    pub email: String,
    /// Set for patient sessions only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patient_id: Option<RecordId>,
}

impl Session {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// # Errors
    ///
    /// [`ClinicError::Forbidden`] for non-admin sessions.
    pub fn require_admin(&self) -> ClinicResult<()> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(ClinicError::Forbidden)
        }
    }

    /// Admins see every patient; a patient sees only their own record.
    pub fn can_view_patient(&self, patient_id: &str) -> bool {
        self.is_admin() || self.patient_id.as_ref().is_some_and(|own| own == patient_id)
    }
}

struct DemoUser {
    id: &'static str,
    role: Role,
    email: &'static str,
    password: &'static str,
    patient_id: Option<&'static str>,
}

const DEMO_USERS: [DemoUser; 3] = [
    DemoUser {
        id: "1",
        role: Role::Admin,
        email: "admin@entnt.in",
        password: "admin123",
        patient_id: None,
    },
    DemoUser {
        id: "2",
        role: Role::Patient,
        email: "john@entnt.in",
        password: "patient123",
        patient_id: Some("p1"),
    },
    DemoUser {
        id: "3",
        role: Role::Patient,
        email: "jane@entnt.in",
        password: "patient123",
        patient_id: Some("p2"),
    },
];

/// Owns the `currentUser` slot.
pub struct SessionService<K: KeyValueStore> {
    kv: K,
    current: Option<Session>,
}

impl<K: KeyValueStore> SessionService<K> {
    /// Restores any persisted session from `kv`.
    pub fn open(kv: K) -> ClinicResult<Self> {
        let current = match kv.get(SESSION_KEY)? {
            Some(raw) => Some(serde_json::from_str(&raw).map_err(|source| {
                ClinicError::Deserialization {
                    key: SESSION_KEY.to_string(),
                    source,
                }
            })?),
            None => None,
        };
        Ok(Self { kv, current })
    }

    pub fn current(&self) -> Option<&Session> {
        self.current.as_ref()
    }

    /// The current session, or [`ClinicError::NotLoggedIn`].
    pub fn require(&self) -> ClinicResult<&Session> {
        self.current.as_ref().ok_or(ClinicError::NotLoggedIn)
    }

    /// Signs in on an exact email and password match.
    ///
    /// Returns `Ok(None)` on a mismatch; the previous session, if any, is kept.
    pub fn login(&mut self, email: &str, password: &str) -> ClinicResult<Option<Session>> {
        let Some(user) = DEMO_USERS
            .iter()
            .find(|u| u.email == email && u.password == password)
        else {
            tracing::warn!("failed login for {}", email);
            return Ok(None);
        };

        let session = Session {
            id: user.id.to_string(),
            role: user.role,
            email: user.email.to_string(),
            patient_id: user.patient_id.map(RecordId::parse).transpose()?,
        };
        let raw = serde_json::to_string(&session).map_err(|source| ClinicError::Serialization {
            key: SESSION_KEY.to_string(),
            source,
        })?;
        self.kv.set(SESSION_KEY, raw)?;
        self.current = Some(session.clone());

        tracing::info!("{} signed in as {}", session.email, session.role);
        Ok(Some(session))
    }

    /// Ends the current session. Logging out twice is harmless.
    pub fn logout(&mut self) -> ClinicResult<()> {
        self.kv.remove(SESSION_KEY)?;
        if let Some(session) = self.current.take() {
            tracing::info!("{} signed out", session.email);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::{FileKeyValueStore, MemoryKeyValueStore};
    use tempfile::TempDir;

    #[test]
    fn test_admin_login_persists_session() {
        let mut sessions = SessionService::open(MemoryKeyValueStore::new()).unwrap();
        let session = sessions.login("admin@entnt.in", "admin123").unwrap().unwrap();

        assert_eq!(session.role, Role::Admin);
        assert_eq!(session.patient_id, None);
        assert!(session.require_admin().is_ok());
        assert_eq!(sessions.current(), Some(&session));

        let raw = sessions.kv.get(SESSION_KEY).unwrap().unwrap();
        assert_eq!(raw, r#"{"id":"1","role":"Admin","email":"admin@entnt.in"}"#);
    }

    #[test]
    fn test_patient_login_links_patient_record() {
        let mut sessions = SessionService::open(MemoryKeyValueStore::new()).unwrap();
        let session = sessions.login("jane@entnt.in", "patient123").unwrap().unwrap();

        assert_eq!(session.role, Role::Patient);
        assert_eq!(session.patient_id.as_ref().unwrap(), "p2");
        assert!(matches!(session.require_admin(), Err(ClinicError::Forbidden)));
        assert!(session.can_view_patient("p2"));
        assert!(!session.can_view_patient("p1"));
    }

    #[test]
    fn test_wrong_password_persists_nothing() {
        let mut sessions = SessionService::open(MemoryKeyValueStore::new()).unwrap();

        assert_eq!(sessions.login("admin@entnt.in", "nope").unwrap(), None);
        assert_eq!(sessions.login("ADMIN@entnt.in", "admin123").unwrap(), None);
        assert!(sessions.current().is_none());
        assert!(sessions.kv.is_empty());
        assert!(matches!(sessions.require(), Err(ClinicError::NotLoggedIn)));
    }

    #[test]
    fn test_session_survives_reopen_and_logout_clears_it() {
        let dir = TempDir::new().unwrap();
        let mut sessions = SessionService::open(FileKeyValueStore::new(dir.path())).unwrap();
        sessions.login("john@entnt.in", "patient123").unwrap().unwrap();

        let mut reopened = SessionService::open(FileKeyValueStore::new(dir.path())).unwrap();
        assert_eq!(reopened.require().unwrap().email, "john@entnt.in");

        reopened.logout().unwrap();
        reopened.logout().unwrap();
        assert!(reopened.current().is_none());

        let again = SessionService::open(FileKeyValueStore::new(dir.path())).unwrap();
        assert!(again.current().is_none());
    }
}
