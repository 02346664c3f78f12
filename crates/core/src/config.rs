//! Core runtime configuration.
//!
//! Configuration is resolved once at process startup and then passed into core services,
//! so nothing below the composition root reads environment variables.

use crate::{ClinicError, ClinicResult};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// What to do when an incident names a patient the store does not hold.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ReferencePolicy {
    /// Reject with [`ClinicError::InvalidReference`].
    #[default]
    Strict,
    /// Accept the dangling reference. Cascading delete still applies once a patient
    /// with that id exists and is removed.
    Permissive,
}

impl FromStr for ReferencePolicy {
    type Err = ClinicError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "strict" => Ok(Self::Strict),
            "permissive" => Ok(Self::Permissive),
            other => Err(ClinicError::InvalidInput(format!(
                "reference policy must be 'strict' or 'permissive', got '{other}'"
            ))),
        }
    }
}

/// Core configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct CoreConfig {
    data_dir: PathBuf,
    reference_policy: ReferencePolicy,
    seed_demo_data: bool,
}

impl CoreConfig {
    /// Create a new `CoreConfig`.
    pub fn new(
        data_dir: PathBuf,
        reference_policy: ReferencePolicy,
        seed_demo_data: bool,
    ) -> ClinicResult<Self> {
        if data_dir.as_os_str().is_empty() {
            return Err(ClinicError::InvalidInput(
                "data_dir cannot be empty".into(),
            ));
        }

        Ok(Self {
            data_dir,
            reference_policy,
            seed_demo_data,
        })
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn reference_policy(&self) -> ReferencePolicy {
        self.reference_policy
    }

    /// Whether missing slots are filled with the demo dataset on first open.
    pub fn seed_demo_data(&self) -> bool {
        self.seed_demo_data
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Parse the reference policy from an optional string value.
///
/// If `value` is `None` or empty/whitespace, returns [`ReferencePolicy::Strict`].
pub fn reference_policy_from_env_value(value: Option<String>) -> ClinicResult<ReferencePolicy> {
    let parsed = non_blank(value)
        .map(|v| v.parse::<ReferencePolicy>())
        .transpose()?;

    Ok(parsed.unwrap_or_default())
}

/// Parse the demo-seeding switch from an optional string value.
///
/// Accepts `true/false`, `1/0`, `yes/no`, `on/off`. Defaults to `true`.
pub fn seed_demo_data_from_env_value(value: Option<String>) -> ClinicResult<bool> {
    let Some(value) = non_blank(value) else {
        return Ok(true);
    };

    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        other => Err(ClinicError::InvalidInput(format!(
            "seed flag must be a boolean, got '{other}'"
        ))),
    }
}
