use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use clinic_core::config::{reference_policy_from_env_value, seed_demo_data_from_env_value};
use clinic_core::constants::DEFAULT_DATA_DIR;
use clinic_core::{ClinicStore, CoreConfig, FileKeyValueStore, SessionService};

mod cli;

use cli::{App, Cli};

/// Entry point for the `clinic` command.
///
/// Configuration is resolved once from the environment (and an optional `.env` file)
/// before the store is opened:
/// - `CLINIC_DATA_DIR`: directory holding the JSON slots (default: `clinic_data`)
/// - `CLINIC_REFERENCE_POLICY`: `strict` (default) or `permissive`
/// - `CLINIC_SEED_DEMO_DATA`: seed missing slots with demo records (default: `true`)
///
/// Logs go to stderr so command output on stdout stays clean.
fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("clinic_core=warn".parse()?),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let data_dir = std::env::var("CLINIC_DATA_DIR").unwrap_or_else(|_| DEFAULT_DATA_DIR.into());
    let reference_policy =
        reference_policy_from_env_value(std::env::var("CLINIC_REFERENCE_POLICY").ok())?;
    let seed_demo_data =
        seed_demo_data_from_env_value(std::env::var("CLINIC_SEED_DEMO_DATA").ok())?;

    let cfg = Arc::new(CoreConfig::new(
        PathBuf::from(data_dir),
        reference_policy,
        seed_demo_data,
    )?);
    tracing::debug!("using data directory {}", cfg.data_dir().display());

    let store = ClinicStore::open(cfg.clone(), FileKeyValueStore::new(cfg.data_dir()))?;
    let sessions = SessionService::open(FileKeyValueStore::new(cfg.data_dir()))?;
    let mut app = App { store, sessions };

    let now = chrono::Local::now().naive_local();
    cli::run(cli, &mut app, now, &mut std::io::stdout().lock())
}
