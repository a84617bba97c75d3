//! Ward CLI - offline-first clinical records cache
//!
//! Synchronizes the local cache with a chart server and inspects cached
//! records and chart projections from the terminal.

use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{TimeZone, Utc};
use clap::{Parser, Subcommand};
use thiserror::Error;
use ward_core::db::Database;
use ward_core::models::Observation;
use ward_core::net::RestClient;
use ward_core::projection;
use ward_core::store::CacheStore;
use ward_core::sync::{
    CycleOutcome, CycleScope, Orchestrator, Phase, PhaseFilter, PhaseOutcome, SyncScheduler,
};
use ward_core::ServerConfig;

#[derive(Parser)]
#[command(name = "ward")]
#[command(about = "Offline-first clinical records cache")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Optional path to the local cache database
    #[arg(long, global = true, value_name = "PATH")]
    db_path: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a sync cycle against the chart server
    Sync {
        /// Run only the named phases (repeatable)
        #[arg(long, value_name = "PHASE")]
        phase: Vec<String>,
        /// Only phases with an incremental changes feed
        #[arg(long, conflicts_with = "full_refresh_only")]
        incremental_only: bool,
        /// Only full-refresh phases
        #[arg(long)]
        full_refresh_only: bool,
        /// Server base URL (or WARD_SERVER_URL)
        #[arg(long, value_name = "URL")]
        server: Option<String>,
    },
    /// Sync on a fixed schedule until interrupted
    Watch {
        /// Seconds between full sync cycles
        #[arg(long, default_value = "300", value_name = "SECONDS")]
        interval: u64,
        /// Server base URL (or WARD_SERVER_URL)
        #[arg(long, value_name = "URL")]
        server: Option<String>,
    },
    /// List cached patients
    Patients {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show a patient's localized chart
    Chart {
        /// Patient UUID
        patient_uuid: String,
        /// Chart UUID (required unless --most-recent)
        #[arg(long, value_name = "UUID", required_unless_present = "most_recent")]
        chart: Option<String>,
        /// Only the newest observation per concept
        #[arg(long)]
        most_recent: bool,
        /// Locale for concept and value names
        #[arg(long, default_value = "en")]
        locale: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Record an observation locally, ahead of server confirmation
    Record {
        /// Patient UUID
        patient_uuid: String,
        /// Concept UUID
        concept_uuid: String,
        /// Observed value (scalar, or a concept UUID for coded answers)
        value: String,
    },
    /// Show persisted sync cursors and the last full sync
    Cursors,
}

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Core(#[from] ward_core::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("Server is not configured. Pass --server or set WARD_SERVER_URL.")]
    ServerNotConfigured,
    #[error("No patient found with UUID: {0}")]
    PatientNotFound(String),
    #[error("Sync cycle {0}")]
    SyncFailed(String),
}

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("ward=info")),
        )
        .init();

    let cli = Cli::parse();
    let db_path = resolve_db_path(cli.db_path);
    tracing::debug!(db_path = %db_path.display(), "Using local cache");

    match cli.command {
        Commands::Sync {
            phase,
            incremental_only,
            full_refresh_only,
            server,
        } => {
            run_sync(
                &phase,
                incremental_only,
                full_refresh_only,
                server,
                &db_path,
            )
            .await?;
        }
        Commands::Watch { interval, server } => run_watch(interval, server, &db_path).await?,
        Commands::Patients { json } => run_patients(json, &db_path)?,
        Commands::Chart {
            patient_uuid,
            chart,
            most_recent,
            locale,
            json,
        } => run_chart(
            &patient_uuid,
            chart.as_deref(),
            most_recent,
            &locale,
            json,
            &db_path,
        )?,
        Commands::Record {
            patient_uuid,
            concept_uuid,
            value,
        } => run_record(&patient_uuid, &concept_uuid, &value, &db_path)?,
        Commands::Cursors => run_cursors(&db_path)?,
    }

    Ok(())
}

async fn run_sync(
    phase_names: &[String],
    incremental_only: bool,
    full_refresh_only: bool,
    server_url: Option<String>,
    db_path: &Path,
) -> Result<(), CliError> {
    let config = server_config_from(server_url)?;
    let store = Arc::new(open_store(db_path)?);
    let client = Arc::new(RestClient::new(config)?);

    let phases = phase_names
        .iter()
        .map(|name| name.parse::<Phase>())
        .collect::<ward_core::Result<Vec<_>>>()?;
    let scope = CycleScope {
        phases: (!phases.is_empty()).then_some(phases),
        filter: if incremental_only {
            PhaseFilter::IncrementalOnly
        } else if full_refresh_only {
            PhaseFilter::FullRefreshOnly
        } else {
            PhaseFilter::All
        },
    };

    let orchestrator = Orchestrator::new(store, client);
    let report = orchestrator.run_cycle(&scope).await;

    for result in &report.phases {
        let status = match &result.outcome {
            PhaseOutcome::Completed => "ok".to_string(),
            PhaseOutcome::Skipped { reason } => format!("skipped ({reason})"),
            PhaseOutcome::Failed { reason } => format!("failed ({reason})"),
        };
        println!(
            "{:<14} {status}  +{} ~{} -{}",
            result.phase, result.stats.inserted, result.stats.updated, result.stats.deleted
        );
    }
    println!(
        "total: {} inserted, {} updated, {} deleted, {} dropped",
        report.stats.inserted, report.stats.updated, report.stats.deleted, report.stats.dropped
    );

    match report.outcome {
        CycleOutcome::Completed => Ok(()),
        CycleOutcome::PartiallyFailed => Err(CliError::SyncFailed("partially failed".into())),
        CycleOutcome::Aborted => Err(CliError::SyncFailed("aborted".into())),
        CycleOutcome::Cancelled => Err(CliError::SyncFailed("cancelled".into())),
    }
}

async fn run_watch(
    interval_secs: u64,
    server_url: Option<String>,
    db_path: &Path,
) -> Result<(), CliError> {
    let config = server_config_from(server_url)?;
    let store = Arc::new(open_store(db_path)?);
    let client = Arc::new(RestClient::new(config)?);

    let orchestrator = Orchestrator::new(store, client);
    let scheduler = SyncScheduler::spawn(
        orchestrator,
        Some(std::time::Duration::from_secs(interval_secs)),
    );
    println!("Syncing every {interval_secs}s; press Ctrl-C to stop");

    tokio::signal::ctrl_c().await?;
    tracing::info!("Interrupted; stopping after the in-flight cycle");
    scheduler.cancel_current();
    scheduler.shutdown().await;
    Ok(())
}

fn run_patients(as_json: bool, db_path: &Path) -> Result<(), CliError> {
    let store = open_store(db_path)?;
    let patients = store.patients()?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&patients)?);
    } else {
        for patient in &patients {
            let id = patient.id.as_deref().unwrap_or("-");
            let location = patient.location_uuid.as_deref().unwrap_or("-");
            println!("{:<10} {:<30} {location}", id, patient.display_name());
        }
        println!("{} patient(s)", patients.len());
    }
    Ok(())
}

fn run_chart(
    patient_uuid: &str,
    chart_uuid: Option<&str>,
    most_recent: bool,
    locale: &str,
    as_json: bool,
    db_path: &Path,
) -> Result<(), CliError> {
    let store = open_store(db_path)?;
    let patient = store
        .patient(patient_uuid)?
        .ok_or_else(|| CliError::PatientNotFound(patient_uuid.to_string()))?;
    println!("{} ({})", patient.display_name(), patient.uuid);

    if most_recent {
        let rows = projection::most_recent_chart(&store, patient_uuid, locale)?;
        if as_json {
            println!("{}", serde_json::to_string_pretty(&rows)?);
        } else {
            for row in &rows {
                println!(
                    "{:<28} {:<20} {}",
                    row.concept_name,
                    row.localized_value,
                    format_millis(row.encounter_millis)
                );
            }
        }
    } else {
        // required_unless_present guarantees this is set
        let chart_uuid = chart_uuid.unwrap_or_default();
        let rows = projection::patient_chart(&store, chart_uuid, patient_uuid, locale)?;
        if as_json {
            println!("{}", serde_json::to_string_pretty(&rows)?);
        } else {
            for row in &rows {
                let value = row.localized_value.as_deref().unwrap_or("-");
                let time = row.encounter_millis.map_or(String::new(), format_millis);
                println!(
                    "{:<20} {:<28} {value:<20} {time}",
                    row.group_name, row.concept_name
                );
            }
        }
    }
    Ok(())
}

fn run_record(
    patient_uuid: &str,
    concept_uuid: &str,
    value: &str,
    db_path: &Path,
) -> Result<(), CliError> {
    let store = open_store(db_path)?;
    if store.patient(patient_uuid)?.is_none() {
        return Err(CliError::PatientNotFound(patient_uuid.to_string()));
    }
    let observation = Observation::unsubmitted(
        patient_uuid,
        concept_uuid,
        Utc::now().timestamp_millis(),
        value,
    );
    store.add_unsubmitted_observation(&observation)?;
    println!("Recorded (pending sync)");
    Ok(())
}

fn run_cursors(db_path: &Path) -> Result<(), CliError> {
    let store = open_store(db_path)?;
    let cursors = store.sync_cursors()?;
    if cursors.is_empty() {
        println!("No sync cursors stored");
    } else {
        for (table, token) in &cursors {
            println!("{table:<14} {token}");
        }
    }
    match store.last_full_sync()? {
        Some((start, end)) => {
            let start = start.map_or("-".to_string(), format_millis);
            let end = end.map_or("in progress".to_string(), format_millis);
            println!("last full sync: {start} .. {end}");
        }
        None => println!("No full sync on record"),
    }
    Ok(())
}

fn server_config_from(server_url: Option<String>) -> Result<ServerConfig, CliError> {
    let base_url = server_url
        .or_else(|| env::var("WARD_SERVER_URL").ok())
        .ok_or(CliError::ServerNotConfigured)?;
    let username = env::var("WARD_USERNAME").unwrap_or_default();
    let password = env::var("WARD_PASSWORD").unwrap_or_default();
    Ok(ServerConfig::new(base_url, username, password)?)
}

fn open_store(db_path: &Path) -> Result<CacheStore, CliError> {
    Ok(CacheStore::new(Database::open(db_path)?))
}

fn resolve_db_path(cli_db_path: Option<PathBuf>) -> PathBuf {
    cli_db_path
        .or_else(|| env::var_os("WARD_DB_PATH").map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("ward.db"))
}

fn format_millis(millis: i64) -> String {
    Utc.timestamp_millis_opt(millis)
        .single()
        .map_or_else(|| millis.to_string(), |dt| dt.format("%Y-%m-%d %H:%M").to_string())
}
