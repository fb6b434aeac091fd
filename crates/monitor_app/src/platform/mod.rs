mod app;
mod config;
mod effects;
mod persistence;
mod records;
mod render;

use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use anyhow::{Context, Result};
use chrono::Utc;
use log::LevelFilter;
use monitor_core::{RecordStore, SessionId, StartRequest};
use monitor_engine::{EngineHandle, RecordsClient};
use monitor_logging::{monitor_info, monitor_warn, LogDestination, DEFAULT_LOG_FILE};

use crate::cli::{Cli, Commands};
use app::{Follow, SessionDriver, SessionOutcome};
use config::{MonitorConfig, Overrides, API_KEY_ENV};
use persistence::{load_history, record_session, HistoryEntry};

/// Exit status after Ctrl-C, as shells report SIGINT.
const INTERRUPTED_EXIT: u8 = 130;

pub fn run(cli: Cli) -> Result<ExitCode> {
    let destination = if cli.verbose {
        LogDestination::Both(PathBuf::from(DEFAULT_LOG_FILE))
    } else {
        LogDestination::default()
    };
    let level = if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    if !monitor_logging::initialize(destination, level) {
        eprintln!("warning: logging is disabled");
    }

    let config = MonitorConfig::load(cli.config.as_deref())?.apply(
        Overrides {
            base_url: cli.base_url,
            api_key: cli.api_key,
        },
        std::env::var(API_KEY_ENV).ok(),
    );

    match cli.command {
        Commands::Watch {
            endpoint,
            body,
            json,
        } => {
            let endpoint = endpoint.unwrap_or_else(|| config.start_endpoint.clone());
            let body = match (body, json) {
                (Some(path), _) => {
                    let text = fs::read_to_string(&path)
                        .with_context(|| format!("reading request body {}", path.display()))?;
                    serde_json::from_str::<serde_json::Value>(&text)
                        .with_context(|| format!("parsing request body {}", path.display()))?
                }
                (None, Some(text)) => serde_json::from_str::<serde_json::Value>(&text)
                    .context("--json is not valid JSON")?,
                (None, None) => serde_json::json!({}),
            };
            follow(&config, Follow::Start(StartRequest::new(endpoint.clone(), body)), &endpoint)
        }
        Commands::Attach { session_id } => {
            follow(&config, Follow::Attach(SessionId::new(session_id)), "attach")
        }
        Commands::Records { action } => {
            let client = RecordsClient::new(config.backend_settings()?)?;
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .context("starting records runtime")?;
            let mut store = RecordStore::new();
            let mut out = io::stdout().lock();
            runtime.block_on(records::run_records(&client, &mut store, action, &mut out))?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::History => {
            let mut out = io::stdout().lock();
            for entry in load_history(&config.state_dir) {
                writeln!(out, "{}", entry.line())?;
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn follow(config: &MonitorConfig, target: Follow, endpoint: &str) -> Result<ExitCode> {
    let engine = EngineHandle::new(config.backend_settings()?).context("starting engine")?;
    let mut driver = SessionDriver::new(engine, io::stdout());
    listen_for_ctrl_c(driver.interrupt_flag());
    let outcome = driver.run(target)?;
    remember(config, endpoint, &outcome);

    Ok(if outcome.failed() {
        ExitCode::FAILURE
    } else if outcome.interrupted() {
        ExitCode::from(INTERRUPTED_EXIT)
    } else {
        ExitCode::SUCCESS
    })
}

/// Raises `interrupt` on the first Ctrl-C so the session is cancelled and its
/// socket closed before the process exits.
fn listen_for_ctrl_c(interrupt: Arc<AtomicBool>) {
    let spawned = thread::Builder::new()
        .name("ctrl-c".to_string())
        .spawn(move || {
            let runtime = match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(runtime) => runtime,
                Err(err) => {
                    monitor_warn!("Ctrl-C handling unavailable: {}", err);
                    return;
                }
            };
            match runtime.block_on(tokio::signal::ctrl_c()) {
                Ok(()) => interrupt.store(true, Ordering::SeqCst),
                Err(err) => monitor_warn!("Ctrl-C handling unavailable: {}", err),
            }
        });
    if let Err(err) = spawned {
        monitor_warn!("Failed to spawn Ctrl-C listener: {}", err);
    }
}

fn remember(config: &MonitorConfig, endpoint: &str, outcome: &SessionOutcome) {
    let Some(entry) = HistoryEntry::from_outcome(endpoint, outcome, Utc::now()) else {
        monitor_info!("Session was cancelled before finishing; nothing recorded in history");
        return;
    };
    record_session(&config.state_dir, entry);
    monitor_info!("Recorded session in {:?}", config.state_dir);
}
