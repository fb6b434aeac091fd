//! Monitor configuration: a RON file, then CLI flags, then the environment.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use monitor_engine::BackendSettings;
use monitor_logging::monitor_info;
use serde::{Deserialize, Serialize};
use url::Url;

pub const DEFAULT_CONFIG_FILE: &str = "./lighthouse.ron";
pub const API_KEY_ENV: &str = "LIGHTHOUSE_API_KEY";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub base_url: String,
    pub socket_base_url: Option<String>,
    pub api_key: Option<String>,
    /// Used by `watch` when no `--endpoint` is given.
    pub start_endpoint: String,
    pub status_endpoint: String,
    pub logs_endpoint: String,
    pub socket_path: String,
    pub poll_interval_ms: u64,
    pub log_lines: usize,
    pub refresh_endpoints: Vec<String>,
    pub connect_timeout_ms: u64,
    pub request_timeout_ms: u64,
    /// Holds the session history file.
    pub state_dir: PathBuf,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8100".to_string(),
            socket_base_url: None,
            api_key: None,
            start_endpoint: "/api/archive/ingest".to_string(),
            status_endpoint: "/api/archive/jobs/{session_id}".to_string(),
            logs_endpoint: "/api/archive/logs/import".to_string(),
            socket_path: "/ws/progress/{session_id}".to_string(),
            poll_interval_ms: 2000,
            log_lines: 100,
            refresh_endpoints: vec!["/api/documents".to_string(), "/api/stats".to_string()],
            connect_timeout_ms: 10_000,
            request_timeout_ms: 30_000,
            state_dir: PathBuf::from(".lighthouse"),
        }
    }
}

/// Values given on the command line; each one wins over the file.
#[derive(Debug, Default)]
pub struct Overrides {
    pub base_url: Option<String>,
    pub api_key: Option<String>,
}

impl MonitorConfig {
    /// Loads `explicit` if given, else `./lighthouse.ron` if it exists, else defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        match explicit {
            Some(path) => Self::from_file(path),
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    Self::from_file(default_path)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config = ron::from_str(&text)
            .with_context(|| format!("parsing config {}", path.display()))?;
        monitor_info!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn apply(mut self, overrides: Overrides, env_api_key: Option<String>) -> Self {
        if let Some(base_url) = overrides.base_url {
            self.base_url = base_url;
        }
        if let Some(api_key) = overrides.api_key {
            self.api_key = Some(api_key);
        }
        if let Some(api_key) = env_api_key.filter(|key| !key.trim().is_empty()) {
            self.api_key = Some(api_key);
        }
        self
    }

    pub fn backend_settings(&self) -> Result<BackendSettings> {
        let base_url = Url::parse(&self.base_url)
            .with_context(|| format!("invalid base_url {:?}", self.base_url))?;
        let socket_base_url = self
            .socket_base_url
            .as_deref()
            .map(Url::parse)
            .transpose()
            .context("invalid socket_base_url")?;

        let mut settings = BackendSettings::new(base_url);
        settings.socket_base_url = socket_base_url;
        settings.api_key = self.api_key.clone();
        settings.status_endpoint = self.status_endpoint.clone();
        settings.logs_endpoint = self.logs_endpoint.clone();
        settings.socket_path = self.socket_path.clone();
        settings.refresh_endpoints = self.refresh_endpoints.clone();
        settings.poll_interval = Duration::from_millis(self.poll_interval_ms.max(1));
        settings.log_lines = self.log_lines;
        settings.connect_timeout = Duration::from_millis(self.connect_timeout_ms);
        settings.request_timeout = Duration::from_millis(self.request_timeout_ms);
        Ok(settings)
    }
}
