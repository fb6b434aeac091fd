use std::path::Path;

use chrono::{DateTime, Utc};
use monitor_core::{SessionId, SessionStatus};
use monitor_engine::{read_state_file, write_atomically};
use monitor_logging::{monitor_error, monitor_info, monitor_warn};
use serde::{Deserialize, Serialize};

use super::app::SessionOutcome;

const HISTORY_FILENAME: &str = "history.ron";
pub const HISTORY_LIMIT: usize = 50;

/// One monitored session, recorded when the CLI stops following it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Absent when the start request failed before a session existed.
    #[serde(default)]
    pub session_id: Option<SessionId>,
    /// Start endpoint, or `attach` for sessions the CLI did not start.
    pub endpoint: String,
    pub status: SessionStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    #[serde(default)]
    pub error: Option<String>,
}

impl HistoryEntry {
    /// Entry for a followed session that reached a terminal state. Sessions
    /// cancelled before finishing are not recorded.
    pub(crate) fn from_outcome(
        endpoint: &str,
        outcome: &SessionOutcome,
        finished_at: DateTime<Utc>,
    ) -> Option<Self> {
        if !outcome.status.is_terminal() {
            return None;
        }
        Some(Self {
            session_id: outcome.session_id.clone(),
            endpoint: endpoint.to_string(),
            status: outcome.status,
            started_at: outcome.started_at.unwrap_or(finished_at),
            finished_at,
            error: outcome.error.clone(),
        })
    }

    pub(crate) fn line(&self) -> String {
        let session = self
            .session_id
            .as_ref()
            .map_or_else(|| "-".to_string(), ToString::to_string);
        let mut line = format!(
            "{}  {}  {:<10}  {}",
            self.started_at.format("%Y-%m-%d %H:%M:%S"),
            session,
            self.status.label(),
            self.endpoint
        );
        if let Some(error) = &self.error {
            line.push_str(&format!("  ({error})"));
        }
        line
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct PersistedHistory {
    sessions: Vec<HistoryEntry>,
}

/// Oldest first. A missing or unreadable file yields an empty history.
pub(crate) fn load_history(state_dir: &Path) -> Vec<HistoryEntry> {
    let content = match read_state_file(state_dir, HISTORY_FILENAME) {
        Ok(Some(text)) => text,
        Ok(None) => return Vec::new(),
        Err(err) => {
            monitor_warn!("Failed to read session history in {:?}: {}", state_dir, err);
            return Vec::new();
        }
    };

    match ron::from_str::<PersistedHistory>(&content) {
        Ok(history) => history.sessions,
        Err(err) => {
            monitor_warn!("Failed to parse session history in {:?}: {}", state_dir, err);
            Vec::new()
        }
    }
}

/// Appends `entry`, dropping the oldest entries beyond the limit.
pub(crate) fn record_session(state_dir: &Path, entry: HistoryEntry) {
    let mut sessions = load_history(state_dir);
    sessions.push(entry);
    if sessions.len() > HISTORY_LIMIT {
        sessions.drain(..sessions.len() - HISTORY_LIMIT);
    }

    let pretty = ron::ser::PrettyConfig::new();
    let content = match ron::ser::to_string_pretty(&PersistedHistory { sessions }, pretty) {
        Ok(text) => text,
        Err(err) => {
            monitor_error!("Failed to serialize session history: {}", err);
            return;
        }
    };

    match write_atomically(state_dir, HISTORY_FILENAME, &content) {
        Ok(path) => monitor_info!("Session history saved to {:?}", path),
        Err(err) => monitor_error!("Failed to write session history to {:?}: {}", state_dir, err),
    }
}
