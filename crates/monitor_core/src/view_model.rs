use chrono::{DateTime, Utc};

use crate::{ChannelState, LogSeverity, LogSource, RefreshState, SessionId, SessionStatus, Statistics};

#[derive(Debug, Clone, PartialEq, Default)]
pub struct MonitorViewModel {
    pub status: SessionStatus,
    pub session_id: Option<SessionId>,
    pub started_at: Option<DateTime<Utc>>,
    pub channel: ChannelState,
    pub polling: bool,
    pub progress_percent: Option<u8>,
    pub current_step: Option<String>,
    pub steps: Vec<StepRowView>,
    pub statistics: Option<Statistics>,
    pub logs: Vec<LogRowView>,
    pub error: Option<String>,
    pub channel_note: Option<String>,
    pub refresh: RefreshState,
    pub dirty: bool,
}

impl MonitorViewModel {
    /// Progress as displayed, e.g. `42%`.
    pub fn progress_label(&self) -> Option<String> {
        self.progress_percent.map(|p| format!("{p}%"))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepRowView {
    pub id: String,
    pub name: String,
    pub status: String,
    pub percent: u8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRowView {
    pub seq: u64,
    pub text: String,
    pub severity: LogSeverity,
    pub source: LogSource,
}

/// Converts a 0–1 fraction to a whole percentage, clamped to 0..=100.
pub fn percent(fraction: f64) -> u8 {
    if !fraction.is_finite() {
        return 0;
    }
    (fraction.clamp(0.0, 1.0) * 100.0).round() as u8
}
