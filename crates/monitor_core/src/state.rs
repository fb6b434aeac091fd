use chrono::{DateTime, Utc};

use crate::view_model::{percent, LogRowView, MonitorViewModel, StepRowView};
use crate::{
    LogBuffer, LogSeverity, LogSource, ProgressSnapshot, Session, SessionId, SessionStatus,
    Statistics,
};

/// Push-channel state as the monitor believes it to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChannelState {
    #[default]
    Detached,
    Connecting,
    Live,
}

/// Progress of the one cache refresh triggered by a terminal status.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RefreshState {
    #[default]
    NotRequested,
    Pending,
    Done {
        refreshed: Vec<String>,
        failed: Vec<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct MonitorState {
    status: SessionStatus,
    session: Option<Session>,
    channel: ChannelState,
    polling: bool,
    progress: Option<ProgressSnapshot>,
    logs: LogBuffer,
    error: Option<String>,
    channel_note: Option<String>,
    refresh: RefreshState,
    dirty: bool,
}

impl MonitorState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn session_id(&self) -> Option<&SessionId> {
        self.session.as_ref().map(|session| &session.id)
    }

    pub fn channel(&self) -> ChannelState {
        self.channel
    }

    pub fn is_polling(&self) -> bool {
        self.polling
    }

    pub fn progress(&self) -> Option<&ProgressSnapshot> {
        self.progress.as_ref()
    }

    pub fn logs(&self) -> &LogBuffer {
        &self.logs
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn refresh(&self) -> &RefreshState {
        &self.refresh
    }

    /// Terminal and no refresh outstanding: nothing else will change on its own.
    pub fn is_settled(&self) -> bool {
        self.status.is_terminal() && self.refresh != RefreshState::Pending
    }

    pub fn consume_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    pub fn view(&self) -> MonitorViewModel {
        let progress = self.progress.as_ref();
        MonitorViewModel {
            status: self.status,
            session_id: self.session.as_ref().map(|s| s.id.clone()),
            started_at: self.session.as_ref().map(|s| s.started_at),
            channel: self.channel,
            polling: self.polling,
            progress_percent: progress.map(|p| percent(p.overall_progress)),
            current_step: progress.and_then(|p| p.current_step.clone()),
            steps: progress
                .map(|p| {
                    p.steps
                        .iter()
                        .map(|step| StepRowView {
                            id: step.id.clone(),
                            name: step.name.clone(),
                            status: step.status.clone(),
                            percent: percent(step.progress),
                        })
                        .collect()
                })
                .unwrap_or_default(),
            statistics: progress.map(|p| p.statistics),
            logs: self
                .logs
                .entries()
                .map(|entry| LogRowView {
                    seq: entry.seq,
                    text: entry.text.clone(),
                    severity: entry.severity,
                    source: entry.source,
                })
                .collect(),
            error: self.error.clone(),
            channel_note: self.channel_note.clone(),
            refresh: self.refresh.clone(),
            dirty: self.dirty,
        }
    }

    pub(crate) fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Discards the previous session and enters `Starting`.
    pub(crate) fn begin_start(&mut self) {
        self.reset_session();
        self.status = SessionStatus::Starting;
        self.mark_dirty();
    }

    pub(crate) fn begin_processing(&mut self, session_id: SessionId, started_at: DateTime<Utc>) {
        self.session = Some(Session {
            id: session_id,
            started_at,
        });
        self.status = SessionStatus::Processing;
        self.channel = ChannelState::Connecting;
        self.polling = true;
        self.mark_dirty();
    }

    /// Drops the session and everything derived from it. Logs keep their sequence numbers.
    pub(crate) fn reset_session(&mut self) {
        self.status = SessionStatus::Idle;
        self.session = None;
        self.channel = ChannelState::Detached;
        self.polling = false;
        self.progress = None;
        self.logs.clear();
        self.error = None;
        self.channel_note = None;
        self.refresh = RefreshState::NotRequested;
        self.mark_dirty();
    }

    pub(crate) fn enter_terminal(&mut self, status: SessionStatus, error: Option<String>) {
        debug_assert!(status.is_terminal());
        self.status = status;
        if let Some(message) = error {
            self.logs
                .push_with_severity(message.clone(), LogSeverity::Error, LogSource::Client);
            self.error = Some(message);
        }
        self.refresh = RefreshState::Pending;
        self.mark_dirty();
    }

    /// Marks socket and timer released; returns what was held so effects can be emitted.
    pub(crate) fn release_channels(&mut self) -> (bool, bool) {
        let had_socket = self.channel != ChannelState::Detached;
        let had_polling = self.polling;
        if had_socket || had_polling {
            self.channel = ChannelState::Detached;
            self.polling = false;
            self.mark_dirty();
        }
        (had_socket, had_polling)
    }

    pub(crate) fn set_channel(&mut self, channel: ChannelState, note: Option<String>) {
        if self.channel != channel || self.channel_note != note {
            self.channel = channel;
            self.channel_note = note;
            self.mark_dirty();
        }
    }

    pub(crate) fn replace_progress(&mut self, snapshot: ProgressSnapshot) {
        self.progress = Some(snapshot);
        self.mark_dirty();
    }

    pub(crate) fn set_current_step(&mut self, step: String) {
        self.progress.get_or_insert_with(ProgressSnapshot::default).current_step = Some(step);
        self.mark_dirty();
    }

    pub(crate) fn apply_polled_progress(
        &mut self,
        overall: Option<f64>,
        statistics: Option<Statistics>,
    ) {
        if overall.is_none() && statistics.is_none() {
            return;
        }
        let snapshot = self.progress.get_or_insert_with(ProgressSnapshot::default);
        if let Some(overall) = overall {
            snapshot.overall_progress = overall;
        }
        if let Some(statistics) = statistics {
            snapshot.statistics = statistics;
        }
        self.mark_dirty();
    }

    pub(crate) fn push_log(&mut self, text: String, source: LogSource) {
        self.logs.push(text, source);
        self.mark_dirty();
    }

    pub(crate) fn append_poll_batch(&mut self, lines: Vec<String>) {
        if self.logs.append_poll_batch(lines) > 0 {
            self.mark_dirty();
        }
    }

    pub(crate) fn finish_refresh(&mut self, refreshed: Vec<String>, failed: Vec<String>) {
        self.refresh = RefreshState::Done { refreshed, failed };
        self.mark_dirty();
    }
}
