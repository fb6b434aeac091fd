use crate::{
    ChannelState, Effect, JobStatus, JobStatusReport, LogSource, MonitorState, Msg, RefreshState,
    SessionId, SessionStatus, SocketFrame,
};

/// Pure update function: applies a message to state and returns any effects.
///
/// Messages tagged with a session id other than the current one are stale and ignored.
pub fn update(mut state: MonitorState, msg: Msg) -> (MonitorState, Vec<Effect>) {
    let effects = match msg {
        Msg::StartRequested(request) => {
            if state.status() == SessionStatus::Starting {
                return (state, Vec::new());
            }
            let mut effects = abandon_session(&mut state);
            state.begin_start();
            effects.push(Effect::StartJob(request));
            effects
        }
        Msg::StartAccepted {
            session_id,
            started_at,
        } => {
            // A response for a start the user already cancelled or replaced.
            if state.status() != SessionStatus::Starting {
                return (state, Vec::new());
            }
            state.begin_processing(session_id.clone(), started_at);
            vec![
                Effect::OpenSocket {
                    session_id: session_id.clone(),
                },
                Effect::StartPolling { session_id },
            ]
        }
        Msg::StartRejected { message } => {
            if state.status() != SessionStatus::Starting {
                return (state, Vec::new());
            }
            finish(&mut state, SessionStatus::Failed, Some(message))
        }
        Msg::AttachRequested { session_id, at } => {
            if state.status() == SessionStatus::Processing
                && state.session_id() == Some(&session_id)
            {
                return (state, Vec::new());
            }
            // Close the previous socket before the new one is opened.
            let mut effects = abandon_session(&mut state);
            state.reset_session();
            state.begin_processing(session_id.clone(), at);
            effects.push(Effect::OpenSocket {
                session_id: session_id.clone(),
            });
            effects.push(Effect::StartPolling { session_id });
            effects
        }
        Msg::SocketOpened { session_id } => {
            if is_current(&state, &session_id) && state.channel() == ChannelState::Connecting {
                state.set_channel(ChannelState::Live, None);
            }
            Vec::new()
        }
        Msg::SocketFrame { session_id, frame } => {
            if !is_current(&state, &session_id) {
                return (state, Vec::new());
            }
            apply_frame(&mut state, frame)
        }
        Msg::SocketClosed { session_id } => {
            if is_current(&state, &session_id) && state.channel() != ChannelState::Detached {
                let note = (state.status() == SessionStatus::Processing)
                    .then(|| "progress socket closed; polling".to_string());
                state.set_channel(ChannelState::Detached, note);
            }
            Vec::new()
        }
        Msg::SocketFailed {
            session_id,
            message,
        } => {
            if is_current(&state, &session_id) && state.channel() != ChannelState::Detached {
                state.set_channel(ChannelState::Detached, Some(message));
            }
            Vec::new()
        }
        Msg::PollDue { session_id } => {
            let should_poll = is_current(&state, &session_id)
                && state.status() == SessionStatus::Processing
                && state.is_polling()
                && state.channel() != ChannelState::Live;
            if should_poll {
                vec![
                    Effect::FetchLogs {
                        session_id: session_id.clone(),
                    },
                    Effect::FetchStatus { session_id },
                ]
            } else {
                Vec::new()
            }
        }
        Msg::LogsPolled { session_id, lines } => {
            if is_current(&state, &session_id) {
                state.append_poll_batch(lines);
            }
            Vec::new()
        }
        Msg::StatusPolled { session_id, report } => {
            if is_current(&state, &session_id) && state.status() == SessionStatus::Processing {
                apply_status_report(&mut state, report)
            } else {
                Vec::new()
            }
        }
        Msg::RefreshCompleted { refreshed, failed } => {
            if *state.refresh() == RefreshState::Pending {
                state.finish_refresh(refreshed, failed);
            }
            Vec::new()
        }
        Msg::CancelClicked => {
            if !state.status().is_active() {
                return (state, Vec::new());
            }
            let effects = abandon_session(&mut state);
            state.reset_session();
            effects
        }
        Msg::Teardown => {
            let holds_nothing = state.status() == SessionStatus::Idle
                && state.session().is_none()
                && state.channel() == ChannelState::Detached
                && !state.is_polling();
            if holds_nothing {
                return (state, Vec::new());
            }
            let effects = abandon_session(&mut state);
            state.reset_session();
            effects
        }
        Msg::Tick => Vec::new(),
    };

    (state, effects)
}

fn is_current(state: &MonitorState, session_id: &SessionId) -> bool {
    state.session_id() == Some(session_id)
}

fn apply_frame(state: &mut MonitorState, frame: SocketFrame) -> Vec<Effect> {
    let processing = state.status() == SessionStatus::Processing;
    match frame {
        SocketFrame::ProgressUpdate(snapshot) => {
            if processing {
                state.replace_progress(snapshot);
            }
            Vec::new()
        }
        SocketFrame::ProcessingComplete => {
            if processing {
                finish(state, SessionStatus::Completed, None)
            } else {
                Vec::new()
            }
        }
        SocketFrame::StepProgress { step, status } => {
            let line = match (&step, &status) {
                (Some(step), Some(status)) => format!("{step}: {status}"),
                (Some(step), None) => step.clone(),
                (None, Some(status)) => status.clone(),
                (None, None) => return Vec::new(),
            };
            state.push_log(line, LogSource::Socket);
            if let (true, Some(step)) = (processing, step) {
                state.set_current_step(step);
            }
            Vec::new()
        }
        SocketFrame::Log { message } => {
            state.push_log(message, LogSource::Socket);
            Vec::new()
        }
        SocketFrame::Unknown { .. } => Vec::new(),
    }
}

fn apply_status_report(state: &mut MonitorState, report: JobStatusReport) -> Vec<Effect> {
    match report.status {
        JobStatus::Completed => {
            state.apply_polled_progress(report.progress, report.statistics);
            finish(state, SessionStatus::Completed, None)
        }
        JobStatus::Failed => {
            let message = report
                .error_message
                .unwrap_or_else(|| "job failed".to_string());
            finish(state, SessionStatus::Failed, Some(message))
        }
        JobStatus::Initializing | JobStatus::Processing | JobStatus::Unknown(_) => {
            state.apply_polled_progress(report.progress, report.statistics);
            Vec::new()
        }
    }
}

/// Enters a terminal status: releases socket and timer, then asks for one cache refresh.
fn finish(state: &mut MonitorState, status: SessionStatus, error: Option<String>) -> Vec<Effect> {
    let mut effects = release_channels(state);
    state.enter_terminal(status, error);
    effects.push(Effect::RefreshCaches);
    effects
}

/// Effects that free everything the current session holds, including in-flight requests.
fn abandon_session(state: &mut MonitorState) -> Vec<Effect> {
    let mut effects = Vec::new();
    if state.status().is_active() || *state.refresh() == RefreshState::Pending {
        effects.push(Effect::CancelInFlight);
    }
    effects.extend(release_channels(state));
    effects
}

fn release_channels(state: &mut MonitorState) -> Vec<Effect> {
    let session_id = state.session_id().cloned();
    let (had_socket, had_polling) = state.release_channels();
    let mut effects = Vec::new();
    if let (true, Some(session_id)) = (had_socket, session_id) {
        effects.push(Effect::CloseSocket { session_id });
    }
    if had_polling {
        effects.push(Effect::StopPolling);
    }
    effects
}
