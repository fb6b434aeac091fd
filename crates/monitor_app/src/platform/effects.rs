use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use monitor_core::{Effect, Msg};
use monitor_engine::{EngineEvent, EngineHandle};
use monitor_logging::{monitor_debug, monitor_info, monitor_warn};

/// Executes core effects on the engine and feeds engine events back as messages.
pub struct EffectRunner {
    engine: EngineHandle,
    forwarder: Option<thread::JoinHandle<()>>,
}

impl EffectRunner {
    pub fn new(engine: EngineHandle, msg_tx: mpsc::Sender<Msg>) -> Self {
        let forwarder = spawn_event_loop(engine.clone(), msg_tx);
        Self {
            engine,
            forwarder: Some(forwarder),
        }
    }

    pub fn enqueue(&self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::StartJob(request) => {
                    monitor_info!("StartJob endpoint={}", request.endpoint);
                    self.engine.start_job(request);
                }
                Effect::OpenSocket { session_id } => self.engine.open_socket(session_id),
                Effect::CloseSocket { session_id } => self.engine.close_socket(session_id),
                Effect::StartPolling { session_id } => self.engine.start_polling(session_id),
                Effect::StopPolling => self.engine.stop_polling(),
                Effect::FetchLogs { session_id } => self.engine.fetch_logs(session_id),
                Effect::FetchStatus { session_id } => self.engine.fetch_status(session_id),
                Effect::RefreshCaches => self.engine.refresh(),
                Effect::CancelInFlight => self.engine.cancel_in_flight(),
            }
        }
    }

    /// Stops the engine and waits for the forwarding thread to drain.
    pub fn shutdown(&mut self) {
        self.engine.shutdown();
        if let Some(forwarder) = self.forwarder.take() {
            if forwarder.join().is_err() {
                monitor_warn!("Event forwarder panicked");
            }
        }
    }
}

fn spawn_event_loop(engine: EngineHandle, msg_tx: mpsc::Sender<Msg>) -> thread::JoinHandle<()> {
    thread::spawn(move || loop {
        match engine.recv_timeout(Duration::from_millis(50)) {
            Ok(event) => {
                if msg_tx.send(to_msg(event)).is_err() {
                    break;
                }
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                monitor_debug!("Engine event channel closed");
                break;
            }
        }
    })
}

pub(crate) fn to_msg(event: EngineEvent) -> Msg {
    match event {
        EngineEvent::JobStarted { job, started_at } => Msg::StartAccepted {
            session_id: job.session_id,
            started_at,
        },
        EngineEvent::JobStartFailed { error } => Msg::StartRejected {
            message: error.to_string(),
        },
        EngineEvent::SocketOpened { session_id } => Msg::SocketOpened { session_id },
        EngineEvent::SocketFrame { session_id, frame } => Msg::SocketFrame { session_id, frame },
        EngineEvent::SocketClosed { session_id } => Msg::SocketClosed { session_id },
        EngineEvent::SocketFailed {
            session_id,
            message,
        } => Msg::SocketFailed {
            session_id,
            message,
        },
        EngineEvent::PollDue { session_id } => Msg::PollDue { session_id },
        EngineEvent::LogsFetched { session_id, lines } => Msg::LogsPolled { session_id, lines },
        EngineEvent::StatusFetched { session_id, report } => {
            Msg::StatusPolled { session_id, report }
        }
        EngineEvent::RefreshCompleted { refreshed, failed } => {
            Msg::RefreshCompleted { refreshed, failed }
        }
    }
}
