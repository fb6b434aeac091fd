use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use chrono::Utc;
use monitor_core::{SessionId, StartRequest};
use monitor_logging::{monitor_debug, monitor_info, monitor_warn};
use tokio::runtime::{Handle, Runtime};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::backend::{Backend, ReqwestBackend};
use crate::settings::BackendSettings;
use crate::socket::{progress_socket_url, run_progress_socket};
use crate::{EngineError, EngineEvent};

/// How long a retired socket or timer task may take to wind down.
const RETIRE_TIMEOUT: Duration = Duration::from_secs(2);

enum EngineCommand {
    StartJob { request: StartRequest },
    OpenSocket { session_id: SessionId },
    CloseSocket { session_id: SessionId },
    StartPolling { session_id: SessionId },
    StopPolling,
    FetchLogs { session_id: SessionId },
    FetchStatus { session_id: SessionId },
    Refresh,
    CancelInFlight,
    Shutdown,
}

/// Handle to the engine thread. Cloning shares the same engine.
#[derive(Clone)]
pub struct EngineHandle {
    cmd_tx: mpsc::Sender<EngineCommand>,
    event_rx: Arc<Mutex<mpsc::Receiver<EngineEvent>>>,
    worker: Arc<Mutex<Option<thread::JoinHandle<()>>>>,
}

impl EngineHandle {
    pub fn new(settings: BackendSettings) -> Result<Self, EngineError> {
        let backend = Arc::new(ReqwestBackend::new(settings.clone())?);
        Self::with_backend(settings, backend)
    }

    pub fn with_backend(
        settings: BackendSettings,
        backend: Arc<dyn Backend>,
    ) -> Result<Self, EngineError> {
        let (cmd_tx, cmd_rx) = mpsc::channel();
        let (event_tx, event_rx) = mpsc::channel();
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("monitor-engine-io")
            .enable_all()
            .build()?;

        let worker = thread::Builder::new()
            .name("monitor-engine".to_string())
            .spawn(move || run_engine(runtime, settings, backend, cmd_rx, event_tx))?;

        Ok(Self {
            cmd_tx,
            event_rx: Arc::new(Mutex::new(event_rx)),
            worker: Arc::new(Mutex::new(Some(worker))),
        })
    }

    pub fn start_job(&self, request: StartRequest) {
        self.send(EngineCommand::StartJob { request });
    }

    /// Opens the progress socket, closing any socket that is already open first.
    pub fn open_socket(&self, session_id: SessionId) {
        self.send(EngineCommand::OpenSocket { session_id });
    }

    /// Closes the socket if it belongs to `session_id`. Closing twice is harmless.
    pub fn close_socket(&self, session_id: SessionId) {
        self.send(EngineCommand::CloseSocket { session_id });
    }

    pub fn start_polling(&self, session_id: SessionId) {
        self.send(EngineCommand::StartPolling { session_id });
    }

    pub fn stop_polling(&self) {
        self.send(EngineCommand::StopPolling);
    }

    pub fn fetch_logs(&self, session_id: SessionId) {
        self.send(EngineCommand::FetchLogs { session_id });
    }

    pub fn fetch_status(&self, session_id: SessionId) {
        self.send(EngineCommand::FetchStatus { session_id });
    }

    pub fn refresh(&self) {
        self.send(EngineCommand::Refresh);
    }

    /// Aborts every in-flight HTTP request. Aborted requests emit no event.
    pub fn cancel_in_flight(&self) {
        self.send(EngineCommand::CancelInFlight);
    }

    pub fn try_recv(&self) -> Option<EngineEvent> {
        self.event_rx.lock().ok()?.try_recv().ok()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Result<EngineEvent, RecvTimeoutError> {
        let rx = self
            .event_rx
            .lock()
            .map_err(|_| RecvTimeoutError::Disconnected)?;
        rx.recv_timeout(timeout)
    }

    /// Closes the socket, stops the timer, aborts requests and joins the engine thread.
    pub fn shutdown(&self) {
        self.send(EngineCommand::Shutdown);
        let worker = self.worker.lock().ok().and_then(|mut guard| guard.take());
        if let Some(worker) = worker {
            if worker.join().is_err() {
                monitor_warn!("Engine thread panicked during shutdown");
            }
        }
    }

    fn send(&self, command: EngineCommand) {
        if self.cmd_tx.send(command).is_err() {
            monitor_debug!("Engine already stopped; command dropped");
        }
    }
}

fn run_engine(
    runtime: Runtime,
    settings: BackendSettings,
    backend: Arc<dyn Backend>,
    cmd_rx: mpsc::Receiver<EngineCommand>,
    event_tx: mpsc::Sender<EngineEvent>,
) {
    let mut supervisor = Supervisor::new(settings, backend, event_tx, runtime.handle().clone());
    while let Ok(command) = cmd_rx.recv() {
        if matches!(command, EngineCommand::Shutdown) {
            break;
        }
        supervisor.handle(command);
    }
    supervisor.release_all();
    runtime.shutdown_timeout(RETIRE_TIMEOUT);
    monitor_info!("Engine stopped");
}

/// A long-lived task bound to one session, stopped through its token.
struct ActiveTask {
    session_id: SessionId,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl ActiveTask {
    /// Cancels the task and waits up to `limit` for it to finish; a task
    /// still running after that is aborted. Returns whether it stopped in time.
    fn retire(self, runtime: &Handle, limit: Duration) -> bool {
        self.cancel.cancel();
        let abort = self.handle.abort_handle();
        let handle = self.handle;
        let waited = runtime.block_on(async { tokio::time::timeout(limit, handle).await });
        if waited.is_err() {
            monitor_warn!("Task for {} did not stop in time, aborting", self.session_id);
            abort.abort();
            return false;
        }
        true
    }
}

/// Owns the engine's resources: at most one socket, at most one polling timer,
/// and the token that scopes in-flight requests.
struct Supervisor {
    settings: BackendSettings,
    backend: Arc<dyn Backend>,
    events: mpsc::Sender<EngineEvent>,
    runtime: Handle,
    socket: Option<ActiveTask>,
    polling: Option<ActiveTask>,
    requests: CancellationToken,
}

impl Supervisor {
    fn new(
        settings: BackendSettings,
        backend: Arc<dyn Backend>,
        events: mpsc::Sender<EngineEvent>,
        runtime: Handle,
    ) -> Self {
        Self {
            settings,
            backend,
            events,
            runtime,
            socket: None,
            polling: None,
            requests: CancellationToken::new(),
        }
    }

    fn handle(&mut self, command: EngineCommand) {
        match command {
            EngineCommand::StartJob { request } => self.start_job(request),
            EngineCommand::OpenSocket { session_id } => self.open_socket(session_id),
            EngineCommand::CloseSocket { session_id } => {
                if self.socket.as_ref().map(|task| &task.session_id) == Some(&session_id) {
                    if let Some(task) = self.socket.take() {
                        self.retire(task);
                    }
                }
            }
            EngineCommand::StartPolling { session_id } => self.start_polling(session_id),
            EngineCommand::StopPolling => {
                if let Some(task) = self.polling.take() {
                    self.retire(task);
                }
            }
            EngineCommand::FetchLogs { session_id } => self.fetch_logs(session_id),
            EngineCommand::FetchStatus { session_id } => self.fetch_status(session_id),
            EngineCommand::Refresh => self.refresh(),
            EngineCommand::CancelInFlight => self.cancel_in_flight(),
            EngineCommand::Shutdown => {}
        }
    }

    fn start_job(&self, request: StartRequest) {
        let backend = self.backend.clone();
        let events = self.events.clone();
        let token = self.requests.clone();
        self.runtime.spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {
                    monitor_info!("Start request to {} cancelled", request.endpoint);
                }
                result = backend.start_job(&request) => {
                    let event = match result {
                        Ok(job) => {
                            monitor_info!("Job started at {}: session {}", request.endpoint, job.session_id);
                            EngineEvent::JobStarted { job, started_at: Utc::now() }
                        }
                        Err(error) => {
                            monitor_warn!("Start request to {} failed: {}", request.endpoint, error);
                            EngineEvent::JobStartFailed { error }
                        }
                    };
                    let _ = events.send(event);
                }
            }
        });
    }

    fn open_socket(&mut self, session_id: SessionId) {
        if let Some(previous) = self.socket.take() {
            monitor_debug!(
                "Closing socket for {} before opening {}",
                previous.session_id,
                session_id
            );
            self.retire(previous);
        }

        let url = match progress_socket_url(&self.settings, &session_id) {
            Ok(url) => url,
            Err(err) => {
                monitor_warn!("No progress socket for {}: {}", session_id, err);
                let _ = self.events.send(EngineEvent::SocketFailed {
                    session_id,
                    message: err.to_string(),
                });
                return;
            }
        };

        let cancel = CancellationToken::new();
        let handle = self.runtime.spawn(run_progress_socket(
            url,
            session_id.clone(),
            self.events.clone(),
            cancel.clone(),
        ));
        self.socket = Some(ActiveTask {
            session_id,
            cancel,
            handle,
        });
    }

    fn start_polling(&mut self, session_id: SessionId) {
        if let Some(previous) = self.polling.take() {
            self.retire(previous);
        }

        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let events = self.events.clone();
        let period = self.settings.poll_interval;
        let task_session = session_id.clone();
        let handle = self.runtime.spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // The first tick completes immediately; polling starts one period later.
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        let due = EngineEvent::PollDue { session_id: task_session.clone() };
                        if events.send(due).is_err() {
                            break;
                        }
                    }
                }
            }
        });
        self.polling = Some(ActiveTask {
            session_id,
            cancel,
            handle,
        });
    }

    fn fetch_logs(&self, session_id: SessionId) {
        let backend = self.backend.clone();
        let events = self.events.clone();
        let token = self.requests.clone();
        self.runtime.spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                result = backend.fetch_logs(&session_id) => match result {
                    Ok(lines) => {
                        let _ = events.send(EngineEvent::LogsFetched { session_id, lines });
                    }
                    Err(err) => monitor_warn!("Log poll for {} failed: {}", session_id, err),
                }
            }
        });
    }

    fn fetch_status(&self, session_id: SessionId) {
        let backend = self.backend.clone();
        let events = self.events.clone();
        let token = self.requests.clone();
        self.runtime.spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                result = backend.job_status(&session_id) => match result {
                    Ok(report) => {
                        let _ = events.send(EngineEvent::StatusFetched { session_id, report });
                    }
                    Err(err) => monitor_warn!("Status poll for {} failed: {}", session_id, err),
                }
            }
        });
    }

    fn refresh(&self) {
        let backend = self.backend.clone();
        let events = self.events.clone();
        let token = self.requests.clone();
        let endpoints = self.settings.refresh_endpoints.clone();
        self.runtime.spawn(async move {
            let refresh_all = async {
                let mut refreshed = Vec::new();
                let mut failed = Vec::new();
                for endpoint in endpoints {
                    match backend.refresh(&endpoint).await {
                        Ok(()) => refreshed.push(endpoint),
                        Err(err) => {
                            monitor_warn!("Refresh of {} failed: {}", endpoint, err);
                            failed.push(endpoint);
                        }
                    }
                }
                (refreshed, failed)
            };
            tokio::select! {
                _ = token.cancelled() => {}
                (refreshed, failed) = refresh_all => {
                    let _ = events.send(EngineEvent::RefreshCompleted { refreshed, failed });
                }
            }
        });
    }

    fn cancel_in_flight(&mut self) {
        self.requests.cancel();
        self.requests = CancellationToken::new();
    }

    /// Stops a task and waits briefly so a socket can send its close frame.
    fn retire(&self, task: ActiveTask) {
        task.retire(&self.runtime, RETIRE_TIMEOUT);
    }

    fn release_all(&mut self) {
        self.cancel_in_flight();
        if let Some(task) = self.socket.take() {
            self.retire(task);
        }
        if let Some(task) = self.polling.take() {
            self.retire(task);
        }
    }
}
