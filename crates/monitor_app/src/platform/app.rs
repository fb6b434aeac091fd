use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use monitor_core::{update, MonitorState, Msg, SessionId, SessionStatus, StartRequest};
use monitor_engine::EngineHandle;
use monitor_logging::{monitor_debug, monitor_info};

use super::effects::EffectRunner;
use super::render::Renderer;

/// How often the loop wakes up when nothing arrives.
const IDLE_TICK: Duration = Duration::from_millis(250);

/// What the driver should follow.
#[derive(Debug, Clone)]
pub enum Follow {
    Start(StartRequest),
    Attach(SessionId),
}

/// Final state of a followed session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionOutcome {
    pub status: SessionStatus,
    pub session_id: Option<SessionId>,
    pub started_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

impl SessionOutcome {
    pub fn failed(&self) -> bool {
        self.status == SessionStatus::Failed
    }

    /// Followed session was cancelled before it finished.
    pub fn interrupted(&self) -> bool {
        self.status == SessionStatus::Idle
    }
}

/// Single-threaded update loop: the only writer of `MonitorState`.
pub struct SessionDriver<W: Write> {
    state: MonitorState,
    runner: EffectRunner,
    msg_rx: mpsc::Receiver<Msg>,
    renderer: Renderer,
    out: W,
    interrupt: Arc<AtomicBool>,
}

impl<W: Write> SessionDriver<W> {
    pub fn new(engine: EngineHandle, out: W) -> Self {
        let (msg_tx, msg_rx) = mpsc::channel();
        Self {
            state: MonitorState::new(),
            runner: EffectRunner::new(engine, msg_tx),
            msg_rx,
            renderer: Renderer::new(),
            out,
            interrupt: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Flag that, once raised, cancels the followed session on the next
    /// loop turn.
    pub fn interrupt_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.interrupt)
    }

    /// Follows the session until it is terminal and its cache refresh settled,
    /// then tears everything down. The engine is shut down on every path.
    pub fn run(&mut self, follow: Follow) -> Result<SessionOutcome> {
        let result = self.follow(follow);
        self.teardown();
        result
    }

    #[cfg(test)]
    pub fn output(&self) -> &W {
        &self.out
    }

    fn follow(&mut self, follow: Follow) -> Result<SessionOutcome> {
        let first = match follow {
            Follow::Start(request) => Msg::StartRequested(request),
            Follow::Attach(session_id) => Msg::AttachRequested {
                session_id,
                at: Utc::now(),
            },
        };
        self.dispatch(first)?;

        while !self.state.is_settled() {
            if self.interrupt.swap(false, Ordering::SeqCst) {
                monitor_info!("Interrupted; cancelling {:?}", self.state.session_id());
                self.dispatch(Msg::CancelClicked)?;
                break;
            }
            match self.msg_rx.recv_timeout(IDLE_TICK) {
                Ok(msg) => self.dispatch(msg)?,
                Err(RecvTimeoutError::Timeout) => self.dispatch(Msg::Tick)?,
                Err(RecvTimeoutError::Disconnected) => {
                    bail!("engine stopped before the session finished")
                }
            }
        }

        let outcome = SessionOutcome {
            status: self.state.status(),
            session_id: self.state.session_id().cloned(),
            started_at: self.state.session().map(|session| session.started_at),
            error: self.state.error().map(str::to_string),
        };
        monitor_info!(
            "Session {:?} settled as {}",
            outcome.session_id,
            outcome.status
        );
        Ok(outcome)
    }

    fn dispatch(&mut self, msg: Msg) -> Result<()> {
        let state = std::mem::take(&mut self.state);
        let (mut state, effects) = update(state, msg);
        self.runner.enqueue(effects);
        let was_dirty = state.consume_dirty();
        self.state = state;

        if was_dirty {
            let view = self.state.view();
            self.renderer
                .render(&view, &mut self.out)
                .context("writing to the terminal")?;
        }
        Ok(())
    }

    fn teardown(&mut self) {
        let state = std::mem::take(&mut self.state);
        let (state, effects) = update(state, Msg::Teardown);
        monitor_debug!("Teardown issued {} effects", effects.len());
        self.runner.enqueue(effects);
        self.state = state;
        self.runner.shutdown();
    }
}
