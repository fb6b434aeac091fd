use chrono::{DateTime, Utc};

use crate::{JobStatusReport, SessionId, SocketFrame, StartRequest};

#[derive(Debug, Clone, PartialEq)]
pub enum Msg {
    /// User asked to start a new backend job.
    StartRequested(StartRequest),
    /// Backend accepted the start request.
    StartAccepted {
        session_id: SessionId,
        started_at: DateTime<Utc>,
    },
    /// Start request failed (network error or non-2xx response).
    StartRejected { message: String },
    /// User asked to follow an already running session.
    AttachRequested {
        session_id: SessionId,
        at: DateTime<Utc>,
    },
    /// Progress socket handshake finished.
    SocketOpened { session_id: SessionId },
    /// Progress socket delivered a decoded frame.
    SocketFrame {
        session_id: SessionId,
        frame: SocketFrame,
    },
    /// Progress socket closed, by either side.
    SocketClosed { session_id: SessionId },
    /// Progress socket failed to connect or errored mid-stream.
    SocketFailed {
        session_id: SessionId,
        message: String,
    },
    /// Polling timer fired.
    PollDue { session_id: SessionId },
    /// Logs endpoint returned its tail.
    LogsPolled {
        session_id: SessionId,
        lines: Vec<String>,
    },
    /// Job status endpoint answered.
    StatusPolled {
        session_id: SessionId,
        report: JobStatusReport,
    },
    /// Post-terminal cache refresh finished.
    RefreshCompleted {
        refreshed: Vec<String>,
        failed: Vec<String>,
    },
    /// User clicked Cancel.
    CancelClicked,
    /// Owner is going away; release every resource.
    Teardown,
    /// Render tick.
    Tick,
}
