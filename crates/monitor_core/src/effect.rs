use crate::{SessionId, StartRequest};

#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    StartJob(StartRequest),
    OpenSocket { session_id: SessionId },
    CloseSocket { session_id: SessionId },
    StartPolling { session_id: SessionId },
    StopPolling,
    FetchLogs { session_id: SessionId },
    FetchStatus { session_id: SessionId },
    RefreshCaches,
    /// Abort every in-flight HTTP request.
    CancelInFlight,
}
