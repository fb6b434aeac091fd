use std::fmt;

use chrono::{DateTime, Utc};
use monitor_core::{JobStatus, JobStatusReport, SessionId, SocketFrame};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    JobStarted {
        job: StartedJob,
        started_at: DateTime<Utc>,
    },
    JobStartFailed {
        error: ApiError,
    },
    SocketOpened {
        session_id: SessionId,
    },
    SocketFrame {
        session_id: SessionId,
        frame: SocketFrame,
    },
    SocketClosed {
        session_id: SessionId,
    },
    SocketFailed {
        session_id: SessionId,
        message: String,
    },
    PollDue {
        session_id: SessionId,
    },
    LogsFetched {
        session_id: SessionId,
        lines: Vec<String>,
    },
    StatusFetched {
        session_id: SessionId,
        report: JobStatusReport,
    },
    RefreshCompleted {
        refreshed: Vec<String>,
        failed: Vec<String>,
    },
}

/// Accepted start request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartedJob {
    pub session_id: SessionId,
    pub status: Option<JobStatus>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct ApiError {
    pub kind: FailureKind,
    pub message: String,
}

impl ApiError {
    pub(crate) fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    InvalidUrl,
    InvalidInput,
    HttpStatus(u16),
    Timeout,
    Decode,
    Network,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::InvalidUrl => write!(f, "invalid url"),
            FailureKind::InvalidInput => write!(f, "invalid input"),
            FailureKind::HttpStatus(code) => write!(f, "http status {code}"),
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::Decode => write!(f, "unexpected response body"),
            FailureKind::Network => write!(f, "network error"),
        }
    }
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("failed to start engine runtime: {0}")]
    Runtime(#[from] std::io::Error),
    #[error(transparent)]
    Api(#[from] ApiError),
}
