#![allow(dead_code)]

use std::sync::Once;

use chrono::{TimeZone, Utc};
use monitor_core::{update, Effect, MonitorState, Msg, SessionId, SocketFrame, StartRequest};

pub fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(monitor_logging::initialize_for_tests);
}

pub fn sid(raw: &str) -> SessionId {
    SessionId::new(raw)
}

pub fn ingest_request() -> StartRequest {
    StartRequest::new(
        "/api/archive/ingest",
        serde_json::json!({ "path": "/data/archive" }),
    )
}

/// Drives a fresh state through a successful start with the given session id.
pub fn processing(session: &str) -> MonitorState {
    let (state, _) = update(MonitorState::new(), Msg::StartRequested(ingest_request()));
    let (state, _) = update(
        state,
        Msg::StartAccepted {
            session_id: sid(session),
            started_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
        },
    );
    state
}

/// Like [`processing`] but with the socket handshake completed.
pub fn live(session: &str) -> MonitorState {
    let (state, _) = update(
        processing(session),
        Msg::SocketOpened {
            session_id: sid(session),
        },
    );
    state
}

pub fn frame(state: MonitorState, session: &str, frame: SocketFrame) -> (MonitorState, Vec<Effect>) {
    update(
        state,
        Msg::SocketFrame {
            session_id: sid(session),
            frame,
        },
    )
}
