mod common;

use chrono::Utc;
use common::{frame, init_logging, live, processing, sid};
use monitor_core::{
    update, ChannelState, Effect, LogSource, Msg, SessionStatus, SocketFrame,
};
use pretty_assertions::assert_eq;

#[test]
fn teardown_twice_is_idempotent() {
    init_logging();
    let (state, first) = update(live("abc"), Msg::Teardown);
    assert_eq!(
        first,
        vec![
            Effect::CancelInFlight,
            Effect::CloseSocket {
                session_id: sid("abc")
            },
            Effect::StopPolling,
        ]
    );
    assert_eq!(state.channel(), ChannelState::Detached);
    assert!(!state.is_polling());

    let (state, second) = update(state, Msg::Teardown);
    assert!(second.is_empty());
    assert_eq!(state.channel(), ChannelState::Detached);
    assert_eq!(state.status(), SessionStatus::Idle);
}

#[test]
fn teardown_after_completion_only_cancels_pending_refresh() {
    init_logging();
    let (state, _) = frame(live("abc"), "abc", SocketFrame::ProcessingComplete);
    let (state, effects) = update(state, Msg::Teardown);

    // Socket and timer were already released on completion.
    assert_eq!(effects, vec![Effect::CancelInFlight]);
    let (_, effects) = update(state, Msg::Teardown);
    assert!(effects.is_empty());
}

#[test]
fn attach_closes_previous_socket_before_opening_new() {
    init_logging();
    let (state, effects) = update(
        live("first"),
        Msg::AttachRequested {
            session_id: sid("second"),
            at: Utc::now(),
        },
    );

    assert_eq!(
        effects,
        vec![
            Effect::CancelInFlight,
            Effect::CloseSocket {
                session_id: sid("first")
            },
            Effect::StopPolling,
            Effect::OpenSocket {
                session_id: sid("second")
            },
            Effect::StartPolling {
                session_id: sid("second")
            },
        ]
    );
    assert_eq!(state.session_id(), Some(&sid("second")));
    assert_eq!(state.channel(), ChannelState::Connecting);

    // Frames from the replaced session are stale.
    let (state, effects) = frame(state, "first", SocketFrame::ProcessingComplete);
    assert!(effects.is_empty());
    assert_eq!(state.status(), SessionStatus::Processing);
}

#[test]
fn attaching_the_same_live_session_is_noop() {
    init_logging();
    let (_, effects) = update(
        live("abc"),
        Msg::AttachRequested {
            session_id: sid("abc"),
            at: Utc::now(),
        },
    );
    assert!(effects.is_empty());
}

#[test]
fn poll_fetches_only_without_live_socket() {
    init_logging();
    let due = || Msg::PollDue {
        session_id: sid("abc"),
    };

    // Handshake still pending: poll.
    let (state, effects) = update(processing("abc"), due());
    assert_eq!(
        effects,
        vec![
            Effect::FetchLogs {
                session_id: sid("abc")
            },
            Effect::FetchStatus {
                session_id: sid("abc")
            },
        ]
    );

    // Socket live: skip.
    let (state, effects) = update(
        state,
        Msg::SocketOpened {
            session_id: sid("abc"),
        },
    );
    assert!(effects.is_empty());
    let (state, effects) = update(state, due());
    assert!(effects.is_empty());

    // Socket closed: no reconnect, polling resumes.
    let (state, effects) = update(
        state,
        Msg::SocketClosed {
            session_id: sid("abc"),
        },
    );
    assert!(effects.is_empty());
    assert_eq!(state.channel(), ChannelState::Detached);
    let (_, effects) = update(state, due());
    assert_eq!(effects.len(), 2);
}

#[test]
fn socket_failure_degrades_to_polling() {
    init_logging();
    let (state, effects) = update(
        processing("abc"),
        Msg::SocketFailed {
            session_id: sid("abc"),
            message: "connection refused".to_string(),
        },
    );
    assert!(effects.is_empty());

    let view = state.view();
    assert_eq!(view.status, SessionStatus::Processing);
    assert_eq!(view.channel, ChannelState::Detached);
    assert_eq!(view.channel_note.as_deref(), Some("connection refused"));
    assert!(view.polling);
}

#[test]
fn poll_batches_append_only_new_lines() {
    init_logging();
    let batch = |lines: &[&str]| Msg::LogsPolled {
        session_id: sid("abc"),
        lines: lines.iter().map(|s| s.to_string()).collect(),
    };

    let (state, _) = update(processing("abc"), batch(&["INFO a", "INFO b"]));
    let (state, _) = update(state, batch(&["INFO b", "WARNING c"]));
    let (state, _) = update(state, batch(&["INFO b", "WARNING c"]));

    let texts: Vec<_> = state.logs().entries().map(|e| e.text.as_str()).collect();
    assert_eq!(texts, vec!["INFO a", "INFO b", "WARNING c"]);
}

#[test]
fn socket_and_poll_duplicates_are_both_kept() {
    init_logging();
    let (state, _) = frame(
        processing("abc"),
        "abc",
        SocketFrame::Log {
            message: "INFO embedded 40 chunks".to_string(),
        },
    );
    let (state, _) = update(
        state,
        Msg::LogsPolled {
            session_id: sid("abc"),
            lines: vec!["INFO embedded 40 chunks".to_string()],
        },
    );

    let entries: Vec<_> = state.logs().entries().collect();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].text, entries[1].text);
    assert_eq!(entries[0].source, LogSource::Socket);
    assert_eq!(entries[1].source, LogSource::Poll);
}

#[test]
fn unknown_frames_are_ignored() {
    init_logging();
    let mut state = live("abc");
    assert!(state.consume_dirty());

    let (mut state, effects) = frame(
        state,
        "abc",
        SocketFrame::Unknown {
            kind: "heartbeat".to_string(),
        },
    );
    assert!(effects.is_empty());
    assert!(!state.consume_dirty());
}

#[test]
fn transform_step_frames_set_step_and_log() {
    init_logging();
    let (state, _) = frame(
        live("t-1"),
        "t-1",
        SocketFrame::StepProgress {
            step: Some("vocabulary_projection".to_string()),
            status: Some("running".to_string()),
        },
    );

    let view = state.view();
    assert_eq!(view.current_step.as_deref(), Some("vocabulary_projection"));
    assert_eq!(view.logs.last().unwrap().text, "vocabulary_projection: running");
}

#[test]
fn cancel_releases_everything_and_discards_session() {
    init_logging();
    let (state, effects) = update(live("abc"), Msg::CancelClicked);
    assert_eq!(
        effects,
        vec![
            Effect::CancelInFlight,
            Effect::CloseSocket {
                session_id: sid("abc")
            },
            Effect::StopPolling,
        ]
    );
    assert_eq!(state.status(), SessionStatus::Idle);
    assert!(state.session().is_none());

    let (_, effects) = update(state, Msg::CancelClicked);
    assert!(effects.is_empty());
}
