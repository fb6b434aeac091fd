use std::sync::mpsc;

use futures_util::StreamExt;
use monitor_core::SessionId;
use monitor_logging::{monitor_debug, monitor_info, monitor_warn};
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::frame::decode_frame;
use crate::settings::{session_path_url, BackendSettings};
use crate::{ApiError, EngineEvent, FailureKind};

/// Progress socket URL for a session: `http` becomes `ws`, `https` becomes `wss`.
pub fn progress_socket_url(
    settings: &BackendSettings,
    session_id: &SessionId,
) -> Result<Url, ApiError> {
    let mut base = settings
        .socket_base_url
        .clone()
        .unwrap_or_else(|| settings.base_url.clone());
    let scheme = match base.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => {
            return Err(ApiError::new(
                FailureKind::InvalidUrl,
                format!("unsupported scheme for progress socket: {other}"),
            ))
        }
    };
    base.set_scheme(scheme).map_err(|()| {
        ApiError::new(FailureKind::InvalidUrl, format!("cannot use {scheme} for {base}"))
    })?;
    session_path_url(&base, &settings.socket_path, session_id)
}

/// Follows one progress socket until the server closes it, it errors, or `cancel` fires.
///
/// Emits `SocketOpened` once connected, a `SocketFrame` per decodable text frame,
/// and finally `SocketClosed` or `SocketFailed`. Never reconnects.
pub(crate) async fn run_progress_socket(
    url: Url,
    session_id: SessionId,
    events: mpsc::Sender<EngineEvent>,
    cancel: CancellationToken,
) {
    let connect = tokio_tungstenite::connect_async(url.as_str());
    let (mut stream, _response) = tokio::select! {
        _ = cancel.cancelled() => {
            monitor_debug!("Progress socket for {} cancelled before connecting", session_id);
            let _ = events.send(EngineEvent::SocketClosed { session_id });
            return;
        }
        result = connect => match result {
            Ok(pair) => pair,
            Err(err) => {
                monitor_warn!("Progress socket for {} failed to connect: {}", session_id, err);
                let _ = events.send(EngineEvent::SocketFailed {
                    session_id,
                    message: err.to_string(),
                });
                return;
            }
        }
    };

    monitor_info!("Progress socket open for {} at {}", session_id, url);
    let _ = events.send(EngineEvent::SocketOpened {
        session_id: session_id.clone(),
    });

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                // Fails harmlessly if the peer already closed.
                if let Err(err) = stream.close(None).await {
                    monitor_debug!("Progress socket for {} already closed: {}", session_id, err);
                }
                break;
            }
            next = stream.next() => match next {
                Some(Ok(Message::Text(text))) => match decode_frame(text.as_str()) {
                    Ok(frame) => {
                        let _ = events.send(EngineEvent::SocketFrame {
                            session_id: session_id.clone(),
                            frame,
                        });
                    }
                    Err(err) => {
                        monitor_warn!("Dropping frame on socket {}: {}", session_id, err);
                    }
                },
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(err)) => {
                    monitor_warn!("Progress socket for {} errored: {}", session_id, err);
                    let _ = events.send(EngineEvent::SocketFailed {
                        session_id,
                        message: err.to_string(),
                    });
                    return;
                }
            }
        }
    }

    monitor_info!("Progress socket closed for {}", session_id);
    let _ = events.send(EngineEvent::SocketClosed { session_id });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(base: &str) -> BackendSettings {
        BackendSettings::new(Url::parse(base).unwrap())
    }

    #[test]
    fn http_maps_to_ws_and_https_to_wss() {
        let sid = SessionId::new("abc");
        assert_eq!(
            progress_socket_url(&settings("http://localhost:8100"), &sid)
                .unwrap()
                .as_str(),
            "ws://localhost:8100/ws/progress/abc"
        );
        assert_eq!(
            progress_socket_url(&settings("https://lighthouse.example"), &sid)
                .unwrap()
                .as_str(),
            "wss://lighthouse.example/ws/progress/abc"
        );
    }

    #[test]
    fn socket_host_and_path_are_configurable() {
        let mut settings = settings("http://localhost:8100");
        settings.socket_base_url = Some(Url::parse("ws://127.0.0.1:9001").unwrap());
        settings.socket_path = "/ws/transform/{session_id}".to_string();

        let url = progress_socket_url(&settings, &SessionId::new("t-9")).unwrap();
        assert_eq!(url.as_str(), "ws://127.0.0.1:9001/ws/transform/t-9");
    }

    #[test]
    fn session_id_is_encoded_into_the_socket_path() {
        let url = progress_socket_url(&settings("http://localhost:8100"), &SessionId::new("a/../b"))
            .unwrap();
        assert_eq!(url.path(), "/ws/progress/a%2F..%2Fb");
    }

    #[test]
    fn other_schemes_are_rejected() {
        let err = progress_socket_url(&settings("ftp://files.example"), &SessionId::new("x"))
            .unwrap_err();
        assert_eq!(err.kind, FailureKind::InvalidUrl);
    }
}
