#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use futures_util::{SinkExt, StreamExt};
use monitor_engine::{BackendSettings, EngineEvent, EngineHandle};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::Message;
use url::Url;

pub const WAIT: Duration = Duration::from_secs(5);

/// Waits for the next engine event without blocking the test runtime.
pub async fn next_event(engine: &EngineHandle) -> EngineEvent {
    let deadline = Instant::now() + WAIT;
    loop {
        if let Some(event) = engine.try_recv() {
            return event;
        }
        assert!(Instant::now() < deadline, "timed out waiting for engine event");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Collects every event that arrives within `window`.
pub async fn drain_for(engine: &EngineHandle, window: Duration) -> Vec<EngineEvent> {
    let deadline = Instant::now() + window;
    let mut events = Vec::new();
    while Instant::now() < deadline {
        while let Some(event) = engine.try_recv() {
            events.push(event);
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    events
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Seen {
    Connected(String),
    ClientClosed(String),
    Dropped(String),
}

enum ServerCmd {
    Send(String),
    Close,
}

/// Minimal progress-socket server: one task per connection, driven by the test.
pub struct MockSocketServer {
    pub addr: std::net::SocketAddr,
    connections: Arc<Mutex<Vec<(String, mpsc::UnboundedSender<ServerCmd>)>>>,
    seen: mpsc::UnboundedReceiver<Seen>,
}

impl MockSocketServer {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let connections = Arc::new(Mutex::new(Vec::new()));
        let (seen_tx, seen) = mpsc::unbounded_channel();

        let registry = connections.clone();
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let registry = registry.clone();
                let seen_tx = seen_tx.clone();
                tokio::spawn(async move {
                    let path = Arc::new(Mutex::new(String::new()));
                    let path_slot = path.clone();
                    let callback = move |req: &Request, resp: Response| {
                        *path_slot.lock().unwrap() = req.uri().path().to_string();
                        Ok::<_, ErrorResponse>(resp)
                    };
                    let Ok(mut ws) = tokio_tungstenite::accept_hdr_async(stream, callback).await
                    else {
                        return;
                    };
                    let path = path.lock().unwrap().clone();
                    let (cmd_tx, mut cmd_rx) = mpsc::unbounded_channel();
                    registry.lock().unwrap().push((path.clone(), cmd_tx));
                    let _ = seen_tx.send(Seen::Connected(path.clone()));

                    loop {
                        tokio::select! {
                            cmd = cmd_rx.recv() => match cmd {
                                Some(ServerCmd::Send(text)) => {
                                    let _ = ws.send(Message::Text(text.into())).await;
                                }
                                Some(ServerCmd::Close) => {
                                    let _ = ws.close(None).await;
                                }
                                None => break,
                            },
                            msg = ws.next() => match msg {
                                Some(Ok(Message::Close(_))) => {
                                    let _ = seen_tx.send(Seen::ClientClosed(path.clone()));
                                    break;
                                }
                                Some(Ok(_)) => {}
                                None | Some(Err(_)) => {
                                    let _ = seen_tx.send(Seen::Dropped(path.clone()));
                                    break;
                                }
                            }
                        }
                    }
                });
            }
        });

        Self {
            addr,
            connections,
            seen,
        }
    }

    pub fn url(&self) -> Url {
        Url::parse(&format!("ws://{}", self.addr)).unwrap()
    }

    pub fn send(&self, path: &str, frame: &str) {
        self.command(path, ServerCmd::Send(frame.to_string()));
    }

    pub fn close(&self, path: &str) {
        self.command(path, ServerCmd::Close);
    }

    fn command(&self, path: &str, cmd: ServerCmd) {
        let connections = self.connections.lock().unwrap();
        let (_, tx) = connections
            .iter()
            .rev()
            .find(|(p, _)| p == path)
            .unwrap_or_else(|| panic!("no connection on {path}"));
        tx.send(cmd).ok().expect("connection task gone");
    }

    pub async fn next_seen(&mut self) -> Seen {
        tokio::time::timeout(WAIT, self.seen.recv())
            .await
            .expect("timed out waiting for socket server")
            .expect("server stopped")
    }

    pub async fn nothing_seen_for(&mut self, window: Duration) -> bool {
        tokio::time::timeout(window, self.seen.recv()).await.is_err()
    }
}

/// Settings whose HTTP side points nowhere and whose socket side points at `socket_url`.
pub fn socket_settings(socket_url: Url) -> BackendSettings {
    let mut settings = BackendSettings::new(Url::parse("http://127.0.0.1:9").unwrap());
    settings.socket_base_url = Some(socket_url);
    settings
}
