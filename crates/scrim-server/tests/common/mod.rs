use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use scrim_core::net::messages::{
    ClientEvent, CreateMsg, JoinMsg, PingMsg, PlayersMsg, ServerEvent, SetReadyMsg,
};
use scrim_core::net::protocol::{decode_server_event, encode_client_event};
use scrim_core::player::Player;
use scrim_core::room::RoomState;

use scrim_server::build_app;
use scrim_server::config::{LimitsConfig, RoomsConfig, ServerConfig};
use scrim_server::recorder::DisabledRecorder;

pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub struct TestServer {
    pub addr: SocketAddr,
    _shutdown: tokio::task::JoinHandle<()>,
}

impl TestServer {
    /// Start a test server with default pacing (10 Hz, 10 s countdown).
    pub async fn new() -> Self {
        Self::from_config(ServerConfig::default()).await
    }

    /// Start a test server ticking at 100 Hz with a 1 s countdown, so a
    /// full countdown still spans 100 ticks but completes quickly.
    pub async fn accelerated() -> Self {
        let config = ServerConfig {
            rooms: RoomsConfig {
                tick_hz: 100,
                countdown_secs: 1,
            },
            ..ServerConfig::default()
        };
        Self::from_config(config).await
    }

    /// Start a test server that admits at most `max` WebSocket connections.
    pub async fn with_connection_cap(max: usize) -> Self {
        let config = ServerConfig {
            limits: LimitsConfig {
                max_ws_connections: max,
                ..LimitsConfig::default()
            },
            ..ServerConfig::default()
        };
        Self::from_config(config).await
    }

    async fn from_config(config: ServerConfig) -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (app, _state) = build_app(config, Arc::new(DisabledRecorder::new()));

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        // Give the server a moment to start accepting
        tokio::time::sleep(Duration::from_millis(20)).await;

        Self {
            addr,
            _shutdown: handle,
        }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn ws_url(&self) -> String {
        format!("ws://{}/ws", self.addr)
    }
}

/// Connect a WebSocket client to the given URL.
pub async fn ws_connect(url: &str) -> WsStream {
    let (stream, _) = tokio_tungstenite::connect_async(url).await.unwrap();
    stream
}

/// Send a client event as a text frame.
pub async fn ws_send(stream: &mut WsStream, event: &ClientEvent) {
    let encoded = encode_client_event(event).unwrap();
    stream.send(Message::Text(encoded.into())).await.unwrap();
}

/// Send an arbitrary text frame, valid envelope or not.
pub async fn ws_send_text(stream: &mut WsStream, raw: &str) {
    stream
        .send(Message::Text(raw.to_string().into()))
        .await
        .unwrap();
}

/// Send a well-formed envelope carrying a hand-built payload.
pub async fn ws_send_json(stream: &mut WsStream, event: &str, data: serde_json::Value) {
    let raw = serde_json::json!({ "event": event, "data": data }).to_string();
    ws_send_text(stream, &raw).await;
}

/// Read the next server event from a WebSocket stream (5s timeout).
pub async fn ws_read_event(stream: &mut WsStream) -> ServerEvent {
    let deadline = Duration::from_secs(5);
    tokio::time::timeout(deadline, async {
        loop {
            match stream.next().await {
                Some(Ok(Message::Text(text))) => {
                    return decode_server_event(text.as_str()).unwrap();
                },
                Some(Ok(Message::Close(_))) => panic!("WebSocket closed unexpectedly"),
                Some(Err(e)) => panic!("WebSocket error: {e}"),
                None => panic!("WebSocket stream ended"),
                _ => continue,
            }
        }
    })
    .await
    .expect("Timed out waiting for WebSocket message")
}

/// Try to read a server event, returning None on timeout.
pub async fn ws_try_read_event(stream: &mut WsStream, timeout_ms: u64) -> Option<ServerEvent> {
    let deadline = Duration::from_millis(timeout_ms);
    tokio::time::timeout(deadline, async {
        loop {
            match stream.next().await {
                Some(Ok(Message::Text(text))) => {
                    return decode_server_event(text.as_str()).unwrap();
                },
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => {
                    panic!("WebSocket error or closed")
                },
                _ => continue,
            }
        }
    })
    .await
    .ok()
}

/// Drain every server event arriving within the window.
pub async fn ws_collect_events(stream: &mut WsStream, window_ms: u64) -> Vec<ServerEvent> {
    let deadline = tokio::time::Instant::now() + Duration::from_millis(window_ms);
    let mut events = Vec::new();
    loop {
        let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
        if remaining.is_zero() {
            return events;
        }
        match ws_try_read_event(stream, remaining.as_millis() as u64).await {
            Some(event) => events.push(event),
            None => return events,
        }
    }
}

/// Create a room and return its code and the host's player record.
pub async fn ws_create_room(stream: &mut WsStream, name: &str) -> (String, Player) {
    ws_send(
        stream,
        &ClientEvent::Create(CreateMsg {
            host_name: name.to_string(),
        }),
    )
    .await;

    match ws_read_event(stream).await {
        ServerEvent::Created(created) => {
            assert!(!created.code.is_empty(), "Expected a room code");
            (created.code, created.player)
        },
        other => panic!("Expected created, got: {other:?}"),
    }
}

/// Ask to join a room and return the server's direct reply, success
/// or rejection.
pub async fn ws_join_room(stream: &mut WsStream, code: &str, name: &str) -> ServerEvent {
    ws_send(
        stream,
        &ClientEvent::Join(JoinMsg {
            code: code.to_string(),
            name: name.to_string(),
        }),
    )
    .await;
    ws_read_event(stream).await
}

pub async fn ws_set_ready(stream: &mut WsStream, ready: bool) {
    ws_send(stream, &ClientEvent::SetReady(SetReadyMsg { ready })).await;
}

pub async fn ws_ping(stream: &mut WsStream, hello: &str) {
    ws_send(
        stream,
        &ClientEvent::Ping(PingMsg {
            hello: hello.to_string(),
        }),
    )
    .await;
}

/// Read events until a state snapshot satisfies the predicate,
/// skipping everything else. Panics after 5s.
pub async fn ws_wait_state<F>(stream: &mut WsStream, mut pred: F) -> RoomState
where
    F: FnMut(&RoomState) -> bool,
{
    let deadline = Duration::from_secs(5);
    tokio::time::timeout(deadline, async {
        loop {
            if let ServerEvent::State(state) = ws_read_event(stream).await
                && pred(&state)
            {
                return state;
            }
        }
    })
    .await
    .expect("Timed out waiting for matching state")
}

/// Read events until a roster broadcast satisfies the predicate,
/// skipping everything else. Panics after 5s.
pub async fn ws_wait_players<F>(stream: &mut WsStream, mut pred: F) -> PlayersMsg
where
    F: FnMut(&PlayersMsg) -> bool,
{
    let deadline = Duration::from_secs(5);
    tokio::time::timeout(deadline, async {
        loop {
            if let ServerEvent::Players(msg) = ws_read_event(stream).await
                && pred(&msg)
            {
                return msg;
            }
        }
    })
    .await
    .expect("Timed out waiting for matching roster")
}
