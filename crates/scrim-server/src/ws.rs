use std::sync::Arc;
use std::sync::atomic::Ordering;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use scrim_core::net::messages::{
    BadPayloadMsg, ClientEvent, CreateMsg, CreatedMsg, FullMsg, JoinMsg, JoinedMsg, NotFoundMsg,
    PingMsg, PongMsg, ServerEvent, SetReadyMsg, StartedMsg,
};
use scrim_core::net::protocol::{decode_envelope, encode_server_event};
use scrim_core::net::validate::parse_event;
use scrim_core::player::{Player, PlayerId};
use scrim_core::room::MAX_PLAYERS;
use scrim_core::time::timestamp_ms;

use crate::registry::{JoinError, PlayerSender};
use crate::state::{AppState, ConnectionGuard};

/// What the gateway knows about one connection. A connection binds to
/// at most one room for its lifetime.
struct Session {
    player_id: PlayerId,
    room_code: Option<String>,
}

pub async fn ws_handler(
    State(state): State<AppState>,
    ws: WebSocketUpgrade,
) -> Result<axum::response::Response, StatusCode> {
    let max_ws = state.config.limits.max_ws_connections;
    let current = state.ws_connection_count.load(Ordering::Relaxed);
    if current >= max_ws {
        tracing::warn!(current, max = max_ws, "WS connection limit reached");
        return Err(StatusCode::SERVICE_UNAVAILABLE);
    }

    Ok(ws
        .on_upgrade(move |socket| handle_socket(socket, state))
        .into_response())
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let _guard = ConnectionGuard::new(Arc::clone(&state.ws_connection_count));
    let conn_id = state.alloc_conn_id();
    let (ws_sender, mut ws_receiver) = socket.split();

    // All outbound traffic for this connection, direct replies and room
    // broadcasts alike, flows through one bounded channel. That keeps
    // replies ordered ahead of the broadcasts they trigger.
    let (tx, rx) = mpsc::channel::<Message>(state.config.limits.player_message_buffer);
    spawn_writer(ws_sender, rx);

    let mut session = Session {
        player_id: conn_id,
        room_code: None,
    };
    tracing::debug!(player_id = conn_id, "WebSocket connected");

    while let Some(Ok(msg)) = ws_receiver.next().await {
        let text = match msg {
            Message::Text(t) => t,
            Message::Close(_) => break,
            _ => continue,
        };
        handle_frame(text.as_str(), &tx, &mut session, &state).await;
    }

    // Connection gone, take the player out of their room.
    disconnect(&session, &state).await;
}

fn spawn_writer(
    mut ws_sender: futures::stream::SplitSink<WebSocket, Message>,
    mut rx: mpsc::Receiver<Message>,
) {
    tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            if ws_sender.send(frame).await.is_err() {
                break;
            }
        }
    });
}

/// Encode and queue one event for this connection. A full buffer drops
/// the frame rather than blocking the handler.
fn send_event(tx: &PlayerSender, event: &ServerEvent) {
    match encode_server_event(event) {
        Ok(text) => {
            if let Err(e) = tx.try_send(Message::Text(text.into())) {
                tracing::debug!(error = %e, "Dropping reply to slow client");
            }
        },
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode reply");
        },
    }
}

async fn handle_frame(raw: &str, tx: &PlayerSender, session: &mut Session, state: &AppState) {
    // Frames that are not even a `{event, data}` envelope are dropped;
    // only envelopes with a malformed payload earn a rejection reply.
    let envelope = match decode_envelope(raw) {
        Ok(env) => env,
        Err(e) => {
            tracing::debug!(
                player_id = session.player_id, error = %e,
                "Dropping undecodable frame"
            );
            return;
        },
    };

    let event = match parse_event(&envelope.event, &envelope.data) {
        Ok(event) => event,
        Err(issues) => {
            tracing::debug!(
                player_id = session.player_id,
                event = %envelope.event,
                issue_count = issues.len(),
                "Rejected malformed payload"
            );
            send_event(
                tx,
                &ServerEvent::BadPayload(BadPayloadMsg {
                    event: envelope.event,
                    issues,
                }),
            );
            return;
        },
    };

    match event {
        ClientEvent::Ping(msg) => handle_ping(msg, tx),
        ClientEvent::Create(msg) => handle_create(msg, tx, session, state).await,
        ClientEvent::Join(msg) => handle_join(msg, tx, session, state).await,
        ClientEvent::SetReady(msg) => handle_set_ready(msg, session, state).await,
    }
}

fn handle_ping(msg: PingMsg, tx: &PlayerSender) {
    send_event(
        tx,
        &ServerEvent::Pong(PongMsg {
            echo: msg,
            server_time: timestamp_ms(),
        }),
    );
}

async fn handle_create(msg: CreateMsg, tx: &PlayerSender, session: &mut Session, state: &AppState) {
    if session.room_code.is_some() {
        tracing::debug!(
            player_id = session.player_id,
            "Ignoring create from room-bound player"
        );
        return;
    }

    let player = Player {
        id: session.player_id,
        name: msg.host_name,
        team: 0,
        ready: false,
    };

    let code = {
        let mut reg = state.registry.write().await;
        let code = reg.create_room(player.clone(), tx.clone());
        send_event(
            tx,
            &ServerEvent::Created(CreatedMsg {
                code: code.clone(),
                player,
            }),
        );
        reg.broadcast_roster(&code);
        code
    };
    session.room_code = Some(code.clone());
    tracing::info!(player_id = session.player_id, room = %code, "Room created");

    state
        .ticker
        .start(
            &code,
            &state.registry,
            &state.recorder,
            state.config.tick_interval(),
        )
        .await;
}

async fn handle_join(msg: JoinMsg, tx: &PlayerSender, session: &mut Session, state: &AppState) {
    if session.room_code.is_some() {
        tracing::debug!(
            player_id = session.player_id,
            "Ignoring join from room-bound player"
        );
        return;
    }

    let JoinMsg { code, name } = msg;
    let player = Player {
        id: session.player_id,
        name,
        team: 0,
        ready: false,
    };

    let admitted = {
        let mut reg = state.registry.write().await;
        match reg.join_room(&code, player, tx.clone()) {
            Ok(joined) => {
                send_event(
                    tx,
                    &ServerEvent::Joined(JoinedMsg {
                        code: code.clone(),
                        player: joined,
                    }),
                );
                reg.broadcast_roster(&code);
                // Readiness is re-examined on every roster change.
                let armed = reg
                    .room_mut(&code)
                    .map(|room| room.maybe_start_match(state.config.countdown_ticks()))
                    .unwrap_or(false);
                if armed {
                    reg.broadcast_state(&code);
                }
                true
            },
            Err(JoinError::NotFound) => {
                send_event(
                    tx,
                    &ServerEvent::NotFound(NotFoundMsg {
                        what: "room".to_string(),
                        code: code.clone(),
                    }),
                );
                false
            },
            Err(JoinError::AlreadyStarted(phase)) => {
                send_event(
                    tx,
                    &ServerEvent::Started(StartedMsg {
                        code: code.clone(),
                        phase,
                    }),
                );
                false
            },
            Err(JoinError::Full) => {
                send_event(
                    tx,
                    &ServerEvent::Full(FullMsg {
                        code: code.clone(),
                        max: MAX_PLAYERS as u8,
                    }),
                );
                false
            },
        }
    };

    if admitted {
        tracing::info!(player_id = session.player_id, room = %code, "Player joined room");
        state
            .ticker
            .start(
                &code,
                &state.registry,
                &state.recorder,
                state.config.tick_interval(),
            )
            .await;
        session.room_code = Some(code);
    }
}

async fn handle_set_ready(msg: SetReadyMsg, session: &Session, state: &AppState) {
    // Readiness only means something inside a room.
    let Some(code) = session.room_code.as_deref() else {
        tracing::debug!(
            player_id = session.player_id,
            "Ignoring setReady from unbound player"
        );
        return;
    };

    let mut reg = state.registry.write().await;
    let Some(room) = reg.room_mut(code) else {
        return;
    };
    let Some(player) = room.player_mut(session.player_id) else {
        return;
    };
    player.ready = msg.ready;

    let countdown_ticks = state.config.countdown_ticks();
    let armed = room.maybe_start_match(countdown_ticks);
    let reverted = room.cancel_countdown_if_broken();

    reg.broadcast_roster(code);
    if armed || reverted {
        reg.broadcast_state(code);
    }

    if armed {
        tracing::info!(room = code, countdown_ticks, "All players ready, countdown armed");
    }
    if reverted {
        tracing::info!(room = code, "Countdown cancelled, readiness broken");
    }
}

async fn disconnect(session: &Session, state: &AppState) {
    let Some(code) = session.room_code.as_deref() else {
        tracing::debug!(player_id = session.player_id, "WebSocket closed");
        return;
    };

    {
        let mut reg = state.registry.write().await;
        if reg.remove_player(code, session.player_id) {
            reg.broadcast_roster(code);
            let reverted = reg
                .room_mut(code)
                .map(|room| room.cancel_countdown_if_broken())
                .unwrap_or(false);
            if reverted {
                reg.broadcast_state(code);
            }
        }
        reg.remove_room_if_empty(code);
    }
    state.ticker.stop_if_empty(code, &state.registry).await;

    tracing::info!(player_id = session.player_id, room = code, "Player disconnected");
}
