//! WebSocket upgrade handler

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::app::AppState;
use crate::game::{Outbound, RoomHandle};
use crate::matchmaking::{JoinError, JoinOptions};
use crate::util::rate_limit::SessionRateLimiter;
use crate::ws::protocol::{ClientMsg, ServerMsg};

/// WebSocket upgrade handler; join options come from the query string
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(options): Query<JoinOptions>,
    State(state): State<AppState>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, options, state))
}

/// Handle the upgraded WebSocket connection
async fn handle_socket(socket: WebSocket, options: JoinOptions, state: AppState) {
    let session_id = Uuid::new_v4().simple().to_string();
    info!(session_id = %session_id, create = options.create, "New WebSocket connection");

    let (mut ws_sink, ws_stream) = socket.split();

    let (room, snapshot) = match state.rooms.join(&session_id, &options).await {
        Ok(joined) => joined,
        Err(e) => {
            warn!(session_id = %session_id, error = %e, "Join failed");
            let code = match e {
                JoinError::NoRoomAvailable => "no_room_available",
                JoinError::Room(_) => "join_failed",
            };
            let _ = send_msg(
                &mut ws_sink,
                &ServerMsg::Error {
                    code: code.to_string(),
                    message: e.to_string(),
                },
            )
            .await;
            return;
        }
    };

    // Room broadcasts for this session start here
    let outbound_rx = room.subscribe();

    let joined = ServerMsg::RoomJoined {
        room_id: room.id,
        session_id: session_id.clone(),
        metadata: room.metadata.clone(),
        state: snapshot,
    };

    if let Err(e) = send_msg(&mut ws_sink, &joined).await {
        error!(session_id = %session_id, error = %e, "Failed to send join confirmation");
        room.leave(&session_id).await;
        return;
    }

    run_session(&session_id, &room, ws_sink, ws_stream, outbound_rx).await;

    // Cleanup on disconnect
    room.leave(&session_id).await;

    info!(session_id = %session_id, room_id = %room.id, "WebSocket connection closed");
}

/// Run the WebSocket session with read/write split
async fn run_session(
    session_id: &str,
    room: &RoomHandle,
    mut ws_sink: futures::stream::SplitSink<WebSocket, Message>,
    mut ws_stream: futures::stream::SplitStream<WebSocket>,
    mut outbound_rx: broadcast::Receiver<Outbound>,
) {
    let rate_limiter = SessionRateLimiter::new();

    // Spawn writer task: room broadcasts -> WebSocket
    let writer_session = session_id.to_string();
    let mut writer_handle = tokio::spawn(async move {
        loop {
            match outbound_rx.recv().await {
                Ok(out) => {
                    if !out.is_for(&writer_session) {
                        continue;
                    }
                    let closing = matches!(out.msg, ServerMsg::RoomDisposed);
                    if let Err(e) = send_msg(&mut ws_sink, &out.msg).await {
                        debug!(session_id = %writer_session, error = %e, "WebSocket send failed");
                        break;
                    }
                    if closing {
                        let _ = ws_sink.send(Message::Close(None)).await;
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(
                        session_id = %writer_session,
                        lagged_count = n,
                        "Client lagged, skipping {} messages", n
                    );
                    // Continue - the next snapshot carries the full dynamic state
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!(session_id = %writer_session, "Room channel closed");
                    break;
                }
            }
        }
    });

    // Reader loop: WebSocket -> room; stops early if the writer ends
    loop {
        let result = tokio::select! {
            next = ws_stream.next() => match next {
                Some(result) => result,
                None => break,
            },
            _ = &mut writer_handle => break,
        };

        match result {
            Ok(Message::Text(text)) => {
                if !rate_limiter.check_message() {
                    warn!(session_id = %session_id, "Rate limited room message");
                    continue;
                }

                match serde_json::from_str::<ClientMsg>(&text) {
                    Ok(client_msg) => {
                        if room.send_message(session_id, client_msg).await.is_err() {
                            debug!(session_id = %session_id, "Room closed");
                            break;
                        }
                    }
                    Err(e) => {
                        warn!(session_id = %session_id, error = %e, "Failed to parse client message");
                    }
                }
            }
            Ok(Message::Binary(_)) => {
                warn!(session_id = %session_id, "Received binary message, ignoring");
            }
            Ok(Message::Ping(_)) => {
                debug!(session_id = %session_id, "Received ping");
            }
            Ok(Message::Pong(_)) => {
                debug!(session_id = %session_id, "Received pong");
            }
            Ok(Message::Close(_)) => {
                info!(session_id = %session_id, "Client initiated close");
                break;
            }
            Err(e) => {
                error!(session_id = %session_id, error = %e, "WebSocket error");
                break;
            }
        }
    }

    // Abort writer task
    writer_handle.abort();
}

/// Send a message over WebSocket
async fn send_msg(
    sink: &mut futures::stream::SplitSink<WebSocket, Message>,
    msg: &ServerMsg,
) -> Result<(), String> {
    let json = serde_json::to_string(msg).map_err(|e| e.to_string())?;
    sink.send(Message::Text(json))
        .await
        .map_err(|e| e.to_string())
}
