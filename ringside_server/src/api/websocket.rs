//! WebSocket push channel for live bet and fight updates.
//!
//! # Connection Flow
//!
//! 1. Client connects via `GET /ws?token=<jwt>`
//! 2. Server validates the JWT and upgrades the connection
//! 3. A send task forwards dispatcher events visible to the user (their own
//!    bet updates and notifications, plus every fight result)
//! 4. The receive loop answers pings until the client disconnects
//!
//! # Server Messages
//!
//! ```json
//! {"event": "bet:update", "payload": {"userId": 1, "betId": 9, "fightId": 3, "status": "WON", "actualWin": 2500}}
//! {"event": "fight:result", "payload": {"fightId": 3, "winner": "A"}}
//! ```

use axum::{
    extract::{
        Query, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::{IntoResponse, Response},
};
use futures_util::{SinkExt, StreamExt};
use ringside::notify::Event;
use serde::{Deserialize, Serialize};
use std::sync::atomic::Ordering;
use tokio::sync::{broadcast::error::RecvError, mpsc};

use super::{AppState, error::ApiError};
use crate::metrics;

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    token: String,
}

/// Messages a client may send
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ClientMessage {
    Ping,
}

/// Direct replies to client messages
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ServerResponse {
    Pong,
    Error { message: String },
}

/// Upgrade to a WebSocket after validating the `token` query parameter
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<WsQuery>,
    State(state): State<AppState>,
) -> Response {
    let user_id = match state.auth_manager.verify_access_token(&query.token) {
        Ok(claims) => claims.sub,
        Err(_) => return ApiError::Unauthorized.into_response(),
    };

    ws.on_upgrade(move |socket| handle_socket(socket, user_id, state))
}

async fn handle_socket(socket: WebSocket, user_id: i64, state: AppState) {
    let (mut sender, mut receiver) = socket.split();
    let mut events = state.notifications.subscribe();
    let (response_tx, mut response_rx) = mpsc::channel::<String>(32);

    let active = state.ws_connections.fetch_add(1, Ordering::SeqCst) + 1;
    metrics::websocket_connections_active(active);
    tracing::info!(user_id, "WebSocket connected");

    let mut send_task = tokio::spawn(async move {
        loop {
            tokio::select! {
                received = events.recv() => {
                    let event = match received {
                        Ok(event) => event,
                        Err(RecvError::Lagged(skipped)) => {
                            tracing::warn!(user_id, skipped, "WebSocket subscriber lagged");
                            continue;
                        }
                        Err(RecvError::Closed) => break,
                    };
                    if !event.is_visible_to(user_id) {
                        continue;
                    }
                    let Some(json) = encode_event(&event) else {
                        continue;
                    };
                    if sender.send(Message::Text(json.into())).await.is_err() {
                        break;
                    }
                }
                Some(response) = response_rx.recv() => {
                    if sender.send(Message::Text(response.into())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(message)) = receiver.next().await {
            match message {
                Message::Text(text) => {
                    let response = match serde_json::from_str::<ClientMessage>(text.as_str()) {
                        Ok(ClientMessage::Ping) => ServerResponse::Pong,
                        Err(e) => ServerResponse::Error {
                            message: format!("Invalid message: {e}"),
                        },
                    };
                    let Ok(json) = serde_json::to_string(&response) else {
                        continue;
                    };
                    if response_tx.send(json).await.is_err() {
                        break;
                    }
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    // Whichever side finishes first tears down the other
    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    let active = state
        .ws_connections
        .fetch_sub(1, Ordering::SeqCst)
        .saturating_sub(1);
    metrics::websocket_connections_active(active);
    tracing::info!(user_id, "WebSocket disconnected");
}

fn encode_event(event: &Event) -> Option<String> {
    match serde_json::to_string(event) {
        Ok(json) => Some(json),
        Err(e) => {
            tracing::error!("Failed to serialize {} event: {}", event.name(), e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ringside::Corner;

    #[test]
    fn test_ping_parses() {
        let msg: ClientMessage = serde_json::from_str(r#"{"type":"ping"}"#).unwrap();
        assert!(matches!(msg, ClientMessage::Ping));
    }

    #[test]
    fn test_fight_result_encoding() {
        let json = encode_event(&Event::FightResult {
            fight_id: 3,
            winner: Corner::A,
        })
        .unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["event"], "fight:result");
        assert_eq!(value["payload"]["fightId"], 3);
    }

    #[test]
    fn test_error_response_shape() {
        let json = serde_json::to_string(&ServerResponse::Error {
            message: "bad".to_string(),
        })
        .unwrap();
        assert_eq!(json, r#"{"type":"error","message":"bad"}"#);
    }
}
