//! /events and /ws handlers — presence reports and the notification channel.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::Response;
use axum::Json;
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};

use glossa_core::Address;
use glossa_services::{Notification, Notifier};

use super::{parse_address, ApiState};

// ── /events (POST) ────────────────────────────────────────────────────────────

/// Presence report from a client. Join and heartbeat both prove presence;
/// leave starts the clock on an emptying room.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase", rename_all_fields = "camelCase")]
pub enum SessionEvent {
    Join { session_id: String, address: Address },
    Leave { session_id: String, address: Address },
    Heartbeat { session_id: String, address: Address },
}

#[derive(Serialize)]
pub struct EventResponse {
    pub accepted: bool,
}

pub async fn handle_event(
    State(state): State<ApiState>,
    Json(event): Json<SessionEvent>,
) -> Result<Json<EventResponse>, (StatusCode, String)> {
    match &event {
        SessionEvent::Join {
            session_id,
            address,
        } => {
            validate(session_id, address)?;
            state.monitor.handle_join(session_id, address);
        }
        SessionEvent::Leave {
            session_id,
            address,
        } => {
            validate(session_id, address)?;
            state.monitor.handle_leave(session_id, address);
        }
        SessionEvent::Heartbeat {
            session_id,
            address,
        } => {
            validate(session_id, address)?;
            state.monitor.handle_heartbeat(session_id, address);
        }
    }
    Ok(Json(EventResponse { accepted: true }))
}

fn validate(session_id: &str, address: &Address) -> Result<(), (StatusCode, String)> {
    if session_id.trim().is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            "sessionId must not be empty".to_string(),
        ));
    }
    if address.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            "address must not be empty".to_string(),
        ));
    }
    Ok(())
}

// ── /ws (GET, upgrade) ────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct ChannelParams {
    pub address: String,
}

pub async fn handle_channel(
    State(state): State<ApiState>,
    Query(params): Query<ChannelParams>,
    ws: WebSocketUpgrade,
) -> Result<Response, (StatusCode, String)> {
    let address = parse_address(&params.address)?;
    Ok(ws.on_upgrade(move |socket| channel_loop(state.notifier.clone(), address, socket)))
}

/// Pump notifications to one connected client until either side goes away.
/// Incoming frames are drained but otherwise ignored; the channel is one-way.
async fn channel_loop(notifier: Notifier, address: Address, socket: WebSocket) {
    let (id, mut rx) = notifier.register(address.clone());
    let (mut sink, mut stream) = socket.split();
    tracing::debug!(address = %address, "notification socket opened");

    loop {
        tokio::select! {
            notification = rx.recv() => {
                let Some(notification) = notification else { break };
                let superseded = notification == Notification::ConnectionSuperseded;
                match serde_json::to_string(&notification) {
                    Ok(text) => {
                        if sink.send(Message::Text(text.into())).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "notification serialization failed");
                    }
                }
                if superseded {
                    break;
                }
            }
            incoming = stream.next() => {
                match incoming {
                    None | Some(Err(_)) | Some(Ok(Message::Close(_))) => break,
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    notifier.unregister(&address, id);
    tracing::debug!(address = %address, "notification socket closed");
}
