//! `/ws` — near-real-time progress feed (spec §2(d)). Broadcasts every
//! `ResonanceEvent` the Scheduler emits; an optional `submission_id` query
//! param narrows the stream to one submission, mirroring a client polling
//! `GET /status/{id}` without the round-trip.

use crate::state::{AppState, ResonanceEvent};
use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Query, State, WebSocketUpgrade};
use axum::response::Response;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::select;

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    submission_id: Option<i64>,
}

pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>, Query(query): Query<WsQuery>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state, query.submission_id))
}

async fn handle_socket(socket: WebSocket, state: AppState, filter: Option<i64>) {
    let (mut sender, mut receiver) = socket.split();
    let mut events = state.subscribe_events();

    let welcome = serde_json::json!({"type": "connected"});
    if sender.send(Message::Text(welcome.to_string())).await.is_err() {
        return;
    }

    loop {
        select! {
            event = events.recv() => {
                match event {
                    Ok(event) => {
                        if let (Some(wanted), Some(actual)) = (filter, event.submission_id()) {
                            if wanted != actual {
                                continue;
                            }
                        }
                        match serde_json::to_string(&event) {
                            Ok(json) => {
                                if sender.send(Message::Text(json)).await.is_err() {
                                    break;
                                }
                            }
                            Err(e) => tracing::error!(error = %e, "failed to serialize event"),
                        }
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "event broadcast lagged or closed");
                        break;
                    }
                }
            }
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Err(_)) => break,
                    _ => {}
                }
            }
        }
    }
}
