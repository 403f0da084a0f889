//! `WS /feed` — pushes live bus notifications to the client. Grounded
//! on `omnibrain_bus::wire_event_bus_to_ws`, adapted from its generic
//! sink callback to an axum `WebSocket` sender.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use omnibrain_bus::TOPIC_NOTIFICATION;

use crate::state::ApiState;

pub async fn feed(ws: WebSocketUpgrade, State(state): State<ApiState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(mut socket: WebSocket, state: ApiState) {
    let mut rx = state.resources.bus.subscribe(TOPIC_NOTIFICATION);
    loop {
        tokio::select! {
            event = rx.recv() => {
                match event {
                    Ok(event) => {
                        let frame = serde_json::json!({ "topic": event.topic, "payload": event.payload });
                        if socket.send(Message::Text(frame.to_string().into())).await.is_err() {
                            break;
                        }
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }
            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(_)) => break,
                    _ => continue,
                }
            }
        }
    }
}
