//! Real-time route
//!
//! `GET /ws` upgrades to a WebSocket that receives the full record array as
//! a text frame after every successful write. Client frames are ignored
//! apart from close.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};

use crate::api::state::AppState;
use crate::subscriptions::Broadcaster;

pub async fn subscribe(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    let broadcaster = state.broadcaster().clone();
    ws.on_upgrade(move |socket| serve_subscriber(socket, broadcaster))
}

/// Pump the subscriber's outbox into the socket until either side ends.
///
/// The socket is closed here and nowhere else: the writer sends one close
/// frame when the registry lets go of the subscriber, and both halves are
/// dropped when this function returns.
async fn serve_subscriber(socket: WebSocket, broadcaster: Broadcaster) {
    let mut handle = broadcaster.subscribe();
    let id = handle.id;
    let (mut sink, mut stream) = socket.split();

    tracing::debug!(subscriber = %id, "WebSocket subscriber connected");

    let mut writer = tokio::spawn(async move {
        while let Some(frame) = handle.recv().await {
            if let Err(e) = sink.send(Message::Text(frame)).await {
                tracing::debug!(subscriber = %id, error = %e, "WebSocket write failed");
                return;
            }
        }

        // Removed from the registry
        let _ = sink.send(Message::Close(None)).await;
    });

    let mut reader = tokio::spawn(async move {
        while let Some(incoming) = stream.next().await {
            match incoming {
                Ok(Message::Close(_)) => break,
                Ok(_) => {}
                Err(e) => {
                    tracing::debug!(subscriber = %id, error = %e, "WebSocket read failed");
                    break;
                }
            }
        }
    });

    tokio::select! {
        _ = &mut writer => reader.abort(),
        _ = &mut reader => writer.abort(),
    }

    broadcaster.unsubscribe(id);

    tracing::debug!(subscriber = %id, "WebSocket subscriber disconnected");
}
