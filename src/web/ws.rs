//! WebSocket fan-out: ordered per-map event delivery to attached clients.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::broadcast::error::RecvError;
use tracing::debug;
use ts_rs::TS;
use uuid::Uuid;

use crate::data;
use crate::events::DomainEvent;
use crate::state::AppState;

/// The first client frame after connect: which session is attaching to
/// which map.
#[derive(Debug, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct AttachMessage {
    pub session_id: Uuid,
    pub map_id: Uuid,
}

/// WebSocket endpoint for the per-map event stream.
pub async fn world_ws(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_world_ws(socket, state))
}

async fn handle_world_ws(socket: WebSocket, state: AppState) {
    let (mut sink, mut stream) = socket.split();

    // The client speaks first: an attach frame naming its session and map
    let Some(attach) = read_attach(&mut stream).await else {
        let _ = sink.send(Message::Close(None)).await;
        return;
    };

    // The session is the credential: it must exist, be active, and belong
    // to the requested map
    let valid = data::sessions::get_session(&state.db_pool, attach.session_id)
        .await
        .ok()
        .flatten()
        .is_some_and(|s| s.is_active && s.map_id == attach.map_id);
    if !valid {
        debug!(session_id = %attach.session_id, "rejected WebSocket attach for unknown session");
        let _ = sink.send(Message::Close(None)).await;
        return;
    }

    debug!(session_id = %attach.session_id, map_id = %attach.map_id, "WebSocket attached");
    let mut events = state.events.subscribe(attach.map_id);

    loop {
        tokio::select! {
            msg = stream.next() => {
                match msg {
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    // Clients only send the attach frame; anything else is ignored
                    _ => {}
                }
            }
            event = events.recv() => {
                match event {
                    Ok(event) => {
                        if !send_event(&mut sink, &event).await {
                            break;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        // Overflowed the bounded buffer; drop the client,
                        // it re-syncs over HTTP on reconnect
                        debug!(
                            session_id = %attach.session_id,
                            skipped,
                            "client lagged behind event stream, disconnecting"
                        );
                        break;
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        }
    }

    debug!(session_id = %attach.session_id, "WebSocket detached");
}

/// Wait for the attach frame, skipping any non-text frames. Returns `None`
/// on malformed input or disconnect.
async fn read_attach(
    stream: &mut futures::stream::SplitStream<WebSocket>,
) -> Option<AttachMessage> {
    while let Some(msg) = stream.next().await {
        match msg {
            Ok(Message::Text(text)) => return serde_json::from_str(&text).ok(),
            Ok(Message::Close(_)) | Err(_) => return None,
            _ => {}
        }
    }
    None
}

async fn send_event(sink: &mut SplitSink<WebSocket, Message>, event: &DomainEvent) -> bool {
    let Ok(json) = serde_json::to_string(event) else {
        return true;
    };
    sink.send(Message::Text(json.into())).await.is_ok()
}
