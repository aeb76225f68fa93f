//! WebSocket upgrade handler.
//!
//! Handles the HTTP → WebSocket upgrade and hands the socket to the
//! session coordinator:
//! 1. Upgrade to WebSocket
//! 2. Split the socket and adapt both halves to session frames
//! 3. Run the session until the client goes away

use std::future::{ready, Ready};
use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        OriginalUri, State,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};

use crate::application::SessionCoordinator;
use crate::domain::foundation::SessionId;
use crate::domain::protocol::{InboundFrame, OutboundFrame};

/// State required for WebSocket handling.
#[derive(Clone)]
pub struct BridgeState {
    pub coordinator: Arc<SessionCoordinator>,
}

impl BridgeState {
    pub fn new(coordinator: Arc<SessionCoordinator>) -> Self {
        Self { coordinator }
    }
}

/// Handle WebSocket upgrade requests.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    OriginalUri(uri): OriginalUri,
    State(state): State<BridgeState>,
) -> Response {
    let session_id = SessionId::new();
    tracing::info!(session_id = %session_id, path = %uri.path(), "websocket upgrade");
    ws.on_upgrade(move |socket| handle_socket(socket, session_id, state))
}

/// Runs one established connection to completion.
async fn handle_socket(socket: WebSocket, session_id: SessionId, state: BridgeState) {
    let (sender, receiver) = socket.split();
    let inbound = receiver.map(inbound_frame);
    let outbound = sender.with(to_message);

    match state.coordinator.run(session_id, inbound, outbound).await {
        Ok(summary) => tracing::info!(
            session_id = %session_id,
            reason = %summary.close_reason,
            messages = summary.messages,
            errors = summary.errors,
            "client disconnected"
        ),
        Err(e) => tracing::info!(session_id = %session_id, error = %e, "session rejected"),
    }
}

/// Maps a transport event to a session frame.
pub fn inbound_frame(event: Result<Message, axum::Error>) -> InboundFrame {
    match event {
        Ok(Message::Text(text)) => InboundFrame::Text(text),
        Ok(Message::Binary(bytes)) => InboundFrame::Binary(bytes),
        Ok(Message::Ping(_)) => InboundFrame::Ping,
        Ok(Message::Pong(_)) => InboundFrame::Pong,
        Ok(Message::Close(_)) => InboundFrame::Close,
        Err(e) => InboundFrame::Error(e.to_string()),
    }
}

/// Maps a session frame to a transport message.
pub fn outbound_message(frame: OutboundFrame) -> Message {
    match frame.to_text() {
        Some(text) => Message::Text(text),
        None if frame.is_close() => Message::Close(None),
        None => Message::Ping(Vec::new()),
    }
}

fn to_message(frame: OutboundFrame) -> Ready<Result<Message, axum::Error>> {
    ready(Ok(outbound_message(frame)))
}

/// Create axum router serving the bridge on `path`.
///
/// # Example
///
/// ```ignore
/// let app = bridge_router("/")
///     .layer(TraceLayer::new_for_http())
///     .with_state(BridgeState::new(coordinator));
/// ```
pub fn bridge_router(path: &str) -> axum::Router<BridgeState> {
    use axum::routing::get;

    axum::Router::new().route(path, get(ws_handler))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryDatabase;
    use crate::application::CommandRegistry;
    use crate::ports::NoopHooks;

    #[test]
    fn maps_inbound_messages() {
        assert_eq!(
            inbound_frame(Ok(Message::Text("[\"SELECT 1\"]".into()))),
            InboundFrame::Text("[\"SELECT 1\"]".into())
        );
        assert_eq!(inbound_frame(Ok(Message::Binary(vec![1, 2]))), InboundFrame::Binary(vec![1, 2]));
        assert_eq!(inbound_frame(Ok(Message::Ping(vec![9]))), InboundFrame::Ping);
        assert_eq!(inbound_frame(Ok(Message::Pong(vec![]))), InboundFrame::Pong);
        assert_eq!(inbound_frame(Ok(Message::Close(None))), InboundFrame::Close);
    }

    #[test]
    fn maps_outbound_frames() {
        assert!(matches!(outbound_message(OutboundFrame::Ping), Message::Ping(p) if p.is_empty()));
        assert!(matches!(outbound_message(OutboundFrame::Close), Message::Close(None)));
        assert!(matches!(
            outbound_message(OutboundFrame::Text("row".into())),
            Message::Text(t) if t == "row"
        ));
        assert!(matches!(
            outbound_message(OutboundFrame::error("boom")),
            Message::Text(t) if t == r#"{"error": "boom"}"#
        ));
    }

    #[test]
    fn bridge_router_creates_route() {
        let coordinator = SessionCoordinator::new(
            Arc::new(InMemoryDatabase::new()),
            Arc::new(CommandRegistry::new()),
            Arc::new(NoopHooks),
        );
        let _router: axum::Router = bridge_router("/").with_state(BridgeState::new(Arc::new(coordinator)));
    }
}
