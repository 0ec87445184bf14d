// ============================
// backend-lib/src/ws_router.rs
// ============================
//! WebSocket router and connection handling.
use crate::connection::ConnectionHandler;
use crate::http_api;
use crate::metrics::{WS_ACTIVE, WS_CONNECTION, WS_DISCONNECTION};
use crate::AppState;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    http::HeaderValue,
    response::IntoResponse,
    routing::get,
    Router,
};
use futures_util::{SinkExt, StreamExt};
use metrics::{counter, gauge};
use std::sync::Arc;
use tokio::sync::mpsc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::debug;
use uuid::Uuid;

/// Outbound frames queued per connection before the router starts
/// dropping for that client.
const CHANNEL_CAPACITY: usize = 32;

/// Create the full router: the WebSocket endpoint plus the stateless
/// assistant endpoints.
pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = cors_layer(&state.settings.server.cors_allowed_origins);
    Router::new()
        .route("/ws", get(ws_handler))
        .merge(http_api::routes())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|origin| origin == "*") {
        return CorsLayer::permissive();
    }
    let parsed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(parsed))
        .allow_methods(Any)
        .allow_headers(Any)
}

/// Handler for WebSocket connections
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    counter!(WS_CONNECTION).increment(1);
    gauge!(WS_ACTIVE).increment(1.0);

    ws.on_upgrade(move |socket| handle_connection(socket, state))
}

async fn handle_connection(socket: WebSocket, state: Arc<AppState>) {
    let connection_id = Uuid::new_v4();
    let (mut sink, mut stream) = socket.split();

    // Frames queued for this client; the router publishes into it and
    // this task drains it onto the socket.
    let (tx, mut rx) = mpsc::channel::<String>(CHANNEL_CAPACITY);

    let send_task = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            if sink.send(Message::Text(frame.into())).await.is_err() {
                break;
            }
        }
    });

    debug!(connection = %connection_id, "socket open");
    let mut handler = ConnectionHandler::new(Arc::clone(&state), connection_id, tx);

    while let Some(Ok(message)) = stream.next().await {
        match message {
            Message::Text(text) => handler.handle_frame(&text),
            Message::Close(_) => break,
            _ => {}
        }
    }

    // Teardown tells the room exactly once, even if the socket died
    // without a close frame.
    handler.finish();
    debug!(connection = %connection_id, "socket closed");

    counter!(WS_DISCONNECTION).increment(1);
    gauge!(WS_ACTIVE).decrement(1.0);

    send_task.abort();
}
