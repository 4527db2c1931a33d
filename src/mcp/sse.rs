//! SSE transport.
//!
//! - `GET /sse` opens an event stream. Its first event is `endpoint`,
//!   carrying the URL the client posts messages to.
//! - `POST /messages/?session_id=<id>` takes one JSON-RPC message and
//!   answers 202; the reply arrives on the stream as a `message` event.
//!
//! A session lives as long as its event stream.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::routing::{get, post};
use axum::Router;
use dashmap::DashMap;
use futures::stream::{self, Stream, StreamExt};
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::{debug, error, info};
use uuid::Uuid;

use super::protocol::JsonRpcResponse;
use super::server::ToolServer;

pub const SSE_PATH: &str = "/sse";
pub const MESSAGES_PATH: &str = "/messages/";

/// Shared state of the SSE transport
pub struct SseState {
    server: Arc<ToolServer>,
    sessions: DashMap<String, mpsc::UnboundedSender<JsonRpcResponse>>,
}

impl SseState {
    pub fn new(server: Arc<ToolServer>) -> Self {
        Self {
            server,
            sessions: DashMap::new(),
        }
    }

    /// Number of open sessions
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }
}

/// Removes its session when the event stream is dropped
struct SessionGuard {
    state: Arc<SseState>,
    session_id: String,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.state.sessions.remove(&self.session_id);
        info!(session_id = %self.session_id, "SSE session closed");
    }
}

#[derive(Debug, Deserialize)]
struct MessageQuery {
    session_id: String,
}

/// Build the SSE router
pub fn router(state: Arc<SseState>) -> Router {
    Router::new()
        .route(SSE_PATH, get(open_stream))
        .route(MESSAGES_PATH, post(post_message))
        .route("/messages", post(post_message))
        .with_state(state)
}

async fn open_stream(
    State(state): State<Arc<SseState>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let session_id = Uuid::new_v4().simple().to_string();
    let (tx, rx) = mpsc::unbounded_channel();
    state.sessions.insert(session_id.clone(), tx);
    info!(%session_id, "SSE session opened");

    let endpoint = Event::default()
        .event("endpoint")
        .data(format!("{}?session_id={}", MESSAGES_PATH, session_id));

    let guard = SessionGuard {
        state: Arc::clone(&state),
        session_id,
    };

    let messages = stream::unfold((rx, guard), |(mut rx, guard)| async move {
        let response = rx.recv().await?;
        let event = match serde_json::to_string(&response) {
            Ok(json) => Event::default().event("message").data(json),
            Err(e) => {
                error!(error = %e, "Failed to encode response");
                Event::default().comment("encode error")
            }
        };
        Some((Ok(event), (rx, guard)))
    });

    let events = stream::once(async move { Ok::<_, Infallible>(endpoint) }).chain(messages);
    Sse::new(events).keep_alive(KeepAlive::default())
}

async fn post_message(
    State(state): State<Arc<SseState>>,
    Query(query): Query<MessageQuery>,
    body: String,
) -> (StatusCode, &'static str) {
    let Some(sender) = state.sessions.get(&query.session_id).map(|s| s.clone()) else {
        debug!(session_id = %query.session_id, "Message for unknown session");
        return (StatusCode::NOT_FOUND, "Could not find session");
    };

    let server = Arc::clone(&state.server);
    tokio::spawn(async move {
        if let Some(response) = server.handle_message(&body).await {
            if sender.send(response).is_err() {
                debug!("Session closed before the response was delivered");
            }
        }
    });

    (StatusCode::ACCEPTED, "Accepted")
}

/// Serve the SSE transport until Ctrl-C
pub async fn serve(server: Arc<ToolServer>, addr: SocketAddr) -> Result<()> {
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!(%addr, "SSE transport listening");

    let state = Arc::new(SseState::new(server));
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("SSE server failed")
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}
