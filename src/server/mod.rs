//! HTTP server for the chat relay.
//!
//! Endpoints:
//! - POST /api/chat             - run one chat exchange
//! - POST /api/new-conversation - clear a session's history
//! - GET  /api/status           - config validation + upstream probe

mod handlers;

pub use handlers::{ChatRequestBody, ChatResponseBody};

use std::sync::Arc;

use anyhow::Result;
use axum::Router;
use axum::http::{Method, header};
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::AppConfig;
use crate::context::ContextAssembler;
use crate::llm::ChatBackend;
use crate::parts::PartsFinder;
use crate::session::SessionStore;

/// Shared handler state. Everything is constructed once in `main` and passed
/// in; there is no global mutable state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    /// `None` when the API key is missing; chat requests then get a
    /// configuration error instead of the process refusing to start.
    pub backend: Option<Arc<dyn ChatBackend>>,
    pub context: Arc<ContextAssembler>,
    pub sessions: Arc<SessionStore>,
    pub parts: Option<Arc<PartsFinder>>,
}

/// Create the router with all endpoints.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/api/chat", post(handlers::chat_handler))
        .route(
            "/api/new-conversation",
            post(handlers::new_conversation_handler),
        )
        .route("/api/status", get(handlers::status_handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Run the HTTP server until shutdown.
pub async fn run(state: AppState) -> Result<()> {
    let bind_address = state.config.bind_address();
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    info!("Server listening on http://{bind_address}");
    axum::serve(listener, app).await?;

    Ok(())
}
