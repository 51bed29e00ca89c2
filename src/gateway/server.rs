//! HTTP server setup and configuration.

use axum::{
    routing::{get, post},
    Router,
};
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tower_http::trace::TraceLayer;

use super::dispatch::Dispatcher;
use super::handlers;
use crate::config::Config;
use crate::registry::ModelRegistry;
use crate::ws::{ws_handler, EventHub};

/// Upstream calls are abandoned after this long, surfacing as transport
/// failures to the caller.
const UPSTREAM_TIMEOUT: Duration = Duration::from_secs(60);
const UPSTREAM_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
    pub registry: Arc<ModelRegistry>,
    pub hub: Arc<EventHub>,
}

impl AppState {
    /// Assemble state from configuration: registry, hub, outbound client.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let registry = Arc::new(ModelRegistry::from_config(config));
        let hub = Arc::new(EventHub::new());

        let http_client = Client::builder()
            .timeout(UPSTREAM_TIMEOUT)
            .connect_timeout(UPSTREAM_CONNECT_TIMEOUT)
            .build()?;

        let dispatcher = Arc::new(Dispatcher::new(
            registry.clone(),
            http_client,
            hub.clone(),
        ));

        Ok(Self {
            dispatcher,
            registry,
            hub,
        })
    }
}

/// Create the axum router with all endpoints.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/chat/completions", post(handlers::chat_completions))
        .route("/api/models", get(handlers::list_models))
        .route("/health", get(handlers::health))
        .route("/ws", get(ws_handler))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Run the HTTP server.
pub async fn run_server(config: Config) -> anyhow::Result<()> {
    let listen_addr = config.server.listen.clone();

    let state = AppState::from_config(&config)?;
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(&listen_addr).await?;
    tracing::info!(address = %listen_addr, "Starting chatgate server");

    axum::serve(listener, app).await?;

    Ok(())
}
