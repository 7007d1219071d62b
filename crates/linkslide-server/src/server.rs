use std::sync::Arc;

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use futures::{Stream, StreamExt};
use serde::Deserialize;
use tokio::sync::oneshot;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use linkslide_core::layout::OutputLayout;
use linkslide_core::session::{GenerationOptions, QualityMode};
use linkslide_settings::StylePreset;

use crate::error::ServerError;
use crate::orchestrator::SessionOrchestrator;

/// Server configuration.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub layout: OutputLayout,
    pub styles: Vec<StylePreset>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 5809,
            layout: OutputLayout::default(),
            styles: vec![StylePreset::default()],
        }
    }
}

/// Shared application state passed to Axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<SessionOrchestrator>,
    pub styles: Arc<Vec<StylePreset>>,
}

/// Body of `POST /generate_stream`.
#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    #[serde(default)]
    pub topic: String,
    #[serde(default)]
    pub use_pro: bool,
    #[serde(default)]
    pub style_prompt: Option<String>,
    #[serde(default)]
    pub color_hex: Option<String>,
}

/// Build the Axum router with all routes.
pub fn build_router(state: AppState, layout: &OutputLayout) -> Router {
    Router::new()
        .route("/generate_stream", post(generate_stream_handler))
        .route("/styles", get(styles_handler))
        .route("/health", get(health_handler))
        .nest_service(layout.public_prefix(), ServeDir::new(layout.root()))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Bind and start serving. Returns a handle that keeps the server running.
pub async fn start(
    config: ServerConfig,
    orchestrator: Arc<SessionOrchestrator>,
) -> Result<ServerHandle, std::io::Error> {
    let state = AppState {
        orchestrator,
        styles: Arc::new(config.styles),
    };
    let router = build_router(state, &config.layout);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    let local_addr = listener.local_addr()?;

    tracing::info!(
        host = %config.host,
        port = local_addr.port(),
        output_root = %config.layout.root().display(),
        "LinkSlide server started"
    );

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let server = tokio::spawn(async move {
        let result = axum::serve(listener, router)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            })
            .await;
        if let Err(e) = result {
            tracing::error!(error = %e, "server exited with error");
        }
    });

    Ok(ServerHandle {
        port: local_addr.port(),
        shutdown_tx: Some(shutdown_tx),
        server,
    })
}

/// Handle returned by `start()`.
pub struct ServerHandle {
    pub port: u16,
    shutdown_tx: Option<oneshot::Sender<()>>,
    server: tokio::task::JoinHandle<()>,
}

impl ServerHandle {
    /// Stop accepting connections and wait for in-flight responses to end.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Err(e) = self.server.await {
            tracing::warn!(error = %e, "server task ended abnormally");
        }
    }
}

/// Streams progress events for one new session as server-sent events.
async fn generate_stream_handler(
    State(state): State<AppState>,
    Json(request): Json<GenerateRequest>,
) -> Result<Sse<impl Stream<Item = Result<Event, axum::Error>>>, ServerError> {
    let topic = request.topic.trim();
    if topic.is_empty() {
        return Err(ServerError::InvalidRequest("topic is required".into()));
    }

    let options = GenerationOptions {
        mode: QualityMode::from_flag(request.use_pro),
        style_prompt: request.style_prompt,
        color_hint: request.color_hex,
    };
    let (session, progress) = state.orchestrator.start(topic, &options);
    let session_id = session.id;
    let events = progress.map(move |event| {
        if event.is_terminal() {
            tracing::info!(session_id = %session_id, kind = event.kind(), "progress stream ended");
        }
        Event::default().json_data(&event)
    });

    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}

async fn styles_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.styles.as_ref().clone())
}

async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "healthy" }))
}
