use crate::api::types::*;
use crate::config::Config;
use crate::error::{KgserveError, Result};
use crate::service::GraphRag;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// HTTP server exposing /healthz, /build and /chat
pub struct HttpServer {
    state: AppState,
}

impl HttpServer {
    pub fn new(config: Config, backend: Arc<dyn GraphRag>) -> Self {
        Self {
            state: AppState {
                config: Arc::new(config),
                backend,
            },
        }
    }

    /// Run the HTTP server until Ctrl-C
    pub async fn run(&self) -> Result<()> {
        let http = &self.state.config.http_server;
        let addr = format!("{}:{}", http.host, http.port);

        let listener = tokio::net::TcpListener::bind(&addr).await.map_err(|e| {
            KgserveError::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to bind to {}: {}", addr, e),
            ))
        })?;

        log::info!("Starting HTTP server on http://{}", addr);
        log::info!(
            "Graph database at {}:{}, model {}",
            self.state.config.falkor.host,
            self.state.config.falkor.port,
            self.state.config.model.name
        );

        axum::serve(listener, build_router(self.state.clone()))
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        log::info!("HTTP server stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    log::info!("Shutdown signal received");
}

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub backend: Arc<dyn GraphRag>,
}

impl AppState {
    fn graph_name(&self, requested: Option<String>) -> String {
        requested
            .map(|g| g.trim().to_string())
            .filter(|g| !g.is_empty())
            .unwrap_or_else(|| self.config.graph.default_name.clone())
    }
}

/// Create the axum router
pub fn build_router(state: AppState) -> Router {
    let allowed_origins = &state.config.http_server.allowed_origins;

    // No configured origins: allow any (local dev)
    let cors = if allowed_origins.is_empty() {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<axum::http::HeaderValue> = allowed_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods(Any)
            .allow_headers(Any)
    };

    Router::new()
        .route("/healthz", get(handle_health))
        .route("/build", post(handle_build))
        .route("/chat", post(handle_chat))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}

/// Handler error: unknown graphs are 404, everything else a generic 500
struct ApiError(KgserveError);

impl From<KgserveError> for ApiError {
    fn from(err: KgserveError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self.0 {
            KgserveError::GraphNotFound(name) => (
                StatusCode::NOT_FOUND,
                Json(ErrorResponse {
                    error: format!("graph '{}' not found", name),
                }),
            )
                .into_response(),
            err => {
                log::error!("Request failed: {}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ErrorResponse {
                        error: "internal server error".to_string(),
                    }),
                )
                    .into_response()
            }
        }
    }
}

/// Liveness only: never touches the database or the model
async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse { ok: true })
}

async fn handle_build(
    State(state): State<AppState>,
    Json(request): Json<BuildRequest>,
) -> std::result::Result<Json<BuildResponse>, ApiError> {
    let graph = state.graph_name(request.graph);
    log::info!("Build request for '{}' with {} sources", graph, request.urls.len());

    let summary = state.backend.build(&state.config, &graph, &request.urls).await?;
    Ok(Json(BuildResponse::built(summary.nodes)))
}

async fn handle_chat(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> std::result::Result<Json<ChatResponse>, ApiError> {
    let graph = state.graph_name(request.graph);
    log::info!("Chat request for '{}'", graph);

    let answer = state.backend.chat(&state.config, &graph, &request.message).await?;
    Ok(Json(ChatResponse { answer }))
}
