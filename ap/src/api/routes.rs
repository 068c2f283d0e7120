//! HTTP route handlers

use std::sync::Arc;

use axum::extract::State;
use axum::http::{Method, header};
use axum::response::Json;
use axum::routing::{get, post};
use axum::Router;
use eyre::{Context, Result};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use super::types::{ApiError, HealthResponse, RunRequest};
use crate::config::{Config, PipelineConfig};
use crate::coordinator::{Coordinator, CoordinatorConfig, PipelineGraph};
use crate::domain::TaskRecord;
use crate::llm::{LlmClient, create_client};
use crate::worker::Source;

/// Shared application state
pub struct AppState {
    pub config: Config,
    /// Client handed to externally-sourced workers
    llm: Arc<dyn LlmClient>,
    /// Whether the configured API key variable was set at startup
    credential_present: bool,
    /// Graph for the server's default pipeline policy
    graph: PipelineGraph,
}

impl AppState {
    /// Build state from config, validating the default pipeline policy
    pub fn new(config: Config) -> Result<Self> {
        debug!("AppState::new: called");
        let llm = create_client(&config.llm).context("Failed to create LLM client")?;
        let credential_present = config.llm.credential_present();
        Self::with_llm(config, llm, credential_present)
    }

    /// Build state around an explicit LLM client
    pub fn with_llm(config: Config, llm: Arc<dyn LlmClient>, credential_present: bool) -> Result<Self> {
        debug!(credential_present, "AppState::with_llm: called");
        let policy = CoordinatorConfig::try_from(&config.pipeline).context("Invalid pipeline config")?;
        Ok(Self {
            config,
            llm,
            credential_present,
            graph: PipelineGraph::new(&policy),
        })
    }

    fn source_for(&self, pipeline: &PipelineConfig) -> Source {
        if pipeline.resolve_mock(self.credential_present) {
            Source::Deterministic
        } else {
            Source::External(self.llm.clone())
        }
    }
}

/// Build the router over shared state
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT]);

    Router::new()
        .route("/health", get(health))
        .route("/run", post(run_pipeline))
        .route("/graph", get(graph))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Start the HTTP server
pub async fn serve(config: Config) -> Result<()> {
    let addr = config.server.bind_addr();
    let state = Arc::new(AppState::new(config)?);
    let app = router(state);

    let listener = TcpListener::bind(&addr)
        .await
        .context(format!("Failed to bind {}", addr))?;
    info!("Starting HTTP server on http://{}", addr);
    axum::serve(listener, app).await.context("HTTP server failed")?;
    Ok(())
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}

async fn graph(State(state): State<Arc<AppState>>) -> Json<PipelineGraph> {
    Json(state.graph.clone())
}

async fn run_pipeline(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RunRequest>,
) -> Result<Json<TaskRecord>, ApiError> {
    debug!(query = %req.query, ?req.mock, "run_pipeline: called");
    let pipeline = req.pipeline(&state.config.pipeline)?;
    let coordinator = Coordinator::new(&pipeline, state.source_for(&pipeline))?;

    let deadline = state.config.server.run_timeout();
    match tokio::time::timeout(deadline, coordinator.run(req.query.clone())).await {
        Ok(record) => Ok(Json(record)),
        Err(_) => {
            warn!(query = %req.query, ?deadline, "run_pipeline: deadline expired");
            Err(ApiError::Timeout {
                query: req.query,
                after_ms: state.config.server.run_timeout_ms,
            })
        }
    }
}
