use crate::{
    app::{AppError, AppService, Health, RankingResult, SERVICE_NAME},
    mcp::{McpServer, PROTOCOL_VERSION},
    recommend::InstallGuide,
};
use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::{fmt::Debug, sync::Arc};
use tokio::signal;

#[derive(Clone)]
struct SharedState {
    service: Arc<AppService>,
    mcp: Arc<McpServer>,
}

pub fn router(service: Arc<AppService>) -> Router {
    let shared_state = Arc::new(SharedState {
        mcp: Arc::new(McpServer::new(service.clone())),
        service,
    });

    Router::new()
        .route("/health", get(health))
        .route("/api/find-mcp", post(find_mcp))
        .route("/api/add-mcp", post(add_mcp))
        .route("/api/refresh", post(refresh))
        .route("/mcp/info", get(mcp_info))
        .route("/mcp", post(mcp))
        .layer(
            tower::ServiceBuilder::new().layer(
                tower_http::trace::TraceLayer::new_for_http()
                    .make_span_with(
                        tower_http::trace::DefaultMakeSpan::new().level(tracing::Level::INFO),
                    )
                    .on_response(
                        tower_http::trace::DefaultOnResponse::new().level(tracing::Level::INFO),
                    ),
            ),
        )
        .with_state(shared_state)
}

async fn shutdown_signal(service: Arc<AppService>) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            log::error!("failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                log::error!("failed to install signal handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    log::warn!("shutting down");
    service.shutdown();
}

async fn start_app(service: Arc<AppService>, bind: String) -> anyhow::Result<()> {
    let app = router(service.clone());

    let listener = tokio::net::TcpListener::bind(&bind).await?;
    log::info!("listening on {bind}");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(service))
        .await?;
    Ok(())
}

pub fn start_daemon(service: Arc<AppService>, bind: &str) -> anyhow::Result<()> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(start_app(service, bind.to_string()))
}

#[derive(Debug)]
struct HttpError(AppError);

impl IntoResponse for HttpError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self.0 {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Cache(_) => {
                log::error!("{self:?}");
                StatusCode::SERVICE_UNAVAILABLE
            }
            AppError::Other(_) => {
                log::error!("{self:?}");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        (status, Json(json!({"error": self.0.to_string()}))).into_response()
    }
}

impl<E> From<E> for HttpError
where
    E: Into<AppError>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

async fn health(State(state): State<Arc<SharedState>>) -> Json<Health> {
    Json(state.service.health())
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FindMcpRequest {
    pub query: Option<String>,
}

async fn find_mcp(
    State(state): State<Arc<SharedState>>,
    Json(payload): Json<FindMcpRequest>,
) -> Result<Json<RankingResult>, HttpError> {
    log::debug!("payload: {payload:?}");

    let query = payload
        .query
        .filter(|q| !q.trim().is_empty())
        .ok_or_else(|| AppError::BadRequest("query is required".to_string()))?;

    let service = state.service.clone();
    tokio::task::block_in_place(move || Ok(Json(service.find_mcp(&query))))
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddMcpRequest {
    pub mcp_id: Option<Value>,
}

async fn add_mcp(
    State(state): State<Arc<SharedState>>,
    Json(payload): Json<AddMcpRequest>,
) -> Result<Json<InstallGuide>, HttpError> {
    log::debug!("payload: {payload:?}");

    let mcp_id = match payload.mcp_id {
        Some(Value::String(id)) if !id.trim().is_empty() => id,
        Some(Value::Number(id)) => id.to_string(),
        _ => return Err(AppError::BadRequest("mcpId is required".to_string()).into()),
    };

    let service = state.service.clone();
    tokio::task::block_in_place(move || Ok(Json(service.add_mcp(&mcp_id))))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResponse {
    pub mcp_count: usize,
}

async fn refresh(
    State(state): State<Arc<SharedState>>,
) -> Result<Json<RefreshResponse>, HttpError> {
    let service = state.service.clone();
    tokio::task::block_in_place(move || {
        let mcp_count = service.refresh()?;
        Ok(Json(RefreshResponse { mcp_count }))
    })
}

async fn mcp_info(State(state): State<Arc<SharedState>>) -> Json<Value> {
    let health = state.service.health();
    Json(json!({
        "name": SERVICE_NAME,
        "version": env!("CARGO_PKG_VERSION"),
        "protocolVersion": PROTOCOL_VERSION,
        "strategy": health.strategy,
        "tools": ["find_mcp", "add_mcp"],
        "endpoints": {
            "mcp": "/mcp",
            "health": "/health",
            "findMcp": "/api/find-mcp",
            "addMcp": "/api/add-mcp",
            "refresh": "/api/refresh"
        }
    }))
}

/// JSON-RPC over HTTP. Notifications are acknowledged with 202.
async fn mcp(State(state): State<Arc<SharedState>>, body: String) -> axum::response::Response {
    let server = state.mcp.clone();
    match tokio::task::block_in_place(move || server.handle_message(&body)) {
        Some(response) => Json(response).into_response(),
        None => StatusCode::ACCEPTED.into_response(),
    }
}
