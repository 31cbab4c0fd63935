//! REST API Handlers
//!
//! JSON endpoints in front of the orchestrator. Errors are returned as
//! `{code, message, retryable}` with an HTTP status derived from the error code.

use crate::controlplane::orchestrator::VolumeOrchestrator;
use crate::domain::ports::{
    CreateVolumeRequest, CreatedVolume, Mounter, NamespaceRecord, NodeInfo, OffloadProcessor,
    PluginCapabilities, PluginInfo, ProbeResult, UnpublishRequest, VolumeBackend,
    VolumeCapability, VolumeRequest, VolumeStats, VolumeStatsRequest,
};
use crate::error::{Error, ErrorBody, ErrorCode};
use crate::metrics;
use axum::{
    extract::{rejection::JsonRejection, Json, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::debug;

// =============================================================================
// Request/Response Types
// =============================================================================

/// Result of a successful publish
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishResponse {
    pub device_path: String,
    /// True when the target was mounted before this call
    pub already_mounted: bool,
    pub mount_attempts: u32,
}

/// Node capabilities
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeCapabilitiesResponse {
    pub capabilities: Vec<String>,
}

/// Capability validation request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateCapabilitiesRequest {
    #[serde(default)]
    pub volume_id: String,
    #[serde(default)]
    pub volume_capabilities: Option<Vec<VolumeCapability>>,
}

/// Capability validation result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateCapabilitiesResponse {
    pub confirmed: Vec<VolumeCapability>,
}

/// Health response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub offload_enabled: bool,
}

/// Empty success body
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Empty {}

// =============================================================================
// Error Mapping
// =============================================================================

/// Error as returned over HTTP
#[derive(Debug)]
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self(Error::InvalidArgument(rejection.body_text()))
    }
}

/// HTTP status for an error code
pub fn status_for(code: ErrorCode) -> StatusCode {
    match code {
        ErrorCode::InvalidArgument => StatusCode::BAD_REQUEST,
        ErrorCode::NotFound => StatusCode::NOT_FOUND,
        ErrorCode::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
        ErrorCode::DeadlineExceeded => StatusCode::GATEWAY_TIMEOUT,
        ErrorCode::Unimplemented => StatusCode::NOT_IMPLEMENTED,
        // Client closed request
        ErrorCode::Cancelled => {
            StatusCode::from_u16(499).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
        }
        ErrorCode::Internal | ErrorCode::Unknown => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody::from(&self.0);
        (status_for(body.code), Json(body)).into_response()
    }
}

type ApiResult<T> = std::result::Result<Json<T>, ApiError>;

// =============================================================================
// REST Router
// =============================================================================

/// REST API router builder
pub struct RestRouter<B, O, M> {
    orchestrator: Arc<VolumeOrchestrator<B, O, M>>,
    shutdown: CancellationToken,
}

impl<B, O, M> RestRouter<B, O, M>
where
    B: VolumeBackend + 'static,
    O: OffloadProcessor + 'static,
    M: Mounter + 'static,
{
    /// Create a new REST router; `shutdown` is the parent of every request token
    pub fn new(orchestrator: Arc<VolumeOrchestrator<B, O, M>>, shutdown: CancellationToken) -> Self {
        Self {
            orchestrator,
            shutdown,
        }
    }

    /// Build the Axum router
    pub fn build(self) -> Router {
        let state = AppState {
            orchestrator: self.orchestrator,
            shutdown: self.shutdown,
        };

        Router::new()
            // Node endpoints
            .route("/v1/node/publish", post(node_publish::<B, O, M>))
            .route("/v1/node/unpublish", post(node_unpublish::<B, O, M>))
            .route("/v1/node/info", get(node_info::<B, O, M>))
            .route("/v1/node/capabilities", get(node_capabilities::<B, O, M>))
            .route("/v1/node/stats", post(node_stats::<B, O, M>))
            .route("/v1/node/stage", post(node_stage::<B, O, M>))
            .route("/v1/node/unstage", post(node_unstage::<B, O, M>))
            .route("/v1/node/expand", post(node_expand::<B, O, M>))
            // Identity endpoints
            .route("/v1/identity/info", get(plugin_info::<B, O, M>))
            .route("/v1/identity/probe", get(probe::<B, O, M>))
            .route("/v1/identity/capabilities", get(plugin_capabilities::<B, O, M>))
            // Controller endpoints
            .route("/v1/controller/volumes", post(create_volume::<B, O, M>))
            .route("/v1/controller/volumes/:id", delete(delete_volume::<B, O, M>))
            .route("/v1/controller/validate", post(validate_capabilities::<B, O, M>))
            // Host inventory
            .route("/v1/namespaces", get(list_namespaces::<B, O, M>))
            // Health and metrics
            .route("/health", get(health_check::<B, O, M>))
            .route("/metrics", get(metrics_text))
            .layer(TraceLayer::new_for_http())
            .with_state(state)
    }
}

/// Shared application state
struct AppState<B, O, M> {
    orchestrator: Arc<VolumeOrchestrator<B, O, M>>,
    shutdown: CancellationToken,
}

impl<B, O, M> Clone for AppState<B, O, M> {
    fn clone(&self) -> Self {
        Self {
            orchestrator: self.orchestrator.clone(),
            shutdown: self.shutdown.clone(),
        }
    }
}

impl<B, O, M> AppState<B, O, M> {
    /// Token for one request, cancelled when the server shuts down
    fn request_token(&self) -> CancellationToken {
        self.shutdown.child_token()
    }
}

// =============================================================================
// Node Handlers
// =============================================================================

async fn node_publish<B, O, M>(
    State(state): State<AppState<B, O, M>>,
    payload: Result<Json<VolumeRequest>, JsonRejection>,
) -> ApiResult<PublishResponse>
where
    B: VolumeBackend,
    O: OffloadProcessor,
    M: Mounter,
{
    let Json(request) = payload?;
    let session = state
        .orchestrator
        .publish(&request, &state.request_token())
        .await?;

    Ok(Json(PublishResponse {
        already_mounted: session.already_mounted(),
        mount_attempts: session.mount_attempts,
        device_path: session.device_path,
    }))
}

async fn node_unpublish<B, O, M>(
    State(state): State<AppState<B, O, M>>,
    payload: Result<Json<UnpublishRequest>, JsonRejection>,
) -> ApiResult<Empty>
where
    B: VolumeBackend,
    O: OffloadProcessor,
    M: Mounter,
{
    let Json(request) = payload?;
    state
        .orchestrator
        .unpublish(&request, &state.request_token())
        .await?;
    Ok(Json(Empty::default()))
}

async fn node_info<B, O, M>(State(state): State<AppState<B, O, M>>) -> Json<NodeInfo>
where
    B: VolumeBackend,
    O: OffloadProcessor,
    M: Mounter,
{
    Json(state.orchestrator.node_info())
}

async fn node_capabilities<B, O, M>(
    State(state): State<AppState<B, O, M>>,
) -> Json<NodeCapabilitiesResponse>
where
    B: VolumeBackend,
    O: OffloadProcessor,
    M: Mounter,
{
    Json(NodeCapabilitiesResponse {
        capabilities: state.orchestrator.node_capabilities(),
    })
}

async fn node_stats<B, O, M>(
    State(state): State<AppState<B, O, M>>,
    payload: Result<Json<VolumeStatsRequest>, JsonRejection>,
) -> ApiResult<VolumeStats>
where
    B: VolumeBackend,
    O: OffloadProcessor,
    M: Mounter,
{
    let Json(request) = payload?;
    Ok(Json(state.orchestrator.node_volume_stats(&request)?))
}

async fn node_stage<B, O, M>(State(state): State<AppState<B, O, M>>) -> ApiResult<Empty>
where
    B: VolumeBackend,
    O: OffloadProcessor,
    M: Mounter,
{
    state.orchestrator.node_stage()?;
    Ok(Json(Empty::default()))
}

async fn node_unstage<B, O, M>(State(state): State<AppState<B, O, M>>) -> ApiResult<Empty>
where
    B: VolumeBackend,
    O: OffloadProcessor,
    M: Mounter,
{
    state.orchestrator.node_unstage()?;
    Ok(Json(Empty::default()))
}

async fn node_expand<B, O, M>(State(state): State<AppState<B, O, M>>) -> ApiResult<Empty>
where
    B: VolumeBackend,
    O: OffloadProcessor,
    M: Mounter,
{
    state.orchestrator.node_expand()?;
    Ok(Json(Empty::default()))
}

// =============================================================================
// Identity Handlers
// =============================================================================

async fn plugin_info<B, O, M>(State(state): State<AppState<B, O, M>>) -> ApiResult<PluginInfo>
where
    B: VolumeBackend,
    O: OffloadProcessor,
    M: Mounter,
{
    Ok(Json(state.orchestrator.plugin_info(&state.request_token()).await?))
}

async fn probe<B, O, M>(State(state): State<AppState<B, O, M>>) -> ApiResult<ProbeResult>
where
    B: VolumeBackend,
    O: OffloadProcessor,
    M: Mounter,
{
    Ok(Json(state.orchestrator.probe(&state.request_token()).await?))
}

async fn plugin_capabilities<B, O, M>(
    State(state): State<AppState<B, O, M>>,
) -> ApiResult<PluginCapabilities>
where
    B: VolumeBackend,
    O: OffloadProcessor,
    M: Mounter,
{
    Ok(Json(
        state
            .orchestrator
            .plugin_capabilities(&state.request_token())
            .await?,
    ))
}

// =============================================================================
// Controller Handlers
// =============================================================================

async fn create_volume<B, O, M>(
    State(state): State<AppState<B, O, M>>,
    payload: Result<Json<CreateVolumeRequest>, JsonRejection>,
) -> ApiResult<CreatedVolume>
where
    B: VolumeBackend,
    O: OffloadProcessor,
    M: Mounter,
{
    let Json(request) = payload?;
    Ok(Json(
        state
            .orchestrator
            .create_volume(&request, &state.request_token())
            .await?,
    ))
}

async fn delete_volume<B, O, M>(
    State(state): State<AppState<B, O, M>>,
    Path(volume_id): Path<String>,
) -> ApiResult<Empty>
where
    B: VolumeBackend,
    O: OffloadProcessor,
    M: Mounter,
{
    state.orchestrator.delete_volume(&volume_id)?;
    Ok(Json(Empty::default()))
}

async fn validate_capabilities<B, O, M>(
    State(state): State<AppState<B, O, M>>,
    payload: Result<Json<ValidateCapabilitiesRequest>, JsonRejection>,
) -> ApiResult<ValidateCapabilitiesResponse>
where
    B: VolumeBackend,
    O: OffloadProcessor,
    M: Mounter,
{
    let Json(request) = payload?;
    state
        .orchestrator
        .validate_volume_capabilities(&request.volume_id, request.volume_capabilities.as_deref())?;

    Ok(Json(ValidateCapabilitiesResponse {
        confirmed: request.volume_capabilities.unwrap_or_default(),
    }))
}

// =============================================================================
// Inventory / Health Handlers
// =============================================================================

async fn list_namespaces<B, O, M>(
    State(state): State<AppState<B, O, M>>,
) -> ApiResult<Vec<NamespaceRecord>>
where
    B: VolumeBackend,
    O: OffloadProcessor,
    M: Mounter,
{
    let namespaces = state.orchestrator.scanner().inventory().await?;
    debug!(count = namespaces.len(), "Listed namespaces");
    Ok(Json(namespaces))
}

async fn health_check<B, O, M>(State(state): State<AppState<B, O, M>>) -> Json<HealthResponse>
where
    B: VolumeBackend,
    O: OffloadProcessor,
    M: Mounter,
{
    Json(HealthResponse {
        status: "healthy".into(),
        version: crate::VERSION.into(),
        offload_enabled: state.orchestrator.has_offload(),
    })
}

async fn metrics_text() -> Result<Response, ApiError> {
    let (content_type, body) = metrics::gather_text()?;
    Ok(([(header::CONTENT_TYPE, content_type)], body).into_response())
}
