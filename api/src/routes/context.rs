use axum::extract::{Path, State};
use axum::routing::{delete, get, put};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use vital_core::error::ApiError;

use crate::error::AppError;
use crate::state::AppState;

pub fn write_router() -> Router<AppState> {
    Router::new()
        .route("/v1/context/{user_id}", put(update_context))
        .route("/v1/context/{user_id}", delete(clear_context))
}

pub fn read_router() -> Router<AppState> {
    Router::new().route("/v1/context/{user_id}/topic", get(active_topic))
}

#[derive(Debug, Clone, Deserialize, utoipa::ToSchema)]
pub struct UpdateContextRequest {
    /// Key-value pairs merged into the session, last write wins
    pub metadata: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct ContextUpdatedResponse {
    pub user_id: String,
    pub updated: bool,
}

#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct ContextClearedResponse {
    pub user_id: String,
    /// False when the user had no session to clear
    pub cleared: bool,
}

#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct ActiveTopicResponse {
    pub user_id: String,
    /// Handler behind the user's latest routed query, "general" before
    /// any query has been routed
    pub active_topic: String,
}

/// Merge metadata into a user's session
#[utoipa::path(
    put,
    path = "/v1/context/{user_id}",
    request_body = UpdateContextRequest,
    params(("user_id" = String, Path, description = "User to update")),
    responses(
        (status = 200, description = "Metadata merged", body = ContextUpdatedResponse),
        (status = 400, description = "Validation failed", body = ApiError)
    ),
    tag = "context"
)]
pub async fn update_context(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Json(req): Json<UpdateContextRequest>,
) -> Result<Json<ContextUpdatedResponse>, AppError> {
    if user_id.trim().is_empty() {
        return Err(AppError::validation("user_id must not be empty"));
    }
    if req.metadata.is_empty() {
        return Err(AppError::validation("metadata must not be empty"));
    }

    state.adapter.update_context(&user_id, &req.metadata).await;

    Ok(Json(ContextUpdatedResponse {
        user_id,
        updated: true,
    }))
}

/// Forget a user's session: metadata, query log, observation contexts
///
/// Route history is an audit log and is not touched.
#[utoipa::path(
    delete,
    path = "/v1/context/{user_id}",
    params(("user_id" = String, Path, description = "User to clear")),
    responses(
        (status = 200, description = "Session cleared (or nothing to clear)", body = ContextClearedResponse)
    ),
    tag = "context"
)]
pub async fn clear_context(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Json<ContextClearedResponse> {
    let cleared = state.adapter.clear_context(&user_id).await;
    Json(ContextClearedResponse { user_id, cleared })
}

/// The topic (handler) of the user's most recent routed query
#[utoipa::path(
    get,
    path = "/v1/context/{user_id}/topic",
    params(("user_id" = String, Path, description = "User to inspect")),
    responses(
        (status = 200, description = "Active topic", body = ActiveTopicResponse)
    ),
    tag = "context"
)]
pub async fn active_topic(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Json<ActiveTopicResponse> {
    let active_topic = state.adapter.active_topic(&user_id).await;
    Json(ActiveTopicResponse {
        user_id,
        active_topic,
    })
}
