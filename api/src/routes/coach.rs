use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use vital_core::data::DataKind;
use vital_core::error::ApiError;
use vital_core::response::CoachResponse;
use vital_core::routing::{RouteHistoryEntry, RouteMethod};

use crate::error::AppError;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/coach/query", post(coach_query))
        .route("/v1/coach/upload", post(coach_upload))
}

#[derive(Debug, Clone, Deserialize, utoipa::ToSchema)]
pub struct CoachQueryRequest {
    pub user_id: String,
    /// Natural-language question for the coach
    pub query: String,
    /// Session metadata merged before routing (optional)
    #[serde(default)]
    pub metadata: Option<Map<String, Value>>,
}

#[derive(Debug, Clone, Deserialize, utoipa::ToSchema)]
pub struct CoachUploadRequest {
    pub user_id: String,
    /// One of: sleep, exercise, nutrition, biometric
    pub data_type: String,
    /// Records as a JSON array of per-day objects
    pub data: Value,
}

/// A routing decision plus the answer it produced.
#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct RoutedResponse {
    /// Route-history entry ID for this request
    pub request_id: Uuid,
    pub user_id: String,
    /// Handler that answered; null when routing failed outright
    pub handler: Option<String>,
    pub method: RouteMethod,
    pub confidence: f64,
    #[serde(flatten)]
    pub envelope: CoachResponse,
}

impl RoutedResponse {
    fn from_parts(entry: RouteHistoryEntry, envelope: CoachResponse) -> Self {
        Self {
            request_id: entry.id,
            user_id: entry.user_id,
            handler: entry.handler,
            method: entry.method,
            confidence: entry.confidence,
            envelope,
        }
    }
}

/// Route a query to the best handler and return its answer
///
/// Routing never fails: when no handler qualifies or the selected one
/// errors, the envelope carries the failure and `method` is `error`.
#[utoipa::path(
    post,
    path = "/v1/coach/query",
    request_body = CoachQueryRequest,
    responses(
        (status = 200, description = "Routed answer", body = RoutedResponse),
        (status = 400, description = "Validation failed", body = ApiError),
        (status = 429, description = "Rate limited", body = ApiError)
    ),
    tag = "coach"
)]
pub async fn coach_query(
    State(state): State<AppState>,
    Json(req): Json<CoachQueryRequest>,
) -> Result<Json<RoutedResponse>, AppError> {
    let user_id = req.user_id.trim();
    if user_id.is_empty() {
        return Err(AppError::validation("user_id must not be empty"));
    }
    if req.query.trim().is_empty() {
        return Err(AppError::validation("query must not be empty"));
    }

    let (entry, envelope) = state
        .adapter
        .route_query_traced(user_id, &req.query, req.metadata.as_ref())
        .await;

    Ok(Json(RoutedResponse::from_parts(entry, envelope)))
}

/// Upload health records and get first insights back
///
/// Builds the upload metadata and a canned query, then routes it like
/// any other request; supporting handlers refresh their observation
/// contexts before the answer is produced.
#[utoipa::path(
    post,
    path = "/v1/coach/upload",
    request_body = CoachUploadRequest,
    responses(
        (status = 200, description = "Upload ingested and routed", body = RoutedResponse),
        (status = 400, description = "Validation failed", body = ApiError),
        (status = 429, description = "Rate limited", body = ApiError)
    ),
    tag = "coach"
)]
pub async fn coach_upload(
    State(state): State<AppState>,
    Json(req): Json<CoachUploadRequest>,
) -> Result<Json<RoutedResponse>, AppError> {
    let user_id = req.user_id.trim();
    if user_id.is_empty() {
        return Err(AppError::validation("user_id must not be empty"));
    }

    let Some(kind) = DataKind::parse(&req.data_type) else {
        return Err(AppError::field_validation(
            format!("unknown data_type '{}'", req.data_type),
            "data_type",
            Value::String(req.data_type),
            "Expected one of: sleep, exercise, nutrition, biometric",
        ));
    };

    let is_populated_array = req.data.as_array().is_some_and(|a| !a.is_empty());
    if !is_populated_array {
        return Err(AppError::field_validation(
            "data must be a non-empty JSON array of records",
            "data",
            req.data,
            "Send records as an array of per-day objects, e.g. \
             [{\"date\": \"2025-01-01\", \"sleep_hours\": 7.5}]",
        ));
    }

    let (entry, envelope) = state.adapter.upload_traced(user_id, kind, req.data).await;

    Ok(Json(RoutedResponse::from_parts(entry, envelope)))
}
