use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use vital_core::routing::RouteHistoryEntry;

use crate::state::AppState;

const DEFAULT_LIMIT: usize = 50;
const MAX_LIMIT: usize = 100;

pub fn router() -> Router<AppState> {
    Router::new().route("/v1/routes", get(list_routes))
}

/// Query parameters for listing routing decisions
#[derive(Debug, Deserialize, utoipa::IntoParams)]
pub struct ListRoutesParams {
    /// Narrow to one user's decisions
    #[serde(default)]
    pub user_id: Option<String>,
    /// Maximum number of entries to return (default 50, max 100)
    #[serde(default)]
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct ListRoutesResponse {
    pub routes: Vec<RouteHistoryEntry>,
    pub count: usize,
}

/// Recent routing decisions, newest first
#[utoipa::path(
    get,
    path = "/v1/routes",
    params(ListRoutesParams),
    responses(
        (status = 200, description = "Routing decisions", body = ListRoutesResponse)
    ),
    tag = "routing"
)]
pub async fn list_routes(
    State(state): State<AppState>,
    Query(params): Query<ListRoutesParams>,
) -> Json<ListRoutesResponse> {
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let routes = state
        .adapter
        .router()
        .route_history(params.user_id.as_deref(), limit)
        .await;
    let count = routes.len();

    Json(ListRoutesResponse { routes, count })
}
