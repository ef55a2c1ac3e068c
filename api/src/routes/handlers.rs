use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;

use vital_core::routing::HandlerDescriptor;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/v1/handlers", get(list_handlers))
}

#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct ListHandlersResponse {
    /// Registered handlers in routing priority order
    pub handlers: Vec<HandlerDescriptor>,
    pub count: usize,
}

/// The registered handler roster
#[utoipa::path(
    get,
    path = "/v1/handlers",
    responses(
        (status = 200, description = "Registered handlers", body = ListHandlersResponse)
    ),
    tag = "routing"
)]
pub async fn list_handlers(State(state): State<AppState>) -> Json<ListHandlersResponse> {
    let handlers = state.descriptors.as_ref().clone();
    let count = handlers.len();
    Json(ListHandlersResponse { handlers, count })
}
