use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::http::HeaderValue;
use serde::Serialize;
use tower::ServiceBuilder;
use tower_http::request_id::{MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use vital_router::{RouterAdapter, RouterConfig, SemanticRouter};

mod error;
mod middleware;
mod routes;
mod state;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Vital Coach API",
        version = "0.1.0",
        description = "Semantic dispatch for health coaching: queries are routed to the best specialist handler by capability similarity, keywords, and the freshness of the user's uploaded data."
    ),
    paths(
        routes::health::health_check,
        routes::coach::coach_query,
        routes::coach::coach_upload,
        routes::context::update_context,
        routes::context::clear_context,
        routes::context::active_topic,
        routes::history::list_routes,
        routes::handlers::list_handlers,
    ),
    components(schemas(
        HealthResponse,
        routes::coach::CoachQueryRequest,
        routes::coach::CoachUploadRequest,
        routes::coach::RoutedResponse,
        routes::context::UpdateContextRequest,
        routes::context::ContextUpdatedResponse,
        routes::context::ContextClearedResponse,
        routes::context::ActiveTopicResponse,
        routes::history::ListRoutesResponse,
        routes::handlers::ListHandlersResponse,
        vital_core::error::ApiError,
        vital_core::response::CoachResponse,
        vital_core::routing::RouteMethod,
        vital_core::routing::RouteHistoryEntry,
        vital_core::routing::HandlerDescriptor,
        vital_core::data::DataKind,
    ))
)]
struct ApiDoc;

#[derive(Serialize, utoipa::ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[derive(Clone, Default)]
struct MakeRequestUuid;

impl MakeRequestId for MakeRequestUuid {
    fn make_request_id<B>(&mut self, _request: &axum::http::Request<B>) -> Option<RequestId> {
        let id = uuid::Uuid::now_v7().to_string();
        HeaderValue::from_str(&id).ok().map(RequestId::new)
    }
}

async fn not_found() -> error::AppError {
    error::AppError::NotFound {
        message: "Unknown route. See /docs for the API reference.".to_string(),
    }
}

#[tokio::main]
async fn main() {
    // Load .env if present (dev only)
    let _ = dotenvy::dotenv();

    // Structured JSON logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "vital_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    let registry = vital_agents::build_registry().expect("failed to build handler roster");
    let config = RouterConfig::from_env();
    let router = SemanticRouter::new(Arc::new(registry), config)
        .await
        .expect("failed to build capability index");
    let adapter = Arc::new(RouterAdapter::new(Arc::new(router)));
    let app_state = state::AppState::new(adapter);

    let cors_layer = middleware::cors::build_cors_layer();

    // Router with per-endpoint rate limiting
    let app = Router::new()
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .merge(routes::health::router())
        .merge(routes::coach::router().layer(middleware::rate_limit::coach_layer()))
        .merge(routes::context::write_router().layer(middleware::rate_limit::context_layer()))
        .merge(routes::context::read_router().layer(middleware::rate_limit::reads_layer()))
        .merge(routes::history::router().layer(middleware::rate_limit::reads_layer()))
        .merge(routes::handlers::router().layer(middleware::rate_limit::reads_layer()))
        .fallback(not_found)
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(TraceLayer::new_for_http())
                .layer(PropagateRequestIdLayer::x_request_id())
                .layer(cors_layer),
        )
        .with_state(app_state);

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8080);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Vital API listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .unwrap();
}
