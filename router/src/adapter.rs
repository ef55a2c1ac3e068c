//! Stable facade over the semantic router for application callers.
//! Routing itself is never reimplemented here; the adapter only shapes
//! inputs (upload metadata) and outputs (topic-keyed field defaults).

use std::sync::Arc;

use serde_json::{Map, Value, json};

use vital_core::data::{DataKind, UPLOAD_FLAG_KEY, UPLOAD_KIND_KEY};
use vital_core::response::CoachResponse;
use vital_core::routing::RouteHistoryEntry;

use crate::router::SemanticRouter;

/// Question attached to every data upload so routing has text to work
/// with even when the caller sent none.
const UPLOAD_QUERY_TEMPLATE: &str = "I've uploaded new {kind} data. What insights can you provide?";

pub struct RouterAdapter {
    router: Arc<SemanticRouter>,
}

impl RouterAdapter {
    pub fn new(router: Arc<SemanticRouter>) -> Self {
        Self { router }
    }

    /// The wrapped router, for callers that need history or the
    /// handler roster.
    pub fn router(&self) -> &Arc<SemanticRouter> {
        &self.router
    }

    /// Delegate to the router, then guarantee topic-keyed fields:
    /// metrics-flavored queries always carry a `metrics` map and
    /// bio-age-flavored queries a `total_score`. Fields the handler
    /// did supply are left untouched.
    pub async fn route_query(
        &self,
        user_id: &str,
        query: &str,
        metadata: Option<&Map<String, Value>>,
    ) -> CoachResponse {
        self.route_query_traced(user_id, query, metadata).await.1
    }

    /// `route_query` plus the routing decision it recorded.
    pub async fn route_query_traced(
        &self,
        user_id: &str,
        query: &str,
        metadata: Option<&Map<String, Value>>,
    ) -> (RouteHistoryEntry, CoachResponse) {
        let (entry, response) = self.router.route_query_traced(user_id, query, metadata).await;
        (entry, normalize_by_topic(query, response))
    }

    /// Wrap raw records into upload metadata and route them with the
    /// standard upload question. An unrecognized data type never
    /// reaches the router; it comes straight back as an error envelope.
    pub async fn handle_data_upload(
        &self,
        user_id: &str,
        data_type: &str,
        records: Value,
    ) -> CoachResponse {
        let Some(kind) = DataKind::parse(data_type) else {
            tracing::warn!(user = user_id, data_type, "rejecting upload of unknown data type");
            return CoachResponse::failure(
                "I couldn't store that upload.",
                format!(
                    "unsupported data type '{data_type}'; expected one of sleep, exercise, nutrition, biometric"
                ),
            );
        };
        self.upload_traced(user_id, kind, records).await.1
    }

    /// Upload with an already-validated kind, handing back the routing
    /// decision as well.
    pub async fn upload_traced(
        &self,
        user_id: &str,
        kind: DataKind,
        records: Value,
    ) -> (RouteHistoryEntry, CoachResponse) {
        let mut metadata = Map::new();
        metadata.insert(UPLOAD_FLAG_KEY.to_string(), json!(true));
        metadata.insert(UPLOAD_KIND_KEY.to_string(), json!(kind.as_str()));
        metadata.insert(kind.payload_key().to_string(), records);

        let query = UPLOAD_QUERY_TEMPLATE.replace("{kind}", kind.as_str());
        self.route_query_traced(user_id, &query, Some(&metadata))
            .await
    }

    pub async fn update_context(&self, user_id: &str, metadata: &Map<String, Value>) {
        self.router.update_context(user_id, metadata).await;
    }

    pub async fn clear_context(&self, user_id: &str) -> bool {
        self.router.clear_context(user_id).await
    }

    pub async fn active_topic(&self, user_id: &str) -> String {
        self.router.active_topic(user_id).await
    }
}

/// Downstream consumers key off `metrics` and `total_score` without
/// null checks, so the adapter backfills them for the query flavors
/// that promise them.
fn normalize_by_topic(query: &str, mut response: CoachResponse) -> CoachResponse {
    let lowered = query.to_lowercase();
    let metrics_flavored = lowered.contains("metric") || lowered.contains("health");
    if metrics_flavored && response.metrics.is_none() {
        response.metrics = Some(json!({}));
    }

    let bio_age_flavored = lowered.contains("bio age")
        || lowered.contains("bio-age")
        || lowered.contains("biological age");
    if bio_age_flavored && response.total_score.is_none() {
        response.total_score = Some(0.0);
    }
    response
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use serde_json::{Map, json};

    use vital_core::data::DataKind;
    use vital_core::response::CoachResponse;
    use vital_core::routing::RouteMethod;

    use super::{RouterAdapter, normalize_by_topic};
    use crate::config::RouterConfig;
    use crate::error::HandlerError;
    use crate::handler::{Handler, SessionSnapshot};
    use crate::registry::HandlerRegistry;
    use crate::router::SemanticRouter;

    struct StubHandler {
        name: String,
        capabilities: Vec<String>,
        kinds: Vec<DataKind>,
        metrics: Option<serde_json::Value>,
    }

    #[async_trait]
    impl Handler for StubHandler {
        fn name(&self) -> &str {
            &self.name
        }

        fn description(&self) -> &str {
            "stub"
        }

        fn capabilities(&self) -> &[String] {
            &self.capabilities
        }

        fn supported_data_kinds(&self) -> &[DataKind] {
            &self.kinds
        }

        fn score(&self, _query: &str, _session: &SessionSnapshot) -> f64 {
            0.0
        }

        async fn process(
            &self,
            _query: &str,
            _session: &SessionSnapshot,
        ) -> Result<CoachResponse, HandlerError> {
            let mut response = CoachResponse::text(format!("{} answered", self.name));
            response.metrics = self.metrics.clone();
            Ok(response)
        }
    }

    async fn adapter_with(handlers: Vec<StubHandler>) -> RouterAdapter {
        let mut registry = HandlerRegistry::new();
        for handler in handlers {
            let name = handler.name.clone();
            let shared: Arc<dyn Handler> = Arc::new(handler);
            registry.register_type(name.clone(), move |_| shared.clone());
            registry.create_agent(&name, &name).unwrap();
        }
        let router = SemanticRouter::new(Arc::new(registry), RouterConfig::default())
            .await
            .unwrap();
        RouterAdapter::new(Arc::new(router))
    }

    fn stub(name: &str, phrases: &[&str], kinds: &[DataKind]) -> StubHandler {
        StubHandler {
            name: name.to_string(),
            capabilities: phrases.iter().map(|p| p.to_string()).collect(),
            kinds: kinds.to_vec(),
            metrics: None,
        }
    }

    #[tokio::test]
    async fn upload_reaches_supporting_handler() {
        let adapter = adapter_with(vec![stub(
            "sleep_coach",
            &["how is my sleep quality"],
            &[DataKind::Sleep],
        )])
        .await;

        let response = adapter
            .handle_data_upload(
                "u1",
                "sleep",
                json!([{"date": "2023-01-01", "sleep_hours": 7.5}]),
            )
            .await;
        assert!(response.error.is_none());
        assert_eq!(adapter.active_topic("u1").await, "sleep_coach");

        let history = adapter.router().route_history(Some("u1"), 1).await;
        assert_eq!(history[0].method, RouteMethod::ObservationContext);
    }

    #[tokio::test]
    async fn unknown_data_type_is_rejected_before_routing() {
        let adapter = adapter_with(vec![stub("sleep_coach", &["sleep"], &[DataKind::Sleep])]).await;

        let response = adapter
            .handle_data_upload("u1", "telepathy", json!([]))
            .await;
        assert!(response.error.as_deref().is_some_and(|e| e.contains("telepathy")));
        assert!(adapter.router().route_history(Some("u1"), 10).await.is_empty());
    }

    #[tokio::test]
    async fn metrics_flavored_query_gets_empty_metrics_backfilled() {
        let adapter = adapter_with(vec![stub(
            "metrics",
            &["show my health metrics overview"],
            &[],
        )])
        .await;

        let response = adapter
            .route_query("u1", "show my health metrics overview", None)
            .await;
        assert!(response.error.is_none());
        assert_eq!(response.metrics, Some(json!({})));
    }

    #[tokio::test]
    async fn supplied_metrics_are_never_overwritten() {
        let mut handler = stub("metrics", &["show my health metrics overview"], &[]);
        handler.metrics = Some(json!({"steps": 12000}));
        let adapter = adapter_with(vec![handler]).await;

        let response = adapter
            .route_query("u1", "show my health metrics overview", None)
            .await;
        assert_eq!(response.metrics, Some(json!({"steps": 12000})));
    }

    #[test]
    fn bio_age_flavor_defaults_total_score() {
        let plain = CoachResponse::text("your pace is fine");
        let shaped = normalize_by_topic("what is my biological age", plain);
        assert_eq!(shaped.total_score, Some(0.0));

        let untouched = normalize_by_topic("how was my run", CoachResponse::text("fine"));
        assert_eq!(untouched.total_score, None);
        assert_eq!(untouched.metrics, None);
    }

    #[tokio::test]
    async fn context_ops_pass_through() {
        let adapter = adapter_with(vec![stub("sleep_coach", &["sleep"], &[DataKind::Sleep])]).await;

        let mut meta = Map::new();
        meta.insert("plan".to_string(), json!("basic"));
        adapter.update_context("u1", &meta).await;
        assert!(adapter.clear_context("u1").await);
        assert!(!adapter.clear_context("u1").await);
        assert_eq!(adapter.active_topic("u1").await, "general");
    }
}
