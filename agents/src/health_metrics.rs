//! Daily-metric questions: sleep, exercise, nutrition, biometrics.
//! Answers come from the user's freshest observation context; without
//! one the handler falls back to an onboarding overview. Every answer
//! carries a `metrics` map.

use std::collections::BTreeSet;

use async_trait::async_trait;
use serde_json::{Map, Value, json};

use vital_core::data::DataKind;
use vital_core::response::CoachResponse;
use vital_router::error::HandlerError;
use vital_router::handler::{Handler, SessionSnapshot};
use vital_router::index::tokenize_ascii;
use vital_router::observation::ObservationContext;

pub struct HealthMetricsHandler {
    name: String,
    capabilities: Vec<String>,
}

impl HealthMetricsHandler {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            capabilities: [
                "How is my sleep quality?",
                "How many calories did I burn this week?",
                "Show my health metrics overview",
                "What does my exercise activity look like?",
                "How is my nutrition looking?",
                "What are my latest biometric readings?",
                "Track my fitness progress",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }

    /// This handler's own context, at most one per user.
    fn own_context<'a>(&self, session: &'a SessionSnapshot) -> Option<&'a ObservationContext> {
        session.contexts.iter().find(|c| c.handler == self.name)
    }
}

#[async_trait]
impl Handler for HealthMetricsHandler {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "Analyzes uploaded health data and answers daily-metric questions"
    }

    fn capabilities(&self) -> &[String] {
        &self.capabilities
    }

    fn supported_data_kinds(&self) -> &[DataKind] {
        &DataKind::ALL
    }

    fn score(&self, query: &str, session: &SessionSnapshot) -> f64 {
        let tokens = tokenize_ascii(query);
        let keywords: BTreeSet<&str> = DataKind::ALL
            .into_iter()
            .flat_map(|kind| kind.topic_keywords().iter().copied())
            .chain(["health", "metrics", "steps"])
            .collect();
        let matches = keywords
            .iter()
            .filter(|kw| tokens.iter().any(|t| t == *kw))
            .count();

        if matches > 2 {
            0.9
        } else if matches > 0 {
            0.7
        } else if session.has_uploaded_data() {
            0.5
        } else {
            0.3
        }
    }

    async fn process(
        &self,
        query: &str,
        session: &SessionSnapshot,
    ) -> Result<CoachResponse, HandlerError> {
        let Some(context) = self.own_context(session) else {
            return Ok(overview_response());
        };

        let tokens = tokenize_ascii(query);
        let topical = context
            .kind
            .topic_keywords()
            .iter()
            .any(|kw| tokens.iter().any(|t| t == kw));
        let asked_other = DataKind::ALL
            .into_iter()
            .filter(|kind| *kind != context.kind)
            .find(|kind| {
                kind.topic_keywords()
                    .iter()
                    .any(|kw| tokens.iter().any(|t| t == kw))
            });

        let mut response = match asked_other {
            Some(missing) if !topical => CoachResponse::text(format!(
                "I only have {} data on file right now. Upload your {} records and I can look at those too.",
                context.kind, missing
            )),
            _ => context.generate_response(),
        };
        response.metrics = Some(metrics_json(context));
        Ok(response)
    }
}

fn overview_response() -> CoachResponse {
    let mut response = CoachResponse::text(
        "I don't have any health data on file for you yet. Upload sleep, exercise, nutrition, or biometric records and I'll build your overview.",
    );
    response.questions = vec![
        "Do you track sleep or activity with a wearable?".to_string(),
        "Which would you like to start with: sleep, exercise, nutrition, or biometrics?".to_string(),
    ];
    response.metrics = Some(json!({}));
    response
}

fn metrics_json(context: &ObservationContext) -> Value {
    let mut metrics = Map::new();
    metrics.insert("data_type".to_string(), json!(context.kind.as_str()));
    metrics.insert(
        "record_count".to_string(),
        json!(context.summary.record_count),
    );
    for (key, value) in &context.summary.aggregates {
        metrics.insert(key.clone(), json!(value));
    }
    Value::Object(metrics)
}
