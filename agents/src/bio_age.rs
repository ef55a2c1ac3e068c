//! Biological-age scoring. Produces a deterministic 0-100 score from
//! the aggregates of whatever observation contexts the session holds:
//! sleep hours (max 50), active calories (max 30), resting heart rate
//! (max 20). Kinds with no context on file contribute nothing and turn
//! into upload prompts instead.

use async_trait::async_trait;
use serde_json::{Map, Value, json};

use vital_core::data::DataKind;
use vital_core::response::CoachResponse;
use vital_router::error::HandlerError;
use vital_router::handler::{Handler, SessionSnapshot};
use vital_router::index::tokenize_ascii;

const SUPPORTED: [DataKind; 3] = [DataKind::Sleep, DataKind::Exercise, DataKind::Biometric];

const TOPIC_KEYWORDS: [&str; 11] = [
    "biological",
    "bio",
    "age",
    "aging",
    "longevity",
    "lifespan",
    "healthspan",
    "biomarkers",
    "rejuvenation",
    "epigenetic",
    "metabolic",
];

struct Component {
    points: f64,
    insight: &'static str,
}

pub struct BioAgeHandler {
    name: String,
    capabilities: Vec<String>,
}

impl BioAgeHandler {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            capabilities: [
                "What is my bio age score?",
                "Calculate my biological age",
                "How can I improve my bio age score?",
                "Show my bio age score trends",
                "Which habits lower my biological age?",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}

#[async_trait]
impl Handler for BioAgeHandler {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "Scores biological age from sleep, activity, and biometric data"
    }

    fn capabilities(&self) -> &[String] {
        &self.capabilities
    }

    fn supported_data_kinds(&self) -> &[DataKind] {
        &SUPPORTED
    }

    fn score(&self, query: &str, session: &SessionSnapshot) -> f64 {
        let tokens = tokenize_ascii(query);
        let matches = TOPIC_KEYWORDS
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
        _query: &str,
        session: &SessionSnapshot,
    ) -> Result<CoachResponse, HandlerError> {
        let mut total = 0.0;
        let mut breakdown = Map::new();
        let mut insights = Vec::new();
        let mut questions = Vec::new();

        match aggregate_for(session, DataKind::Sleep, "avg_sleep_hours") {
            Some(avg) => {
                let c = sleep_component(avg);
                total += c.points;
                breakdown.insert("sleep_score".to_string(), json!(c.points));
                insights.push(c.insight.to_string());
            }
            None => questions
                .push("Upload your sleep records so sleep can count toward your score.".to_string()),
        }
        match aggregate_for(session, DataKind::Exercise, "avg_active_calories") {
            Some(avg) => {
                let c = exercise_component(avg);
                total += c.points;
                breakdown.insert("exercise_score".to_string(), json!(c.points));
                insights.push(c.insight.to_string());
            }
            None => questions.push(
                "Upload your exercise records so activity can count toward your score.".to_string(),
            ),
        }
        match aggregate_for(session, DataKind::Biometric, "avg_resting_heart_rate") {
            Some(avg) => {
                let c = heart_component(avg);
                total += c.points;
                breakdown.insert("heart_score".to_string(), json!(c.points));
                insights.push(c.insight.to_string());
            }
            None => questions.push(
                "Upload biometric records with resting heart rate to complete your score."
                    .to_string(),
            ),
        }

        let mut response = if breakdown.is_empty() {
            CoachResponse::text(
                "I don't have enough health data to score your biological age yet. Upload sleep, exercise, or biometric records to get started.",
            )
        } else {
            let mut r = CoachResponse::text(format!(
                "Your current bio age score is {total:.0} out of 100, based on {} of 3 factors.",
                breakdown.len()
            ));
            r.metrics = Some(Value::Object(breakdown));
            r
        };
        response.total_score = Some(total);
        response.insights = insights;
        response.questions = questions;
        Ok(response)
    }
}

/// Freshest context of `kind`, reduced to one named aggregate.
fn aggregate_for(session: &SessionSnapshot, kind: DataKind, key: &str) -> Option<f64> {
    session
        .context_for_kind(kind)
        .and_then(|ctx| ctx.summary.aggregates.get(key).copied())
}

fn sleep_component(avg_hours: f64) -> Component {
    if avg_hours >= 8.5 {
        Component {
            points: 50.0,
            insight: "Optimal sleep duration, associated with a 2-3 year reduction in biological age",
        }
    } else if avg_hours >= 7.0 {
        Component {
            points: 42.0,
            insight: "Good sleep duration, keep holding 7+ hours consistently",
        }
    } else if avg_hours >= 6.0 {
        Component {
            points: 25.0,
            insight: "Sleep duration below the recommended 7-9 hours, consider sleep hygiene improvements",
        }
    } else {
        Component {
            points: 8.0,
            insight: "Sleep is well short of recommendations, prioritize an earlier bedtime",
        }
    }
}

fn exercise_component(avg_calories: f64) -> Component {
    if avg_calories >= 750.0 {
        Component {
            points: 30.0,
            insight: "Excellent activity level, associated with a 4-5 year reduction in biological age",
        }
    } else if avg_calories >= 500.0 {
        Component {
            points: 25.0,
            insight: "Good activity level, keep burning 500+ active calories",
        }
    } else if avg_calories >= 300.0 {
        Component {
            points: 15.0,
            insight: "Moderate activity, increasing toward 500+ active calories would help",
        }
    } else {
        Component {
            points: 5.0,
            insight: "Activity level below recommendations, consider increasing daily movement",
        }
    }
}

fn heart_component(avg_rhr: f64) -> Component {
    if avg_rhr < 60.0 {
        Component {
            points: 20.0,
            insight: "Resting heart rate in the athletic range, a strong longevity marker",
        }
    } else if avg_rhr < 70.0 {
        Component {
            points: 16.0,
            insight: "Healthy resting heart rate, regular aerobic work keeps it there",
        }
    } else if avg_rhr < 80.0 {
        Component {
            points: 10.0,
            insight: "Resting heart rate has room to improve, consistent cardio helps",
        }
    } else {
        Component {
            points: 4.0,
            insight: "Elevated resting heart rate, worth discussing with a clinician",
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use serde_json::json;

    use vital_core::data::DataKind;
    use vital_router::handler::{Handler, SessionSnapshot};
    use vital_router::observation::ObservationContext;

    use super::BioAgeHandler;

    fn context_of(handler: &str, kind: DataKind, records: serde_json::Value) -> ObservationContext {
        let mut ctx = ObservationContext::new(handler, "u1", kind);
        ctx.update_from_data(&json!({kind.payload_key(): records}), Utc::now());
        ctx
    }

    fn full_session() -> SessionSnapshot {
        let mut session = SessionSnapshot::for_user("u1");
        session.contexts = vec![
            context_of(
                "bio_age",
                DataKind::Sleep,
                json!([{"date": "2023-01-01", "sleep_hours": 7.5}]),
            ),
            context_of(
                "metrics",
                DataKind::Exercise,
                json!([{"date": "2023-01-01", "active_calories": 600.0}]),
            ),
            context_of(
                "tracker",
                DataKind::Biometric,
                json!([{"date": "2023-01-01", "resting_heart_rate": 65.0}]),
            ),
        ];
        session
    }

    #[tokio::test]
    async fn full_data_sums_the_three_components() {
        let handler = BioAgeHandler::new("bio_age");
        let response = handler
            .process("what is my bio age score", &full_session())
            .await
            .unwrap();

        // 42 (7.5h sleep) + 25 (600 cal) + 16 (65 bpm)
        assert_eq!(response.total_score, Some(83.0));
        assert!(response.questions.is_empty());
        assert_eq!(response.insights.len(), 3);

        let metrics = response.metrics.unwrap();
        assert_eq!(metrics["sleep_score"], json!(42.0));
        assert_eq!(metrics["exercise_score"], json!(25.0));
        assert_eq!(metrics["heart_score"], json!(16.0));
    }

    #[tokio::test]
    async fn empty_session_scores_zero_and_asks_for_data() {
        let handler = BioAgeHandler::new("bio_age");
        let session = SessionSnapshot::for_user("u1");

        let response = handler
            .process("calculate my biological age", &session)
            .await
            .unwrap();
        assert_eq!(response.total_score, Some(0.0));
        assert_eq!(response.questions.len(), 3);
        assert!(response.metrics.is_none());
        assert!(response.response.contains("don't have enough health data"));
    }

    #[tokio::test]
    async fn partial_data_scores_only_what_is_on_file() {
        let handler = BioAgeHandler::new("bio_age");
        let mut session = SessionSnapshot::for_user("u1");
        session.contexts = vec![context_of(
            "bio_age",
            DataKind::Biometric,
            json!([{"date": "2023-01-01", "resting_heart_rate": 58.0}]),
        )];

        let response = handler
            .process("what is my bio age score", &session)
            .await
            .unwrap();
        assert_eq!(response.total_score, Some(20.0));
        assert_eq!(response.questions.len(), 2);
        assert!(response.response.contains("1 of 3 factors"));
    }

    #[tokio::test]
    async fn scoring_is_deterministic() {
        let handler = BioAgeHandler::new("bio_age");
        let session = full_session();

        let first = handler.process("bio age", &session).await.unwrap();
        let second = handler.process("bio age", &session).await.unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn score_bands_follow_keyword_density() {
        let handler = BioAgeHandler::new("bio_age");
        let empty = SessionSnapshot::for_user("u1");

        assert_eq!(handler.score("how is aging and longevity tied to my biological markers", &empty), 0.9);
        assert_eq!(handler.score("what is my bio age", &empty), 0.7);
        assert_eq!(handler.score("hello there", &empty), 0.3);
        assert_eq!(handler.score("hello there", &full_session()), 0.5);
    }
}
