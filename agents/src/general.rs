//! Catch-all conversational coach. Greetings, farewells, app
//! orientation, and a guidance fallback for everything no specialist
//! claims. Scores a 0.4 floor on any non-empty query so routing always
//! has a last resort.

use async_trait::async_trait;

use vital_core::data::DataKind;
use vital_core::response::CoachResponse;
use vital_router::error::HandlerError;
use vital_router::handler::{Handler, SessionSnapshot};
use vital_router::index::tokenize_ascii;

const GREETING_TOKENS: [&str; 7] = [
    "hello",
    "hi",
    "hey",
    "greetings",
    "morning",
    "afternoon",
    "evening",
];

const FAREWELL_TOKENS: [&str; 5] = ["goodbye", "bye", "farewell", "thanks", "thank"];

const APP_TOKENS: [&str; 8] = [
    "app",
    "application",
    "features",
    "feature",
    "help",
    "explain",
    "started",
    "capabilities",
];

const APP_PHRASES: [&str; 3] = ["what can you do", "what is this", "how does this work"];

pub struct GeneralHandler {
    name: String,
    capabilities: Vec<String>,
}

impl GeneralHandler {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            capabilities: [
                "What can this coach do?",
                "How does this app work?",
                "Help me get started",
                "Just saying hello",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}

#[async_trait]
impl Handler for GeneralHandler {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "General conversation and orientation, the routing fallback"
    }

    fn capabilities(&self) -> &[String] {
        &self.capabilities
    }

    fn supported_data_kinds(&self) -> &[DataKind] {
        &[]
    }

    fn score(&self, query: &str, _session: &SessionSnapshot) -> f64 {
        let tokens = tokenize_ascii(query);
        if tokens.is_empty() {
            return 0.0;
        }
        if matches_any(&tokens, &GREETING_TOKENS) || matches_any(&tokens, &FAREWELL_TOKENS) {
            return 0.9;
        }
        if is_app_info(query, &tokens) {
            return 0.8;
        }
        if tokens.len() < 4 {
            return 0.7;
        }
        0.4
    }

    async fn process(
        &self,
        query: &str,
        _session: &SessionSnapshot,
    ) -> Result<CoachResponse, HandlerError> {
        let tokens = tokenize_ascii(query);

        if matches_any(&tokens, &GREETING_TOKENS) {
            let mut response = CoachResponse::text(
                "Hello! I'm your wellness coach. I can analyze your health data, score your biological age, and point you at the research. How can I help today?",
            );
            response.recommendations = vec![
                "Ask what biological age is".to_string(),
                "Upload sleep, exercise, nutrition, or biometric data".to_string(),
                "Ask for your bio age score".to_string(),
            ];
            return Ok(response);
        }

        if matches_any(&tokens, &FAREWELL_TOKENS) {
            let text = if tokens.iter().any(|t| t.starts_with("thank")) {
                "You're welcome! I'm here whenever you want to dig into your health data."
            } else {
                "Goodbye! Small consistent changes add up. Talk soon."
            };
            return Ok(CoachResponse::text(text));
        }

        if is_app_info(query, &tokens) {
            let mut response = CoachResponse::text("Here's what I can help with:");
            response.recommendations = vec![
                "Analyze your uploaded sleep, exercise, nutrition, and biometric data".to_string(),
                "Score your biological age and show what drives it".to_string(),
                "Summarize longevity research with citations".to_string(),
                "Track your metrics over time".to_string(),
            ];
            return Ok(response);
        }

        let mut response = CoachResponse::text(
            "I'm your wellness coach. Ask me about your health data, your bio age score, or what the research says about healthy aging.",
        );
        response.recommendations = vec![
            "Upload health data to get personalized insights".to_string(),
            "Ask for your bio age score".to_string(),
            "Ask what the research says about sleep".to_string(),
        ];
        Ok(response)
    }
}

fn matches_any(tokens: &[String], words: &[&str]) -> bool {
    words.iter().any(|w| tokens.iter().any(|t| t == w))
}

fn is_app_info(query: &str, tokens: &[String]) -> bool {
    if matches_any(tokens, &APP_TOKENS) {
        return true;
    }
    let lowered = query.to_lowercase();
    APP_PHRASES.iter().any(|p| lowered.contains(p))
}

#[cfg(test)]
mod tests {
    use vital_router::handler::{Handler, SessionSnapshot};

    use super::GeneralHandler;

    #[tokio::test]
    async fn greeting_gets_a_welcome() {
        let handler = GeneralHandler::new("general");
        let session = SessionSnapshot::for_user("u1");

        let response = handler.process("hello", &session).await.unwrap();
        assert!(response.response.starts_with("Hello"));
        assert!(!response.recommendations.is_empty());
    }

    #[tokio::test]
    async fn thanks_gets_a_farewell() {
        let handler = GeneralHandler::new("general");
        let session = SessionSnapshot::for_user("u1");

        let response = handler.process("thanks for the help", &session).await.unwrap();
        assert!(response.response.contains("You're welcome"));
    }

    #[tokio::test]
    async fn capability_question_lists_features() {
        let handler = GeneralHandler::new("general");
        let session = SessionSnapshot::for_user("u1");

        let response = handler.process("what can you do", &session).await.unwrap();
        assert!(response.recommendations.len() >= 3);
    }

    #[tokio::test]
    async fn anything_else_gets_guidance() {
        let handler = GeneralHandler::new("general");
        let session = SessionSnapshot::for_user("u1");

        let response = handler
            .process("i wonder whether the weather affects me", &session)
            .await
            .unwrap();
        assert!(response.error.is_none());
        assert!(!response.recommendations.is_empty());
    }

    #[test]
    fn score_bands() {
        let handler = GeneralHandler::new("general");
        let session = SessionSnapshot::for_user("u1");

        assert_eq!(handler.score("   ", &session), 0.0);
        assert_eq!(handler.score("good morning", &session), 0.9);
        assert_eq!(handler.score("thanks", &session), 0.9);
        assert_eq!(handler.score("what can you do", &session), 0.8);
        assert_eq!(handler.score("sleep?", &session), 0.7);
        assert_eq!(
            handler.score("tell me something interesting about my day", &session),
            0.4
        );
    }
}
