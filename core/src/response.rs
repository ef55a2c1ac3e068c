use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Uniform response envelope returned by every routing path.
///
/// The four core keys (`response`, `insights`, `visualization`, `error`)
/// are always present in the serialized form, with `visualization` and
/// `error` as explicit nulls when absent, so callers never probe for
/// shape. The remaining fields are handler extras and are omitted when
/// empty.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct CoachResponse {
    /// Natural-language answer text
    pub response: String,
    /// Short observations derived from the user's data, ordered
    #[serde(default)]
    pub insights: Vec<String>,
    /// Optional chart payload, opaque to the dispatch core
    pub visualization: Option<serde_json::Value>,
    /// Present only when the request could not be served normally
    pub error: Option<String>,
    /// Suggested next actions (optional handler extra)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub recommendations: Vec<String>,
    /// Follow-up questions the coach could ask (optional handler extra)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub questions: Vec<String>,
    /// Per-metric breakdown for health-metrics style answers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics: Option<serde_json::Value>,
    /// Aggregate 0-100 score for bio-age style answers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_score: Option<f64>,
}

impl CoachResponse {
    /// Plain text answer with no insights or extras.
    pub fn text(response: impl Into<String>) -> Self {
        Self {
            response: response.into(),
            ..Self::default()
        }
    }

    /// Failure envelope: a non-empty fallback message for the user plus
    /// the error string. Both are always populated.
    pub fn failure(fallback: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            response: fallback.into(),
            error: Some(error.into()),
            ..Self::default()
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}
