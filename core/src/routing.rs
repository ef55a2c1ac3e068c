use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::data::DataKind;

/// Which strategy produced a routing decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum RouteMethod {
    /// Capability-phrase token overlap
    Keyword,
    /// Vector similarity against the capability index
    Semantic,
    /// Time-decayed relevance of previously uploaded data
    ObservationContext,
    /// No handler qualified, or the selected handler failed
    Error,
}

impl RouteMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            RouteMethod::Keyword => "keyword",
            RouteMethod::Semantic => "semantic",
            RouteMethod::ObservationContext => "observation_context",
            RouteMethod::Error => "error",
        }
    }
}

impl fmt::Display for RouteMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One routing decision, appended after every `route_query` call.
/// Entries for a given user appear in completion order.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RouteHistoryEntry {
    /// Unique entry ID, UUIDv7 so it sorts by time
    pub id: Uuid,
    pub user_id: String,
    /// The query as the router saw it
    pub query: String,
    /// Selected handler name; None when no handler was invoked
    pub handler: Option<String>,
    /// Confidence of the winning signal, in [0, 1]
    pub confidence: f64,
    pub method: RouteMethod,
    pub timestamp: DateTime<Utc>,
}

/// Public description of a registered handler, for roster listings.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HandlerDescriptor {
    pub name: String,
    /// Registered type the instance was created from
    pub handler_type: String,
    pub description: String,
    pub capabilities: Vec<String>,
    pub supported_data_types: Vec<DataKind>,
}
