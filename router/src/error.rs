use thiserror::Error;

/// Routing-time failures. Every variant is absorbed into the response
/// envelope at the router boundary; none escapes `route_query`.
#[derive(Debug, Error)]
pub enum RouterError {
    /// No candidate handler cleared any threshold across all three
    /// routing strategies.
    #[error("no handler qualified for this query")]
    RoutingFailure,

    /// The selected handler's `process` failed.
    #[error("handler '{handler}' failed: {detail}")]
    HandlerProcessing { handler: String, detail: String },

    /// The selected handler's `process` exceeded its time budget.
    #[error("handler '{handler}' timed out after {timeout_ms}ms")]
    HandlerTimeout { handler: String, timeout_ms: u64 },

    /// The capability index call failed or timed out.
    #[error("capability index unavailable: {0}")]
    IndexUnavailable(String),

    /// An upload payload did not carry the records key its data kind
    /// promises. The affected context update is skipped, nothing else.
    #[error("upload payload missing key '{key}'")]
    MalformedUploadPayload { key: String },
}

/// Failure from a handler's `process` or `close`. Handlers produce
/// these instead of panicking; the router converts them into the error
/// envelope and never lets them cross the public boundary raw.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct HandlerError {
    pub message: String,
}

impl HandlerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Registry/configuration failures. Unlike `RouterError`, these are
/// allowed to fail the call that caused them: a missing handler type is
/// a deployment mistake, not a runtime routing condition.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("handler type '{0}' is not registered")]
    UnknownType(String),

    #[error("handler instance '{0}' is already registered")]
    DuplicateInstance(String),

    #[error("no suitable handler found for query")]
    NoAgentAvailable,

    #[error("handler '{handler}' failed: {source}")]
    Handler {
        handler: String,
        source: HandlerError,
    },

    #[error("shutdown completed with {} handler failure(s)", failures.len())]
    Shutdown { failures: Vec<(String, String)> },
}
