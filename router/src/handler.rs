use async_trait::async_trait;
use serde_json::{Map, Value};

use vital_core::data::DataKind;
use vital_core::response::CoachResponse;

use crate::error::HandlerError;
use crate::observation::ObservationContext;

/// Read-only view of a user's session handed to handler calls. Cloned
/// out from under the session lock so handlers never touch shared
/// mutable state.
#[derive(Debug, Clone, Default)]
pub struct SessionSnapshot {
    pub user_id: String,
    /// Most recent queries, oldest first, capped by the router
    pub recent_queries: Vec<String>,
    /// Merged metadata, last write wins per key
    pub metadata: Map<String, Value>,
    /// Observation contexts keyed implicitly by their `handler` field
    pub contexts: Vec<ObservationContext>,
}

impl SessionSnapshot {
    pub fn for_user(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            ..Self::default()
        }
    }

    /// Freshest context of the given kind, if any.
    pub fn context_for_kind(&self, kind: DataKind) -> Option<&ObservationContext> {
        self.contexts
            .iter()
            .filter(|c| c.kind == kind)
            .max_by_key(|c| c.updated_at)
    }

    /// Freshest context of any kind, if any.
    pub fn freshest_context(&self) -> Option<&ObservationContext> {
        self.contexts.iter().max_by_key(|c| c.updated_at)
    }

    /// True when the session has seen a data upload at some point.
    pub fn has_uploaded_data(&self) -> bool {
        !self.contexts.is_empty()
            || self
                .metadata
                .get(vital_core::data::UPLOAD_FLAG_KEY)
                .and_then(Value::as_bool)
                .unwrap_or(false)
    }
}

/// A specialized coaching unit. The five operations below are the whole
/// contract the dispatch engine relies on; everything else about a
/// handler is its own business.
///
/// `score` must stay cheap and synchronous, since it runs inline during
/// selection. `process` and `create_observation_context` may await
/// slow backends; the router bounds them with timeouts.
#[async_trait]
pub trait Handler: Send + Sync {
    /// Unique name, stable across restarts (used in route history).
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// Ordered capability phrases; these seed the capability index and
    /// feed the keyword route.
    fn capabilities(&self) -> &[String];

    /// Data kinds this handler can summarize. Empty for pure Q&A
    /// handlers.
    fn supported_data_kinds(&self) -> &[DataKind];

    /// Cheap relevance estimate in [0, 1] for the direct registry path.
    fn score(&self, query: &str, session: &SessionSnapshot) -> f64;

    /// Produce a full answer. Failures come back as `HandlerError`,
    /// never as panics; the router converts them to error envelopes.
    async fn process(
        &self,
        query: &str,
        session: &SessionSnapshot,
    ) -> Result<CoachResponse, HandlerError>;

    /// A fresh observation context for `kind`, or None when this
    /// handler does not track that kind.
    async fn create_observation_context(
        &self,
        kind: DataKind,
        user_id: &str,
    ) -> Option<ObservationContext> {
        if self.supported_data_kinds().contains(&kind) {
            Some(ObservationContext::new(self.name(), user_id, kind))
        } else {
            None
        }
    }

    /// Release external resources. Default: nothing to release.
    async fn close(&self) -> Result<(), HandlerError> {
        Ok(())
    }
}

impl std::fmt::Debug for dyn Handler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Handler").field("name", &self.name()).finish()
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use vital_core::data::DataKind;

    use super::SessionSnapshot;
    use crate::observation::ObservationContext;

    #[test]
    fn snapshot_picks_freshest_context_per_kind() {
        let mut older = ObservationContext::new("a", "u1", DataKind::Exercise);
        older.updated_at = Utc::now() - Duration::hours(2);
        let newer = ObservationContext::new("b", "u1", DataKind::Exercise);

        let mut snapshot = SessionSnapshot::for_user("u1");
        snapshot.contexts = vec![older, newer];

        let picked = snapshot.context_for_kind(DataKind::Exercise).unwrap();
        assert_eq!(picked.handler, "b");
        assert!(snapshot.context_for_kind(DataKind::Sleep).is_none());
        assert!(snapshot.has_uploaded_data());
    }

    #[test]
    fn empty_snapshot_reports_no_uploads() {
        let snapshot = SessionSnapshot::for_user("u1");
        assert!(!snapshot.has_uploaded_data());
        assert!(snapshot.freshest_context().is_none());
    }
}
