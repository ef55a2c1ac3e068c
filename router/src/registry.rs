use std::collections::HashMap;
use std::sync::Arc;

use vital_core::response::CoachResponse;
use vital_core::routing::HandlerDescriptor;

use crate::error::RegistryError;
use crate::handler::{Handler, SessionSnapshot};

type HandlerFactory = Box<dyn Fn(&str) -> Arc<dyn Handler> + Send + Sync>;

/// One registered instance. `name` comes from the constructed handler;
/// the position in the registry's entry list is its registration index.
pub struct RegisteredHandler {
    pub name: String,
    pub handler_type: String,
    pub handler: Arc<dyn Handler>,
}

/// Owns handler types (factories) and the instances created from them.
/// Instance order is registration order, and that order breaks every
/// score tie in the engine. The registry is assembled at startup and
/// read-only afterwards; the capability index is built from it once.
#[derive(Default)]
pub struct HandlerRegistry {
    factories: HashMap<String, HandlerFactory>,
    entries: Vec<RegisteredHandler>,
    by_name: HashMap<String, usize>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler type. The factory receives the instance name.
    pub fn register_type<F>(&mut self, type_name: impl Into<String>, factory: F)
    where
        F: Fn(&str) -> Arc<dyn Handler> + Send + Sync + 'static,
    {
        self.factories.insert(type_name.into(), Box::new(factory));
    }

    /// Create and register an instance of a previously registered type.
    /// Fails fast on unknown types: that is a deployment mistake.
    pub fn create_agent(
        &mut self,
        instance_name: &str,
        type_name: &str,
    ) -> Result<Arc<dyn Handler>, RegistryError> {
        let factory = self
            .factories
            .get(type_name)
            .ok_or_else(|| RegistryError::UnknownType(type_name.to_string()))?;

        let handler = factory(instance_name);
        let name = handler.name().to_string();
        if self.by_name.contains_key(&name) {
            return Err(RegistryError::DuplicateInstance(name));
        }

        self.by_name.insert(name.clone(), self.entries.len());
        self.entries.push(RegisteredHandler {
            name,
            handler_type: type_name.to_string(),
            handler: handler.clone(),
        });
        Ok(handler)
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Handler>> {
        self.by_name
            .get(name)
            .map(|idx| self.entries[*idx].handler.clone())
    }

    /// Position in registration order; lower wins ties.
    pub fn registration_index(&self, name: &str) -> Option<usize> {
        self.by_name.get(name).copied()
    }

    pub fn entries(&self) -> &[RegisteredHandler] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Every handler's capability phrases, tagged with its name; the
    /// capability index is built from exactly this list.
    pub fn capability_phrases(&self) -> Vec<(String, String)> {
        self.entries
            .iter()
            .flat_map(|entry| {
                entry
                    .handler
                    .capabilities()
                    .iter()
                    .map(|phrase| (phrase.clone(), entry.name.clone()))
            })
            .collect()
    }

    pub fn descriptors(&self) -> Vec<HandlerDescriptor> {
        self.entries
            .iter()
            .map(|entry| HandlerDescriptor {
                name: entry.name.clone(),
                handler_type: entry.handler_type.clone(),
                description: entry.handler.description().to_string(),
                capabilities: entry.handler.capabilities().to_vec(),
                supported_data_types: entry.handler.supported_data_kinds().to_vec(),
            })
            .collect()
    }

    /// Highest `score` above `min_score`, ties to the first registered.
    pub fn find_best(
        &self,
        query: &str,
        session: &SessionSnapshot,
        min_score: f64,
    ) -> Option<&RegisteredHandler> {
        let mut best: Option<(&RegisteredHandler, f64)> = None;
        for entry in &self.entries {
            let score = entry.handler.score(query, session).clamp(0.0, 1.0);
            let beats = match best {
                Some((_, best_score)) => score > best_score,
                None => true,
            };
            if beats {
                best = Some((entry, score));
            }
        }
        best.filter(|(_, score)| *score > min_score)
            .map(|(entry, _)| entry)
    }

    /// Direct path: pick the best scorer and let it answer. A local
    /// failure here is surfaced, never swallowed; this path is for
    /// callers that want the cheap first pass without the full merge.
    pub async fn process_query(
        &self,
        query: &str,
        session: &SessionSnapshot,
        min_score: f64,
    ) -> Result<CoachResponse, RegistryError> {
        let entry = self
            .find_best(query, session, min_score)
            .ok_or(RegistryError::NoAgentAvailable)?;
        entry
            .handler
            .process(query, session)
            .await
            .map_err(|source| RegistryError::Handler {
                handler: entry.name.clone(),
                source,
            })
    }

    /// Best-effort shutdown: every handler gets its `close` call even
    /// when earlier ones fail; failures come back aggregated.
    pub async fn close(&self) -> Result<(), RegistryError> {
        let mut failures = Vec::new();
        for entry in &self.entries {
            if let Err(err) = entry.handler.close().await {
                tracing::warn!(handler = %entry.name, error = %err, "handler close failed");
                failures.push((entry.name.clone(), err.to_string()));
            }
        }
        if failures.is_empty() {
            Ok(())
        } else {
            Err(RegistryError::Shutdown { failures })
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use vital_core::data::DataKind;
    use vital_core::response::CoachResponse;

    use super::HandlerRegistry;
    use crate::error::{HandlerError, RegistryError};
    use crate::handler::{Handler, SessionSnapshot};

    struct FixedHandler {
        name: String,
        capabilities: Vec<String>,
        score: f64,
        fail_close: bool,
        closed: Arc<AtomicUsize>,
    }

    impl FixedHandler {
        fn new(name: &str, score: f64) -> Self {
            Self {
                name: name.to_string(),
                capabilities: vec![format!("things {name} can do")],
                score,
                fail_close: false,
                closed: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    #[async_trait]
    impl Handler for FixedHandler {
        fn name(&self) -> &str {
            &self.name
        }

        fn description(&self) -> &str {
            "fixed-score test handler"
        }

        fn capabilities(&self) -> &[String] {
            &self.capabilities
        }

        fn supported_data_kinds(&self) -> &[DataKind] {
            &[]
        }

        fn score(&self, _query: &str, _session: &SessionSnapshot) -> f64 {
            self.score
        }

        async fn process(
            &self,
            _query: &str,
            _session: &SessionSnapshot,
        ) -> Result<CoachResponse, HandlerError> {
            Ok(CoachResponse::text(format!("{} answered", self.name)))
        }

        async fn close(&self) -> Result<(), HandlerError> {
            self.closed.fetch_add(1, Ordering::SeqCst);
            if self.fail_close {
                Err(HandlerError::new("release failed"))
            } else {
                Ok(())
            }
        }
    }

    fn registry_with(handlers: Vec<FixedHandler>) -> HandlerRegistry {
        let mut registry = HandlerRegistry::new();
        for handler in handlers {
            let name = handler.name.clone();
            let shared = Arc::new(handler);
            registry.register_type(name.clone(), move |_| shared.clone());
            registry.create_agent(&name, &name).unwrap();
        }
        registry
    }

    #[test]
    fn create_agent_fails_fast_on_unknown_type() {
        let mut registry = HandlerRegistry::new();
        let err = registry.create_agent("anything", "missing_type").unwrap_err();
        assert!(matches!(err, RegistryError::UnknownType(t) if t == "missing_type"));
    }

    #[test]
    fn duplicate_instance_names_are_rejected() {
        let mut registry = HandlerRegistry::new();
        let shared = Arc::new(FixedHandler::new("dup", 0.9));
        registry.register_type("t", move |_| shared.clone());
        registry.create_agent("dup", "t").unwrap();
        let err = registry.create_agent("dup", "t").unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateInstance(n) if n == "dup"));
    }

    #[test]
    fn find_best_returns_highest_scorer_above_threshold() {
        let registry = registry_with(vec![
            FixedHandler::new("low", 0.3),
            FixedHandler::new("high", 0.8),
        ]);
        let session = SessionSnapshot::for_user("u1");
        let best = registry.find_best("query", &session, 0.5).unwrap();
        assert_eq!(best.name, "high");
    }

    #[test]
    fn find_best_breaks_ties_by_registration_order() {
        let registry = registry_with(vec![
            FixedHandler::new("first", 0.8),
            FixedHandler::new("second", 0.8),
        ]);
        let session = SessionSnapshot::for_user("u1");
        let best = registry.find_best("query", &session, 0.5).unwrap();
        assert_eq!(best.name, "first");
    }

    #[test]
    fn find_best_requires_strictly_above_threshold() {
        let registry = registry_with(vec![FixedHandler::new("edge", 0.5)]);
        let session = SessionSnapshot::for_user("u1");
        assert!(registry.find_best("query", &session, 0.5).is_none());
    }

    #[tokio::test]
    async fn process_query_surfaces_no_agent_available() {
        let registry = registry_with(vec![FixedHandler::new("weak", 0.1)]);
        let session = SessionSnapshot::for_user("u1");
        let err = registry
            .process_query("query", &session, 0.5)
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::NoAgentAvailable));
    }

    #[tokio::test]
    async fn close_keeps_going_past_failures_and_aggregates_them() {
        let mut failing = FixedHandler::new("first", 0.5);
        failing.fail_close = true;
        let failing_count = failing.closed.clone();
        let ok = FixedHandler::new("second", 0.5);
        let ok_count = ok.closed.clone();

        let registry = registry_with(vec![failing, ok]);
        let err = registry.close().await.unwrap_err();

        assert_eq!(failing_count.load(Ordering::SeqCst), 1);
        assert_eq!(ok_count.load(Ordering::SeqCst), 1);
        assert!(matches!(err, RegistryError::Shutdown { failures } if failures.len() == 1));
    }

    #[test]
    fn capability_phrases_carry_owner_names_in_order() {
        let registry = registry_with(vec![
            FixedHandler::new("alpha", 0.5),
            FixedHandler::new("beta", 0.5),
        ]);
        let phrases = registry.capability_phrases();
        assert_eq!(phrases[0].1, "alpha");
        assert_eq!(phrases[1].1, "beta");
        assert_eq!(registry.registration_index("beta"), Some(1));
    }
}
