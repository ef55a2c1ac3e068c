//! The stock handler roster. Registration order is load-bearing:
//! routing ties resolve to the earlier registration, so the specialists
//! come first and the catch-all comes last.

use std::sync::Arc;

use vital_router::error::RegistryError;
use vital_router::handler::Handler;
use vital_router::registry::HandlerRegistry;

use crate::bio_age::BioAgeHandler;
use crate::general::GeneralHandler;
use crate::health_metrics::HealthMetricsHandler;
use crate::research::ResearchHandler;

/// Registry pre-loaded with the four built-in coaching handlers.
pub fn build_registry() -> Result<HandlerRegistry, RegistryError> {
    let mut registry = HandlerRegistry::new();

    registry.register_type("health_metrics", |name| {
        Arc::new(HealthMetricsHandler::new(name)) as Arc<dyn Handler>
    });
    registry.register_type("bio_age", |name| {
        Arc::new(BioAgeHandler::new(name)) as Arc<dyn Handler>
    });
    registry.register_type("research", |name| {
        Arc::new(ResearchHandler::new(name)) as Arc<dyn Handler>
    });
    registry.register_type("general", |name| {
        Arc::new(GeneralHandler::new(name)) as Arc<dyn Handler>
    });

    registry.create_agent("health_metrics", "health_metrics")?;
    registry.create_agent("bio_age", "bio_age")?;
    registry.create_agent("research", "research")?;
    registry.create_agent("general", "general")?;

    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::build_registry;

    #[test]
    fn roster_registers_in_routing_priority_order() {
        let registry = build_registry().unwrap();
        let names: Vec<&str> = registry.entries().iter().map(|e| e.name.as_str()).collect();
        assert_eq!(
            names,
            ["health_metrics", "bio_age", "research", "general"]
        );
        assert_eq!(registry.registration_index("health_metrics"), Some(0));
        assert_eq!(registry.registration_index("general"), Some(3));
    }

    #[test]
    fn every_handler_seeds_capability_phrases() {
        let registry = build_registry().unwrap();
        let phrases = registry.capability_phrases();
        for entry in registry.entries() {
            assert!(
                phrases.iter().any(|(_, handler)| handler == &entry.name),
                "{} has no phrases",
                entry.name
            );
        }
    }

    #[test]
    fn only_the_specialists_accept_uploads() {
        let registry = build_registry().unwrap();
        let kinds_of = |name: &str| {
            registry
                .get(name)
                .map(|h| h.supported_data_kinds().len())
                .unwrap_or(0)
        };
        assert_eq!(kinds_of("health_metrics"), 4);
        assert_eq!(kinds_of("bio_age"), 3);
        assert_eq!(kinds_of("research"), 0);
        assert_eq!(kinds_of("general"), 0);
    }
}
