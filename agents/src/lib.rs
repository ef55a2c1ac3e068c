//! The built-in coaching handlers: daily health metrics, biological-age
//! scoring, longevity research, and the general-conversation fallback,
//! plus the pre-wired registry the service boots with.

pub mod bio_age;
pub mod general;
pub mod health_metrics;
pub mod research;
pub mod roster;

pub use bio_age::BioAgeHandler;
pub use general::GeneralHandler;
pub use health_metrics::HealthMetricsHandler;
pub use research::ResearchHandler;
pub use roster::build_registry;
