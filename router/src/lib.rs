//! The Vital dispatch engine.
//!
//! A query comes in with a user id; the engine decides which registered
//! handler answers it. Three signals feed the decision: token overlap
//! with the handlers' capability phrases, vector similarity against the
//! capability index, and the time-decayed relevancy of data the user
//! uploaded earlier. Strictly higher score wins; exact ties go to the
//! earliest-registered handler.
//!
//! The engine never fails a request. Index outages, handler failures,
//! and timeouts all degrade into a well-formed response envelope with
//! an `error` string.

pub mod adapter;
pub mod config;
pub mod error;
pub mod handler;
pub mod index;
pub mod observation;
pub mod registry;
pub mod router;
pub mod session;

pub use adapter::RouterAdapter;
pub use config::RouterConfig;
pub use error::{HandlerError, RegistryError, RouterError};
pub use handler::{Handler, SessionSnapshot};
pub use index::{CapabilityIndex, Embedder, HashingEmbedder, IndexError};
pub use observation::ObservationContext;
pub use registry::HandlerRegistry;
pub use router::SemanticRouter;
