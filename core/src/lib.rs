//! Shared types for the Vital coaching dispatch service.
//!
//! Everything in this crate is plain data: the response envelope every
//! routing path returns, the route-history types, the data-kind tags
//! uploads are classified under, and the API error envelope. No I/O,
//! no async.

pub mod data;
pub mod error;
pub mod response;
pub mod routing;
