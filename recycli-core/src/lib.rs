//! Core types and booking logic for the recycli e-waste pickup scheduler.

/// Caller-facing availability views derived from the catalog.
pub mod availability;
/// Bookable pickup windows and their capacity.
pub mod catalog;
/// Error taxonomy for catalog, ledger, and bootstrap.
pub mod error;
/// Capacity accounting and booking records.
pub mod ledger;
/// Domain models and identifiers.
pub mod model;
/// Registry for the sources that seed the catalog.
pub mod plugin;
/// Traits describing seed sources and clocks.
pub mod ports;
/// High-level service facade used by clients.
pub mod service;
/// Select-date, select-slot, confirm orchestration.
pub mod workflow;

pub use availability::*;
pub use catalog::*;
pub use error::*;
pub use ledger::*;
pub use model::*;
pub use plugin::*;
pub use ports::*;
pub use service::*;
pub use workflow::*;
