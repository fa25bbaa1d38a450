//! Application state shared by all handlers.

use std::sync::Arc;

use recycli_core::{DateRange, PickupService};

/// Shared state cloned into every handler.
#[derive(Clone)]
pub(crate) struct AppState {
    /// Scheduling service holding the catalog and ledger.
    pub(crate) service: Arc<PickupService>,
    /// Range loaded at start-up; queries without bounds fall back to it.
    pub(crate) range: DateRange,
}

impl AppState {
    pub(crate) fn new(service: Arc<PickupService>, range: DateRange) -> Self {
        Self { service, range }
    }
}
