//! High-level service facade wiring catalog, ledger, resolver, and workflow.

use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{info, warn};

use crate::availability::{AvailabilityResolver, DateSummary, SlotAvailability};
use crate::catalog::SlotCatalog;
use crate::error::{BookingError, BootstrapError};
use crate::ledger::BookingLedger;
use crate::model::{
    Booking, BookingId, BookingPayload, BookingStatus, CustomerId, DateRange, Slot, SlotDefinition,
    SlotKey, TimeWindow,
};
use crate::plugin::SourceRegistry;
use crate::ports::{Clock, SourceError, SourceId, SystemClock};
use crate::workflow::{AbortSignal, BookingWorkflow, Confirmation, WorkflowError};

/// Public entry point for pickup scheduling.
///
/// State lives in process memory for the lifetime of the service.
pub struct PickupService {
    catalog: Arc<SlotCatalog>,
    ledger: Arc<BookingLedger>,
    resolver: AvailabilityResolver,
    workflow: BookingWorkflow,
}

impl PickupService {
    /// Create a service over an existing catalog.
    #[must_use]
    pub fn new(catalog: Arc<SlotCatalog>, clock: Arc<dyn Clock>) -> Self {
        let ledger = Arc::new(BookingLedger::new(Arc::clone(&catalog), clock));
        let resolver = AvailabilityResolver::new(Arc::clone(&catalog));
        let workflow = BookingWorkflow::new(resolver.clone(), Arc::clone(&ledger));
        Self {
            catalog,
            ledger,
            resolver,
            workflow,
        }
    }

    /// Empty service on the wall clock.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(Arc::new(SlotCatalog::new()), Arc::new(SystemClock))
    }

    /// Build a service and seed it from every registered source.
    ///
    /// # Errors
    ///
    /// Returns a [`BootstrapError`] if a source fails or its data is rejected.
    pub async fn bootstrap(
        registry: &SourceRegistry,
        range: DateRange,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, BootstrapError> {
        let service = Self::new(Arc::new(SlotCatalog::new()), clock);

        for plugin in registry.plugins_iter() {
            let definitions =
                plugin
                    .source
                    .slots(range)
                    .await
                    .map_err(|source| BootstrapError::Source {
                        id: plugin.meta.id.clone(),
                        source,
                    })?;
            let loaded = service.seed(&definitions)?;
            info!(source = %plugin.meta.id, slots = loaded, "loaded pickup slots");
        }

        Ok(service)
    }

    /// Fetch `range` from one registered source again and add the slots it
    /// publishes that the catalog does not hold yet.
    ///
    /// Slots already in the catalog keep their live counts. Returns the number
    /// of slots added.
    ///
    /// # Errors
    ///
    /// Returns [`BootstrapError::Source`] for an unknown id or a failing
    /// source, and [`BootstrapError::Seed`] when the new data is rejected.
    pub async fn refresh_source(
        &self,
        registry: &SourceRegistry,
        id: &SourceId,
        range: DateRange,
    ) -> Result<usize, BootstrapError> {
        let into_bootstrap = |source: SourceError| BootstrapError::Source {
            id: id.clone(),
            source,
        };
        let plugin = registry.plugin(id).map_err(into_bootstrap)?;
        let definitions = plugin.source.slots(range).await.map_err(into_bootstrap)?;

        let fresh: Vec<SlotDefinition> = definitions
            .into_iter()
            .filter(|definition| {
                self.catalog
                    .get_slot(definition.key.date, definition.key.window)
                    .is_err()
            })
            .collect();
        let added = self.seed(&fresh)?;
        info!(source = %id, slots = added, "refreshed pickup slots");
        Ok(added)
    }

    /// Add slot definitions to the catalog, importing their booked counts.
    ///
    /// Definitions for keys already in the catalog are skipped. Returns the
    /// number of slots added.
    ///
    /// # Errors
    ///
    /// Returns a [`BookingError`] for zero capacities or seeds that overbook a slot.
    pub fn seed(&self, definitions: &[SlotDefinition]) -> Result<usize, BookingError> {
        let mut added = 0;
        for definition in definitions {
            // Imports need an enabled slot; the switch is applied afterwards.
            let enabled = SlotDefinition {
                disabled: false,
                ..*definition
            };
            match self.catalog.insert(&enabled) {
                Ok(_) => {}
                Err(BookingError::DuplicateSlot(key)) => {
                    warn!(slot = %key, "slot defined twice, keeping the first definition");
                    continue;
                }
                Err(err) => return Err(err),
            }

            if definition.booked > 0 {
                self.ledger
                    .import_existing(definition.key, definition.booked)?;
            }
            if definition.disabled {
                self.catalog
                    .disable_slot(definition.key.date, definition.key.window)?;
            }
            added += 1;
        }
        Ok(added)
    }

    /// Slot catalog.
    #[must_use]
    pub fn catalog(&self) -> &Arc<SlotCatalog> {
        &self.catalog
    }

    /// Booking ledger.
    #[must_use]
    pub fn ledger(&self) -> &Arc<BookingLedger> {
        &self.ledger
    }

    /// Availability resolver.
    #[must_use]
    pub fn resolver(&self) -> &AvailabilityResolver {
        &self.resolver
    }

    /// Booking workflow.
    #[must_use]
    pub fn workflow(&self) -> &BookingWorkflow {
        &self.workflow
    }

    /// Slots in `range`, ordered by date then window.
    #[must_use]
    pub fn list_slots(&self, range: DateRange) -> Vec<Slot> {
        self.catalog.list_slots(range)
    }

    /// Availability of every slot in `range`.
    #[must_use]
    pub fn available_slots(&self, range: DateRange) -> Vec<SlotAvailability> {
        self.resolver.available_slots(range)
    }

    /// Dates in `range` with at least one slot.
    #[must_use]
    pub fn distinct_dates(&self, range: DateRange) -> Vec<NaiveDate> {
        self.resolver.distinct_dates(range)
    }

    /// Per-date slot counts in `range`.
    #[must_use]
    pub fn date_summaries(&self, range: DateRange) -> Vec<DateSummary> {
        self.resolver.date_summaries(range)
    }

    /// Switch a slot off.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::SlotNotFound`] for unknown slots.
    pub fn disable_slot(&self, date: NaiveDate, window: TimeWindow) -> Result<Slot, BookingError> {
        self.catalog.disable_slot(date, window)
    }

    /// Switch a slot back on.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::SlotNotFound`] for unknown slots.
    pub fn enable_slot(&self, date: NaiveDate, window: TimeWindow) -> Result<Slot, BookingError> {
        self.catalog.enable_slot(date, window)
    }

    /// Reserve one unit of `key` for a caller without a prior availability read.
    ///
    /// # Errors
    ///
    /// See [`BookingWorkflow::reserve`].
    pub fn reserve(
        &self,
        key: SlotKey,
        payload: BookingPayload,
    ) -> Result<Confirmation, WorkflowError> {
        self.workflow.reserve(key, payload, &AbortSignal::new())
    }

    /// Cancel a booking and release its capacity.
    ///
    /// # Errors
    ///
    /// See [`BookingLedger::cancel`].
    pub fn cancel(&self, booking_id: BookingId) -> Result<Booking, BookingError> {
        self.ledger.cancel(booking_id)
    }

    /// Move a booking to `target`.
    ///
    /// # Errors
    ///
    /// See [`BookingWorkflow::reschedule`].
    pub fn reschedule(
        &self,
        booking_id: BookingId,
        target: SlotKey,
    ) -> Result<Confirmation, WorkflowError> {
        self.workflow
            .reschedule(booking_id, target, &AbortSignal::new())
    }

    /// Look up a booking.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::BookingNotFound`] for unknown ids.
    pub fn booking(&self, booking_id: BookingId) -> Result<Booking, BookingError> {
        self.ledger.get(booking_id)
    }

    /// Bookings held against a slot, oldest first, cancelled ones included.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::SlotNotFound`] for unknown slots.
    pub fn slot_bookings(&self, key: SlotKey) -> Result<Vec<Booking>, BookingError> {
        self.catalog.get_slot(key.date, key.window)?;
        Ok(self.ledger.bookings_for_slot(key))
    }

    /// A customer's bookings, newest first.
    #[must_use]
    pub fn bookings_for_customer(&self, customer: &CustomerId) -> Vec<Booking> {
        self.ledger.list_by_customer(customer)
    }

    /// Apply an operational status change.
    ///
    /// # Errors
    ///
    /// See [`BookingLedger::advance_status`].
    pub fn advance_status(
        &self,
        booking_id: BookingId,
        next: BookingStatus,
    ) -> Result<Booking, BookingError> {
        self.ledger.advance_status(booking_id, next)
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::model::Contact;
    use crate::plugin::SourcePlugin;
    use crate::ports::{SlotSource, SourceError, SourceId, SourceMeta};

    struct FixedSource {
        meta: SourceMeta,
        slots: Vec<SlotDefinition>,
    }

    #[async_trait]
    impl SlotSource for FixedSource {
        fn meta(&self) -> &SourceMeta {
            &self.meta
        }

        async fn slots(&self, range: DateRange) -> Result<Vec<SlotDefinition>, SourceError> {
            Ok(self
                .slots
                .iter()
                .filter(|slot| range.contains(slot.key.date))
                .copied()
                .collect())
        }
    }

    struct BrokenSource {
        meta: SourceMeta,
    }

    #[async_trait]
    impl SlotSource for BrokenSource {
        fn meta(&self) -> &SourceMeta {
            &self.meta
        }

        async fn slots(&self, _range: DateRange) -> Result<Vec<SlotDefinition>, SourceError> {
            Err(SourceError::Internal(String::from("backend offline")))
        }
    }

    fn meta(id: &str) -> SourceMeta {
        SourceMeta {
            id: SourceId(id.to_owned()),
            name: id.to_owned(),
        }
    }

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, day).expect("valid date")
    }

    fn definition(day: u32, raw: &str, capacity: u32, booked: u32, disabled: bool) -> SlotDefinition {
        SlotDefinition {
            key: SlotKey::new(date(day), raw.parse().expect("valid window")),
            capacity,
            booked,
            disabled,
        }
    }

    fn plugin(id: &str, slots: Vec<SlotDefinition>) -> SourcePlugin {
        SourcePlugin {
            meta: meta(id),
            source: Arc::new(FixedSource {
                meta: meta(id),
                slots,
            }),
        }
    }

    fn january() -> DateRange {
        DateRange::new(date(1), date(31))
    }

    #[tokio::test]
    async fn bootstrap_imports_seeded_counts_as_bookings() {
        let registry = SourceRegistry::new(vec![plugin(
            "fixed",
            vec![
                definition(15, "9-11AM", 5, 4, false),
                definition(15, "2-4PM", 5, 5, false),
                definition(16, "9-11AM", 5, 1, true),
            ],
        )]);

        let service = PickupService::bootstrap(&registry, january(), Arc::new(SystemClock))
            .await
            .expect("bootstrap");

        let remaining: Vec<(u32, bool)> = service
            .available_slots(january())
            .iter()
            .map(|slot| (slot.remaining, slot.is_available))
            .collect();
        assert_eq!(
            remaining,
            vec![(1, true), (0, false), (4, false)],
            "seeded counts and switches applied"
        );
        assert_eq!(
            service.bookings_for_customer(&CustomerId::imported()).len(),
            10,
            "seeded units exist as bookings"
        );
        service.ledger().verify_consistency().expect("counts agree");
    }

    #[tokio::test]
    async fn first_source_wins_on_duplicate_slots() {
        let registry = SourceRegistry::new(vec![
            plugin("primary", vec![definition(15, "9-11AM", 5, 0, false)]),
            plugin("secondary", vec![definition(15, "9:00 AM - 11:00 AM", 2, 0, false)]),
        ]);

        let service = PickupService::bootstrap(&registry, january(), Arc::new(SystemClock))
            .await
            .expect("bootstrap");

        let slots = service.list_slots(january());
        assert_eq!(slots.len(), 1, "one slot");
        assert_eq!(slots.first().map(|slot| slot.capacity), Some(5), "primary kept");
    }

    #[tokio::test]
    async fn bootstrap_reports_failing_and_overbooked_sources() {
        let broken = SourceRegistry::new(vec![SourcePlugin {
            meta: meta("broken"),
            source: Arc::new(BrokenSource {
                meta: meta("broken"),
            }),
        }]);
        let outcome = PickupService::bootstrap(&broken, january(), Arc::new(SystemClock)).await;
        assert!(
            matches!(outcome, Err(BootstrapError::Source { ref id, .. }) if id.0 == "broken"),
            "source failure names the source"
        );

        let overbooked =
            SourceRegistry::new(vec![plugin("fixed", vec![definition(15, "9-11AM", 2, 3, false)])]);
        let outcome = PickupService::bootstrap(&overbooked, january(), Arc::new(SystemClock)).await;
        assert!(
            matches!(
                outcome,
                Err(BootstrapError::Seed(BookingError::CapacityExceeded(_)))
            ),
            "seed cannot exceed capacity"
        );
    }

    #[tokio::test]
    async fn refresh_adds_new_slots_and_keeps_live_counts() {
        let registry = SourceRegistry::new(vec![plugin(
            "fixed",
            vec![definition(15, "9-11AM", 5, 2, false)],
        )]);
        let service = PickupService::bootstrap(&registry, january(), Arc::new(SystemClock))
            .await
            .expect("bootstrap");
        let key = SlotKey::new(date(15), "9-11AM".parse().expect("window"));
        service
            .reserve(key, BookingPayload::new(CustomerId(String::from("c-1")), Contact::default()))
            .expect("reserve");

        let added = service
            .refresh_source(&registry, &SourceId(String::from("fixed")), january())
            .await
            .expect("refresh");
        assert_eq!(added, 0, "nothing new in the source");

        let wider = SourceRegistry::new(vec![plugin(
            "fixed",
            vec![
                definition(15, "9-11AM", 5, 2, false),
                definition(16, "9-11AM", 5, 1, false),
            ],
        )]);
        let added = service
            .refresh_source(&wider, &SourceId(String::from("fixed")), january())
            .await
            .expect("refresh");
        assert_eq!(added, 1, "new date picked up");

        let booked: Vec<u32> = service
            .list_slots(january())
            .iter()
            .map(|slot| slot.booked)
            .collect();
        assert_eq!(booked, vec![3, 1], "live count kept, new seed imported");
        service.ledger().verify_consistency().expect("counts agree");

        let outcome = service
            .refresh_source(&wider, &SourceId(String::from("missing")), january())
            .await;
        assert!(
            matches!(
                outcome,
                Err(BootstrapError::Source {
                    source: SourceError::UnknownSource(_),
                    ..
                })
            ),
            "unknown source id"
        );
    }

    #[test]
    fn slot_bookings_lists_cancelled_entries() {
        let service = PickupService::in_memory();
        service
            .seed(&[definition(15, "9-11AM", 5, 1, false)])
            .expect("seed");
        let key = SlotKey::new(date(15), "9-11AM".parse().expect("window"));
        let receipt = service
            .reserve(key, BookingPayload::new(CustomerId(String::from("c-2")), Contact::default()))
            .expect("reserve");
        service.cancel(receipt.booking_id).expect("cancel");

        let statuses: Vec<BookingStatus> = service
            .slot_bookings(key)
            .expect("known slot")
            .iter()
            .map(|booking| booking.status)
            .collect();
        assert_eq!(
            statuses,
            vec![BookingStatus::Scheduled, BookingStatus::Cancelled],
            "seeded then cancelled, oldest first"
        );

        let unknown = SlotKey::new(date(16), "9-11AM".parse().expect("window"));
        assert_eq!(
            service.slot_bookings(unknown),
            Err(BookingError::SlotNotFound(unknown)),
            "unknown slot"
        );
    }

    #[test]
    fn scenario_cancel_confirmed_booking_keeps_history() {
        let service = PickupService::in_memory();
        service
            .seed(&[definition(15, "9-11AM", 5, 0, false)])
            .expect("seed");
        let key = SlotKey::new(date(15), "9-11AM".parse().expect("window"));
        let customer = CustomerId(String::from("c-9"));

        let receipt = service
            .reserve(key, BookingPayload::new(customer.clone(), Contact::default()))
            .expect("reserve");
        service
            .advance_status(receipt.booking_id, BookingStatus::Confirmed)
            .expect("confirm");

        service.cancel(receipt.booking_id).expect("cancel");

        let slot = service
            .catalog()
            .get_slot(key.date, key.window)
            .expect("slot");
        assert_eq!(slot.booked, 0, "unit released");
        let history = service.bookings_for_customer(&customer);
        assert_eq!(
            history.iter().map(|entry| entry.status).collect::<Vec<_>>(),
            vec![BookingStatus::Cancelled],
            "still listed, now cancelled"
        );
    }
}
