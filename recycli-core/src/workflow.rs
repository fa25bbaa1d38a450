//! Select-date, select-slot, confirm orchestration on top of the ledger.
//!
//! The workflow never touches capacity itself. Its local checks are optimistic;
//! the ledger has the final word and a lost race is reported together with
//! freshly read availability.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::availability::{AvailabilityResolver, SlotAvailability};
use crate::error::BookingError;
use crate::ledger::BookingLedger;
use crate::model::{Booking, BookingId, BookingPayload, BookingStatus, SlotKey, TimeWindow};

#[derive(Debug, Clone, Default)]
/// Flag a caller raises to abandon a request before the ledger is called.
pub struct AbortSignal(Arc<AtomicBool>);

impl AbortSignal {
    /// Signal that has not fired.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Abandon the request.
    pub fn abort(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether the request was abandoned.
    #[must_use]
    pub fn is_aborted(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// Step 1 result: what a date offers as of the read.
pub struct DateSelection {
    /// Selected date.
    pub date: NaiveDate,
    /// Slots on the date.
    pub slots: Vec<SlotAvailability>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
/// Step 2 result: a slot that looked available in the last read.
pub struct SlotChoice {
    /// Chosen slot.
    pub key: SlotKey,
    /// Remaining capacity seen in the read.
    pub remaining: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// Receipt handed back to the caller once a booking exists.
pub struct Confirmation {
    /// Booking identifier.
    pub booking_id: BookingId,
    /// Pickup date.
    pub date: NaiveDate,
    /// Pickup window.
    pub window: TimeWindow,
    /// Booking status.
    pub status: BookingStatus,
    /// Long date, e.g. `Wednesday, January 15, 2025`.
    pub date_label: String,
    /// Window label, e.g. `9:00 AM - 11:00 AM`.
    pub window_label: String,
    /// Declared items in one line.
    pub summary: String,
}

impl From<&Booking> for Confirmation {
    fn from(booking: &Booking) -> Self {
        Self {
            booking_id: booking.id,
            date: booking.slot.date,
            window: booking.slot.window,
            status: booking.status,
            date_label: booking.slot.date.format("%A, %B %-d, %Y").to_string(),
            window_label: booking.slot.window.label(),
            summary: summarize(booking),
        }
    }
}

fn summarize(booking: &Booking) -> String {
    if booking.items.is_empty() {
        return String::from("No items declared");
    }

    let mut categories: Vec<&str> = Vec::new();
    for item in &booking.items {
        let label = item.category.label();
        if !categories.contains(&label) {
            categories.push(label);
        }
    }

    let count = booking.items.len();
    let noun = if count == 1 { "item" } else { "items" };
    let mut parts = vec![format!("{count} {noun} ({})", categories.join(", "))];
    if let Some(weight) = booking.total_weight_kg() {
        parts.push(format!("est. {weight:.1} kg"));
    }
    if booking.has_hazardous_items() {
        parts.push(String::from("hazardous materials declared"));
    }
    parts.join(", ")
}

#[derive(thiserror::Error, Debug)]
/// Failures surfaced to the presentation layer.
pub enum WorkflowError {
    /// The caller gave up before the ledger was called; nothing changed.
    #[error("Request aborted before any booking change")]
    Aborted,
    /// The chosen slot was not available in the caller's last read.
    #[error("Slot {key} is not available")]
    SlotUnavailable {
        /// Requested slot.
        key: SlotKey,
        /// Fresh availability for the slot's date.
        availability: Vec<SlotAvailability>,
    },
    /// Another booking took the last unit between read and reserve.
    #[error("Slot {key} was taken before the booking went through")]
    SlotTaken {
        /// Requested slot.
        key: SlotKey,
        /// Fresh availability for the slot's date.
        availability: Vec<SlotAvailability>,
    },
    /// The original booking was cancelled but the new slot could not be reserved.
    #[error("Booking {} was cancelled but rescheduling failed: {source}", .cancelled.id)]
    RescheduleFailed {
        /// The cancelled original booking.
        cancelled: Box<Booking>,
        /// Why the new reservation failed.
        source: BookingError,
        /// Fresh availability for the target date.
        availability: Vec<SlotAvailability>,
    },
    /// Ledger or catalog rejection.
    #[error(transparent)]
    Booking(#[from] BookingError),
}

impl WorkflowError {
    /// Refreshed availability the caller should re-render, if the error carries one.
    #[must_use]
    pub fn availability(&self) -> Option<&[SlotAvailability]> {
        match self {
            WorkflowError::SlotUnavailable { availability, .. }
            | WorkflowError::SlotTaken { availability, .. }
            | WorkflowError::RescheduleFailed { availability, .. } => Some(availability),
            WorkflowError::Aborted | WorkflowError::Booking(_) => None,
        }
    }
}

/// User-facing booking sequence.
#[derive(Clone)]
pub struct BookingWorkflow {
    resolver: AvailabilityResolver,
    ledger: Arc<BookingLedger>,
}

impl BookingWorkflow {
    /// Wire a workflow to a resolver and the ledger it books through.
    #[must_use]
    pub fn new(resolver: AvailabilityResolver, ledger: Arc<BookingLedger>) -> Self {
        Self { resolver, ledger }
    }

    /// Step 1: read what `date` offers.
    #[must_use]
    pub fn select_date(&self, date: NaiveDate) -> DateSelection {
        DateSelection {
            date,
            slots: self.resolver.slots_on(date),
        }
    }

    /// Step 2: validate a window against the last read.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::SlotNotFound`] when the window is not offered on
    /// the date and [`WorkflowError::SlotUnavailable`] when it was full or
    /// disabled in the read.
    pub fn select_slot(
        &self,
        selection: &DateSelection,
        window: TimeWindow,
    ) -> Result<SlotChoice, WorkflowError> {
        let key = SlotKey::new(selection.date, window);
        match selection.slots.iter().find(|slot| slot.window == window) {
            Some(slot) if slot.is_available => Ok(SlotChoice {
                key,
                remaining: slot.remaining,
            }),
            Some(_) => Err(WorkflowError::SlotUnavailable {
                key,
                availability: self.resolver.slots_on(selection.date),
            }),
            None => Err(BookingError::SlotNotFound(key).into()),
        }
    }

    /// Step 3: reserve the chosen slot.
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowError::Aborted`] if `abort` fired first,
    /// [`WorkflowError::SlotTaken`] with refreshed availability when the
    /// slot filled up since the read, or the ledger's rejection otherwise.
    pub fn confirm(
        &self,
        choice: SlotChoice,
        payload: BookingPayload,
        abort: &AbortSignal,
    ) -> Result<Confirmation, WorkflowError> {
        self.reserve(choice.key, payload, abort)
    }

    /// Reserve `key` without a prior read, as remote clients do.
    ///
    /// Repeating a request with the same idempotency key returns the original
    /// booking even when the slot has filled up since.
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowError::Aborted`] if `abort` fired first,
    /// [`WorkflowError::SlotTaken`] for a full slot,
    /// [`WorkflowError::SlotUnavailable`] for a disabled one, or the ledger's
    /// rejection otherwise. Both conflicts carry refreshed availability.
    pub fn reserve(
        &self,
        key: SlotKey,
        payload: BookingPayload,
        abort: &AbortSignal,
    ) -> Result<Confirmation, WorkflowError> {
        if abort.is_aborted() {
            return Err(WorkflowError::Aborted);
        }

        match self.ledger.reserve_key(key, payload) {
            Ok(booking) => Ok(Confirmation::from(&booking)),
            Err(BookingError::CapacityExceeded(_)) => {
                warn!(slot = %key, "lost race for slot");
                Err(WorkflowError::SlotTaken {
                    key,
                    availability: self.resolver.slots_on(key.date),
                })
            }
            Err(BookingError::SlotDisabled(_)) => Err(WorkflowError::SlotUnavailable {
                key,
                availability: self.resolver.slots_on(key.date),
            }),
            Err(err) => Err(err.into()),
        }
    }

    /// Steps 1 to 3 in one call, for callers that already know the slot.
    ///
    /// # Errors
    ///
    /// See [`BookingWorkflow::select_slot`] and [`BookingWorkflow::confirm`].
    pub fn book(
        &self,
        key: SlotKey,
        payload: BookingPayload,
        abort: &AbortSignal,
    ) -> Result<Confirmation, WorkflowError> {
        let selection = self.select_date(key.date);
        let choice = self.select_slot(&selection, key.window)?;
        self.confirm(choice, payload, abort)
    }

    /// Cancel a booking.
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowError::Aborted`] if `abort` fired first, or the ledger's rejection.
    pub fn cancel(
        &self,
        booking_id: BookingId,
        abort: &AbortSignal,
    ) -> Result<Booking, WorkflowError> {
        if abort.is_aborted() {
            return Err(WorkflowError::Aborted);
        }
        Ok(self.ledger.cancel(booking_id)?)
    }

    /// Move a booking to another slot by cancelling it and reserving `target`.
    ///
    /// The two steps are not atomic. When the reservation fails the original
    /// booking stays cancelled and the error says so; nothing is retried.
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowError::Aborted`] if `abort` fired first, the ledger's
    /// rejection of the cancellation, or [`WorkflowError::RescheduleFailed`].
    pub fn reschedule(
        &self,
        booking_id: BookingId,
        target: SlotKey,
        abort: &AbortSignal,
    ) -> Result<Confirmation, WorkflowError> {
        let cancelled = self.cancel(booking_id, abort)?;

        match self.ledger.reserve_key(target, cancelled.to_payload()) {
            Ok(booking) => {
                info!(from = %booking_id, to = %booking.id, slot = %target, "rescheduled booking");
                Ok(Confirmation::from(&booking))
            }
            Err(source) => {
                warn!(booking = %booking_id, slot = %target, error = %source, "reschedule left booking cancelled");
                Err(WorkflowError::RescheduleFailed {
                    cancelled: Box::new(cancelled),
                    source,
                    availability: self.resolver.slots_on(target.date),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::SlotCatalog;
    use crate::model::{Contact, CustomerId, ItemCategory, ItemDescriptor, SlotDefinition};
    use crate::ports::SystemClock;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, day).expect("valid date")
    }

    fn window(raw: &str) -> TimeWindow {
        raw.parse().expect("valid window")
    }

    fn setup(slots: &[(u32, &str, u32)]) -> (BookingWorkflow, Arc<BookingLedger>) {
        let catalog = Arc::new(SlotCatalog::new());
        for (day, raw, capacity) in slots {
            catalog
                .insert(&SlotDefinition {
                    key: SlotKey::new(date(*day), window(raw)),
                    capacity: *capacity,
                    booked: 0,
                    disabled: false,
                })
                .expect("insert");
        }
        let ledger = Arc::new(BookingLedger::new(
            Arc::clone(&catalog),
            Arc::new(SystemClock),
        ));
        let workflow = BookingWorkflow::new(AvailabilityResolver::new(catalog), Arc::clone(&ledger));
        (workflow, ledger)
    }

    fn payload() -> BookingPayload {
        BookingPayload::new(
            CustomerId(String::from("c-1")),
            Contact {
                name: String::from("Asha Rao"),
                address: String::from("123, Bandra, Mumbai, India"),
                phone: String::from("+91 98200 00000"),
                ..Contact::default()
            },
        )
        .with_items(vec![
            ItemDescriptor::new(ItemCategory::Computers, "Lenovo").with_weight(2.5),
            ItemDescriptor::new(ItemCategory::TvsAndMonitors, "Samsung").with_weight(6.0),
            ItemDescriptor::new(ItemCategory::Computers, "Logitech"),
        ])
    }

    #[test]
    fn happy_path_produces_a_receipt() {
        let (workflow, ledger) = setup(&[(15, "9-11AM", 5), (15, "2-4PM", 5)]);

        let selection = workflow.select_date(date(15));
        assert_eq!(selection.slots.len(), 2, "both windows offered");

        let choice = workflow
            .select_slot(&selection, window("9-11AM"))
            .expect("available");
        let receipt = workflow
            .confirm(choice, payload(), &AbortSignal::new())
            .expect("reserved");

        assert_eq!(receipt.date_label, "Wednesday, January 15, 2025", "long date");
        assert_eq!(receipt.window_label, "9:00 AM - 11:00 AM", "window label");
        assert_eq!(receipt.status, BookingStatus::Scheduled, "status");
        assert_eq!(
            receipt.summary,
            "3 items (Computers & Laptops, TVs & Monitors), est. 8.5 kg",
            "item summary"
        );
        assert!(
            receipt.booking_id.to_string().starts_with("PU-"),
            "booking id format"
        );
        assert_eq!(
            ledger.get(receipt.booking_id).map(|booking| booking.slot),
            Ok(SlotKey::new(date(15), window("9-11AM"))),
            "ledger holds the booking"
        );
    }

    #[test]
    fn stale_view_loses_race_and_gets_fresh_availability() {
        let (workflow, ledger) = setup(&[(15, "9-11AM", 1)]);

        let selection = workflow.select_date(date(15));
        let choice = workflow
            .select_slot(&selection, window("9-11AM"))
            .expect("looked available");

        ledger
            .reserve_key(choice.key, payload())
            .expect("someone else books first");

        let err = workflow
            .confirm(choice, payload(), &AbortSignal::new())
            .expect_err("slot is gone");
        assert!(matches!(err, WorkflowError::SlotTaken { .. }), "race reported");
        let refreshed = err.availability().expect("fresh list attached");
        assert_eq!(
            refreshed.first().map(|slot| slot.remaining),
            Some(0),
            "refreshed view shows the slot full"
        );
    }

    #[test]
    fn optimistic_check_rejects_unavailable_and_unknown_windows() {
        let (workflow, ledger) = setup(&[(15, "9-11AM", 1)]);
        ledger
            .reserve_key(SlotKey::new(date(15), window("9-11AM")), payload())
            .expect("fill slot");

        let selection = workflow.select_date(date(15));
        assert!(
            matches!(
                workflow.select_slot(&selection, window("9-11AM")),
                Err(WorkflowError::SlotUnavailable { .. })
            ),
            "full in view"
        );
        assert!(
            matches!(
                workflow.select_slot(&selection, window("4-6PM")),
                Err(WorkflowError::Booking(BookingError::SlotNotFound(_)))
            ),
            "not offered"
        );
    }

    #[test]
    fn abort_before_reserve_changes_nothing() {
        let (workflow, ledger) = setup(&[(15, "9-11AM", 5)]);
        let abort = AbortSignal::new();
        abort.abort();

        let result = workflow.book(SlotKey::new(date(15), window("9-11AM")), payload(), &abort);
        assert!(matches!(result, Err(WorkflowError::Aborted)), "aborted");
        assert_eq!(ledger.booking_count(), 0, "no booking recorded");
    }

    #[test]
    fn reschedule_moves_the_booking() {
        let (workflow, ledger) = setup(&[(15, "9-11AM", 5), (16, "2-4PM", 5)]);
        let original = workflow
            .book(SlotKey::new(date(15), window("9-11AM")), payload(), &AbortSignal::new())
            .expect("book");

        let moved = workflow
            .reschedule(
                original.booking_id,
                SlotKey::new(date(16), window("2-4PM")),
                &AbortSignal::new(),
            )
            .expect("reschedule");

        assert_ne!(moved.booking_id, original.booking_id, "new booking");
        assert_eq!(moved.date, date(16), "new date");
        assert_eq!(
            ledger.get(original.booking_id).map(|booking| booking.status),
            Ok(BookingStatus::Cancelled),
            "original cancelled"
        );
        ledger.verify_consistency().expect("counts agree");
    }

    #[test]
    fn failed_reschedule_leaves_original_cancelled() {
        let (workflow, ledger) = setup(&[(15, "9-11AM", 5), (16, "2-4PM", 1)]);
        let original = workflow
            .book(SlotKey::new(date(15), window("9-11AM")), payload(), &AbortSignal::new())
            .expect("book");
        ledger
            .reserve_key(SlotKey::new(date(16), window("2-4PM")), payload())
            .expect("target filled by someone else");

        let err = workflow
            .reschedule(
                original.booking_id,
                SlotKey::new(date(16), window("2-4PM")),
                &AbortSignal::new(),
            )
            .expect_err("target full");

        match err {
            WorkflowError::RescheduleFailed {
                cancelled, source, ..
            } => {
                assert_eq!(cancelled.id, original.booking_id, "reports the original");
                assert_eq!(cancelled.status, BookingStatus::Cancelled, "left cancelled");
                assert!(
                    matches!(source, BookingError::CapacityExceeded(_)),
                    "cause kept"
                );
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(ledger.booking_count(), 2, "no retry happened");
    }

    #[test]
    fn direct_reserve_replays_and_maps_conflicts() {
        let (workflow, ledger) = setup(&[(15, "9-11AM", 1), (16, "9-11AM", 3)]);
        let key = SlotKey::new(date(15), window("9-11AM"));

        let first = workflow
            .reserve(key, payload().with_idempotency_key("req-1"), &AbortSignal::new())
            .expect("last unit");
        let replay = workflow
            .reserve(key, payload().with_idempotency_key("req-1"), &AbortSignal::new())
            .expect("replay of a filled slot");
        assert_eq!(replay.booking_id, first.booking_id, "same booking returned");
        assert!(
            matches!(
                workflow.reserve(key, payload(), &AbortSignal::new()),
                Err(WorkflowError::SlotTaken { .. })
            ),
            "full slot"
        );

        let closed = SlotKey::new(date(16), window("9-11AM"));
        ledger
            .catalog()
            .disable_slot(closed.date, closed.window)
            .expect("disable");
        assert!(
            matches!(
                workflow.reserve(closed, payload(), &AbortSignal::new()),
                Err(WorkflowError::SlotUnavailable { .. })
            ),
            "disabled slot"
        );
        assert_eq!(ledger.booking_count(), 1, "only one booking recorded");
    }
}
