//! Caller-facing view of open capacity.

use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::catalog::SlotCatalog;
use crate::model::{DateRange, Slot, SlotKey, TimeWindow};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
/// Availability of one slot as of the moment it was read.
pub struct SlotAvailability {
    /// Pickup date.
    pub date: NaiveDate,
    /// Pickup window.
    pub window: TimeWindow,
    /// Slot capacity.
    pub capacity: u32,
    /// `capacity - booked`.
    pub remaining: u32,
    /// Operator switch.
    pub disabled: bool,
    /// `remaining > 0` and not disabled.
    pub is_available: bool,
}

impl SlotAvailability {
    /// Key of the slot this entry describes.
    #[must_use]
    pub fn key(&self) -> SlotKey {
        SlotKey::new(self.date, self.window)
    }
}

impl From<&Slot> for SlotAvailability {
    fn from(slot: &Slot) -> Self {
        Self {
            date: slot.key.date,
            window: slot.key.window,
            capacity: slot.capacity,
            remaining: slot.remaining(),
            disabled: slot.disabled,
            is_available: slot.is_bookable(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
/// Per-date roll-up for date pickers ("3 slots available").
pub struct DateSummary {
    /// Calendar date.
    pub date: NaiveDate,
    /// Slots on the date, bookable or not.
    pub total_slots: usize,
    /// Slots that would accept a reservation.
    pub open_slots: usize,
    /// Free capacity summed over open slots.
    pub remaining: u32,
}

/// Read-only composition over the catalog. Every call reads committed state.
#[derive(Debug, Clone)]
pub struct AvailabilityResolver {
    catalog: Arc<SlotCatalog>,
}

impl AvailabilityResolver {
    /// Create a resolver reading from `catalog`.
    #[must_use]
    pub fn new(catalog: Arc<SlotCatalog>) -> Self {
        Self { catalog }
    }

    /// Availability of every slot in `range`, ordered by date then window.
    #[must_use]
    pub fn available_slots(&self, range: DateRange) -> Vec<SlotAvailability> {
        self.catalog
            .list_slots(range)
            .iter()
            .map(SlotAvailability::from)
            .collect()
    }

    /// Availability of the slots on a single date.
    #[must_use]
    pub fn slots_on(&self, date: NaiveDate) -> Vec<SlotAvailability> {
        self.available_slots(DateRange::day(date))
    }

    /// Dates in `range` that have at least one slot, available or not.
    #[must_use]
    pub fn distinct_dates(&self, range: DateRange) -> Vec<NaiveDate> {
        let mut dates: Vec<NaiveDate> = self
            .catalog
            .list_slots(range)
            .iter()
            .map(|slot| slot.key.date)
            .collect();
        dates.dedup();
        dates
    }

    /// Slot counts per date in `range`.
    #[must_use]
    pub fn date_summaries(&self, range: DateRange) -> Vec<DateSummary> {
        let mut summaries: Vec<DateSummary> = Vec::new();
        for slot in self.catalog.list_slots(range) {
            let same_day = summaries
                .last()
                .is_some_and(|last| last.date == slot.key.date);
            if !same_day {
                summaries.push(DateSummary {
                    date: slot.key.date,
                    total_slots: 0,
                    open_slots: 0,
                    remaining: 0,
                });
            }
            let Some(summary) = summaries.last_mut() else {
                continue;
            };
            summary.total_slots += 1;
            if slot.is_bookable() {
                summary.open_slots += 1;
                summary.remaining = summary.remaining.saturating_add(slot.remaining());
            }
        }
        summaries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::BookingLedger;
    use crate::model::{BookingPayload, SlotDefinition};
    use crate::ports::SystemClock;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, day).expect("valid date")
    }

    fn key(day: u32, raw: &str) -> SlotKey {
        SlotKey::new(date(day), raw.parse().expect("valid window"))
    }

    /// Mock catalog shown on the scheduler screen.
    fn fixture() -> (AvailabilityResolver, BookingLedger) {
        let catalog = Arc::new(SlotCatalog::new());
        let ledger = BookingLedger::new(Arc::clone(&catalog), Arc::new(SystemClock));
        for (day, raw, booked) in [
            (15, "9:00 AM - 11:00 AM", 2),
            (15, "11:00 AM - 1:00 PM", 4),
            (15, "2:00 PM - 4:00 PM", 5),
            (15, "4:00 PM - 6:00 PM", 1),
            (16, "9:00 AM - 11:00 AM", 0),
            (16, "11:00 AM - 1:00 PM", 3),
            (16, "2:00 PM - 4:00 PM", 2),
        ] {
            catalog
                .insert(&SlotDefinition {
                    key: key(day, raw),
                    capacity: 5,
                    booked: 0,
                    disabled: false,
                })
                .expect("insert");
            ledger.import_existing(key(day, raw), booked).expect("seed");
        }
        (AvailabilityResolver::new(catalog), ledger)
    }

    fn january() -> DateRange {
        DateRange::new(date(1), date(31))
    }

    #[test]
    fn remaining_and_availability_are_derived_from_counts() {
        let (resolver, _ledger) = fixture();
        let day = resolver.slots_on(date(15));

        let remaining: Vec<u32> = day.iter().map(|slot| slot.remaining).collect();
        assert_eq!(remaining, vec![3, 1, 0, 4], "capacity minus booked");

        let available: Vec<bool> = day.iter().map(|slot| slot.is_available).collect();
        assert_eq!(available, vec![true, true, false, true], "full slot unavailable");
    }

    #[test]
    fn disabled_slot_with_capacity_is_unavailable() {
        let (resolver, ledger) = fixture();
        ledger
            .catalog()
            .disable_slot(date(16), "9-11AM".parse().expect("window"))
            .expect("disable");

        let first = resolver.slots_on(date(16)).first().copied().expect("slot listed");
        assert_eq!(first.remaining, 5, "capacity untouched");
        assert!(first.disabled, "disabled flag surfaced");
        assert!(!first.is_available, "not offered");
    }

    #[test]
    fn reads_reflect_reservations_and_cancellations_immediately() {
        let (resolver, ledger) = fixture();
        let target = key(15, "11-1PM");
        let remaining = |resolver: &AvailabilityResolver| {
            resolver
                .slots_on(date(15))
                .iter()
                .find(|slot| slot.key() == target)
                .map(|slot| slot.remaining)
        };

        let booking = ledger
            .reserve_key(target, BookingPayload::imported())
            .expect("last unit");
        assert_eq!(remaining(&resolver), Some(0), "reservation visible");

        ledger.cancel(booking.id).expect("cancel");
        assert_eq!(remaining(&resolver), Some(1), "cancellation adds exactly one");
    }

    #[test]
    fn repeated_reads_without_mutation_are_identical() {
        let (resolver, _ledger) = fixture();
        assert_eq!(
            resolver.available_slots(january()),
            resolver.available_slots(january()),
            "idempotent read"
        );
    }

    #[test]
    fn distinct_dates_include_fully_booked_days() {
        let (resolver, ledger) = fixture();
        for raw in ["9-11AM", "11-1PM", "2-4PM"] {
            ledger
                .catalog()
                .disable_slot(date(16), raw.parse().expect("window"))
                .expect("disable");
        }

        assert_eq!(
            resolver.distinct_dates(january()),
            vec![date(15), date(16)],
            "dates with any slot"
        );
        assert!(
            resolver.distinct_dates(DateRange::day(date(20))).is_empty(),
            "no slots that day"
        );
    }

    #[test]
    fn date_summaries_count_open_slots() {
        let (resolver, _ledger) = fixture();
        let summaries = resolver.date_summaries(january());

        assert_eq!(
            summaries,
            vec![
                DateSummary {
                    date: date(15),
                    total_slots: 4,
                    open_slots: 3,
                    remaining: 8,
                },
                DateSummary {
                    date: date(16),
                    total_slots: 3,
                    open_slots: 3,
                    remaining: 10,
                },
            ],
            "per-date roll-up"
        );
    }
}
