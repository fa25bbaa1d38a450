//! Universe of bookable pickup windows and their capacity.
//!
//! Each slot lives in its own cell with a private lock. The catalog only hands
//! out snapshots; booked counts inside a cell are changed by the ledger alone.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::NaiveDate;
use parking_lot::{Mutex, MutexGuard, RwLock};
use tracing::{debug, info};

use crate::error::BookingError;
use crate::model::{BookingId, CustomerId, DateRange, Slot, SlotDefinition, SlotKey, TimeWindow};

/// Mutable slot state. Reserve and cancel hold the lock for the whole check-and-update.
#[derive(Debug, Default)]
pub(crate) struct SlotState {
    pub(crate) booked: u32,
    pub(crate) disabled: bool,
    /// Live bookings per customer and idempotency key. Cancelled bookings drop out.
    pub(crate) replays: HashMap<(CustomerId, String), BookingId>,
}

#[derive(Debug)]
pub(crate) struct SlotCell {
    key: SlotKey,
    capacity: u32,
    state: Mutex<SlotState>,
}

impl SlotCell {
    pub(crate) fn key(&self) -> SlotKey {
        self.key
    }

    pub(crate) fn capacity(&self) -> u32 {
        self.capacity
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, SlotState> {
        self.state.lock()
    }

    fn snapshot(&self) -> Slot {
        let state = self.state.lock();
        Slot {
            key: self.key,
            capacity: self.capacity,
            booked: state.booked,
            disabled: state.disabled,
        }
    }
}

/// Catalog of pickup slots, iterated in date then window order.
#[derive(Debug, Default)]
pub struct SlotCatalog {
    slots: RwLock<BTreeMap<SlotKey, Arc<SlotCell>>>,
}

impl SlotCatalog {
    /// Create an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a slot with no bookings.
    ///
    /// `definition.booked` is ignored here; seeded bookings are imported through
    /// the ledger so that counts and bookings agree.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::InvalidCapacity`] for a zero capacity and
    /// [`BookingError::DuplicateSlot`] when the key is taken.
    pub fn insert(&self, definition: &SlotDefinition) -> Result<Slot, BookingError> {
        let key = definition.key;
        if definition.capacity == 0 {
            return Err(BookingError::InvalidCapacity(key));
        }

        let mut slots = self.slots.write();
        if slots.contains_key(&key) {
            return Err(BookingError::DuplicateSlot(key));
        }

        let cell = Arc::new(SlotCell {
            key,
            capacity: definition.capacity,
            state: Mutex::new(SlotState {
                disabled: definition.disabled,
                ..SlotState::default()
            }),
        });
        let slot = cell.snapshot();
        slots.insert(key, cell);
        debug!(slot = %key, capacity = definition.capacity, "added slot to catalog");
        Ok(slot)
    }

    /// Slots dated within `range`, ordered by date then window start.
    #[must_use]
    pub fn list_slots(&self, range: DateRange) -> Vec<Slot> {
        if range.is_empty() {
            return Vec::new();
        }

        let cells: Vec<Arc<SlotCell>> = self
            .slots
            .read()
            .values()
            .skip_while(|cell| cell.key.date < range.start)
            .take_while(|cell| cell.key.date <= range.end)
            .map(Arc::clone)
            .collect();

        cells.iter().map(|cell| cell.snapshot()).collect()
    }

    /// Look up a single slot.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::SlotNotFound`] when the catalog has no such slot.
    pub fn get_slot(&self, date: NaiveDate, window: TimeWindow) -> Result<Slot, BookingError> {
        Ok(self.cell(SlotKey::new(date, window))?.snapshot())
    }

    /// Stop accepting reservations for a slot. Existing bookings are kept.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::SlotNotFound`] when the catalog has no such slot.
    pub fn disable_slot(&self, date: NaiveDate, window: TimeWindow) -> Result<Slot, BookingError> {
        self.set_disabled(SlotKey::new(date, window), true)
    }

    /// Accept reservations for a previously disabled slot again.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::SlotNotFound`] when the catalog has no such slot.
    pub fn enable_slot(&self, date: NaiveDate, window: TimeWindow) -> Result<Slot, BookingError> {
        self.set_disabled(SlotKey::new(date, window), false)
    }

    /// Number of slots in the catalog.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.read().len()
    }

    /// Whether the catalog holds no slots.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.read().is_empty()
    }

    fn set_disabled(&self, key: SlotKey, disabled: bool) -> Result<Slot, BookingError> {
        let cell = self.cell(key)?;
        cell.lock().disabled = disabled;
        info!(slot = %key, disabled, "changed slot availability switch");
        Ok(cell.snapshot())
    }

    pub(crate) fn cell(&self, key: SlotKey) -> Result<Arc<SlotCell>, BookingError> {
        self.slots
            .read()
            .get(&key)
            .map(Arc::clone)
            .ok_or(BookingError::SlotNotFound(key))
    }

    pub(crate) fn cells(&self) -> Vec<Arc<SlotCell>> {
        self.slots.read().values().map(Arc::clone).collect()
    }
}
