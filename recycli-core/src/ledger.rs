//! Booking ledger: the only component that consumes or releases slot capacity.
//!
//! Reserve and cancel lock the affected slot before touching the booking table,
//! so the booked count and the set of active bookings change together. Lock
//! order is always slot first, then bookings.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::NaiveDate;
use parking_lot::RwLock;
use tracing::{debug, error, info, warn};

use crate::catalog::SlotCatalog;
use crate::error::BookingError;
use crate::model::{
    Booking, BookingId, BookingPayload, BookingStatus, CustomerId, ItemDescriptor, SlotKey,
    TimeWindow,
};
use crate::ports::Clock;

/// Authority over slot capacity and booking records.
pub struct BookingLedger {
    catalog: Arc<SlotCatalog>,
    clock: Arc<dyn Clock>,
    next_id: AtomicU64,
    bookings: RwLock<HashMap<BookingId, Booking>>,
}

impl BookingLedger {
    /// Create a ledger over `catalog`, stamping bookings with `clock`.
    #[must_use]
    pub fn new(catalog: Arc<SlotCatalog>, clock: Arc<dyn Clock>) -> Self {
        Self {
            catalog,
            clock,
            next_id: AtomicU64::new(1),
            bookings: RwLock::new(HashMap::new()),
        }
    }

    /// Catalog the ledger books against.
    #[must_use]
    pub fn catalog(&self) -> &Arc<SlotCatalog> {
        &self.catalog
    }

    /// Reserve one unit of capacity in the slot at `date`/`window`.
    ///
    /// # Errors
    ///
    /// See [`BookingLedger::reserve_key`].
    pub fn reserve(
        &self,
        date: NaiveDate,
        window: TimeWindow,
        payload: BookingPayload,
    ) -> Result<Booking, BookingError> {
        self.reserve_key(SlotKey::new(date, window), payload)
    }

    /// Reserve one unit of capacity in `key` and record a `Scheduled` booking.
    ///
    /// A payload carrying an idempotency key the same customer already used on
    /// this slot returns that booking without consuming capacity. Keys are
    /// scoped per customer, and a key stops replaying once its booking is
    /// cancelled.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::SlotNotFound`], [`BookingError::SlotDisabled`],
    /// [`BookingError::CapacityExceeded`] when the slot is full, or
    /// [`BookingError::InvalidItem`] when an item weight is negative.
    pub fn reserve_key(
        &self,
        key: SlotKey,
        payload: BookingPayload,
    ) -> Result<Booking, BookingError> {
        validate_items(&payload.items)?;

        let cell = self.catalog.cell(key)?;
        let mut state = cell.lock();

        if let Some(replay_key) = &payload.idempotency_key
            && let Some(existing) = state
                .replays
                .get(&(payload.customer.clone(), replay_key.clone()))
                .copied()
        {
            debug!(slot = %key, booking = %existing, "replaying idempotent reservation");
            return self.get(existing);
        }

        if state.disabled {
            warn!(slot = %key, "reservation rejected, slot disabled");
            return Err(BookingError::SlotDisabled(key));
        }
        if state.booked >= cell.capacity() {
            warn!(slot = %key, capacity = cell.capacity(), "reservation rejected, slot full");
            return Err(BookingError::CapacityExceeded(key));
        }
        let booked = state
            .booked
            .checked_add(1)
            .ok_or(BookingError::CountInvariant {
                key,
                booked: state.booked,
                capacity: cell.capacity(),
            })?;

        let id = BookingId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let now = self.clock.now();
        let booking = Booking {
            id,
            slot: key,
            customer: payload.customer,
            contact: payload.contact,
            items: payload.items,
            status: BookingStatus::Scheduled,
            created_at: now,
            updated_at: now,
            idempotency_key: payload.idempotency_key,
        };

        self.bookings.write().insert(id, booking.clone());
        if let Some(replay_key) = &booking.idempotency_key {
            state
                .replays
                .insert((booking.customer.clone(), replay_key.clone()), id);
        }
        state.booked = booked;

        info!(
            booking = %id,
            slot = %key,
            remaining = cell.capacity().saturating_sub(booked),
            "reserved pickup slot"
        );
        Ok(booking)
    }

    /// Cancel a booking and release its unit of capacity.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::BookingNotFound`], [`BookingError::AlreadyCancelled`]
    /// for a second cancellation, [`BookingError::InvalidTransition`] once the
    /// collection is in progress or done, and [`BookingError::CountInvariant`]
    /// if the slot count would drop below zero.
    pub fn cancel(&self, booking_id: BookingId) -> Result<Booking, BookingError> {
        let key = self
            .bookings
            .read()
            .get(&booking_id)
            .map(|booking| booking.slot)
            .ok_or(BookingError::BookingNotFound(booking_id))?;

        let cell = self.catalog.cell(key)?;
        let mut state = cell.lock();
        let mut bookings = self.bookings.write();
        let booking = bookings
            .get_mut(&booking_id)
            .ok_or(BookingError::BookingNotFound(booking_id))?;

        match booking.status {
            BookingStatus::Cancelled => return Err(BookingError::AlreadyCancelled(booking_id)),
            status if !status.can_transition_to(BookingStatus::Cancelled) => {
                return Err(BookingError::InvalidTransition {
                    booking: booking_id,
                    from: status,
                    to: BookingStatus::Cancelled,
                });
            }
            _ => {}
        }

        let Some(booked) = state.booked.checked_sub(1) else {
            error!(slot = %key, booking = %booking_id, "active booking on a slot with zero booked count");
            return Err(BookingError::CountInvariant {
                key,
                booked: state.booked,
                capacity: cell.capacity(),
            });
        };

        state.booked = booked;
        if let Some(replay_key) = &booking.idempotency_key {
            state
                .replays
                .remove(&(booking.customer.clone(), replay_key.clone()));
        }
        booking.status = BookingStatus::Cancelled;
        booking.updated_at = self.clock.now();

        info!(
            booking = %booking_id,
            slot = %key,
            remaining = cell.capacity().saturating_sub(booked),
            "cancelled booking"
        );
        Ok(booking.clone())
    }

    /// Move a booking along its lifecycle.
    ///
    /// Moving to [`BookingStatus::Cancelled`] goes through [`BookingLedger::cancel`]
    /// so capacity is released.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::BookingNotFound`] or
    /// [`BookingError::InvalidTransition`] for moves outside the lifecycle table.
    pub fn advance_status(
        &self,
        booking_id: BookingId,
        next: BookingStatus,
    ) -> Result<Booking, BookingError> {
        if next == BookingStatus::Cancelled {
            return self.cancel(booking_id);
        }

        let mut bookings = self.bookings.write();
        let booking = bookings
            .get_mut(&booking_id)
            .ok_or(BookingError::BookingNotFound(booking_id))?;

        let current = booking.status;
        if !current.can_transition_to(next) {
            warn!(booking = %booking_id, from = %current, to = %next, "rejected status change");
            return Err(BookingError::InvalidTransition {
                booking: booking_id,
                from: current,
                to: next,
            });
        }

        booking.status = next;
        booking.updated_at = self.clock.now();
        info!(booking = %booking_id, from = %current, to = %next, "advanced booking status");
        Ok(booking.clone())
    }

    /// Look up a booking.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::BookingNotFound`] for unknown ids.
    pub fn get(&self, booking_id: BookingId) -> Result<Booking, BookingError> {
        self.bookings
            .read()
            .get(&booking_id)
            .cloned()
            .ok_or(BookingError::BookingNotFound(booking_id))
    }

    /// All bookings of a customer, newest first. Cancelled ones stay listed.
    #[must_use]
    pub fn list_by_customer(&self, customer: &CustomerId) -> Vec<Booking> {
        let mut bookings: Vec<Booking> = self
            .bookings
            .read()
            .values()
            .filter(|booking| &booking.customer == customer)
            .cloned()
            .collect();
        bookings.sort_by(|left, right| {
            right
                .created_at
                .cmp(&left.created_at)
                .then_with(|| right.id.cmp(&left.id))
        });
        bookings
    }

    /// Bookings held against a slot in creation order, cancelled ones included.
    #[must_use]
    pub fn bookings_for_slot(&self, key: SlotKey) -> Vec<Booking> {
        let mut bookings: Vec<Booking> = self
            .bookings
            .read()
            .values()
            .filter(|booking| booking.slot == key)
            .cloned()
            .collect();
        bookings.sort_by_key(|booking| booking.id);
        bookings
    }

    /// Number of bookings ever recorded.
    #[must_use]
    pub fn booking_count(&self) -> usize {
        self.bookings.read().len()
    }

    /// Record `count` bookings that were taken before start-up.
    ///
    /// # Errors
    ///
    /// Fails like [`BookingLedger::reserve_key`], typically with
    /// [`BookingError::CapacityExceeded`] when the seed overbooks the slot.
    pub fn import_existing(&self, key: SlotKey, count: u32) -> Result<Vec<BookingId>, BookingError> {
        let ids = (0..count)
            .map(|_| {
                self.reserve_key(key, BookingPayload::imported())
                    .map(|booking| booking.id)
            })
            .collect::<Result<Vec<_>, _>>()?;
        debug!(slot = %key, count, "imported seeded bookings");
        Ok(ids)
    }

    /// Check that every slot's booked count equals its active bookings.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::CountInvariant`] for the first slot that disagrees.
    pub fn verify_consistency(&self) -> Result<(), BookingError> {
        for cell in self.catalog.cells() {
            let state = cell.lock();
            let active = self
                .bookings_for_slot(cell.key())
                .iter()
                .filter(|booking| booking.is_active())
                .count();

            let matches = usize::try_from(state.booked).is_ok_and(|booked| booked == active);
            if !matches || state.booked > cell.capacity() {
                error!(slot = %cell.key(), booked = state.booked, active, "slot count disagrees with bookings");
                return Err(BookingError::CountInvariant {
                    key: cell.key(),
                    booked: state.booked,
                    capacity: cell.capacity(),
                });
            }
        }
        Ok(())
    }
}

fn validate_items(items: &[ItemDescriptor]) -> Result<(), BookingError> {
    match items.iter().find(|item| !item.has_valid_weight()) {
        Some(item) => Err(BookingError::InvalidItem(format!(
            "{} {} has an invalid estimated weight",
            item.brand, item.model
        ))),
        None => Ok(()),
    }
}
