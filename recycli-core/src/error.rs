//! Error taxonomy shared by the catalog, ledger, and service bootstrap.

use crate::model::{BookingId, BookingStatus, SlotKey};
use crate::ports::{SourceError, SourceId};

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
/// Errors raised by catalog and ledger operations.
pub enum BookingError {
    /// No slot exists for the key.
    #[error("Slot not found: {0}")]
    SlotNotFound(SlotKey),
    /// No booking exists for the id.
    #[error("Booking not found: {0}")]
    BookingNotFound(BookingId),
    /// The slot is full. Re-query availability instead of retrying the same slot.
    #[error("Slot {0} has no remaining capacity")]
    CapacityExceeded(SlotKey),
    /// The slot was switched off by an operator.
    #[error("Slot {0} is disabled")]
    SlotDisabled(SlotKey),
    /// The booking was cancelled before; capacity is not released twice.
    #[error("Booking {0} is already cancelled")]
    AlreadyCancelled(BookingId),
    /// The requested status change is not in the lifecycle table.
    #[error("Booking {booking} cannot move from {from} to {to}")]
    InvalidTransition {
        /// Booking the change was requested for.
        booking: BookingId,
        /// Current status.
        from: BookingStatus,
        /// Requested status.
        to: BookingStatus,
    },
    /// Slot definitions need a positive capacity.
    #[error("Slot {0} must have a positive capacity")]
    InvalidCapacity(SlotKey),
    /// A slot with the same key is already in the catalog.
    #[error("Slot {0} already exists")]
    DuplicateSlot(SlotKey),
    /// A declared item failed validation.
    #[error("Invalid item: {0}")]
    InvalidItem(String),
    /// Booked count would leave `0..=capacity`. Indicates a defect, never clamped.
    #[error("Booked count of slot {key} out of bounds (booked {booked}, capacity {capacity})")]
    CountInvariant {
        /// Affected slot.
        key: SlotKey,
        /// Booked count observed.
        booked: u32,
        /// Slot capacity.
        capacity: u32,
    },
}

impl BookingError {
    /// Whether a fresh query-and-retry cycle can succeed.
    ///
    /// Caller logic errors and invariant defects are not recoverable.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            BookingError::InvalidTransition { .. }
                | BookingError::InvalidCapacity(_)
                | BookingError::DuplicateSlot(_)
                | BookingError::InvalidItem(_)
                | BookingError::CountInvariant { .. }
        )
    }
}

#[derive(thiserror::Error, Debug)]
/// Errors raised while building a service from seed sources.
pub enum BootstrapError {
    /// A source failed to deliver its slots.
    #[error("Source {id} failed: {source}")]
    Source {
        /// Failing source.
        id: SourceId,
        /// Underlying failure.
        source: SourceError,
    },
    /// Seed data violated catalog or ledger rules.
    #[error("Seed data rejected: {0}")]
    Seed(#[from] BookingError),
}
