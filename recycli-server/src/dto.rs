//! Request and response bodies of the HTTP API.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use recycli_core::{
    Booking, BookingPayload, BookingStatus, Contact, CustomerId, DateRange, DateSummary,
    ItemDescriptor, Slot, SlotAvailability, TimeWindow,
};

/// GET /health
#[derive(Debug, Serialize)]
pub(crate) struct HealthResponse {
    pub(crate) status: &'static str,
    pub(crate) version: &'static str,
    pub(crate) slots: usize,
    pub(crate) bookings: usize,
}

/// `?from=&to=` bounds; missing ends fall back to the loaded range.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct RangeQuery {
    pub(crate) from: Option<NaiveDate>,
    pub(crate) to: Option<NaiveDate>,
}

impl RangeQuery {
    pub(crate) fn resolve(&self, loaded: DateRange) -> DateRange {
        DateRange::new(
            self.from.unwrap_or(loaded.start),
            self.to.unwrap_or(loaded.end),
        )
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct AvailabilityResponse {
    pub(crate) slots: Vec<SlotAvailability>,
    pub(crate) total: usize,
}

#[derive(Debug, Serialize)]
pub(crate) struct DatesResponse {
    pub(crate) dates: Vec<DateSummary>,
}

#[derive(Debug, Serialize)]
pub(crate) struct SlotListResponse {
    pub(crate) slots: Vec<Slot>,
    pub(crate) total: usize,
}

/// POST /v1/slots/{date}/{window}/reservations
#[derive(Debug, Deserialize)]
pub(crate) struct ReservationRequest {
    pub(crate) customer_id: String,
    #[serde(default)]
    pub(crate) contact: Contact,
    #[serde(default)]
    pub(crate) items: Vec<ItemDescriptor>,
    #[serde(default)]
    pub(crate) idempotency_key: Option<String>,
}

impl ReservationRequest {
    /// The `Idempotency-Key` header wins over the body field.
    pub(crate) fn into_payload(self, header_key: Option<String>) -> BookingPayload {
        let payload = BookingPayload::new(CustomerId(self.customer_id), self.contact)
            .with_items(self.items);
        match header_key.or(self.idempotency_key) {
            Some(key) => payload.with_idempotency_key(key),
            None => payload,
        }
    }
}

/// PUT /v1/bookings/{id}/status
#[derive(Debug, Deserialize)]
pub(crate) struct StatusRequest {
    pub(crate) status: BookingStatus,
}

/// POST /v1/bookings/{id}/reschedule
#[derive(Debug, Deserialize)]
pub(crate) struct RescheduleRequest {
    pub(crate) date: NaiveDate,
    pub(crate) window: TimeWindow,
}

#[derive(Debug, Serialize)]
pub(crate) struct BookingListResponse {
    pub(crate) bookings: Vec<Booking>,
    pub(crate) total: usize,
}
