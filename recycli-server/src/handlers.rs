//! HTTP handlers for the REST API.
//!
//! Each handler parses its inputs and delegates to the pickup service.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
};
use chrono::NaiveDate;

use recycli_core::{Booking, BookingId, Confirmation, CustomerId, Slot, SlotKey, TimeWindow};

use crate::dto::{
    AvailabilityResponse, BookingListResponse, DatesResponse, HealthResponse, RangeQuery,
    ReservationRequest, RescheduleRequest, SlotListResponse, StatusRequest,
};
use crate::error::AppError;
use crate::state::AppState;

/// Result type for handlers.
pub(crate) type HandlerResult<T> = Result<Json<T>, AppError>;

const IDEMPOTENCY_KEY: &str = "idempotency-key";

// =============================================================================
// Health Check
// =============================================================================

/// GET /health
pub(crate) async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: "v1",
        slots: state.service.catalog().len(),
        bookings: state.service.ledger().booking_count(),
    })
}

// =============================================================================
// Availability
// =============================================================================

/// GET /v1/availability
pub(crate) async fn availability(
    State(state): State<AppState>,
    Query(query): Query<RangeQuery>,
) -> Json<AvailabilityResponse> {
    let slots = state.service.available_slots(query.resolve(state.range));
    let total = slots.len();
    Json(AvailabilityResponse { slots, total })
}

/// GET /v1/dates
pub(crate) async fn dates(
    State(state): State<AppState>,
    Query(query): Query<RangeQuery>,
) -> Json<DatesResponse> {
    Json(DatesResponse {
        dates: state.service.date_summaries(query.resolve(state.range)),
    })
}

/// GET /v1/slots
pub(crate) async fn list_slots(
    State(state): State<AppState>,
    Query(query): Query<RangeQuery>,
) -> Json<SlotListResponse> {
    let slots = state.service.list_slots(query.resolve(state.range));
    let total = slots.len();
    Json(SlotListResponse { slots, total })
}

// =============================================================================
// Slots
// =============================================================================

/// POST /v1/slots/{date}/{window}/reservations
///
/// Repeating the request with the same `Idempotency-Key` returns the original booking.
pub(crate) async fn reserve(
    State(state): State<AppState>,
    Path((date, window)): Path<(String, String)>,
    headers: HeaderMap,
    Json(request): Json<ReservationRequest>,
) -> Result<(StatusCode, Json<Confirmation>), AppError> {
    let key = parse_slot_key(&date, &window)?;
    let header_key = headers
        .get(IDEMPOTENCY_KEY)
        .map(|value| {
            value
                .to_str()
                .map(str::to_owned)
                .map_err(|err| AppError::BadRequest(format!("Invalid Idempotency-Key: {err}")))
        })
        .transpose()?;

    let confirmation = state
        .service
        .reserve(key, request.into_payload(header_key))?;
    Ok((StatusCode::CREATED, Json(confirmation)))
}

/// POST /v1/slots/{date}/{window}/disable
pub(crate) async fn disable_slot(
    State(state): State<AppState>,
    Path((date, window)): Path<(String, String)>,
) -> HandlerResult<Slot> {
    let key = parse_slot_key(&date, &window)?;
    Ok(Json(state.service.disable_slot(key.date, key.window)?))
}

/// POST /v1/slots/{date}/{window}/enable
pub(crate) async fn enable_slot(
    State(state): State<AppState>,
    Path((date, window)): Path<(String, String)>,
) -> HandlerResult<Slot> {
    let key = parse_slot_key(&date, &window)?;
    Ok(Json(state.service.enable_slot(key.date, key.window)?))
}

/// GET /v1/slots/{date}/{window}/bookings
pub(crate) async fn slot_bookings(
    State(state): State<AppState>,
    Path((date, window)): Path<(String, String)>,
) -> HandlerResult<BookingListResponse> {
    let key = parse_slot_key(&date, &window)?;
    let bookings = state.service.slot_bookings(key)?;
    let total = bookings.len();
    Ok(Json(BookingListResponse { bookings, total }))
}

// =============================================================================
// Bookings
// =============================================================================

/// GET /v1/bookings/{booking_id}
pub(crate) async fn get_booking(
    State(state): State<AppState>,
    Path(booking_id): Path<String>,
) -> HandlerResult<Booking> {
    let booking_id = parse_booking_id(&booking_id)?;
    Ok(Json(state.service.booking(booking_id)?))
}

/// DELETE /v1/bookings/{booking_id}
pub(crate) async fn cancel_booking(
    State(state): State<AppState>,
    Path(booking_id): Path<String>,
) -> HandlerResult<Booking> {
    let booking_id = parse_booking_id(&booking_id)?;
    Ok(Json(state.service.cancel(booking_id)?))
}

/// PUT /v1/bookings/{booking_id}/status
pub(crate) async fn update_status(
    State(state): State<AppState>,
    Path(booking_id): Path<String>,
    Json(request): Json<StatusRequest>,
) -> HandlerResult<Booking> {
    let booking_id = parse_booking_id(&booking_id)?;
    Ok(Json(state.service.advance_status(booking_id, request.status)?))
}

/// POST /v1/bookings/{booking_id}/reschedule
pub(crate) async fn reschedule_booking(
    State(state): State<AppState>,
    Path(booking_id): Path<String>,
    Json(request): Json<RescheduleRequest>,
) -> HandlerResult<Confirmation> {
    let booking_id = parse_booking_id(&booking_id)?;
    let target = SlotKey::new(request.date, request.window);
    Ok(Json(state.service.reschedule(booking_id, target)?))
}

/// GET /v1/customers/{customer_id}/bookings
pub(crate) async fn customer_bookings(
    State(state): State<AppState>,
    Path(customer_id): Path<String>,
) -> Json<BookingListResponse> {
    let bookings = state.service.bookings_for_customer(&CustomerId(customer_id));
    let total = bookings.len();
    Json(BookingListResponse { bookings, total })
}

fn parse_slot_key(date: &str, window: &str) -> Result<SlotKey, AppError> {
    let date = date
        .parse::<NaiveDate>()
        .map_err(|err| AppError::BadRequest(format!("Invalid date {date:?}: {err}")))?;
    let window = window
        .parse::<TimeWindow>()
        .map_err(|err| AppError::BadRequest(err.to_string()))?;
    Ok(SlotKey::new(date, window))
}

fn parse_booking_id(raw: &str) -> Result<BookingId, AppError> {
    raw.parse()
        .map_err(|err| AppError::BadRequest(format!("Invalid booking id {raw:?}: {err}")))
}
