//! HTTP error handling and response types.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use tracing::{debug, error};

use recycli_core::{BookingError, SlotAvailability, WorkflowError};

/// API error response body.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct ApiError {
    /// Error code for programmatic handling.
    pub(crate) code: &'static str,
    /// Human-readable error message.
    pub(crate) message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) details: Option<String>,
    /// Refreshed availability to re-render after a conflict.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) availability: Option<Vec<SlotAvailability>>,
}

impl ApiError {
    fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
            availability: None,
        }
    }

    fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    fn with_availability(mut self, availability: Option<&[SlotAvailability]>) -> Self {
        self.availability = availability.map(<[SlotAvailability]>::to_vec);
        self
    }
}

/// Application error type for HTTP handlers.
#[derive(Debug)]
pub(crate) enum AppError {
    /// Malformed path, query, or body value.
    BadRequest(String),
    /// Catalog or ledger rejection.
    Booking(BookingError),
    /// Workflow rejection, possibly carrying fresh availability.
    Workflow(WorkflowError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            AppError::BadRequest(message) => (
                StatusCode::BAD_REQUEST,
                ApiError::new("BAD_REQUEST", message),
            ),
            AppError::Booking(err) => booking_error(&err),
            AppError::Workflow(err) => workflow_error(&err),
        };

        if status.is_server_error() {
            error!(code = body.code, message = %body.message, "request failed");
        } else {
            debug!(status = status.as_u16(), code = body.code, "request rejected");
        }

        (status, Json(body)).into_response()
    }
}

fn booking_error(err: &BookingError) -> (StatusCode, ApiError) {
    let (status, code) = match err {
        BookingError::SlotNotFound(_) => (StatusCode::NOT_FOUND, "SLOT_NOT_FOUND"),
        BookingError::BookingNotFound(_) => (StatusCode::NOT_FOUND, "BOOKING_NOT_FOUND"),
        BookingError::CapacityExceeded(_) => (StatusCode::CONFLICT, "SLOT_FULL"),
        BookingError::SlotDisabled(_) => (StatusCode::CONFLICT, "SLOT_DISABLED"),
        BookingError::AlreadyCancelled(_) => (StatusCode::CONFLICT, "ALREADY_CANCELLED"),
        BookingError::DuplicateSlot(_) => (StatusCode::CONFLICT, "DUPLICATE_SLOT"),
        BookingError::InvalidTransition { .. } => {
            (StatusCode::UNPROCESSABLE_ENTITY, "INVALID_TRANSITION")
        }
        BookingError::InvalidCapacity(_) => (StatusCode::BAD_REQUEST, "INVALID_CAPACITY"),
        BookingError::InvalidItem(_) => (StatusCode::BAD_REQUEST, "INVALID_ITEM"),
        BookingError::CountInvariant { .. } => {
            (StatusCode::INTERNAL_SERVER_ERROR, "INVARIANT_VIOLATION")
        }
    };
    (status, ApiError::new(code, err.to_string()))
}

fn workflow_error(err: &WorkflowError) -> (StatusCode, ApiError) {
    let (status, body) = match err {
        WorkflowError::Booking(inner) => return booking_error(inner),
        WorkflowError::Aborted => (StatusCode::CONFLICT, ApiError::new("ABORTED", err.to_string())),
        WorkflowError::SlotUnavailable { .. } => (
            StatusCode::CONFLICT,
            ApiError::new("SLOT_UNAVAILABLE", err.to_string()),
        ),
        WorkflowError::SlotTaken { .. } => {
            (StatusCode::CONFLICT, ApiError::new("SLOT_FULL", err.to_string()))
        }
        WorkflowError::RescheduleFailed { cancelled, .. } => (
            StatusCode::CONFLICT,
            ApiError::new("RESCHEDULE_FAILED", err.to_string())
                .with_details(format!("Booking {} remains cancelled", cancelled.id)),
        ),
    };
    (status, body.with_availability(err.availability()))
}

impl From<BookingError> for AppError {
    fn from(err: BookingError) -> Self {
        AppError::Booking(err)
    }
}

impl From<WorkflowError> for AppError {
    fn from(err: WorkflowError) -> Self {
        AppError::Workflow(err)
    }
}
