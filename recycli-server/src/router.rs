//! Router configuration for the HTTP API.

use axum::{
    Router,
    routing::{get, post, put},
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::handlers;
use crate::state::AppState;

/// Create the main application router with all routes and middleware.
pub(crate) fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_v1 = Router::new()
        // Availability reads
        .route("/availability", get(handlers::availability))
        .route("/dates", get(handlers::dates))
        .route("/slots", get(handlers::list_slots))
        // Slot commands
        .route(
            "/slots/{date}/{window}/reservations",
            post(handlers::reserve),
        )
        .route("/slots/{date}/{window}/bookings", get(handlers::slot_bookings))
        .route("/slots/{date}/{window}/disable", post(handlers::disable_slot))
        .route("/slots/{date}/{window}/enable", post(handlers::enable_slot))
        // Bookings
        .route(
            "/bookings/{booking_id}",
            get(handlers::get_booking).delete(handlers::cancel_booking),
        )
        .route("/bookings/{booking_id}/status", put(handlers::update_status))
        .route(
            "/bookings/{booking_id}/reschedule",
            post(handlers::reschedule_booking),
        )
        .route(
            "/customers/{customer_id}/bookings",
            get(handlers::customer_bookings),
        );

    Router::new()
        .route("/health", get(handlers::health_check))
        .nest("/v1", api_v1)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
