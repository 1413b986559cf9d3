use axum::{
    Router,
    routing::{get, post},
    middleware,
};

use notification_cell::CellState;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn appointment_routes(state: CellState) -> Router {
    Router::new()
        .route("/", post(handlers::schedule_appointment))
        .route("/check", get(handlers::check_bookable))
        .route("/available-times", get(handlers::get_available_times))
        .route("/upcoming", get(handlers::get_upcoming_appointments))
        .route("/providers/{provider_id}", get(handlers::get_provider_appointments))
        .route("/clients/{client_id}", get(handlers::get_client_appointments))
        .route("/{appointment_id}", get(handlers::get_appointment))
        .route("/{appointment_id}/start", post(handlers::start_appointment))
        .route("/{appointment_id}/complete", post(handlers::complete_appointment))
        .route("/{appointment_id}/cancel", post(handlers::cancel_appointment))
        .layer(middleware::from_fn_with_state(state.config.clone(), auth_middleware))
        .with_state(state)
}
