use std::sync::Arc;

use axum::{
    Router,
    routing::get,
};

use appointment_cell::appointment_routes;
use availability_cell::availability_routes;
use notification_cell::{notification_routes, CellState, EventBus};
use shared_config::AppConfig;

pub fn create_router(config: Arc<AppConfig>, events: EventBus) -> Router {
    let state = CellState::new(config, events);

    Router::new()
        .route("/", get(|| async { "School health scheduling API is running!" }))
        .nest("/availability", availability_routes(state.clone()))
        .nest("/appointments", appointment_routes(state.clone()))
        .merge(notification_routes(state))
}
