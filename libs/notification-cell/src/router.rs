use axum::{
    Router,
    routing::get,
    middleware,
};

use shared_utils::extractor::auth_middleware;

use crate::handlers;
use crate::state::CellState;

pub fn notification_routes(state: CellState) -> Router {
    Router::new()
        .route("/events/stream", get(handlers::stream_events))
        .route("/notifications/count", get(handlers::get_notification_count))
        .layer(middleware::from_fn_with_state(state.config.clone(), auth_middleware))
        .with_state(state)
}
