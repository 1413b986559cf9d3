use axum::{
    Router,
    routing::{get, patch, post},
    middleware,
};

use notification_cell::CellState;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn availability_routes(state: CellState) -> Router {
    Router::new()
        .route("/providers", get(handlers::list_providers))
        .route("/providers/{provider_id}", get(handlers::get_provider))
        .route("/slots/{slot_id}", patch(handlers::update_slot))
        .route("/{provider_id}/{date}", get(handlers::get_day_grid))
        .route("/{provider_id}/{date}/ensure", post(handlers::ensure_slots))
        .route("/{provider_id}/{date}/toggle", post(handlers::toggle_slot))
        .layer(middleware::from_fn_with_state(state.config.clone(), auth_middleware))
        .with_state(state)
}
