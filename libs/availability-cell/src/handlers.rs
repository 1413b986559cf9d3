use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use serde_json::{json, Value};
use tracing::debug;

use notification_cell::CellState;
use shared_models::auth::{Session, User};
use shared_models::error::AppError;

use crate::error::availability_error;
use crate::models::{
    AvailabilitySlot, DayGrid, ProviderQuery, SlotView, ToggleSlotRequest, UpdateSlotRequest,
};
use crate::services::{to_display_time, AvailabilityService, ProviderService};

/// Slot edits are limited to the provider who owns the grid, or an admin.
fn ensure_can_manage(user: &User, provider_id: i64) -> Result<(), AppError> {
    if user.is_admin() || user.numeric_id() == Some(provider_id) {
        return Ok(());
    }
    Err(AppError::Forbidden(format!(
        "Not allowed to change availability for provider {}",
        provider_id
    )))
}

fn slot_view(slot: &AvailabilitySlot) -> SlotView {
    SlotView {
        id: slot.id,
        time: slot.time.clone(),
        display_time: to_display_time(&slot.time).unwrap_or_else(|_| slot.time.clone()),
        available: slot.available,
    }
}

// ==============================================================================
// PROVIDER HANDLERS
// ==============================================================================

pub async fn list_providers(
    State(state): State<CellState>,
    Query(query): Query<ProviderQuery>,
    Extension(session): Extension<Session>,
) -> Result<Json<Value>, AppError> {
    let service = ProviderService::new(&state.config);
    let providers = service
        .list_providers(query.role, &session)
        .await
        .map_err(availability_error)?;

    Ok(Json(json!({
        "providers": providers,
        "total": providers.len()
    })))
}

pub async fn get_provider(
    State(state): State<CellState>,
    Path(provider_id): Path<i64>,
    Extension(session): Extension<Session>,
) -> Result<Json<Value>, AppError> {
    let service = ProviderService::new(&state.config);
    let provider = service
        .get_provider(provider_id, &session)
        .await
        .map_err(availability_error)?;

    Ok(Json(json!(provider)))
}

// ==============================================================================
// SLOT HANDLERS
// ==============================================================================

pub async fn get_day_grid(
    State(state): State<CellState>,
    Path((provider_id, date)): Path<(i64, String)>,
    Extension(session): Extension<Session>,
) -> Result<Json<Value>, AppError> {
    let service = AvailabilityService::new(&state.config, state.events.clone());
    let slots = service
        .load_day_grid(provider_id, &date, &session)
        .await
        .map_err(availability_error)?;

    let grid = DayGrid {
        provider_id,
        date,
        slots: slots.iter().map(slot_view).collect(),
    };

    Ok(Json(json!(grid)))
}

pub async fn ensure_slots(
    State(state): State<CellState>,
    Path((provider_id, date)): Path<(i64, String)>,
    Extension(user): Extension<User>,
    Extension(session): Extension<Session>,
) -> Result<Json<Value>, AppError> {
    ensure_can_manage(&user, provider_id)?;

    let service = AvailabilityService::new(&state.config, state.events.clone());

    let existing = service
        .list_slots(provider_id, &date, &session)
        .await
        .map_err(availability_error)?;
    let created = service
        .ensure_all_slots_exist(provider_id, &date, &existing, &session)
        .await
        .map_err(availability_error)?;

    let slots = if created {
        service
            .list_slots(provider_id, &date, &session)
            .await
            .map_err(availability_error)?
    } else {
        existing
    };

    Ok(Json(json!({
        "created": created,
        "slots": slots.iter().map(slot_view).collect::<Vec<_>>()
    })))
}

pub async fn toggle_slot(
    State(state): State<CellState>,
    Path((provider_id, date)): Path<(i64, String)>,
    Extension(user): Extension<User>,
    Extension(session): Extension<Session>,
    Json(request): Json<ToggleSlotRequest>,
) -> Result<Json<Value>, AppError> {
    ensure_can_manage(&user, provider_id)?;
    debug!("User {} toggling {} on {} for provider {}", user.id, request.time, date, provider_id);

    let service = AvailabilityService::new(&state.config, state.events.clone());
    let slot = service
        .toggle_slot(provider_id, &date, &request.time, &session)
        .await
        .map_err(availability_error)?;

    Ok(Json(json!(slot_view(&slot))))
}

pub async fn update_slot(
    State(state): State<CellState>,
    Path(slot_id): Path<i64>,
    Extension(user): Extension<User>,
    Extension(session): Extension<Session>,
    Json(request): Json<UpdateSlotRequest>,
) -> Result<Json<Value>, AppError> {
    let service = AvailabilityService::new(&state.config, state.events.clone());

    let current = service
        .get_slot(slot_id, &session)
        .await
        .map_err(availability_error)?;
    ensure_can_manage(&user, current.provider_id)?;

    let slot = service
        .update_slot(slot_id, request.available, &session)
        .await
        .map_err(availability_error)?;

    Ok(Json(json!(slot_view(&slot))))
}
