use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use tracing::debug;

use notification_cell::CellState;
use shared_models::auth::{Session, User};
use shared_models::error::AppError;

use crate::models::{
    Appointment, AppointmentError, AppointmentListQuery, AvailableTimesQuery, BookabilityQuery,
    CancelAppointmentRequest, CompleteAppointmentRequest, ScheduleAppointmentRequest,
};
use crate::services::AppointmentScheduler;

fn caller_id(user: &User) -> Result<i64, AppError> {
    user.numeric_id()
        .ok_or_else(|| AppError::BadRequest(format!("User id {} is not a backend user id", user.id)))
}

fn is_participant(user: &User, appointment: &Appointment) -> bool {
    let id = user.numeric_id();
    id == Some(appointment.provider_id) || id == Some(appointment.client_id)
}

fn forbidden(action: &str, appointment_id: i64) -> AppError {
    AppointmentError::Unauthorized(format!("Not allowed to {} appointment {}", action, appointment_id)).into()
}

// ==============================================================================
// BOOKING HANDLERS
// ==============================================================================

pub async fn schedule_appointment(
    State(state): State<CellState>,
    Extension(user): Extension<User>,
    Extension(session): Extension<Session>,
    Json(request): Json<ScheduleAppointmentRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    // Students book for themselves; staff may book on someone's behalf.
    if let Some(client_id) = request.client_id {
        if !user.is_staff() && user.numeric_id() != Some(client_id) {
            return Err(AppError::Forbidden("Cannot book appointments for another user".to_string()));
        }
    }

    let scheduler = AppointmentScheduler::new(&state.config, state.events.clone());
    let appointment = scheduler
        .schedule_appointment(request, user.numeric_id(), &session)
        .await?;

    Ok((StatusCode::CREATED, Json(json!(appointment))))
}

pub async fn check_bookable(
    State(state): State<CellState>,
    Query(query): Query<BookabilityQuery>,
    Extension(session): Extension<Session>,
) -> Result<Json<Value>, AppError> {
    let scheduler = AppointmentScheduler::new(&state.config, state.events.clone());
    let result = scheduler
        .check_bookable(query.provider_id, &query.date, &query.time, &session)
        .await?;

    Ok(Json(json!({
        "provider_id": query.provider_id,
        "date": query.date,
        "time": query.time,
        "bookable": result.is_bookable(),
        "reason": result.reason()
    })))
}

pub async fn get_available_times(
    State(state): State<CellState>,
    Query(query): Query<AvailableTimesQuery>,
    Extension(session): Extension<Session>,
) -> Result<Json<Value>, AppError> {
    let scheduler = AppointmentScheduler::new(&state.config, state.events.clone());
    let times = scheduler
        .available_times(query.provider_id, &query.date, &session)
        .await?;

    Ok(Json(json!({
        "provider_id": query.provider_id,
        "date": query.date,
        "times": times
    })))
}

// ==============================================================================
// QUERY HANDLERS
// ==============================================================================

pub async fn get_appointment(
    State(state): State<CellState>,
    Path(appointment_id): Path<i64>,
    Extension(user): Extension<User>,
    Extension(session): Extension<Session>,
) -> Result<Json<Value>, AppError> {
    let scheduler = AppointmentScheduler::new(&state.config, state.events.clone());
    let appointment = scheduler.get_appointment(appointment_id, &session).await?;

    if !user.is_staff() && !is_participant(&user, &appointment) {
        return Err(forbidden("view", appointment_id));
    }

    Ok(Json(json!(appointment)))
}

pub async fn get_provider_appointments(
    State(state): State<CellState>,
    Path(provider_id): Path<i64>,
    Query(query): Query<AppointmentListQuery>,
    Extension(user): Extension<User>,
    Extension(session): Extension<Session>,
) -> Result<Json<Value>, AppError> {
    if !user.is_staff() && user.numeric_id() != Some(provider_id) {
        return Err(AppError::Forbidden("Cannot view another provider's schedule".to_string()));
    }

    let scheduler = AppointmentScheduler::new(&state.config, state.events.clone());
    let appointments = scheduler
        .appointments_for_provider(provider_id, &query, &session)
        .await?;

    Ok(Json(json!({
        "appointments": appointments,
        "total": appointments.len()
    })))
}

pub async fn get_client_appointments(
    State(state): State<CellState>,
    Path(client_id): Path<i64>,
    Extension(user): Extension<User>,
    Extension(session): Extension<Session>,
) -> Result<Json<Value>, AppError> {
    if !user.is_staff() && user.numeric_id() != Some(client_id) {
        return Err(AppError::Forbidden("Cannot view another user's appointments".to_string()));
    }

    let scheduler = AppointmentScheduler::new(&state.config, state.events.clone());
    let appointments = scheduler.appointments_for_client(client_id, &session).await?;

    Ok(Json(json!({
        "appointments": appointments,
        "total": appointments.len()
    })))
}

pub async fn get_upcoming_appointments(
    State(state): State<CellState>,
    Extension(user): Extension<User>,
    Extension(session): Extension<Session>,
) -> Result<Json<Value>, AppError> {
    let user_id = caller_id(&user)?;

    let scheduler = AppointmentScheduler::new(&state.config, state.events.clone());
    let appointments = scheduler.upcoming_for_user(user_id, &session).await?;

    Ok(Json(json!({
        "appointments": appointments,
        "total": appointments.len()
    })))
}

// ==============================================================================
// STATUS HANDLERS
// ==============================================================================

pub async fn start_appointment(
    State(state): State<CellState>,
    Path(appointment_id): Path<i64>,
    Extension(user): Extension<User>,
    Extension(session): Extension<Session>,
) -> Result<Json<Value>, AppError> {
    let scheduler = AppointmentScheduler::new(&state.config, state.events.clone());
    let current = scheduler.get_appointment(appointment_id, &session).await?;

    if !user.is_admin() && user.numeric_id() != Some(current.provider_id) {
        return Err(forbidden("start", appointment_id));
    }

    let appointment = scheduler.mark_in_progress(appointment_id, &session).await?;
    Ok(Json(json!(appointment)))
}

pub async fn complete_appointment(
    State(state): State<CellState>,
    Path(appointment_id): Path<i64>,
    Extension(user): Extension<User>,
    Extension(session): Extension<Session>,
    request: Option<Json<CompleteAppointmentRequest>>,
) -> Result<Json<Value>, AppError> {
    let scheduler = AppointmentScheduler::new(&state.config, state.events.clone());
    let current = scheduler.get_appointment(appointment_id, &session).await?;

    if !user.is_admin() && user.numeric_id() != Some(current.provider_id) {
        return Err(forbidden("complete", appointment_id));
    }

    let request = request.map(|Json(r)| r).unwrap_or_default();
    let appointment = scheduler.mark_completed(appointment_id, request, &session).await?;
    Ok(Json(json!(appointment)))
}

pub async fn cancel_appointment(
    State(state): State<CellState>,
    Path(appointment_id): Path<i64>,
    Extension(user): Extension<User>,
    Extension(session): Extension<Session>,
    request: Option<Json<CancelAppointmentRequest>>,
) -> Result<Json<Value>, AppError> {
    let scheduler = AppointmentScheduler::new(&state.config, state.events.clone());
    let current = scheduler.get_appointment(appointment_id, &session).await?;

    if !user.is_admin() && !is_participant(&user, &current) {
        return Err(forbidden("cancel", appointment_id));
    }

    let request = request.map(|Json(r)| r).unwrap_or_default();
    debug!("User {} cancelling appointment {}", user.id, appointment_id);

    let appointment = scheduler.cancel(appointment_id, request, &session).await?;
    Ok(Json(json!(appointment)))
}
