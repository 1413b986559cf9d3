use std::sync::Arc;

use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info, instrument, warn};

use availability_cell::{
    canonical_slot, validate_date, AvailabilityService, ProviderNotFound, ProviderRole, ProviderService,
};
use notification_cell::{EventBus, ScheduleEvent, ScheduleEventKind};
use shared_config::AppConfig;
use shared_database::{BackendClient, BackendError};
use shared_models::auth::Session;

use crate::models::{
    Appointment, AppointmentError, AppointmentListQuery, AppointmentStatus, Bookability,
    CancelAppointmentRequest, CompleteAppointmentRequest, NewAppointment, RejectionReason,
    ScheduleAppointmentRequest, ServiceType, DEFAULT_REFERRAL,
};
use crate::services::conflict::{ConflictResolver, APPOINTMENTS_PATH};
use crate::services::lifecycle::AppointmentLifecycleService;

/// Clinic staff see physical cases and counselors mental ones; any other
/// provider keeps whatever the caller asked for, possibly nothing.
pub fn derive_service_type(role: ProviderRole, requested: Option<ServiceType>) -> Option<ServiceType> {
    match role {
        ProviderRole::Clinic => Some(ServiceType::Physical),
        ProviderRole::Counselor => Some(ServiceType::Mental),
        _ => requested,
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Local checks that must pass before any backend call is made.
pub fn validate_request(
    request: &ScheduleAppointmentRequest,
    created_by_id: Option<i64>,
) -> Result<NewAppointment, AppointmentError> {
    let provider_id = request
        .provider_id
        .ok_or_else(|| AppointmentError::ValidationError("provider_id is required".to_string()))?;
    let client_id = request
        .client_id
        .ok_or_else(|| AppointmentError::ValidationError("client_id is required".to_string()))?;

    let date = non_empty(&request.date)
        .ok_or_else(|| AppointmentError::ValidationError("date is required".to_string()))?;
    validate_date(&date).map_err(|e| AppointmentError::ValidationError(e.to_string()))?;

    let time = non_empty(&request.time)
        .ok_or_else(|| AppointmentError::ValidationError("time is required".to_string()))?;
    let time = canonical_slot(&time)
        .map_err(|_| AppointmentError::NotBookable(RejectionReason::InvalidTime))?;

    Ok(NewAppointment {
        provider_id,
        client_id,
        created_by_id: created_by_id.unwrap_or(client_id),
        date,
        time: time.to_string(),
        reason: non_empty(&request.reason),
        referral: non_empty(&request.referral).unwrap_or_else(|| DEFAULT_REFERRAL.to_string()),
        service_type: request.service_type,
    })
}

fn provider_error(provider_id: i64, err: anyhow::Error) -> AppointmentError {
    if err.downcast_ref::<ProviderNotFound>().is_some() {
        AppointmentError::ProviderNotFound(provider_id)
    } else {
        AppointmentError::Availability(err)
    }
}

pub struct AppointmentScheduler {
    backend: Arc<BackendClient>,
    providers: ProviderService,
    availability: AvailabilityService,
    resolver: ConflictResolver,
    lifecycle: AppointmentLifecycleService,
    events: EventBus,
}

impl AppointmentScheduler {
    pub fn new(config: &AppConfig, events: EventBus) -> Self {
        Self::with_backend(Arc::new(BackendClient::new(config)), events)
    }

    pub fn with_backend(backend: Arc<BackendClient>, events: EventBus) -> Self {
        Self {
            providers: ProviderService::with_backend(Arc::clone(&backend)),
            availability: AvailabilityService::with_backend(Arc::clone(&backend), events.clone()),
            resolver: ConflictResolver::new(Arc::clone(&backend)),
            lifecycle: AppointmentLifecycleService::new(),
            backend,
            events,
        }
    }

    // ==============================================================================
    // BOOKING
    // ==============================================================================

    /// Validate, check and persist a new appointment in `upcoming` status.
    #[instrument(skip(self, request, session))]
    pub async fn schedule_appointment(
        &self,
        request: ScheduleAppointmentRequest,
        created_by_id: Option<i64>,
        session: &Session,
    ) -> Result<Appointment, AppointmentError> {
        let new = validate_request(&request, created_by_id)?;
        debug!("Scheduling {} {} with provider {} for client {}",
               new.date, new.time, new.provider_id, new.client_id);

        let provider = self.providers
            .get_provider(new.provider_id, session)
            .await
            .map_err(|e| provider_error(new.provider_id, e))?;
        let service_type = derive_service_type(provider.role, new.service_type);

        let slots = self.availability
            .load_day_grid(new.provider_id, &new.date, session)
            .await?;

        if let Bookability::NotBookable(reason) = self.resolver
            .check(new.provider_id, &new.date, &new.time, &slots, session)
            .await?
        {
            return Err(AppointmentError::NotBookable(reason));
        }

        let body = json!({
            "provider_id": new.provider_id,
            "client_id": new.client_id,
            "created_by_id": new.created_by_id,
            "date": new.date,
            "time": new.time,
            "reason": new.reason,
            "service_type": service_type,
            "status": AppointmentStatus::Upcoming,
            "referral": new.referral
        });

        let mut created: Vec<Appointment> = self.backend
            .request_with_session(
                Method::POST,
                APPOINTMENTS_PATH,
                session,
                Some(body),
                Some(BackendClient::representation_headers()),
            )
            .await
            .map_err(|e| match e {
                BackendError::Conflict(msg) => {
                    warn!("Backend rejected booking as duplicate: {}", msg);
                    AppointmentError::NotBookable(RejectionReason::SlotOccupied)
                }
                other => AppointmentError::Backend(other),
            })?;

        if created.is_empty() {
            return Err(AppointmentError::Availability(anyhow::anyhow!(
                "Backend returned no row for the new appointment"
            )));
        }
        let appointment = created.swap_remove(0);

        info!("Appointment {} booked with provider {} on {} at {}",
              appointment.id, appointment.provider_id, appointment.date, appointment.time);

        self.events.publish(ScheduleEvent::new(ScheduleEventKind::AppointmentCreated {
            appointment_id: appointment.id,
            provider_id: appointment.provider_id,
            client_id: appointment.client_id,
            date: appointment.date.clone(),
            time: appointment.time.clone(),
        }));

        Ok(appointment)
    }

    // ==============================================================================
    // STATUS TRANSITIONS
    // ==============================================================================

    pub async fn mark_in_progress(&self, appointment_id: i64, session: &Session) -> Result<Appointment, AppointmentError> {
        self.transition(appointment_id, AppointmentStatus::InProgress, json!({}), session).await
    }

    pub async fn mark_completed(
        &self,
        appointment_id: i64,
        request: CompleteAppointmentRequest,
        session: &Session,
    ) -> Result<Appointment, AppointmentError> {
        let mut patch = json!({});
        if let Some(documentation) = request.documentation {
            patch["documentation"] = json!(documentation);
        }
        if let Some(code) = request.diagnosis_code {
            patch["diagnosis_code"] = json!(code);
        }
        if let Some(name) = request.diagnosis_name {
            patch["diagnosis_name"] = json!(name);
        }

        self.transition(appointment_id, AppointmentStatus::Completed, patch, session).await
    }

    pub async fn cancel(
        &self,
        appointment_id: i64,
        request: CancelAppointmentRequest,
        session: &Session,
    ) -> Result<Appointment, AppointmentError> {
        let patch = match non_empty(&request.reason) {
            Some(reason) => json!({ "cancellation_reason": reason }),
            None => json!({}),
        };

        self.transition(appointment_id, AppointmentStatus::Cancelled, patch, session).await
    }

    #[instrument(skip(self, patch, session))]
    async fn transition(
        &self,
        appointment_id: i64,
        target: AppointmentStatus,
        mut patch: Value,
        session: &Session,
    ) -> Result<Appointment, AppointmentError> {
        let current = self.get_appointment(appointment_id, session).await?;
        self.lifecycle.validate_status_transition(current.status, target)?;

        patch["status"] = json!(target);
        let path = format!("{}?id=eq.{}", APPOINTMENTS_PATH, appointment_id);

        let mut updated: Vec<Appointment> = self.backend
            .request_with_session(
                Method::PATCH,
                &path,
                session,
                Some(patch),
                Some(BackendClient::representation_headers()),
            )
            .await?;

        if updated.is_empty() {
            return Err(AppointmentError::NotFound(appointment_id));
        }
        let appointment = updated.swap_remove(0);

        info!("Appointment {} moved {} -> {}", appointment_id, current.status, appointment.status);

        self.events.publish(ScheduleEvent::new(ScheduleEventKind::AppointmentStatusChanged {
            appointment_id,
            provider_id: appointment.provider_id,
            client_id: appointment.client_id,
            from: current.status.to_string(),
            to: appointment.status.to_string(),
        }));

        Ok(appointment)
    }

    // ==============================================================================
    // QUERIES
    // ==============================================================================

    pub async fn get_appointment(&self, appointment_id: i64, session: &Session) -> Result<Appointment, AppointmentError> {
        let path = format!("{}?id=eq.{}", APPOINTMENTS_PATH, appointment_id);
        let mut rows: Vec<Appointment> = self.backend
            .request_with_session(Method::GET, &path, session, None, None)
            .await?;

        if rows.is_empty() {
            return Err(AppointmentError::NotFound(appointment_id));
        }
        Ok(rows.swap_remove(0))
    }

    pub async fn appointments_for_provider(
        &self,
        provider_id: i64,
        query: &AppointmentListQuery,
        session: &Session,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let mut path = format!("{}?provider_id=eq.{}", APPOINTMENTS_PATH, provider_id);
        if let Some(date) = &query.date {
            validate_date(date).map_err(|e| AppointmentError::ValidationError(e.to_string()))?;
            path.push_str(&format!("&date=eq.{}", date));
        }
        if let Some(status) = query.status {
            path.push_str(&format!("&status=eq.{}", status));
        }
        path.push_str("&order=date.asc,time.asc");

        Ok(self.backend.request_with_session(Method::GET, &path, session, None, None).await?)
    }

    pub async fn appointments_for_client(
        &self,
        client_id: i64,
        session: &Session,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let path = format!("{}?client_id=eq.{}&order=date.asc,time.asc", APPOINTMENTS_PATH, client_id);
        Ok(self.backend.request_with_session(Method::GET, &path, session, None, None).await?)
    }

    /// Open appointments where the user is either side.
    pub async fn upcoming_for_user(
        &self,
        user_id: i64,
        session: &Session,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let path = format!(
            "{}?or=(client_id.eq.{},provider_id.eq.{})&status=in.(upcoming,in_progress)&order=date.asc,time.asc",
            APPOINTMENTS_PATH, user_id, user_id
        );
        Ok(self.backend.request_with_session(Method::GET, &path, session, None, None).await?)
    }

    /// Bookable canonical times for a provider's day, without creating slots.
    pub async fn available_times(
        &self,
        provider_id: i64,
        date: &str,
        session: &Session,
    ) -> Result<Vec<&'static str>, AppointmentError> {
        let slots = self.availability.list_slots(provider_id, date, session).await?;
        self.resolver.available_times(provider_id, date, &slots, session).await
    }

    /// Advisory check for a single time.
    pub async fn check_bookable(
        &self,
        provider_id: i64,
        date: &str,
        time: &str,
        session: &Session,
    ) -> Result<Bookability, AppointmentError> {
        if canonical_slot(time).is_err() {
            return Ok(Bookability::NotBookable(RejectionReason::InvalidTime));
        }
        let slots = self.availability.list_slots(provider_id, date, session).await?;
        self.resolver.check(provider_id, date, time, &slots, session).await
    }
}
