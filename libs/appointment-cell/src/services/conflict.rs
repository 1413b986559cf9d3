use std::sync::Arc;

use reqwest::Method;
use tracing::{debug, warn};

use availability_cell::{canonical_slot, same_date, to_canonical, AvailabilitySlot, ABSENT_SLOT_AVAILABLE, CANONICAL_SLOT_TIMES};
use shared_database::BackendClient;
use shared_models::auth::Session;

use crate::models::{Appointment, AppointmentError, Bookability, RejectionReason};

pub(crate) const APPOINTMENTS_PATH: &str = "/rest/v1/appointments";

fn same_time(stored: &str, canonical: &str) -> bool {
    to_canonical(stored).map(|t| t == canonical).unwrap_or(false)
}

/// Decide whether `(provider_id, date, time)` can take a new appointment.
///
/// Checks run in a fixed order: the time must be one of the canonical slots,
/// the slot must not be disabled, and no upcoming, in-progress or completed
/// appointment may already hold it. A slot with no record counts as
/// `ABSENT_SLOT_AVAILABLE`.
pub fn is_bookable(
    provider_id: i64,
    date: &str,
    time: &str,
    slots: &[AvailabilitySlot],
    appointments: &[Appointment],
) -> Bookability {
    let time = match canonical_slot(time) {
        Ok(time) => time,
        Err(_) => return Bookability::NotBookable(RejectionReason::InvalidTime),
    };

    let slot_open = slots
        .iter()
        .find(|slot| slot.provider_id == provider_id && same_date(&slot.date, date) && same_time(&slot.time, time))
        .map(|slot| slot.available)
        .unwrap_or(ABSENT_SLOT_AVAILABLE);

    if !slot_open {
        return Bookability::NotBookable(RejectionReason::SlotDisabled);
    }

    let occupied = appointments.iter().any(|appointment| {
        appointment.provider_id == provider_id
            && same_date(&appointment.date, date)
            && same_time(&appointment.time, time)
            && appointment.status.occupies_slot()
    });

    if occupied {
        return Bookability::NotBookable(RejectionReason::SlotOccupied);
    }

    Bookability::Bookable
}

/// Canonical times still open for booking on the provider's day.
pub fn bookable_times(
    provider_id: i64,
    date: &str,
    slots: &[AvailabilitySlot],
    appointments: &[Appointment],
) -> Vec<&'static str> {
    CANONICAL_SLOT_TIMES
        .iter()
        .copied()
        .filter(|time| is_bookable(provider_id, date, time, slots, appointments).is_bookable())
        .collect()
}

/// Fetches a provider's booked day and runs the bookability rules against it.
///
/// Advisory only: concurrent bookings are settled by the backend.
pub struct ConflictResolver {
    backend: Arc<BackendClient>,
}

impl ConflictResolver {
    pub fn new(backend: Arc<BackendClient>) -> Self {
        Self { backend }
    }

    pub async fn appointments_for_day(
        &self,
        provider_id: i64,
        date: &str,
        session: &Session,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let path = format!(
            "{}?provider_id=eq.{}&date=eq.{}&order=time.asc",
            APPOINTMENTS_PATH, provider_id, date
        );

        let appointments: Vec<Appointment> = self.backend
            .request_with_session(Method::GET, &path, session, None, None)
            .await?;

        Ok(appointments)
    }

    pub async fn check(
        &self,
        provider_id: i64,
        date: &str,
        time: &str,
        slots: &[AvailabilitySlot],
        session: &Session,
    ) -> Result<Bookability, AppointmentError> {
        if canonical_slot(time).is_err() {
            return Ok(Bookability::NotBookable(RejectionReason::InvalidTime));
        }

        let appointments = self.appointments_for_day(provider_id, date, session).await?;
        let result = is_bookable(provider_id, date, time, slots, &appointments);

        match result {
            Bookability::Bookable => debug!("{} {} is bookable for provider {}", date, time, provider_id),
            Bookability::NotBookable(reason) => {
                warn!("{} {} rejected for provider {}: {}", date, time, provider_id, reason)
            }
        }

        Ok(result)
    }

    pub async fn available_times(
        &self,
        provider_id: i64,
        date: &str,
        slots: &[AvailabilitySlot],
        session: &Session,
    ) -> Result<Vec<&'static str>, AppointmentError> {
        let appointments = self.appointments_for_day(provider_id, date, session).await?;
        Ok(bookable_times(provider_id, date, slots, &appointments))
    }
}
