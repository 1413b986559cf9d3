use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use availability_cell::availability_error;
use shared_database::BackendError;
use shared_models::error::AppError;

// ==============================================================================
// CORE APPOINTMENT MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Appointment {
    pub id: i64,
    pub provider_id: i64,
    pub client_id: i64,
    #[serde(default)]
    pub created_by_id: Option<i64>,
    /// `YYYY-MM-DD` wall-clock date; never converted to a timestamp.
    pub date: String,
    /// Canonical `HH:MM:SS`.
    pub time: String,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub service_type: Option<ServiceType>,
    pub status: AppointmentStatus,
    #[serde(default)]
    pub documentation: Option<String>,
    #[serde(default)]
    pub diagnosis_code: Option<String>,
    #[serde(default)]
    pub diagnosis_name: Option<String>,
    #[serde(default)]
    pub referral: Option<String>,
    #[serde(default)]
    pub cancellation_reason: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Upcoming,
    InProgress,
    Completed,
    Cancelled,
}

impl AppointmentStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, AppointmentStatus::Completed | AppointmentStatus::Cancelled)
    }

    /// Whether an appointment in this status holds its slot.
    pub fn occupies_slot(&self) -> bool {
        !matches!(self, AppointmentStatus::Cancelled)
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentStatus::Upcoming => write!(f, "upcoming"),
            AppointmentStatus::InProgress => write!(f, "in_progress"),
            AppointmentStatus::Completed => write!(f, "completed"),
            AppointmentStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ServiceType {
    Physical,
    Mental,
}

impl fmt::Display for ServiceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceType::Physical => write!(f, "physical"),
            ServiceType::Mental => write!(f, "mental"),
        }
    }
}

pub const DEFAULT_REFERRAL: &str = "Direct";

// ==============================================================================
// REQUEST MODELS
// ==============================================================================

/// Booking form as submitted. Every field is optional here so that missing
/// values are reported as validation errors rather than rejected by serde.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScheduleAppointmentRequest {
    pub provider_id: Option<i64>,
    pub client_id: Option<i64>,
    pub date: Option<String>,
    pub time: Option<String>,
    pub reason: Option<String>,
    pub referral: Option<String>,
    pub service_type: Option<ServiceType>,
}

/// A booking request that passed local validation.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAppointment {
    pub provider_id: i64,
    pub client_id: i64,
    pub created_by_id: i64,
    pub date: String,
    pub time: String,
    pub reason: Option<String>,
    pub referral: String,
    pub service_type: Option<ServiceType>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CompleteAppointmentRequest {
    pub documentation: Option<String>,
    pub diagnosis_code: Option<String>,
    pub diagnosis_name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CancelAppointmentRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BookabilityQuery {
    pub provider_id: i64,
    pub date: String,
    pub time: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AvailableTimesQuery {
    pub provider_id: i64,
    pub date: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppointmentListQuery {
    pub date: Option<String>,
    pub status: Option<AppointmentStatus>,
}

// ==============================================================================
// BOOKABILITY
// ==============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RejectionReason {
    SlotDisabled,
    SlotOccupied,
    InvalidTime,
}

impl RejectionReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectionReason::SlotDisabled => "slot_disabled",
            RejectionReason::SlotOccupied => "slot_occupied",
            RejectionReason::InvalidTime => "invalid_time",
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            RejectionReason::SlotDisabled => "The provider has disabled this time slot",
            RejectionReason::SlotOccupied => "This time slot is already booked",
            RejectionReason::InvalidTime => "The requested time is not a bookable slot",
        }
    }
}

impl fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bookability {
    Bookable,
    NotBookable(RejectionReason),
}

impl Bookability {
    pub fn is_bookable(&self) -> bool {
        matches!(self, Bookability::Bookable)
    }

    pub fn reason(&self) -> Option<RejectionReason> {
        match self {
            Bookability::Bookable => None,
            Bookability::NotBookable(reason) => Some(*reason),
        }
    }
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Error, Debug)]
pub enum AppointmentError {
    #[error("Appointment {0} not found")]
    NotFound(i64),

    #[error("Provider {0} not found")]
    ProviderNotFound(i64),

    #[error("Slot not bookable: {0}")]
    NotBookable(RejectionReason),

    #[error("Cannot move appointment from {from} to {to}")]
    InvalidStatusTransition {
        from: AppointmentStatus,
        to: AppointmentStatus,
    },

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Unauthorized access to appointment: {0}")]
    Unauthorized(String),

    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    #[error(transparent)]
    Availability(#[from] anyhow::Error),
}

impl From<AppointmentError> for AppError {
    fn from(err: AppointmentError) -> Self {
        match err {
            AppointmentError::NotFound(_) | AppointmentError::ProviderNotFound(_) => {
                AppError::NotFound(err.to_string())
            }
            AppointmentError::NotBookable(reason) => AppError::NotBookable {
                reason: reason.as_str().to_string(),
                message: reason.message().to_string(),
            },
            AppointmentError::InvalidStatusTransition { .. } => AppError::Conflict(err.to_string()),
            AppointmentError::ValidationError(msg) => AppError::ValidationError(msg),
            AppointmentError::Unauthorized(msg) => AppError::Forbidden(msg),
            AppointmentError::Backend(e) => e.into(),
            AppointmentError::Availability(e) => availability_error(e),
        }
    }
}
