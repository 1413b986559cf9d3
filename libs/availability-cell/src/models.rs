use serde::{Deserialize, Serialize};
use std::fmt;

/// A date/time pair with no slot record yet counts as open for booking.
/// `ensure_all_slots_exist` creates missing records with this same value.
pub const ABSENT_SLOT_AVAILABLE: bool = true;

// ==============================================================================
// PROVIDERS
// ==============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ProviderRole {
    Clinic,
    Counselor,
    Faculty,
    Admin,
    Student,
}

impl fmt::Display for ProviderRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderRole::Clinic => write!(f, "clinic"),
            ProviderRole::Counselor => write!(f, "counselor"),
            ProviderRole::Faculty => write!(f, "faculty"),
            ProviderRole::Admin => write!(f, "admin"),
            ProviderRole::Student => write!(f, "student"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Provider {
    pub id: i64,
    pub full_name: String,
    pub role: ProviderRole,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProviderQuery {
    pub role: Option<ProviderRole>,
}

// ==============================================================================
// AVAILABILITY SLOTS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AvailabilitySlot {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub provider_id: i64,
    /// `YYYY-MM-DD`, kept as text end to end.
    pub date: String,
    /// Canonical `HH:MM:SS`.
    pub time: String,
    pub available: bool,
}

impl AvailabilitySlot {
    pub fn new(provider_id: i64, date: &str, time: &str, available: bool) -> Self {
        Self {
            id: None,
            provider_id,
            date: date.to_string(),
            time: time.to_string(),
            available,
        }
    }
}

/// A slot as rendered in a provider's day grid.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlotView {
    pub id: Option<i64>,
    pub time: String,
    pub display_time: String,
    pub available: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DayGrid {
    pub provider_id: i64,
    pub date: String,
    pub slots: Vec<SlotView>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ToggleSlotRequest {
    /// Canonical or `h:mm AM/PM`.
    pub time: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateSlotRequest {
    pub available: bool,
}
