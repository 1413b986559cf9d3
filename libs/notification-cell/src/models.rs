use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What changed. Statuses travel as their wire strings so that every cell
/// can publish without depending on the appointment model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ScheduleEventKind {
    AppointmentCreated {
        appointment_id: i64,
        provider_id: i64,
        client_id: i64,
        date: String,
        time: String,
    },
    AppointmentStatusChanged {
        appointment_id: i64,
        provider_id: i64,
        client_id: i64,
        from: String,
        to: String,
    },
    SlotAvailabilityChanged {
        provider_id: i64,
        date: String,
        time: String,
        available: bool,
    },
    NotificationCountChanged {
        user_id: i64,
        unread_count: u32,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleEvent {
    pub event_id: Uuid,
    pub occurred_at: DateTime<Utc>,
    #[serde(flatten)]
    pub kind: ScheduleEventKind,
}

impl ScheduleEvent {
    pub fn new(kind: ScheduleEventKind) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            occurred_at: Utc::now(),
            kind,
        }
    }

    /// SSE event name.
    pub fn topic(&self) -> &'static str {
        match self.kind {
            ScheduleEventKind::AppointmentCreated { .. } => "appointment_created",
            ScheduleEventKind::AppointmentStatusChanged { .. } => "appointment_status_changed",
            ScheduleEventKind::SlotAvailabilityChanged { .. } => "slot_availability_changed",
            ScheduleEventKind::NotificationCountChanged { .. } => "notification_count_changed",
        }
    }

    /// Whether a view belonging to `user_id` should refresh on this event.
    pub fn concerns(&self, user_id: i64) -> bool {
        match &self.kind {
            ScheduleEventKind::AppointmentCreated { provider_id, client_id, .. }
            | ScheduleEventKind::AppointmentStatusChanged { provider_id, client_id, .. } => {
                *provider_id == user_id || *client_id == user_id
            }
            // Slot grids are public to anyone booking with the provider.
            ScheduleEventKind::SlotAvailabilityChanged { .. } => true,
            ScheduleEventKind::NotificationCountChanged { user_id: owner, .. } => *owner == user_id,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventFilter {
    All,
    User(i64),
}

impl EventFilter {
    pub fn matches(&self, event: &ScheduleEvent) -> bool {
        match self {
            EventFilter::All => true,
            EventFilter::User(user_id) => event.concerns(*user_id),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationCount {
    pub user_id: i64,
    pub unread_count: u32,
}
