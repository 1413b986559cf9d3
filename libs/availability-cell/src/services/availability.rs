use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use reqwest::Method;
use serde_json::json;
use tracing::{debug, info, instrument, warn};

use shared_config::AppConfig;
use shared_database::BackendClient;
use shared_models::auth::Session;
use notification_cell::{EventBus, ScheduleEvent, ScheduleEventKind};

use crate::models::{AvailabilitySlot, ABSENT_SLOT_AVAILABLE};
use crate::services::slots::{canonical_slot, same_date, to_canonical, validate_date, CANONICAL_SLOT_TIMES};

const SLOTS_PATH: &str = "/rest/v1/availability_slots";

#[derive(Debug, thiserror::Error)]
#[error("Availability slot {0} not found")]
pub struct SlotNotFound(pub i64);

pub struct AvailabilityService {
    backend: Arc<BackendClient>,
    events: EventBus,
}

impl AvailabilityService {
    pub fn new(config: &AppConfig, events: EventBus) -> Self {
        Self::with_backend(Arc::new(BackendClient::new(config)), events)
    }

    pub fn with_backend(backend: Arc<BackendClient>, events: EventBus) -> Self {
        Self { backend, events }
    }

    /// Slot records stored for a provider's day, in backend order.
    pub async fn list_slots(
        &self,
        provider_id: i64,
        date: &str,
        session: &Session,
    ) -> Result<Vec<AvailabilitySlot>> {
        validate_date(date)?;
        debug!("Fetching slots for provider {} on {}", provider_id, date);

        let path = format!(
            "{}?provider_id=eq.{}&date=eq.{}&order=time.asc",
            SLOTS_PATH, provider_id, date
        );

        let slots: Vec<AvailabilitySlot> = self.backend
            .request_with_session(Method::GET, &path, session, None, None)
            .await
            .with_context(|| format!("Failed to fetch slots for provider {} on {}", provider_id, date))?;

        Ok(slots)
    }

    pub async fn get_slot(&self, slot_id: i64, session: &Session) -> Result<AvailabilitySlot> {
        let path = format!("{}?id=eq.{}", SLOTS_PATH, slot_id);
        let mut slots: Vec<AvailabilitySlot> = self.backend
            .request_with_session(Method::GET, &path, session, None, None)
            .await
            .with_context(|| format!("Failed to fetch slot {}", slot_id))?;

        if slots.is_empty() {
            return Err(anyhow!(SlotNotFound(slot_id)));
        }
        Ok(slots.swap_remove(0))
    }

    /// Create an enabled record for every canonical time missing from
    /// `existing_slots`.
    ///
    /// Returns whether anything was created; callers re-fetch afterwards to
    /// pick up the backend-assigned ids. Stops at the first failed creation.
    #[instrument(skip(self, existing_slots, session))]
    pub async fn ensure_all_slots_exist(
        &self,
        provider_id: i64,
        date: &str,
        existing_slots: &[AvailabilitySlot],
        session: &Session,
    ) -> Result<bool> {
        validate_date(date)?;

        let present: Vec<String> = existing_slots
            .iter()
            .filter(|slot| slot.provider_id == provider_id && same_date(&slot.date, date))
            .filter_map(|slot| to_canonical(&slot.time).ok())
            .collect();

        let missing: Vec<&str> = CANONICAL_SLOT_TIMES
            .iter()
            .copied()
            .filter(|time| !present.iter().any(|p| p.as_str() == *time))
            .collect();

        if missing.is_empty() {
            return Ok(false);
        }

        debug!("Creating {} missing slot(s)", missing.len());

        for time in &missing {
            let slot = AvailabilitySlot::new(provider_id, date, time, ABSENT_SLOT_AVAILABLE);
            self.create_slot(&slot, session).await.with_context(|| {
                format!("Failed to create {} slot for provider {} on {}", time, provider_id, date)
            })?;
        }

        info!("Created {} slot(s) for provider {} on {}", missing.len(), provider_id, date);
        Ok(true)
    }

    /// The provider's full day: exactly one record per canonical time, in
    /// canonical order.
    pub async fn load_day_grid(
        &self,
        provider_id: i64,
        date: &str,
        session: &Session,
    ) -> Result<Vec<AvailabilitySlot>> {
        let mut slots = self.list_slots(provider_id, date, session).await?;

        if self.ensure_all_slots_exist(provider_id, date, &slots, session).await? {
            slots = self.list_slots(provider_id, date, session).await?;
        }

        let mut grid = Vec::with_capacity(CANONICAL_SLOT_TIMES.len());
        for time in CANONICAL_SLOT_TIMES {
            let slot = slots
                .iter()
                .find(|slot| to_canonical(&slot.time).map(|t| t == time).unwrap_or(false))
                .ok_or_else(|| anyhow!(
                    "Slot grid for provider {} on {} is missing {} after ensure",
                    provider_id, date, time
                ))?;

            let mut slot = slot.clone();
            slot.time = time.to_string();
            grid.push(slot);
        }

        Ok(grid)
    }

    /// Flip a slot's availability. A slot with no record yet is created with
    /// the opposite of the absent default.
    #[instrument(skip(self, session))]
    pub async fn toggle_slot(
        &self,
        provider_id: i64,
        date: &str,
        time: &str,
        session: &Session,
    ) -> Result<AvailabilitySlot> {
        let time = canonical_slot(time)?;
        let slots = self.list_slots(provider_id, date, session).await?;

        let existing = slots
            .iter()
            .find(|slot| to_canonical(&slot.time).map(|t| t == time).unwrap_or(false));

        let updated = match existing {
            Some(AvailabilitySlot { id: Some(id), available, .. }) => {
                self.patch_available(*id, !available, session).await?
            }
            Some(slot) => {
                warn!("Slot at {} has no id; recreating it", slot.time);
                let slot = AvailabilitySlot::new(provider_id, date, time, !slot.available);
                self.create_slot(&slot, session).await?
            }
            None => {
                let slot = AvailabilitySlot::new(provider_id, date, time, !ABSENT_SLOT_AVAILABLE);
                self.create_slot(&slot, session).await?
            }
        };

        info!("Slot {} for provider {} on {} is now {}",
              time, provider_id, date, if updated.available { "enabled" } else { "disabled" });
        self.publish_change(&updated);
        Ok(updated)
    }

    pub async fn update_slot(
        &self,
        slot_id: i64,
        available: bool,
        session: &Session,
    ) -> Result<AvailabilitySlot> {
        let updated = self.patch_available(slot_id, available, session).await?;
        self.publish_change(&updated);
        Ok(updated)
    }

    // ==============================================================================
    // PRIVATE HELPER METHODS
    // ==============================================================================

    async fn create_slot(&self, slot: &AvailabilitySlot, session: &Session) -> Result<AvailabilitySlot> {
        let body = json!({
            "provider_id": slot.provider_id,
            "date": slot.date,
            "time": slot.time,
            "available": slot.available
        });

        let mut created: Vec<AvailabilitySlot> = self.backend
            .request_with_session(
                Method::POST,
                SLOTS_PATH,
                session,
                Some(body),
                Some(BackendClient::representation_headers()),
            )
            .await?;

        if created.is_empty() {
            return Err(anyhow!("Backend returned no row for created slot {}", slot.time));
        }
        Ok(created.swap_remove(0))
    }

    async fn patch_available(&self, slot_id: i64, available: bool, session: &Session) -> Result<AvailabilitySlot> {
        let path = format!("{}?id=eq.{}", SLOTS_PATH, slot_id);

        let mut updated: Vec<AvailabilitySlot> = self.backend
            .request_with_session(
                Method::PATCH,
                &path,
                session,
                Some(json!({ "available": available })),
                Some(BackendClient::representation_headers()),
            )
            .await
            .with_context(|| format!("Failed to update slot {}", slot_id))?;

        if updated.is_empty() {
            return Err(anyhow!(SlotNotFound(slot_id)));
        }
        Ok(updated.swap_remove(0))
    }

    fn publish_change(&self, slot: &AvailabilitySlot) {
        self.events.publish(ScheduleEvent::new(ScheduleEventKind::SlotAvailabilityChanged {
            provider_id: slot.provider_id,
            date: slot.date.clone(),
            time: slot.time.clone(),
            available: slot.available,
        }));
    }
}
