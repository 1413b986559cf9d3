use std::sync::Arc;

use shared_config::AppConfig;

use crate::services::EventBus;

/// Router state for cells whose mutations must reach other open views.
#[derive(Clone)]
pub struct CellState {
    pub config: Arc<AppConfig>,
    pub events: EventBus,
}

impl CellState {
    pub fn new(config: Arc<AppConfig>, events: EventBus) -> Self {
        Self { config, events }
    }
}
