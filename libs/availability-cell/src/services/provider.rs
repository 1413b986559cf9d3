use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use reqwest::Method;
use tracing::debug;

use shared_config::AppConfig;
use shared_database::BackendClient;
use shared_models::auth::Session;

use crate::models::{Provider, ProviderRole};

/// Read-only view of the backend's user directory, restricted to the fields
/// scheduling needs.
pub struct ProviderService {
    backend: Arc<BackendClient>,
}

impl ProviderService {
    pub fn new(config: &AppConfig) -> Self {
        Self::with_backend(Arc::new(BackendClient::new(config)))
    }

    pub fn with_backend(backend: Arc<BackendClient>) -> Self {
        Self { backend }
    }

    pub async fn list_providers(
        &self,
        role: Option<ProviderRole>,
        session: &Session,
    ) -> Result<Vec<Provider>> {
        debug!("Listing providers with role filter {:?}", role);

        let mut path = "/rest/v1/providers?order=full_name.asc".to_string();
        if let Some(role) = role {
            path.push_str(&format!("&role=eq.{}", role));
        }

        let providers: Vec<Provider> = self.backend
            .request_with_session(Method::GET, &path, session, None, None)
            .await
            .context("Failed to fetch providers")?;

        Ok(providers)
    }

    pub async fn get_provider(&self, provider_id: i64, session: &Session) -> Result<Provider> {
        debug!("Fetching provider {}", provider_id);

        let path = format!("/rest/v1/providers?id=eq.{}", provider_id);
        let mut providers: Vec<Provider> = self.backend
            .request_with_session(Method::GET, &path, session, None, None)
            .await
            .with_context(|| format!("Failed to fetch provider {}", provider_id))?;

        if providers.is_empty() {
            return Err(anyhow!(ProviderNotFound(provider_id)));
        }

        Ok(providers.swap_remove(0))
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Provider {0} not found")]
pub struct ProviderNotFound(pub i64);
