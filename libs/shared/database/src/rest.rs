use reqwest::{
    Client,
    header::{HeaderMap, HeaderValue, CONTENT_TYPE, AUTHORIZATION},
    Method, StatusCode,
};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use shared_config::AppConfig;
use shared_models::auth::{Session, SessionTokens};
use shared_models::error::AppError;

const REFRESH_PATH: &str = "/auth/v1/token?grant_type=refresh_token";

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("Authentication error: {0}")]
    Unauthorized(String),

    #[error("Access denied: {0}")]
    Forbidden(String),

    #[error("Session expired: {0}")]
    SessionExpired(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("API error ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Invalid header value: {0}")]
    InvalidHeader(String),

    #[error("Failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),
}

impl From<BackendError> for AppError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::Unauthorized(msg) => AppError::Auth(msg),
            BackendError::Forbidden(msg) => AppError::Forbidden(msg),
            BackendError::SessionExpired(msg) => AppError::SessionExpired(msg),
            BackendError::NotFound(msg) => AppError::NotFound(msg),
            BackendError::Conflict(msg) => AppError::Conflict(msg),
            other => AppError::ExternalService(other.to_string()),
        }
    }
}

/// JSON/HTTP client for the school backend's REST interface.
pub struct BackendClient {
    client: Client,
    base_url: String,
    anon_key: String,
}

impl BackendClient {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.backend_url.trim_end_matches('/').to_string(),
            anon_key: config.backend_anon_key.clone(),
        }
    }

    /// Headers asking the backend to echo created/updated rows.
    pub fn representation_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("Prefer", HeaderValue::from_static("return=representation"));
        headers
    }

    fn get_headers(&self, auth_token: Option<&str>) -> Result<HeaderMap, BackendError> {
        let mut headers = HeaderMap::new();

        headers.insert(
            "apikey",
            HeaderValue::from_str(&self.anon_key)
                .map_err(|e| BackendError::InvalidHeader(e.to_string()))?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if let Some(token) = auth_token {
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&format!("Bearer {}", token))
                    .map_err(|e| BackendError::InvalidHeader(e.to_string()))?,
            );
        }

        Ok(headers)
    }

    pub async fn request<T>(&self, method: Method, path: &str,
                            auth_token: Option<&str>, body: Option<Value>)
                            -> Result<T, BackendError>
    where T: DeserializeOwned {
        self.request_with_headers(method, path, auth_token, body, None).await
    }

    pub async fn request_with_headers<T>(
        &self,
        method: Method,
        path: &str,
        auth_token: Option<&str>,
        body: Option<Value>,
        extra_headers: Option<HeaderMap>,
    ) -> Result<T, BackendError>
    where T: DeserializeOwned {
        let url = format!("{}{}", self.base_url, path);
        debug!("Making {} request to {}", method, url);

        let mut headers = self.get_headers(auth_token)?;
        if let Some(extra) = extra_headers {
            headers.extend(extra);
        }

        let mut req = self.client.request(method, &url)
            .headers(headers);

        if let Some(body_data) = body {
            req = req.json(&body_data);
        }

        let response = req.send().await?;

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            error!("API error ({}): {}", status, text);

            return Err(match status {
                StatusCode::UNAUTHORIZED => BackendError::Unauthorized(text),
                StatusCode::FORBIDDEN => BackendError::Forbidden(text),
                StatusCode::NOT_FOUND => BackendError::NotFound(text),
                StatusCode::CONFLICT => BackendError::Conflict(text),
                _ => BackendError::Api { status: status.as_u16(), body: text },
            });
        }

        let body = if text.trim().is_empty() { "null" } else { text.as_str() };
        Ok(serde_json::from_str(body)?)
    }

    /// Authenticated request that survives one expired access token.
    ///
    /// A 401 triggers a single refresh of `session` followed by one retry. If
    /// the refresh is impossible or the retry is rejected again, the caller
    /// gets `SessionExpired` and must sign the user out.
    pub async fn request_with_session<T>(
        &self,
        method: Method,
        path: &str,
        session: &Session,
        body: Option<Value>,
        extra_headers: Option<HeaderMap>,
    ) -> Result<T, BackendError>
    where T: DeserializeOwned {
        let token = session.access_token().await;

        match self.request_with_headers(
            method.clone(),
            path,
            Some(&token),
            body.clone(),
            extra_headers.clone(),
        ).await {
            Err(BackendError::Unauthorized(msg)) => {
                warn!("Backend rejected access token, attempting refresh: {}", msg);
                self.refresh_session(session).await?;

                let token = session.access_token().await;
                match self.request_with_headers(method, path, Some(&token), body, extra_headers).await {
                    Err(BackendError::Unauthorized(msg)) => Err(BackendError::SessionExpired(msg)),
                    other => other,
                }
            }
            other => other,
        }
    }

    /// Exchange the session's refresh token for a new token pair.
    pub async fn refresh_session(&self, session: &Session) -> Result<(), BackendError> {
        let refresh_token = session.refresh_token().await.ok_or_else(|| {
            BackendError::SessionExpired("No refresh token available".to_string())
        })?;

        let refreshed: SessionTokens = self.request(
            Method::POST,
            REFRESH_PATH,
            None,
            Some(json!({ "refresh_token": refresh_token })),
        ).await.map_err(|e| match e {
            BackendError::Unauthorized(msg)
            | BackendError::Forbidden(msg)
            | BackendError::Api { body: msg, .. } => BackendError::SessionExpired(msg),
            other => other,
        })?;

        session.replace(SessionTokens {
            access_token: refreshed.access_token,
            refresh_token: refreshed.refresh_token.or(Some(refresh_token)),
        }).await;

        info!("Session refreshed");
        Ok(())
    }
}
