use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

#[derive(Debug, Serialize, Deserialize)]
pub struct JwtHeader {
    pub alg: String,
    pub typ: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct JwtClaims {
    pub sub: String,
    pub exp: Option<u64>,
    pub email: Option<String>,
    pub role: Option<String>,
    pub user_metadata: Option<serde_json::Value>,
    pub aud: Option<String>,
    pub iat: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: Option<String>,
    pub role: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub created_at: Option<DateTime<Utc>>,
}

impl User {
    pub fn has_role(&self, role: &str) -> bool {
        self.role.as_deref() == Some(role)
    }

    pub fn is_admin(&self) -> bool {
        self.has_role("admin")
    }

    /// Staff roles may act on behalf of other users (referrals, slot management).
    pub fn is_staff(&self) -> bool {
        matches!(
            self.role.as_deref(),
            Some("admin") | Some("clinic") | Some("counselor") | Some("faculty")
        )
    }

    /// Backend user ids are integers carried as the token subject.
    pub fn numeric_id(&self) -> Option<i64> {
        self.id.parse().ok()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionTokens {
    pub access_token: String,
    pub refresh_token: Option<String>,
}

/// Credentials for talking to the backend on behalf of one signed-in user.
///
/// Clones share the same tokens, so a refresh performed through one clone is
/// visible to every holder for the rest of the request.
#[derive(Debug, Clone)]
pub struct Session {
    tokens: Arc<RwLock<SessionTokens>>,
}

impl Session {
    pub fn new(access_token: impl Into<String>, refresh_token: Option<String>) -> Self {
        Self {
            tokens: Arc::new(RwLock::new(SessionTokens {
                access_token: access_token.into(),
                refresh_token,
            })),
        }
    }

    pub fn from_token(access_token: impl Into<String>) -> Self {
        Self::new(access_token, None)
    }

    pub async fn access_token(&self) -> String {
        self.tokens.read().await.access_token.clone()
    }

    pub async fn refresh_token(&self) -> Option<String> {
        self.tokens.read().await.refresh_token.clone()
    }

    pub async fn replace(&self, tokens: SessionTokens) {
        *self.tokens.write().await = tokens;
    }
}
