use std::sync::Arc;
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use base64::{Engine as _, engine::general_purpose};
use serde_json::json;

use shared_config::AppConfig;
use shared_models::auth::User;

pub struct TestConfig {
    pub jwt_secret: String,
    pub backend_url: String,
    pub backend_anon_key: String,
    pub notification_poll_interval_secs: u64,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "test-secret-key-for-jwt-validation-must-be-long-enough".to_string(),
            backend_url: "http://localhost:54321".to_string(),
            backend_anon_key: "test-anon-key".to_string(),
            notification_poll_interval_secs: 30,
        }
    }
}

impl TestConfig {
    /// Config pointing at a mock backend (usually `MockServer::uri()`).
    pub fn with_backend(backend_url: &str) -> Self {
        Self {
            backend_url: backend_url.to_string(),
            ..Self::default()
        }
    }

    pub fn to_app_config(&self) -> AppConfig {
        AppConfig {
            backend_url: self.backend_url.clone(),
            backend_anon_key: self.backend_anon_key.clone(),
            jwt_secret: self.jwt_secret.clone(),
            notification_poll_interval_secs: self.notification_poll_interval_secs,
            port: 3000,
        }
    }

    pub fn to_arc(&self) -> Arc<AppConfig> {
        Arc::new(self.to_app_config())
    }
}

pub struct TestUser {
    pub id: i64,
    pub email: String,
    pub role: String,
}

impl Default for TestUser {
    fn default() -> Self {
        Self::student(1)
    }
}

impl TestUser {
    pub fn new(id: i64, role: &str) -> Self {
        Self {
            id,
            email: format!("{}{}@school.test", role, id),
            role: role.to_string(),
        }
    }

    pub fn student(id: i64) -> Self {
        Self::new(id, "student")
    }

    pub fn clinic(id: i64) -> Self {
        Self::new(id, "clinic")
    }

    pub fn counselor(id: i64) -> Self {
        Self::new(id, "counselor")
    }

    pub fn faculty(id: i64) -> Self {
        Self::new(id, "faculty")
    }

    pub fn admin(id: i64) -> Self {
        Self::new(id, "admin")
    }

    pub fn to_user(&self) -> User {
        User {
            id: self.id.to_string(),
            email: Some(self.email.clone()),
            role: Some(self.role.clone()),
            metadata: None,
            created_at: Some(Utc::now()),
        }
    }
}

pub struct JwtTestUtils;

impl JwtTestUtils {
    pub fn create_test_token(user: &TestUser, secret: &str, exp_hours: Option<i64>) -> String {
        let now = Utc::now();
        let exp = now + Duration::hours(exp_hours.unwrap_or(24));

        let header = json!({
            "alg": "HS256",
            "typ": "JWT"
        });

        let payload = json!({
            "sub": user.id.to_string(),
            "email": user.email,
            "role": user.role,
            "iat": now.timestamp(),
            "exp": exp.timestamp()
        });

        let header_encoded = general_purpose::URL_SAFE_NO_PAD.encode(header.to_string());
        let payload_encoded = general_purpose::URL_SAFE_NO_PAD.encode(payload.to_string());

        let signing_input = format!("{}.{}", header_encoded, payload_encoded);

        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(signing_input.as_bytes());
        let signature = mac.finalize().into_bytes();
        let signature_encoded = general_purpose::URL_SAFE_NO_PAD.encode(signature);

        format!("{}.{}", signing_input, signature_encoded)
    }

    pub fn create_expired_token(user: &TestUser, secret: &str) -> String {
        Self::create_test_token(user, secret, Some(-1))
    }

    pub fn create_invalid_signature_token(user: &TestUser) -> String {
        Self::create_test_token(user, "wrong-secret", Some(24))
    }

    pub fn create_malformed_token() -> String {
        "invalid.token.format".to_string()
    }
}

/// Canned backend rows in the shape the REST backend returns them.
pub struct MockBackendResponses;

impl MockBackendResponses {
    pub fn provider_response(id: i64, full_name: &str, role: &str) -> serde_json::Value {
        json!({
            "id": id,
            "full_name": full_name,
            "role": role
        })
    }

    pub fn slot_response(id: i64, provider_id: i64, date: &str, time: &str, available: bool) -> serde_json::Value {
        json!({
            "id": id,
            "provider_id": provider_id,
            "date": date,
            "time": time,
            "available": available
        })
    }

    /// A full day of canonical slots, all enabled, ids starting at `first_id`.
    pub fn full_day_slots(first_id: i64, provider_id: i64, date: &str) -> serde_json::Value {
        let times = [
            "07:00:00", "08:00:00", "09:00:00", "10:00:00", "11:00:00",
            "13:00:00", "14:00:00", "15:00:00", "16:00:00", "17:00:00",
        ];
        serde_json::Value::Array(
            times
                .iter()
                .enumerate()
                .map(|(i, time)| Self::slot_response(first_id + i as i64, provider_id, date, time, true))
                .collect(),
        )
    }

    pub fn appointment_response(
        id: i64,
        provider_id: i64,
        client_id: i64,
        date: &str,
        time: &str,
        status: &str,
    ) -> serde_json::Value {
        json!({
            "id": id,
            "provider_id": provider_id,
            "client_id": client_id,
            "created_by_id": client_id,
            "date": date,
            "time": time,
            "reason": "Headache",
            "service_type": "physical",
            "status": status,
            "documentation": null,
            "diagnosis_code": null,
            "diagnosis_name": null,
            "referral": "Direct",
            "cancellation_reason": null
        })
    }

    pub fn error_response(message: &str, code: &str) -> serde_json::Value {
        json!({
            "error": {
                "message": message,
                "code": code
            }
        })
    }
}
