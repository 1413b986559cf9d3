use std::env;
use tracing::warn;

pub const DEFAULT_NOTIFICATION_POLL_INTERVAL_SECS: u64 = 30;
pub const DEFAULT_PORT: u16 = 3000;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub backend_url: String,
    pub backend_anon_key: String,
    pub jwt_secret: String,
    pub notification_poll_interval_secs: u64,
    pub port: u16,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let config = Self {
            backend_url: env::var("BACKEND_URL")
                .unwrap_or_else(|_| {
                    warn!("BACKEND_URL not set, using empty value");
                    String::new()
                }),
            backend_anon_key: env::var("BACKEND_ANON_KEY")
                .unwrap_or_else(|_| {
                    warn!("BACKEND_ANON_KEY not set, using empty value");
                    String::new()
                }),
            jwt_secret: env::var("JWT_SECRET")
                .unwrap_or_else(|_| {
                    warn!("JWT_SECRET not set, using empty value");
                    String::new()
                }),
            notification_poll_interval_secs: parse_or_default(
                "NOTIFICATION_POLL_INTERVAL_SECS",
                DEFAULT_NOTIFICATION_POLL_INTERVAL_SECS,
            ),
            port: parse_or_default("PORT", DEFAULT_PORT),
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.backend_url.is_empty()
            && !self.backend_anon_key.is_empty()
            && !self.jwt_secret.is_empty()
    }
}

fn parse_or_default<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("{} has invalid value '{}', using default {}", key, raw, default);
            default
        }),
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_configured_requires_backend_and_secret() {
        let mut config = AppConfig {
            backend_url: "http://localhost:54321".to_string(),
            backend_anon_key: "anon".to_string(),
            jwt_secret: "secret".to_string(),
            notification_poll_interval_secs: DEFAULT_NOTIFICATION_POLL_INTERVAL_SECS,
            port: DEFAULT_PORT,
        };
        assert!(config.is_configured());

        config.jwt_secret.clear();
        assert!(!config.is_configured());
    }

    #[test]
    fn test_parse_or_default_falls_back_when_unset() {
        let value: u64 = parse_or_default("SCHOOL_HEALTH_UNSET_TEST_KEY", 42);
        assert_eq!(value, 42);
    }
}
