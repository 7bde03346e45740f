// SPDX-License-Identifier: MIT
// Copyright 2026 The IceBreakrr developers

//! Application configuration loaded from environment variables.

use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    // --- Deployment ---
    /// GCP project ID (Firestore and FCM)
    pub gcp_project_id: String,
    /// Server port
    pub port: u16,
    /// Frontend URL allowed by CORS
    pub frontend_url: String,
    /// Use the in-memory profile store instead of Firestore
    pub offline: bool,

    // --- Secrets ---
    /// JWT signing key for session tokens (raw bytes)
    pub jwt_signing_key: Vec<u8>,
    /// Fixed OAuth access token for the FCM HTTP v1 API, overriding
    /// Application Default Credentials
    pub fcm_access_token: Option<String>,

    // --- Meeting requests ---
    /// Max distance between the chooser and a proposed rendezvous point
    pub meeting_radius_m: f64,
    /// Confirmed meetings are cancelled once a participant is further
    /// than this from the rendezvous point
    pub meeting_max_distance_m: f64,
    /// Confirmed meetings are cancelled after this long
    pub meeting_expiry: Duration,
    pub watchdog_interval: Duration,

    // --- Engagement notifications ---
    pub engagement_interval: Duration,
    /// Minimum time between two notifications for the same pair
    pub engagement_cooldown: Duration,
}

impl Config {
    /// Load configuration from environment variables (and `.env` if present).
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        Ok(Self {
            gcp_project_id: env::var("GCP_PROJECT_ID").unwrap_or_else(|_| "local-dev".to_string()),
            port: parse_var("PORT", 8080)?,
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
            offline: env::var("ICEBREAKRR_OFFLINE").is_ok_and(|v| v == "1" || v == "true"),

            jwt_signing_key: env::var("JWT_SIGNING_KEY")
                .map_err(|_| ConfigError::Missing("JWT_SIGNING_KEY"))?
                .into_bytes(),
            fcm_access_token: env::var("FCM_ACCESS_TOKEN")
                .ok()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty()),

            meeting_radius_m: parse_var("MEETING_RADIUS_M", 500.0)?,
            meeting_max_distance_m: parse_var("MEETING_MAX_DISTANCE_M", 1_000.0)?,
            meeting_expiry: Duration::from_secs(parse_var("MEETING_EXPIRY_SECS", 3600)?),
            watchdog_interval: Duration::from_secs(parse_var("WATCHDOG_INTERVAL_SECS", 60)?),

            engagement_interval: Duration::from_secs(parse_var("ENGAGEMENT_INTERVAL_SECS", 60)?),
            engagement_cooldown: Duration::from_secs(parse_var(
                "ENGAGEMENT_COOLDOWN_SECS",
                3600,
            )?),
        })
    }

    /// Config for tests: offline, short intervals, known signing key.
    pub fn test_default() -> Self {
        Self {
            gcp_project_id: "test-project".to_string(),
            port: 8080,
            frontend_url: "http://localhost:5173".to_string(),
            offline: true,
            jwt_signing_key: b"test_jwt_key_32_bytes_minimum!!".to_vec(),
            fcm_access_token: None,
            meeting_radius_m: 500.0,
            meeting_max_distance_m: 1_000.0,
            meeting_expiry: Duration::from_secs(3600),
            watchdog_interval: Duration::from_secs(60),
            engagement_interval: Duration::from_secs(60),
            engagement_cooldown: Duration::from_secs(3600),
        }
    }
}

/// Read an optional variable, falling back to `default` when unset.
fn parse_var<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value: raw }),
        Err(_) => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {name}: {value:?}")]
    Invalid { name: &'static str, value: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_from_env() {
        env::set_var("JWT_SIGNING_KEY", "test_jwt_key_32_bytes_minimum!!");
        env::set_var("MEETING_RADIUS_M", "250");
        env::remove_var("ENGAGEMENT_COOLDOWN_SECS");

        let config = Config::from_env().expect("Config should load");

        assert_eq!(config.jwt_signing_key, b"test_jwt_key_32_bytes_minimum!!");
        assert_eq!(config.meeting_radius_m, 250.0);
        assert_eq!(config.engagement_cooldown, Duration::from_secs(3600));

        env::remove_var("MEETING_RADIUS_M");
    }

    #[test]
    fn test_parse_var_rejects_garbage() {
        env::set_var("ICEBREAKRR_TEST_GARBAGE", "lots");
        let result: Result<u64, _> = parse_var("ICEBREAKRR_TEST_GARBAGE", 1);
        assert!(matches!(result, Err(ConfigError::Invalid { .. })));
    }
}
