// SPDX-License-Identifier: MIT
// Copyright 2026 The IceBreakrr developers

use chrono::NaiveDate;
use icebreakrr::config::Config;
use icebreakrr::db::{FirestoreDb, MemoryProfileStore, ProfileStore};
use icebreakrr::middleware::auth::create_jwt;
use icebreakrr::models::{DiscoverySettings, Gender, GeoPoint, Profile, UserId};
use icebreakrr::routes::create_router;
use icebreakrr::services::RecordingTransport;
use icebreakrr::AppState;
use std::sync::Arc;

/// Check if emulator is available via environment variable.
#[allow(dead_code)]
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Create a test database connection.
#[allow(dead_code)]
pub async fn test_db() -> FirestoreDb {
    FirestoreDb::new("test-project")
        .await
        .expect("Failed to connect to Firestore emulator")
}

/// Offline app: in-memory store and recording transport.
#[allow(dead_code)]
pub struct TestApp {
    pub router: axum::Router,
    pub state: Arc<AppState>,
    pub store: MemoryProfileStore,
    pub transport: RecordingTransport,
}

#[allow(dead_code)]
impl TestApp {
    pub fn new() -> Self {
        Self::with_config(Config::test_default())
    }

    pub fn with_config(config: Config) -> Self {
        let store = MemoryProfileStore::new();
        let transport = RecordingTransport::new();
        let state = Arc::new(AppState::new(
            config,
            Arc::new(store.clone()),
            Arc::new(transport.clone()),
        ));

        Self {
            router: create_router(state.clone()),
            state,
            store,
            transport,
        }
    }

    pub async fn seed(&self, profiles: impl IntoIterator<Item = Profile>) {
        for profile in profiles {
            self.store.add_new_profile(&profile).await.unwrap();
        }
    }

    pub async fn profile(&self, uid: &str) -> Profile {
        self.store
            .get_profile_by_uid(&UserId::from(uid))
            .await
            .unwrap()
            .unwrap_or_else(|| panic!("profile {} missing", uid))
    }

    /// Bearer header value for `uid`.
    pub fn bearer(&self, uid: &str) -> String {
        let token = create_jwt(&UserId::from(uid), &self.state.config.jwt_signing_key).unwrap();
        format!("Bearer {}", token)
    }
}

/// Discoverable profile with a device token, located at (`lat`, `lon`).
#[allow(dead_code)]
pub fn test_profile(uid: &str, name: &str, lat: f64, lon: f64, tags: &[&str]) -> Profile {
    let mut profile = Profile::new(
        uid,
        name,
        Gender::Other,
        NaiveDate::from_ymd_opt(1995, 3, 14).unwrap(),
    );
    profile.set_discovery(DiscoverySettings {
        is_discoverable: true,
        ..Default::default()
    });
    let mut profile = profile.with_location(GeoPoint::new(lat, lon)).unwrap();
    profile.tags = tags.iter().map(|t| t.to_string()).collect();
    profile.fcm_token = Some(token_of(uid));
    profile
}

/// Device token given to `uid` by [`test_profile`].
#[allow(dead_code)]
pub fn token_of(uid: &str) -> String {
    format!("token-{}", uid)
}
