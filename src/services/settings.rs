// SPDX-License-Identifier: MIT
// Copyright 2026 The IceBreakrr developers

//! Per-user discovery settings with change notification.
//!
//! Settings are stored on the profile document, so they survive restarts;
//! this store keeps a watch channel per user on top of them.

use crate::db::ProfileStore;
use crate::error::{AppError, Result};
use crate::models::{DiscoverySettings, Profile, UserId};
use dashmap::mapref::one::RefMut;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::watch;

/// Observable discovery settings, one watch channel per user.
///
/// Users without a profile get `DiscoverySettings::default()` (not
/// discoverable).
#[derive(Clone)]
pub struct SettingsStore {
    store: Arc<dyn ProfileStore>,
    channels: Arc<DashMap<UserId, watch::Sender<DiscoverySettings>>>,
}

impl SettingsStore {
    pub fn new(store: Arc<dyn ProfileStore>) -> Self {
        Self {
            store,
            channels: Arc::new(DashMap::new()),
        }
    }

    /// Current settings for `uid`.
    pub async fn get(&self, uid: &UserId) -> Result<DiscoverySettings> {
        if let Some(tx) = self.channels.get(uid) {
            return Ok(tx.borrow().clone());
        }
        match self.store.get_profile_by_uid(uid).await? {
            Some(profile) => Ok(self.hydrate(uid, &profile).borrow().clone()),
            None => Ok(DiscoverySettings::default()),
        }
    }

    /// Persist `uid`'s settings and wake subscribers. Hiding clears the
    /// stored location in the same write.
    pub async fn update(&self, uid: &UserId, settings: DiscoverySettings) -> Result<Profile> {
        let mut profile = self
            .store
            .get_profile_by_uid(uid)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Profile {}", uid)))?;
        profile.set_discovery(settings.clone());
        self.store.update_profile(&profile).await?;

        tracing::debug!(
            uid = %uid,
            discoverable = settings.is_discoverable,
            radius_m = settings.selected_radius_m,
            "Discovery settings updated"
        );
        self.hydrate(uid, &profile).send_replace(settings);
        Ok(profile)
    }

    /// Receiver that observes every later update for `uid`.
    pub async fn subscribe(&self, uid: &UserId) -> Result<watch::Receiver<DiscoverySettings>> {
        let current = self.get(uid).await?;
        let rx = self
            .channels
            .entry(uid.clone())
            .or_insert_with(|| watch::channel(current).0)
            .subscribe();
        Ok(rx)
    }

    /// Drop the cached channel (account deletion).
    pub fn remove(&self, uid: &UserId) {
        self.channels.remove(uid);
    }

    /// Channel for `uid`, seeded from `profile` when not cached yet.
    fn hydrate(
        &self,
        uid: &UserId,
        profile: &Profile,
    ) -> RefMut<'_, UserId, watch::Sender<DiscoverySettings>> {
        self.channels
            .entry(uid.clone())
            .or_insert_with(|| watch::channel(profile.discovery().clone()).0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryProfileStore;
    use crate::models::{Gender, GeoPoint};
    use chrono::NaiveDate;

    fn discoverable() -> DiscoverySettings {
        DiscoverySettings {
            is_discoverable: true,
            ..Default::default()
        }
    }

    async fn seeded() -> (MemoryProfileStore, SettingsStore) {
        let store = MemoryProfileStore::new();
        let profile = Profile::new(
            "1",
            "Alice",
            Gender::Female,
            NaiveDate::from_ymd_opt(1990, 1, 1).unwrap(),
        );
        store.add_new_profile(&profile).await.unwrap();
        let settings = SettingsStore::new(Arc::new(store.clone()));
        (store, settings)
    }

    #[tokio::test]
    async fn test_default_is_not_discoverable() {
        let (_, settings) = seeded().await;
        assert!(!settings.get(&"1".into()).await.unwrap().is_discoverable);
        assert!(!settings.get(&"404".into()).await.unwrap().is_discoverable);
    }

    #[tokio::test]
    async fn test_subscribers_see_updates() {
        let (_, settings) = seeded().await;
        let uid = UserId::from("1");
        let mut rx = settings.subscribe(&uid).await.unwrap();

        settings.update(&uid, discoverable()).await.unwrap();

        rx.changed().await.unwrap();
        assert!(rx.borrow().is_discoverable);
        assert!(settings.get(&uid).await.unwrap().is_discoverable);
    }

    #[tokio::test]
    async fn test_settings_survive_a_fresh_cache() {
        let (store, settings) = seeded().await;
        let uid = UserId::from("1");
        settings.update(&uid, discoverable()).await.unwrap();

        let reloaded = SettingsStore::new(Arc::new(store));
        assert!(reloaded.get(&uid).await.unwrap().is_discoverable);
    }

    #[tokio::test]
    async fn test_hiding_clears_stored_location() {
        let (store, settings) = seeded().await;
        let uid = UserId::from("1");
        settings.update(&uid, discoverable()).await.unwrap();
        let mut located = store.get_profile_by_uid(&uid).await.unwrap().unwrap();
        located.set_location(Some(GeoPoint::new(46.0, 6.0))).unwrap();
        store.update_profile(&located).await.unwrap();

        settings.update(&uid, DiscoverySettings::default()).await.unwrap();

        let stored = store.get_profile_by_uid(&uid).await.unwrap().unwrap();
        assert_eq!(stored.location(), None);
        assert_eq!(stored.geohash(), None);
    }

    #[tokio::test]
    async fn test_update_unknown_profile_is_not_found() {
        let (_, settings) = seeded().await;
        let result = settings.update(&"404".into(), discoverable()).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }
}
