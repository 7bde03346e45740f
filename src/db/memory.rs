// SPDX-License-Identifier: MIT
// Copyright 2026 The IceBreakrr developers

//! In-memory profile store (offline mode and tests).

use crate::db::{select_nearby, NearbyProfile, ProfileFilter, ProfileStore};
use crate::error::{AppError, Result};
use crate::models::{GeoPoint, Profile, UserId};
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// DashMap-backed [`ProfileStore`].
///
/// Clones share the same data. Writes can be made to fail on demand to
/// exercise store-failure paths.
#[derive(Clone, Default)]
pub struct MemoryProfileStore {
    profiles: Arc<DashMap<UserId, Profile>>,
    /// Serializes multi-document writes so they land together.
    write_lock: Arc<Mutex<()>>,
    fail_writes: Arc<AtomicBool>,
    radius_queries: Arc<AtomicUsize>,
}

impl MemoryProfileStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent write fail with `AppError::Database`.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of radius queries served so far.
    pub fn radius_query_count(&self) -> usize {
        self.radius_queries.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    fn check_writable(&self) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(AppError::Database(
                "Write rejected (injected failure)".to_string(),
            ));
        }
        Ok(())
    }

    fn write_guard(&self) -> std::sync::MutexGuard<'_, ()> {
        self.write_lock.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl ProfileStore for MemoryProfileStore {
    async fn get_profile_by_uid(&self, uid: &UserId) -> Result<Option<Profile>> {
        Ok(self.profiles.get(uid).map(|p| p.clone()))
    }

    async fn get_multiple_profiles(&self, uids: &[UserId]) -> Result<Vec<Profile>> {
        Ok(uids
            .iter()
            .filter_map(|uid| self.profiles.get(uid).map(|p| p.clone()))
            .collect())
    }

    async fn get_filtered_profiles_in_radius(
        &self,
        center: GeoPoint,
        radius_m: f64,
        filter: &ProfileFilter,
    ) -> Result<Vec<NearbyProfile>> {
        self.radius_queries.fetch_add(1, Ordering::SeqCst);
        let snapshot: Vec<Profile> = self.profiles.iter().map(|e| e.value().clone()).collect();
        let today = chrono::Utc::now().date_naive();
        Ok(select_nearby(snapshot, center, radius_m, filter, today))
    }

    async fn add_new_profile(&self, profile: &Profile) -> Result<()> {
        self.check_writable()?;
        let _guard = self.write_guard();
        if self.profiles.contains_key(&profile.uid) {
            return Err(AppError::Database(format!(
                "Profile {} already exists",
                profile.uid
            )));
        }
        self.profiles.insert(profile.uid.clone(), profile.clone());
        Ok(())
    }

    async fn update_profile(&self, profile: &Profile) -> Result<()> {
        self.update_profiles(std::slice::from_ref(profile)).await
    }

    async fn update_profiles(&self, profiles: &[Profile]) -> Result<()> {
        self.check_writable()?;
        let _guard = self.write_guard();
        for profile in profiles {
            self.profiles.insert(profile.uid.clone(), profile.clone());
        }
        Ok(())
    }

    async fn delete_profile_by_uid(&self, uid: &UserId) -> Result<()> {
        self.check_writable()?;
        let _guard = self.write_guard();
        self.profiles.remove(uid);
        Ok(())
    }

    async fn profiles_referencing(&self, uid: &UserId) -> Result<Vec<Profile>> {
        Ok(self
            .profiles
            .iter()
            .filter(|e| e.key() != uid && (e.has_blocked(uid) || e.has_meeting_with(uid)))
            .map(|e| e.value().clone())
            .collect())
    }
}
