// SPDX-License-Identifier: MIT
// Copyright 2026 The IceBreakrr developers

//! Profile lifecycle: creation, location, blocking, reports and deletion.

use crate::db::{NearbyProfile, ProfileFilter, ProfileStore};
use crate::error::{AppError, Result};
use crate::models::{
    CancellationReason, Gender, GeoPoint, Profile, PushMessage, ReportKind, TypedPush, UserId,
};
use crate::services::meeting::MeetingRequestService;
use crate::services::push::PushDispatcher;
use crate::services::settings::SettingsStore;
use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// Firestore caps a transaction at 500 writes.
const MAX_PROFILES_PER_BATCH: usize = 500;

/// Editable profile details. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub tags: Option<Vec<String>>,
}

#[derive(Clone)]
pub struct ProfileService {
    store: Arc<dyn ProfileStore>,
    meetings: MeetingRequestService,
    push: PushDispatcher,
    settings: SettingsStore,
}

impl ProfileService {
    pub fn new(
        store: Arc<dyn ProfileStore>,
        meetings: MeetingRequestService,
        push: PushDispatcher,
        settings: SettingsStore,
    ) -> Self {
        Self {
            store,
            meetings,
            push,
            settings,
        }
    }

    pub async fn get(&self, uid: &UserId) -> Result<Profile> {
        self.store
            .get_profile_by_uid(uid)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Profile {}", uid)))
    }

    /// Create the profile on first sign-in, with empty social state.
    pub async fn create_profile(
        &self,
        uid: &UserId,
        name: &str,
        gender: Gender,
        birth_date: NaiveDate,
    ) -> Result<Profile> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AppError::BadRequest("Name must not be empty".to_string()));
        }
        if self.store.get_profile_by_uid(uid).await?.is_some() {
            return Err(AppError::BadRequest(format!("Profile {} already exists", uid)));
        }

        let mut profile = Profile::new(uid.clone(), name, gender, birth_date);
        profile.created_at = chrono::Utc::now().to_rfc3339();
        self.store.add_new_profile(&profile).await?;

        tracing::info!(uid = %uid, "Profile created");
        Ok(profile)
    }

    pub async fn update_details(&self, uid: &UserId, update: ProfileUpdate) -> Result<Profile> {
        let mut profile = self.get(uid).await?;

        if let Some(name) = update.name {
            let name = name.trim();
            if name.is_empty() {
                return Err(AppError::BadRequest("Name must not be empty".to_string()));
            }
            profile.name = name.to_string();
        }
        if let Some(description) = update.description {
            profile.description = description.trim().to_string();
        }
        if let Some(tags) = update.tags {
            profile.tags = normalize_tags(tags);
        }

        self.store.update_profile(&profile).await?;
        Ok(profile)
    }

    /// Store the current location (and its geohash). Cleared instead while
    /// `uid` is not discoverable.
    pub async fn update_location(&self, uid: &UserId, location: Option<GeoPoint>) -> Result<Profile> {
        let mut profile = self.get(uid).await?;
        let location = location.filter(|_| profile.is_discoverable());
        profile
            .set_location(location)
            .map_err(|e| AppError::BadRequest(e.to_string()))?;
        self.store.update_profile(&profile).await?;

        tracing::debug!(uid = %uid, located = location.is_some(), "Location updated");
        Ok(profile)
    }

    /// Register (or clear) the device push token.
    pub async fn update_fcm_token(&self, uid: &UserId, token: Option<String>) -> Result<Profile> {
        let mut profile = self.get(uid).await?;
        profile.fcm_token = token.map(|t| t.trim().to_string()).filter(|t| !t.is_empty());
        self.store.update_profile(&profile).await?;
        Ok(profile)
    }

    /// Block `target`, cancelling any open meeting with them.
    pub async fn block(&self, uid: &UserId, target: &UserId) -> Result<bool> {
        self.meetings.block(uid, target).await
    }

    /// Report `target`. The first report per target is kept.
    pub async fn report(&self, uid: &UserId, target: &UserId, kind: ReportKind) -> Result<bool> {
        if uid == target {
            return Err(AppError::BadRequest("Cannot report yourself".to_string()));
        }
        if self.store.get_profile_by_uid(target).await?.is_none() {
            return Err(AppError::NotFound(format!("Profile {}", target)));
        }

        let mut profile = self.get(uid).await?;
        if !profile.add_report(target.clone(), kind) {
            return Ok(false);
        }
        self.store.update_profile(&profile).await?;

        tracing::info!(uid = %uid, target = %target, ?kind, "User reported");
        Ok(true)
    }

    /// Delete `uid`'s profile after purging it from every profile that
    /// references it. Returns how many other profiles were rewritten.
    ///
    /// The store finds block lists and sent requests; inbox and
    /// chosen-location entries are keyed by sender, so those counterparts
    /// come from `uid`'s own meeting bookkeeping.
    pub async fn delete_account(&self, uid: &UserId) -> Result<usize> {
        let profile = self.get(uid).await?;
        let counterparts: BTreeSet<UserId> = profile.meeting_counterparts();
        let counterpart_uids: Vec<UserId> = counterparts.iter().cloned().collect();

        let mut candidates: BTreeMap<UserId, Profile> = BTreeMap::new();
        for other in self.store.profiles_referencing(uid).await? {
            candidates.insert(other.uid.clone(), other);
        }
        for other in self.store.get_multiple_profiles(&counterpart_uids).await? {
            candidates.entry(other.uid.clone()).or_insert(other);
        }
        candidates.remove(uid);

        // BTreeMap iteration keeps the batches in uid order
        let purged: Vec<Profile> = candidates
            .into_values()
            .filter_map(|mut other| other.purge_user(uid).then_some(other))
            .collect();

        for batch in purged.chunks(MAX_PROFILES_PER_BATCH) {
            self.store.update_profiles(batch).await?;
        }
        self.store.delete_profile_by_uid(uid).await?;
        self.settings.remove(uid);

        tracing::info!(uid = %uid, purged = purged.len(), "Account deleted");

        let push = TypedPush::new(
            uid.clone(),
            profile.name.clone(),
            PushMessage::MeetingCancellation {
                reason: CancellationReason::PeerCancelled,
            },
        );
        for other in purged.iter().filter(|p| counterparts.contains(&p.uid)) {
            self.push.notify(other, &push).await;
        }

        Ok(purged.len())
    }

    /// Profiles around `uid` matching their discovery settings, nearest
    /// first. Empty while `uid` is not discoverable.
    pub async fn nearby(&self, uid: &UserId) -> Result<Vec<NearbyProfile>> {
        let me = self.get(uid).await?;
        let settings = me.discovery().clone();
        if !settings.is_discoverable {
            return Ok(Vec::new());
        }

        let center = me
            .location()
            .ok_or_else(|| AppError::BadRequest("Current location is unavailable".to_string()))?;

        let filter = ProfileFilter::from_settings(&settings, uid);
        let hits = self
            .store
            .get_filtered_profiles_in_radius(center, settings.selected_radius_m, &filter)
            .await?;

        Ok(hits
            .into_iter()
            .filter(|hit| !me.blocked_between(&hit.profile))
            .collect())
    }
}

/// Trim, drop empties and duplicates, keep first-seen order.
fn normalize_tags(tags: Vec<String>) -> Vec<String> {
    let mut seen = BTreeSet::new();
    tags.into_iter()
        .map(|t| t.trim().to_lowercase())
        .filter(|t| !t.is_empty() && seen.insert(t.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_tags() {
        let tags = vec![
            " Music ".to_string(),
            "sports".to_string(),
            "music".to_string(),
            "".to_string(),
        ];
        assert_eq!(normalize_tags(tags), vec!["music", "sports"]);
    }
}
