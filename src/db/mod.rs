// SPDX-License-Identifier: MIT
// Copyright 2026 The IceBreakrr developers

//! Profile storage layer.
//!
//! [`ProfileStore`] is the seam between the meeting/engagement logic and
//! the document store. [`FirestoreDb`] is the production implementation;
//! [`MemoryProfileStore`] backs offline mode and tests.

pub mod firestore;
pub mod memory;

pub use firestore::FirestoreDb;
pub use memory::MemoryProfileStore;

use crate::error::Result;
use crate::models::{AgeRange, DiscoverySettings, Gender, GeoPoint, Profile, UserId};
use async_trait::async_trait;
use chrono::NaiveDate;

/// Collection names as constants.
pub mod collections {
    pub const PROFILES: &str = "profiles";
}

/// Document store operations on profiles.
///
/// Every method reports store failures as `AppError::Database`; nothing
/// is written when a write returns an error.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn get_profile_by_uid(&self, uid: &UserId) -> Result<Option<Profile>>;

    /// Fetch several profiles; missing ones are omitted.
    async fn get_multiple_profiles(&self, uids: &[UserId]) -> Result<Vec<Profile>>;

    /// Profiles within `radius_m` of `center` that pass `filter`, nearest
    /// first.
    async fn get_filtered_profiles_in_radius(
        &self,
        center: GeoPoint,
        radius_m: f64,
        filter: &ProfileFilter,
    ) -> Result<Vec<NearbyProfile>>;

    /// Create a profile; fails if the uid already exists.
    async fn add_new_profile(&self, profile: &Profile) -> Result<()>;

    async fn update_profile(&self, profile: &Profile) -> Result<()>;

    /// Write several profiles atomically.
    async fn update_profiles(&self, profiles: &[Profile]) -> Result<()>;

    async fn delete_profile_by_uid(&self, uid: &UserId) -> Result<()>;

    /// Profiles that block `uid` or list it among their sent or
    /// pending-location requests. Inbox entries are not searched.
    async fn profiles_referencing(&self, uid: &UserId) -> Result<Vec<Profile>>;
}

/// Candidate filter for radius queries.
#[derive(Debug, Clone, Default)]
pub struct ProfileFilter {
    /// Empty means any gender
    pub genders: Vec<Gender>,
    pub age_range: Option<AgeRange>,
    /// Candidates must have at least one of these (empty means any)
    pub tags: Vec<String>,
    /// Never returned (typically the searching profile)
    pub exclude: Option<UserId>,
}

impl ProfileFilter {
    pub fn from_settings(settings: &DiscoverySettings, exclude: &UserId) -> Self {
        Self {
            genders: settings.selected_genders.clone(),
            age_range: Some(settings.age_range),
            tags: settings.filtered_tags.clone(),
            exclude: Some(exclude.clone()),
        }
    }

    /// Attribute checks (everything except distance).
    pub fn matches(&self, profile: &Profile, today: NaiveDate) -> bool {
        if self.exclude.as_ref() == Some(&profile.uid) {
            return false;
        }
        if !self.genders.is_empty() && !self.genders.contains(&profile.gender) {
            return false;
        }
        if let Some(range) = self.age_range {
            if !range.contains(profile.age_on(today)) {
                return false;
            }
        }
        self.tags.is_empty() || self.tags.iter().any(|t| profile.tags.contains(t))
    }
}

/// A radius query hit.
#[derive(Debug, Clone, PartialEq)]
pub struct NearbyProfile {
    pub profile: Profile,
    pub distance_m: f64,
}

/// Keep discoverable, located profiles within range that pass the filter,
/// nearest first.
pub(crate) fn select_nearby(
    profiles: impl IntoIterator<Item = Profile>,
    center: GeoPoint,
    radius_m: f64,
    filter: &ProfileFilter,
    today: NaiveDate,
) -> Vec<NearbyProfile> {
    let mut hits: Vec<NearbyProfile> = profiles
        .into_iter()
        .filter(|p| p.is_discoverable() && filter.matches(p, today))
        .filter_map(|profile| {
            let distance_m = profile.location()?.distance_m(&center);
            (distance_m <= radius_m).then_some(NearbyProfile {
                profile,
                distance_m,
            })
        })
        .collect();

    hits.sort_by(|a, b| a.distance_m.total_cmp(&b.distance_m));
    hits
}
