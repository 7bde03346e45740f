// SPDX-License-Identifier: MIT
// Copyright 2026 The IceBreakrr developers

//! Firestore client wrapper implementing [`ProfileStore`].
//!
//! Radius queries are answered with geohash prefix ranges (the center cell
//! and its neighbors at a precision covering the radius), followed by an
//! exact haversine filter on the returned documents.

use crate::db::{collections, select_nearby, NearbyProfile, ProfileFilter, ProfileStore};
use crate::error::{AppError, Result};
use crate::geohash;
use crate::models::{GeoPoint, Profile, UserId};
use async_trait::async_trait;
use futures_util::{stream, StreamExt};
use std::collections::BTreeMap;

const MAX_CONCURRENT_DB_OPS: usize = 50;

/// Fields holding uid arrays that can be searched with `array_contains`.
/// Inbox and chosen-location maps are keyed by uid and cannot be queried;
/// account deletion reaches those profiles through the deleted user's own
/// meeting bookkeeping instead.
const UID_ARRAY_FIELDS: [&str; 3] = [
    "hasBlocked",
    "meetingRequestSent",
    "meetingRequestPendingLocation",
];

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    client: Option<firestore::FirestoreDb>,
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self> {
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            AppError::Database(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a disconnected client (offline mode).
    ///
    /// All database operations will return an error if called.
    pub fn new_mock() -> Self {
        Self { client: None }
    }

    /// Helper to get the client or return an error if offline.
    fn get_client(&self) -> Result<&firestore::FirestoreDb> {
        self.client
            .as_ref()
            .ok_or_else(|| AppError::Database("Database not connected (offline mode)".to_string()))
    }

    /// Profiles whose geohash starts with `prefix`.
    async fn profiles_with_geohash_prefix(&self, prefix: String) -> Result<Vec<Profile>> {
        let query = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::PROFILES);

        // An empty prefix means the radius spans the globe
        let query = if prefix.is_empty() {
            query.filter(|q| q.field("geohash").is_not_null())
        } else {
            let end = format!("{}~", prefix);
            query.filter(move |q| {
                q.for_all([
                    q.field("geohash").greater_than_or_equal(prefix.clone()),
                    q.field("geohash").less_than(end.clone()),
                ])
            })
        };

        query
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Profiles whose uid-array `field` contains `uid`.
    async fn profiles_with_array_member(
        &self,
        field: &'static str,
        uid: &UserId,
    ) -> Result<Vec<Profile>> {
        let uid = uid.to_string();
        self.get_client()?
            .fluent()
            .select()
            .from(collections::PROFILES)
            .filter(move |q| q.field(field).array_contains(uid.clone()))
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}

#[async_trait]
impl ProfileStore for FirestoreDb {
    async fn get_profile_by_uid(&self, uid: &UserId) -> Result<Option<Profile>> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::PROFILES)
            .obj()
            .one(uid.as_str())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn get_multiple_profiles(&self, uids: &[UserId]) -> Result<Vec<Profile>> {
        let results = stream::iter(uids.to_vec())
            .map(|uid| async move { self.get_profile_by_uid(&uid).await })
            .buffered(MAX_CONCURRENT_DB_OPS)
            .collect::<Vec<Result<Option<Profile>>>>()
            .await;

        let mut profiles = Vec::with_capacity(results.len());
        for result in results {
            if let Some(profile) = result? {
                profiles.push(profile);
            }
        }
        Ok(profiles)
    }

    async fn get_filtered_profiles_in_radius(
        &self,
        center: GeoPoint,
        radius_m: f64,
        filter: &ProfileFilter,
    ) -> Result<Vec<NearbyProfile>> {
        let precision = geohash::precision_for_radius(radius_m, center.latitude);
        let center_cell = geohash::encode(center.latitude, center.longitude, precision)
            .map_err(|e| AppError::BadRequest(e.to_string()))?;
        let mut cells = geohash::neighbors(&center_cell)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Geohash error: {}", e)))?;
        cells.push(center_cell);

        let batches = stream::iter(cells)
            .map(|cell| self.profiles_with_geohash_prefix(cell))
            .buffer_unordered(MAX_CONCURRENT_DB_OPS)
            .collect::<Vec<Result<Vec<Profile>>>>()
            .await;

        // Cells don't overlap, but dedupe anyway in case a write moved a
        // profile between two reads
        let mut by_uid = BTreeMap::new();
        for batch in batches {
            for profile in batch? {
                by_uid.insert(profile.uid.clone(), profile);
            }
        }

        let today = chrono::Utc::now().date_naive();
        let hits = select_nearby(by_uid.into_values(), center, radius_m, filter, today);

        tracing::debug!(
            precision,
            radius_m,
            hits = hits.len(),
            "Radius query complete"
        );

        Ok(hits)
    }

    async fn add_new_profile(&self, profile: &Profile) -> Result<()> {
        let _: () = self
            .get_client()?
            .fluent()
            .insert()
            .into(collections::PROFILES)
            .document_id(profile.uid.as_str())
            .object(profile)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    async fn update_profile(&self, profile: &Profile) -> Result<()> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::PROFILES)
            .document_id(profile.uid.as_str())
            .object(profile)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Write several profiles in one Firestore transaction.
    async fn update_profiles(&self, profiles: &[Profile]) -> Result<()> {
        let client = self.get_client()?;

        let mut transaction = client
            .begin_transaction()
            .await
            .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

        for profile in profiles {
            client
                .fluent()
                .update()
                .in_col(collections::PROFILES)
                .document_id(profile.uid.as_str())
                .object(profile)
                .add_to_transaction(&mut transaction)
                .map_err(|e| {
                    AppError::Database(format!(
                        "Failed to add profile {} to transaction: {}",
                        profile.uid, e
                    ))
                })?;
        }

        transaction
            .commit()
            .await
            .map_err(|e| AppError::Database(format!("Transaction commit failed: {}", e)))?;

        tracing::debug!(count = profiles.len(), "Profiles written atomically");
        Ok(())
    }

    async fn delete_profile_by_uid(&self, uid: &UserId) -> Result<()> {
        self.get_client()?
            .fluent()
            .delete()
            .from(collections::PROFILES)
            .document_id(uid.as_str())
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    async fn profiles_referencing(&self, uid: &UserId) -> Result<Vec<Profile>> {
        let mut by_uid = BTreeMap::new();
        for field in UID_ARRAY_FIELDS {
            for profile in self.profiles_with_array_member(field, uid).await? {
                by_uid.insert(profile.uid.clone(), profile);
            }
        }
        by_uid.remove(uid);
        Ok(by_uid.into_values().collect())
    }
}
