// SPDX-License-Identifier: MIT
// Copyright 2026 The IceBreakrr developers

//! API routes for authenticated users: own profile, other profiles,
//! discovery settings and background monitoring.

use crate::error::Result;
use crate::middleware::auth::AuthUser;
use crate::models::{DiscoverySettings, Gender, GeoPoint, Profile, ReportKind, UserId};
use crate::services::ProfileUpdate;
use crate::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post, put},
    Extension, Json, Router,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// API routes (require authentication via JWT).
/// The auth middleware is applied in routes/mod.rs for these routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/api/me",
            get(get_me).post(create_me).patch(update_me),
        )
        .route("/api/me/location", put(update_location))
        .route("/api/me/fcm-token", put(update_fcm_token))
        .route("/api/account", delete(delete_account))
        .route("/api/profiles/nearby", get(get_nearby))
        .route("/api/profiles/{uid}/block", post(block_profile))
        .route("/api/profiles/{uid}/report", post(report_profile))
        .route("/api/settings", get(get_settings).put(put_settings))
        .route("/api/engagement/start", post(start_engagement))
        .route("/api/engagement/stop", post(stop_engagement))
}

// ─── Own Profile ─────────────────────────────────────────────

/// Get current user profile.
async fn get_me(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Profile>> {
    Ok(Json(state.profiles.get(&user.uid).await?))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateProfileRequest {
    name: String,
    gender: Gender,
    birth_date: NaiveDate,
}

/// Create the profile on first sign-in.
async fn create_me(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(body): Json<CreateProfileRequest>,
) -> Result<(StatusCode, Json<Profile>)> {
    let profile = state
        .profiles
        .create_profile(&user.uid, &body.name, body.gender, body.birth_date)
        .await?;
    Ok((StatusCode::CREATED, Json(profile)))
}

#[derive(Deserialize)]
struct UpdateProfileRequest {
    name: Option<String>,
    description: Option<String>,
    tags: Option<Vec<String>>,
}

async fn update_me(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(body): Json<UpdateProfileRequest>,
) -> Result<Json<Profile>> {
    let update = ProfileUpdate {
        name: body.name,
        description: body.description,
        tags: body.tags,
    };
    Ok(Json(state.profiles.update_details(&user.uid, update).await?))
}

/// `null` clears the stored location.
async fn update_location(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(location): Json<Option<GeoPoint>>,
) -> Result<Json<Profile>> {
    Ok(Json(
        state.profiles.update_location(&user.uid, location).await?,
    ))
}

#[derive(Deserialize)]
struct FcmTokenRequest {
    token: Option<String>,
}

async fn update_fcm_token(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(body): Json<FcmTokenRequest>,
) -> Result<StatusCode> {
    state.profiles.update_fcm_token(&user.uid, body.token).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ─── Account Deletion ────────────────────────────────────────

/// Response for account deletion.
#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct DeleteAccountResponse {
    pub success: bool,
    /// Other profiles that referenced this account and were cleaned up
    pub purged: usize,
}

/// Delete the account and every reference other profiles hold to it.
async fn delete_account(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<DeleteAccountResponse>> {
    tracing::info!(uid = %user.uid, "User-initiated account deletion");

    state.engagement.stop_monitoring(&user.uid).await;
    state.watchdog.stop(&user.uid).await;
    state.engagement.forget(&user.uid);

    let purged = state.profiles.delete_account(&user.uid).await?;

    Ok(Json(DeleteAccountResponse {
        success: true,
        purged,
    }))
}

// ─── Other Profiles ──────────────────────────────────────────

/// What other users see of a nearby profile.
#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "camelCase")]
pub struct NearbyProfileResponse {
    #[cfg_attr(feature = "binding-generation", ts(type = "string"))]
    pub uid: UserId,
    pub name: String,
    #[cfg_attr(feature = "binding-generation", ts(type = "string"))]
    pub gender: Gender,
    pub age: u32,
    pub description: String,
    pub tags: Vec<String>,
    pub common_tags: Vec<String>,
    pub distance_m: f64,
}

async fn get_nearby(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Vec<NearbyProfileResponse>>> {
    let me = state.profiles.get(&user.uid).await?;
    let today = chrono::Utc::now().date_naive();

    let hits = state.profiles.nearby(&user.uid).await?;
    let response = hits
        .into_iter()
        .map(|hit| NearbyProfileResponse {
            common_tags: me.common_tags(&hit.profile),
            age: hit.profile.age_on(today),
            uid: hit.profile.uid,
            name: hit.profile.name,
            gender: hit.profile.gender,
            description: hit.profile.description,
            tags: hit.profile.tags,
            distance_m: hit.distance_m,
        })
        .collect();

    Ok(Json(response))
}

#[derive(Serialize)]
struct BlockResponse {
    /// False when the target was already blocked
    blocked: bool,
}

async fn block_profile(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(target): Path<String>,
) -> Result<Json<BlockResponse>> {
    let blocked = state.profiles.block(&user.uid, &UserId::new(target)).await?;
    Ok(Json(BlockResponse { blocked }))
}

#[derive(Deserialize)]
struct ReportRequest {
    kind: ReportKind,
}

#[derive(Serialize)]
struct ReportResponse {
    /// False when this user was already reported (the first report stands)
    recorded: bool,
}

async fn report_profile(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(target): Path<String>,
    Json(body): Json<ReportRequest>,
) -> Result<Json<ReportResponse>> {
    let recorded = state
        .profiles
        .report(&user.uid, &UserId::new(target), body.kind)
        .await?;
    Ok(Json(ReportResponse { recorded }))
}

// ─── Discovery Settings ──────────────────────────────────────

async fn get_settings(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<DiscoverySettings>> {
    Ok(Json(state.settings.get(&user.uid).await?))
}

/// Replace discovery settings. Turning discoverability off also clears the
/// stored location.
async fn put_settings(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(settings): Json<DiscoverySettings>,
) -> Result<Json<DiscoverySettings>> {
    if !(settings.selected_radius_m.is_finite() && settings.selected_radius_m > 0.0) {
        return Err(crate::error::AppError::BadRequest(
            "selectedRadiusM must be positive".to_string(),
        ));
    }
    if settings.age_range.min > settings.age_range.max {
        return Err(crate::error::AppError::BadRequest(
            "ageRange.min must not exceed ageRange.max".to_string(),
        ));
    }

    let profile = state.settings.update(&user.uid, settings).await?;
    Ok(Json(profile.discovery().clone()))
}

// ─── Background Monitoring ───────────────────────────────────

#[derive(Serialize)]
struct MonitoringResponse {
    monitoring: bool,
}

/// Start engagement pings and the confirmed meeting watchdog.
async fn start_engagement(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<MonitoringResponse>> {
    // Fail early for users without a profile
    state.profiles.get(&user.uid).await?;

    state.engagement.start_monitoring(&user.uid).await?;
    state.watchdog.start(&user.uid).await;

    Ok(Json(MonitoringResponse { monitoring: true }))
}

async fn stop_engagement(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Json<MonitoringResponse> {
    state.engagement.stop_monitoring(&user.uid).await;
    state.watchdog.stop(&user.uid).await;
    Json(MonitoringResponse { monitoring: false })
}
