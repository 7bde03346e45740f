// SPDX-License-Identifier: MIT
// Copyright 2026 The IceBreakrr developers

//! Meeting request routes. `{peer}` is always the other participant.

use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::{CancelOutcome, CancellationReason, GeoPoint, MeetingState, UserId};
use crate::AppState;
use axum::{
    extract::{Path, State},
    routing::{get, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/meetings/{peer}", get(get_state))
        .route("/api/meetings/{peer}/request", post(send_request))
        .route("/api/meetings/{peer}/accept", post(accept))
        .route("/api/meetings/{peer}/decline", post(decline))
        .route("/api/meetings/{peer}/location", post(choose_location))
        .route("/api/meetings/{peer}/cancel", post(cancel))
}

/// Meeting state with a peer, from the caller's side.
#[derive(Debug, Serialize)]
pub struct MeetingStateResponse {
    pub peer: UserId,
    #[serde(flatten)]
    pub state: MeetingState,
}

async fn get_state(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(peer): Path<String>,
) -> Result<Json<MeetingStateResponse>> {
    let peer = UserId::new(peer);
    let meeting = state.meetings.meeting_state(&user.uid, &peer).await?;
    Ok(Json(MeetingStateResponse {
        peer,
        state: meeting,
    }))
}

#[derive(Deserialize)]
struct SendRequest {
    message: String,
}

async fn send_request(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(peer): Path<String>,
    Json(body): Json<SendRequest>,
) -> Result<Json<MeetingStateResponse>> {
    let peer = UserId::new(peer);
    let profile = state
        .meetings
        .send_request(&user.uid, &peer, &body.message)
        .await?;
    Ok(Json(MeetingStateResponse {
        state: profile.meeting_state_with(&peer),
        peer,
    }))
}

async fn accept(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(peer): Path<String>,
) -> Result<Json<MeetingStateResponse>> {
    let peer = UserId::new(peer);
    let profile = state.meetings.accept(&user.uid, &peer).await?;
    Ok(Json(MeetingStateResponse {
        state: profile.meeting_state_with(&peer),
        peer,
    }))
}

async fn choose_location(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(peer): Path<String>,
    Json(point): Json<GeoPoint>,
) -> Result<Json<MeetingStateResponse>> {
    let peer = UserId::new(peer);
    let profile = state
        .meetings
        .choose_location(&user.uid, &peer, point)
        .await?;
    Ok(Json(MeetingStateResponse {
        state: profile.meeting_state_with(&peer),
        peer,
    }))
}

#[derive(Serialize)]
struct CancelResponse {
    outcome: CancelOutcome,
}

async fn decline(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(peer): Path<String>,
) -> Result<Json<CancelResponse>> {
    let outcome = state
        .meetings
        .decline(&user.uid, &UserId::new(peer))
        .await?;
    Ok(Json(CancelResponse { outcome }))
}

#[derive(Deserialize)]
struct CancelRequest {
    /// Reason token (`TIME`, `DISTANCE`, `CANCELLED`, `CLOSED`, `DECLINED`)
    reason: Option<String>,
}

async fn cancel(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(peer): Path<String>,
    body: Option<Json<CancelRequest>>,
) -> Result<Json<CancelResponse>> {
    let token = body.and_then(|Json(body)| body.reason);
    let reason = match token.as_deref() {
        None => CancellationReason::PeerCancelled,
        Some(token) => CancellationReason::from_token(token).ok_or_else(|| {
            AppError::BadRequest(format!("Unknown cancellation reason: {}", token))
        })?,
    };

    let outcome = state
        .meetings
        .cancel(&user.uid, &UserId::new(peer), reason)
        .await?;
    Ok(Json(CancelResponse { outcome }))
}
