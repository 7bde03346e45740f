// SPDX-License-Identifier: MIT
// Copyright 2026 The IceBreakrr developers

//! Inbound push relay.
//!
//! Devices forward the data payload of every push they receive here, so the
//! backend can reconcile it with the stored meeting state. Malformed pushes
//! are dropped; the endpoint answers 202 either way.

use crate::error::Result;
use crate::middleware::auth::AuthUser;
use crate::models::PushEnvelope;
use crate::services::RemoteOutcome;
use crate::AppState;
use axum::extract::rejection::JsonRejection;
use axum::{extract::State, http::StatusCode, routing::post, Extension, Json, Router};
use serde::Serialize;
use std::sync::Arc;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/push/inbound", post(inbound_push))
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum InboundPushResponse {
    Handled(RemoteOutcome),
    Dropped { status: &'static str },
}

async fn inbound_push(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    body: std::result::Result<Json<PushEnvelope>, JsonRejection>,
) -> Result<(StatusCode, Json<InboundPushResponse>)> {
    let envelope = match body {
        Ok(Json(envelope)) => envelope,
        Err(rejection) => {
            tracing::warn!(uid = %user.uid, error = %rejection, "Dropping unreadable inbound push");
            return Ok(dropped());
        }
    };
    let Ok(push) = state.push.parse_inbound(&envelope) else {
        return Ok(dropped());
    };

    let outcome = state.meetings.apply_remote(&user.uid, &push).await?;
    Ok((StatusCode::ACCEPTED, Json(InboundPushResponse::Handled(outcome))))
}

fn dropped() -> (StatusCode, Json<InboundPushResponse>) {
    (
        StatusCode::ACCEPTED,
        Json(InboundPushResponse::Dropped { status: "dropped" }),
    )
}
