// SPDX-License-Identifier: MIT
// Copyright 2026 The IceBreakrr developers

//! JWT authentication middleware.

use crate::models::UserId;
use crate::AppState;
use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Session cookie name.
pub const SESSION_COOKIE: &str = "icebreakrr_token";

/// Session token claims; `sub` is the profile uid, times are Unix seconds.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
    pub iat: usize,
}

/// The signed-in user.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub uid: UserId,
}

/// How long a session token stays valid.
const SESSION_TTL_DAYS: i64 = 30;

/// The session token, from the cookie or else an `Authorization: Bearer` header.
fn session_token(jar: &CookieJar, headers: &HeaderMap) -> Option<String> {
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        return Some(cookie.value().to_string());
    }
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::to_string)
}

/// Reject the request unless it carries a valid session token; the uid
/// is handed to handlers as an [`AuthUser`] extension.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let token = session_token(&jar, request.headers()).ok_or(StatusCode::UNAUTHORIZED)?;

    let claims = decode::<Claims>(
        &token,
        &DecodingKey::from_secret(&state.config.jwt_signing_key),
        &Validation::new(Algorithm::HS256),
    )
    .map_err(|_| StatusCode::UNAUTHORIZED)?
    .claims;

    let uid = claims.sub.trim();
    if uid.is_empty() {
        return Err(StatusCode::UNAUTHORIZED);
    }

    request.extensions_mut().insert(AuthUser {
        uid: UserId::new(uid),
    });
    Ok(next.run(request).await)
}

/// Sign a session token for `uid`.
pub fn create_jwt(uid: &UserId, signing_key: &[u8]) -> anyhow::Result<String> {
    let now = Utc::now();
    let claims = Claims {
        sub: uid.to_string(),
        iat: now.timestamp() as usize,
        exp: (now + Duration::days(SESSION_TTL_DAYS)).timestamp() as usize,
    };

    Ok(encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(signing_key),
    )?)
}
