// SPDX-License-Identifier: MIT
// Copyright 2026 The IceBreakrr developers

//! Push notification dispatch.
//!
//! Handles:
//! - Delivery of typed pushes through a [`PushTransport`] (FCM in production)
//! - Skipping recipients without a registered device token
//! - Parsing inbound envelopes, dropping unknown or malformed ones

use crate::error::{AppError, Result};
use crate::models::{Profile, PushEnvelope, PushError, TypedPush};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Delivers an envelope to a device token.
#[async_trait]
pub trait PushTransport: Send + Sync {
    async fn send(&self, token: &str, envelope: &PushEnvelope) -> Result<()>;
}

// ─────────────────────────────────────────────────────────────────────────────
// FCM HTTP v1
// ─────────────────────────────────────────────────────────────────────────────

/// OAuth scope for the FCM HTTP v1 API.
const FCM_SCOPE: &str = "https://www.googleapis.com/auth/firebase.messaging";

/// Where the bearer token on each FCM request comes from.
#[derive(Clone)]
enum FcmAuth {
    /// Fixed token, never refreshed
    Static(String),
    /// Google credentials; tokens are cached and refreshed before expiry
    Google(Arc<gcloud_sdk::GoogleAuthTokenGenerator>),
}

/// Firebase Cloud Messaging client (HTTP v1 API, data-only messages).
#[derive(Clone)]
pub struct FcmClient {
    http: reqwest::Client,
    base_url: String,
    project_id: String,
    auth: FcmAuth,
}

impl FcmClient {
    fn with_auth(project_id: &str, auth: FcmAuth) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: "https://fcm.googleapis.com/v1".to_string(),
            project_id: project_id.to_string(),
            auth,
        }
    }

    /// Client using a fixed access token (short-lived; for local runs).
    pub fn with_static_token(project_id: &str, access_token: String) -> Self {
        Self::with_auth(project_id, FcmAuth::Static(access_token))
    }

    /// Client minting tokens from `source`.
    pub async fn with_token_source(
        project_id: &str,
        source: gcloud_sdk::TokenSourceType,
    ) -> Result<Self> {
        let generator =
            gcloud_sdk::GoogleAuthTokenGenerator::new(source, vec![FCM_SCOPE.to_string()])
                .await
                .map_err(|e| AppError::Push(format!("No FCM credentials: {}", e)))?;
        Ok(Self::with_auth(project_id, FcmAuth::Google(Arc::new(generator))))
    }

    /// Client using Application Default Credentials
    /// (`GOOGLE_APPLICATION_CREDENTIALS`, gcloud config or the metadata
    /// server).
    pub async fn with_default_credentials(project_id: &str) -> Result<Self> {
        Self::with_token_source(project_id, gcloud_sdk::TokenSourceType::Default).await
    }

    /// Point the client at another endpoint (emulators, tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// `Authorization` header value for the next request.
    async fn authorization(&self) -> Result<String> {
        match &self.auth {
            FcmAuth::Static(token) => Ok(format!("Bearer {}", token)),
            FcmAuth::Google(generator) => generator
                .create_token()
                .await
                .map(|token| token.header_value())
                .map_err(|e| AppError::Push(format!("FCM token refresh failed: {}", e))),
        }
    }
}

#[async_trait]
impl PushTransport for FcmClient {
    async fn send(&self, token: &str, envelope: &PushEnvelope) -> Result<()> {
        let url = format!(
            "{}/projects/{}/messages:send",
            self.base_url, self.project_id
        );
        let authorization = self.authorization().await?;

        let body = serde_json::json!({
            "message": {
                "token": token,
                "data": envelope,
            }
        });

        let response = self
            .http
            .post(&url)
            .header(reqwest::header::AUTHORIZATION, authorization)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::Push(e.to_string()))?;

        if response.status().is_success() {
            return Ok(());
        }

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        // Stale registration token - the device uninstalled or rotated it
        if status.as_u16() == 404 {
            tracing::warn!("FCM token unregistered");
            return Err(AppError::Push("Device token unregistered".to_string()));
        }

        Err(AppError::Push(format!("HTTP {}: {}", status, body)))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Recording transport (offline mode, tests)
// ─────────────────────────────────────────────────────────────────────────────

/// Transport that records envelopes instead of delivering them.
#[derive(Clone, Default)]
pub struct RecordingTransport {
    sent: Arc<Mutex<Vec<(String, PushEnvelope)>>>,
    fail: Arc<AtomicBool>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent sends fail with `AppError::Push`.
    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// All (token, envelope) pairs sent so far.
    pub fn sent(&self) -> Vec<(String, PushEnvelope)> {
        self.lock().clone()
    }

    /// Envelopes sent to `token`.
    pub fn sent_to(&self, token: &str) -> Vec<PushEnvelope> {
        self.lock()
            .iter()
            .filter(|(t, _)| t == token)
            .map(|(_, e)| e.clone())
            .collect()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<(String, PushEnvelope)>> {
        self.sent.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl PushTransport for RecordingTransport {
    async fn send(&self, token: &str, envelope: &PushEnvelope) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(AppError::Push("Send rejected (injected failure)".to_string()));
        }
        tracing::debug!(title = %envelope.title, "Recorded push");
        self.lock().push((token.to_string(), envelope.clone()));
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Dispatcher
// ─────────────────────────────────────────────────────────────────────────────

/// What happened to an outbound push.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    Sent,
    /// Recipient has no device token
    SkippedNoToken,
}

/// Sends typed pushes to profiles and interprets inbound envelopes.
#[derive(Clone)]
pub struct PushDispatcher {
    transport: Arc<dyn PushTransport>,
}

impl PushDispatcher {
    pub fn new(transport: Arc<dyn PushTransport>) -> Self {
        Self { transport }
    }

    /// Send `push` to `recipient`'s device.
    pub async fn dispatch(&self, recipient: &Profile, push: &TypedPush) -> Result<DispatchOutcome> {
        let Some(token) = recipient.fcm_token.as_deref().filter(|t| !t.is_empty()) else {
            tracing::debug!(
                recipient = %recipient.uid,
                "No device token, skipping push"
            );
            return Ok(DispatchOutcome::SkippedNoToken);
        };

        self.transport.send(token, &push.to_envelope()).await?;

        tracing::debug!(
            recipient = %recipient.uid,
            sender = %push.sender_uid,
            "Push sent"
        );
        Ok(DispatchOutcome::Sent)
    }

    /// Best-effort variant of [`PushDispatcher::dispatch`]: failures are
    /// logged and reported as `None`.
    pub async fn notify(&self, recipient: &Profile, push: &TypedPush) -> Option<DispatchOutcome> {
        match self.dispatch(recipient, push).await {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                tracing::warn!(
                    recipient = %recipient.uid,
                    sender = %push.sender_uid,
                    error = %e,
                    "Push delivery failed"
                );
                None
            }
        }
    }

    /// Interpret an inbound envelope. Failures are logged here; callers
    /// just drop the message.
    pub fn parse_inbound(&self, envelope: &PushEnvelope) -> std::result::Result<TypedPush, PushError> {
        TypedPush::try_from(envelope).inspect_err(|e| {
            tracing::warn!(
                title = %envelope.title,
                sender = %envelope.sender_uid,
                error = %e,
                "Dropping inbound push"
            );
        })
    }
}
