// SPDX-License-Identifier: MIT
// Copyright 2026 The IceBreakrr developers

//! IceBreakrr: proximity-based meeting requests between nearby people.
//!
//! This crate provides the backend for the meeting request state machine,
//! push notification dispatch, engagement notifications and the geohash
//! backed profile store.

pub mod config;
pub mod db;
pub mod error;
pub mod geohash;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;

use config::Config;
use db::ProfileStore;
use services::{
    EngagementManager, MeetingRequestService, MeetingWatchdog, ProfileService, PushDispatcher,
    PushTransport, SettingsStore,
};
use std::sync::Arc;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn ProfileStore>,
    pub push: PushDispatcher,
    pub settings: SettingsStore,
    pub meetings: MeetingRequestService,
    pub profiles: ProfileService,
    pub engagement: EngagementManager,
    pub watchdog: MeetingWatchdog,
}

impl AppState {
    /// Wire every service onto one store and push transport.
    pub fn new(
        config: Config,
        store: Arc<dyn ProfileStore>,
        transport: Arc<dyn PushTransport>,
    ) -> Self {
        let push = PushDispatcher::new(transport);
        let settings = SettingsStore::new(store.clone());

        let meetings =
            MeetingRequestService::new(store.clone(), push.clone(), config.meeting_radius_m);
        let profiles = ProfileService::new(
            store.clone(),
            meetings.clone(),
            push.clone(),
            settings.clone(),
        );
        let engagement = EngagementManager::new(
            store.clone(),
            push.clone(),
            settings.clone(),
            config.engagement_interval,
            config.engagement_cooldown,
        );
        let watchdog = MeetingWatchdog::new(
            store.clone(),
            meetings.clone(),
            config.watchdog_interval,
            config.meeting_expiry,
            config.meeting_max_distance_m,
        );

        Self {
            config,
            store,
            push,
            settings,
            meetings,
            profiles,
            engagement,
            watchdog,
        }
    }

    /// Stop every background loop.
    pub async fn shutdown(&self) {
        self.engagement.stop_all().await;
        self.watchdog.stop_all().await;
    }
}
