// SPDX-License-Identifier: MIT
// Copyright 2026 The IceBreakrr developers

//! Engagement notifications.
//!
//! While a user is monitored, each tick looks up nearby discoverable
//! profiles matching their settings and pings those sharing a tag. A given
//! pair is pinged at most once per cooldown, whichever side's tick finds
//! the other first.

use crate::db::{ProfileFilter, ProfileStore};
use crate::error::Result;
use crate::models::{DiscoverySettings, PairKey, PushMessage, TypedPush, UserId};
use crate::services::monitor::TaskRegistry;
use crate::services::push::{DispatchOutcome, PushDispatcher};
use crate::services::settings::SettingsStore;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Result of one engagement tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickReport {
    /// Discoverability is off; nothing was queried
    NotDiscoverable,
    NoProfile,
    NoLocation,
    /// The profile has no tags to match on
    NoTags,
    Completed {
        /// Profiles returned by the radius query
        candidates: usize,
        /// Pings handed to the transport
        notified: usize,
        /// Pings withheld by the cooldown
        suppressed: usize,
        /// Pings the transport rejected (retried next tick)
        failed: usize,
    },
}

/// Tick logic, shared with the spawned loops.
#[derive(Clone)]
struct EngagementWorker {
    store: Arc<dyn ProfileStore>,
    push: PushDispatcher,
    settings: SettingsStore,
    cooldown: Duration,
    last_notified: Arc<DashMap<PairKey, Instant>>,
}

impl EngagementWorker {
    async fn tick(&self, uid: &UserId, settings: &DiscoverySettings) -> Result<TickReport> {
        if !settings.is_discoverable {
            tracing::debug!(uid = %uid, "Not discoverable, skipping engagement tick");
            return Ok(TickReport::NotDiscoverable);
        }

        let Some(me) = self.store.get_profile_by_uid(uid).await? else {
            return Ok(TickReport::NoProfile);
        };
        let Some(center) = me.location() else {
            tracing::debug!(uid = %uid, "No location, skipping engagement tick");
            return Ok(TickReport::NoLocation);
        };
        if me.tags.is_empty() {
            return Ok(TickReport::NoTags);
        }

        let filter = ProfileFilter::from_settings(settings, uid);
        let candidates = self
            .store
            .get_filtered_profiles_in_radius(center, settings.selected_radius_m, &filter)
            .await?;

        let mut notified = 0;
        let mut suppressed = 0;
        let mut failed = 0;

        for hit in &candidates {
            let candidate = &hit.profile;
            if me.blocked_between(candidate) {
                continue;
            }
            let Some(tag) = me.common_tags(candidate).into_iter().next() else {
                continue;
            };

            let pair = PairKey::new(uid, &candidate.uid);
            let now = Instant::now();
            // Reserve the pair before sending so the other side's tick
            // cannot ping it concurrently
            let reserved = match self.last_notified.entry(pair.clone()) {
                Entry::Occupied(last) if now.duration_since(*last.get()) < self.cooldown => false,
                Entry::Occupied(mut last) => {
                    last.insert(now);
                    true
                }
                Entry::Vacant(slot) => {
                    slot.insert(now);
                    true
                }
            };
            if !reserved {
                suppressed += 1;
                continue;
            }

            let push = TypedPush::new(
                uid.clone(),
                me.name.clone(),
                PushMessage::Engagement { tag: tag.clone() },
            );
            match self.push.dispatch(candidate, &push).await {
                Ok(outcome) => {
                    if outcome == DispatchOutcome::Sent {
                        notified += 1;
                    }
                    tracing::debug!(
                        uid = %uid,
                        peer = %candidate.uid,
                        tag = %tag,
                        distance_m = hit.distance_m,
                        ?outcome,
                        "Engagement ping"
                    );
                }
                Err(e) => {
                    // Release the reservation so the next tick retries
                    self.last_notified.remove_if(&pair, |_, at| *at == now);
                    failed += 1;
                    tracing::warn!(
                        uid = %uid,
                        peer = %candidate.uid,
                        error = %e,
                        "Engagement ping failed"
                    );
                }
            }
        }

        Ok(TickReport::Completed {
            candidates: candidates.len(),
            notified,
            suppressed,
            failed,
        })
    }
}

/// Runs an engagement loop per monitored user.
#[derive(Clone)]
pub struct EngagementManager {
    worker: EngagementWorker,
    interval: Duration,
    tasks: TaskRegistry,
}

impl EngagementManager {
    pub fn new(
        store: Arc<dyn ProfileStore>,
        push: PushDispatcher,
        settings: SettingsStore,
        interval: Duration,
        cooldown: Duration,
    ) -> Self {
        Self {
            worker: EngagementWorker {
                store,
                push,
                settings,
                cooldown,
                last_notified: Arc::new(DashMap::new()),
            },
            interval,
            tasks: TaskRegistry::new("engagement"),
        }
    }

    /// Begin periodic ticks for `uid` (restarting an existing loop).
    ///
    /// Each tick reads the latest settings from a subscription, so updates
    /// apply from the next tick on.
    pub async fn start_monitoring(&self, uid: &UserId) -> Result<()> {
        let settings = self.worker.settings.subscribe(uid).await?;
        let worker = self.worker.clone();
        let tick_uid = uid.clone();
        let restarted = self
            .tasks
            .start(uid, self.interval, move || {
                let worker = worker.clone();
                let uid = tick_uid.clone();
                let current = settings.borrow().clone();
                async move {
                    match worker.tick(&uid, &current).await {
                        Ok(TickReport::Completed {
                            candidates,
                            notified,
                            suppressed,
                            failed,
                        }) if candidates > 0 => {
                            tracing::info!(
                                uid = %uid,
                                candidates,
                                notified,
                                suppressed,
                                failed,
                                "Engagement tick"
                            );
                        }
                        Ok(_) => {}
                        Err(e) => {
                            tracing::warn!(uid = %uid, error = %e, "Engagement tick failed");
                        }
                    }
                }
            })
            .await;

        tracing::info!(uid = %uid, restarted, "Engagement monitoring started");
        Ok(())
    }

    /// Stop `uid`'s loop. No tick runs once this returns.
    pub async fn stop_monitoring(&self, uid: &UserId) {
        if self.tasks.stop(uid).await {
            tracing::info!(uid = %uid, "Engagement monitoring stopped");
        }
    }

    pub async fn stop_all(&self) {
        self.tasks.stop_all().await;
    }

    pub fn is_monitoring(&self, uid: &UserId) -> bool {
        self.tasks.is_running(uid)
    }

    /// Run one tick for `uid` now, outside the periodic loop.
    pub async fn run_tick(&self, uid: &UserId) -> Result<TickReport> {
        let settings = self.worker.settings.get(uid).await?;
        self.worker.tick(uid, &settings).await
    }

    /// Drop cooldown records involving `uid` (account deletion).
    pub fn forget(&self, uid: &UserId) {
        self.worker.last_notified.retain(|pair, _| !pair.involves(uid));
    }
}
