// SPDX-License-Identifier: MIT
// Copyright 2026 The IceBreakrr developers

//! Confirmed meeting watchdog.
//!
//! Cancels confirmed meetings that have gone stale (`TIME_EXPIRED`) or whose
//! participant walked away from the rendezvous point (`OUT_OF_DISTANCE`).
//! Confirmation age is tracked from when this process first sees the
//! confirmed point, so a restart resets the clock.

use crate::db::ProfileStore;
use crate::error::Result;
use crate::models::{CancelOutcome, CancellationReason, GeoPoint, PairKey, UserId};
use crate::services::meeting::MeetingRequestService;
use crate::services::monitor::TaskRegistry;
use dashmap::DashMap;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WatchdogReport {
    /// Confirmed meetings inspected
    pub confirmed: usize,
    pub expired: usize,
    pub out_of_distance: usize,
}

#[derive(Clone)]
struct WatchdogWorker {
    store: Arc<dyn ProfileStore>,
    meetings: MeetingRequestService,
    expiry: Duration,
    max_distance_m: f64,
    /// Confirmed point and when it was first observed
    first_seen: Arc<DashMap<PairKey, (GeoPoint, Instant)>>,
}

impl WatchdogWorker {
    async fn check(&self, uid: &UserId) -> Result<WatchdogReport> {
        let mut report = WatchdogReport::default();
        let Some(me) = self.store.get_profile_by_uid(uid).await? else {
            return Ok(report);
        };

        let now = Instant::now();
        let confirmed = me.meeting_request_chosen_localisation().clone();
        report.confirmed = confirmed.len();

        let live: HashSet<PairKey> = confirmed.keys().map(|peer| PairKey::new(uid, peer)).collect();
        self.first_seen
            .retain(|pair, _| !pair.involves(uid) || live.contains(pair));

        for (peer, point) in confirmed {
            let pair = PairKey::new(uid, &peer);
            let since = {
                let mut seen = self.first_seen.entry(pair.clone()).or_insert((point, now));
                if seen.0 != point {
                    // Re-confirmed elsewhere; restart the clock
                    *seen = (point, now);
                }
                seen.1
            };

            let reason = if now.duration_since(since) >= self.expiry {
                CancellationReason::TimeExpired
            } else if me
                .location()
                .is_some_and(|here| here.distance_m(&point) > self.max_distance_m)
            {
                CancellationReason::OutOfDistance
            } else {
                continue;
            };

            match self.meetings.cancel(uid, &peer, reason).await {
                Ok(outcome) => {
                    self.first_seen.remove(&pair);
                    if outcome == CancelOutcome::Cancelled {
                        match reason {
                            CancellationReason::TimeExpired => report.expired += 1,
                            _ => report.out_of_distance += 1,
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        uid = %uid,
                        peer = %peer,
                        reason = reason.token(),
                        error = %e,
                        "Watchdog cancellation failed"
                    );
                }
            }
        }

        Ok(report)
    }
}

/// Runs a watchdog loop per monitored user.
#[derive(Clone)]
pub struct MeetingWatchdog {
    worker: WatchdogWorker,
    interval: Duration,
    tasks: TaskRegistry,
}

impl MeetingWatchdog {
    pub fn new(
        store: Arc<dyn ProfileStore>,
        meetings: MeetingRequestService,
        interval: Duration,
        expiry: Duration,
        max_distance_m: f64,
    ) -> Self {
        Self {
            worker: WatchdogWorker {
                store,
                meetings,
                expiry,
                max_distance_m,
                first_seen: Arc::new(DashMap::new()),
            },
            interval,
            tasks: TaskRegistry::new("watchdog"),
        }
    }

    pub async fn start(&self, uid: &UserId) {
        let worker = self.worker.clone();
        let tick_uid = uid.clone();
        self.tasks
            .start(uid, self.interval, move || {
                let worker = worker.clone();
                let uid = tick_uid.clone();
                async move {
                    match worker.check(&uid).await {
                        Ok(report) if report.expired + report.out_of_distance > 0 => {
                            tracing::info!(
                                uid = %uid,
                                expired = report.expired,
                                out_of_distance = report.out_of_distance,
                                "Watchdog cancelled meetings"
                            );
                        }
                        Ok(_) => {}
                        Err(e) => tracing::warn!(uid = %uid, error = %e, "Watchdog check failed"),
                    }
                }
            })
            .await;
    }

    pub async fn stop(&self, uid: &UserId) {
        self.tasks.stop(uid).await;
    }

    pub async fn stop_all(&self) {
        self.tasks.stop_all().await;
    }

    pub fn is_running(&self, uid: &UserId) -> bool {
        self.tasks.is_running(uid)
    }

    /// Run one check for `uid` now.
    pub async fn check(&self, uid: &UserId) -> Result<WatchdogReport> {
        self.worker.check(uid).await
    }
}
