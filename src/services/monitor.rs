// SPDX-License-Identifier: MIT
// Copyright 2026 The IceBreakrr developers

//! Per-user periodic background tasks.
//!
//! Each task ticks on a `tokio::time::interval` until cancelled. Cancellation
//! is only observed between ticks: a tick in flight always runs to
//! completion, and [`TaskRegistry::stop`] waits for it, so no tick is
//! running or starts after `stop` returns.

use crate::models::UserId;
use dashmap::DashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

struct PeriodicTask {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl PeriodicTask {
    fn spawn<F, Fut>(name: &'static str, uid: UserId, period: Duration, mut tick: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        let handle = tokio::spawn(async move {
            let mut timer = interval(period);
            timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

            tracing::debug!(task = name, uid = %uid, ?period, "Periodic task started");

            loop {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    _ = timer.tick() => tick().await,
                }
            }

            tracing::debug!(task = name, uid = %uid, "Periodic task stopped");
        });

        Self { cancel, handle }
    }

    async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(e) = self.handle.await {
            if e.is_panic() {
                tracing::error!(error = %e, "Periodic task panicked");
            }
        }
    }
}

/// At most one running task per user.
#[derive(Clone)]
pub struct TaskRegistry {
    name: &'static str,
    tasks: Arc<DashMap<UserId, PeriodicTask>>,
}

impl TaskRegistry {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            tasks: Arc::new(DashMap::new()),
        }
    }

    /// Start ticking `tick` every `period` for `uid`, first tick immediately.
    ///
    /// A task already running for `uid` is stopped first; returns true in
    /// that case.
    pub async fn start<F, Fut>(&self, uid: &UserId, period: Duration, tick: F) -> bool
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let restarted = self.stop(uid).await;
        let task = PeriodicTask::spawn(self.name, uid.clone(), period, tick);
        if let Some(previous) = self.tasks.insert(uid.clone(), task) {
            // Lost a start race with another caller
            previous.cancel.cancel();
        }
        restarted
    }

    /// Cancel `uid`'s task and wait for it to finish.
    ///
    /// Returns false if nothing was running.
    pub async fn stop(&self, uid: &UserId) -> bool {
        match self.tasks.remove(uid) {
            Some((_, task)) => {
                task.shutdown().await;
                true
            }
            None => false,
        }
    }

    pub async fn stop_all(&self) {
        let uids: Vec<UserId> = self.tasks.iter().map(|e| e.key().clone()).collect();
        for uid in &uids {
            self.stop(uid).await;
        }
        if !uids.is_empty() {
            tracing::info!(task = self.name, count = uids.len(), "Stopped all periodic tasks");
        }
    }

    pub fn is_running(&self, uid: &UserId) -> bool {
        self.tasks
            .get(uid)
            .is_some_and(|task| !task.handle.is_finished())
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting(counter: &Arc<AtomicUsize>) -> impl FnMut() -> std::future::Ready<()> + Send + 'static {
        let counter = counter.clone();
        move || {
            counter.fetch_add(1, Ordering::SeqCst);
            std::future::ready(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticks_until_stopped() {
        let registry = TaskRegistry::new("test");
        let counter = Arc::new(AtomicUsize::new(0));
        let uid = UserId::from("1");

        assert!(!registry.start(&uid, Duration::from_secs(10), counting(&counter)).await);
        tokio::time::sleep(Duration::from_secs(25)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 3);

        assert!(registry.stop(&uid).await);
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 3);
        assert!(!registry.is_running(&uid));
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_replaces_running_task() {
        let registry = TaskRegistry::new("test");
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));
        let uid = UserId::from("1");

        registry.start(&uid, Duration::from_secs(10), counting(&first)).await;
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(registry.start(&uid, Duration::from_secs(10), counting(&second)).await);
        tokio::time::sleep(Duration::from_secs(15)).await;

        assert_eq!(first.load(Ordering::SeqCst), 1);
        assert_eq!(second.load(Ordering::SeqCst), 2);
        assert_eq!(registry.len(), 1);

        registry.stop_all().await;
        assert!(registry.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_waits_for_tick_in_flight() {
        let registry = TaskRegistry::new("test");
        let started = Arc::new(AtomicUsize::new(0));
        let finished = Arc::new(AtomicUsize::new(0));
        let uid = UserId::from("1");

        let (s, f) = (started.clone(), finished.clone());
        registry
            .start(&uid, Duration::from_secs(60), move || {
                let (s, f) = (s.clone(), f.clone());
                async move {
                    s.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    f.fetch_add(1, Ordering::SeqCst);
                }
            })
            .await;

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(started.load(Ordering::SeqCst), 1);
        assert_eq!(finished.load(Ordering::SeqCst), 0);

        assert!(registry.stop(&uid).await);
        assert_eq!(finished.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(started.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_stop_unknown_is_noop() {
        let registry = TaskRegistry::new("test");
        assert!(!registry.stop(&"nobody".into()).await);
    }
}
