// SPDX-License-Identifier: MIT
// Copyright 2026 The IceBreakrr developers

//! Meeting request state machine.
//!
//! Each transition:
//! 1. Serializes on the (unordered) pair within this process
//! 2. Re-reads both profiles and checks its precondition on fresh data
//! 3. Writes both profiles in one atomic store operation
//! 4. Sends at most one best-effort push to the other party
//!
//! A push failure never rolls back the store write. Cancelling a pair with
//! nothing open is a no-op, which makes duplicate or late cancellation
//! pushes harmless.

use crate::db::ProfileStore;
use crate::error::{AppError, Result};
use crate::models::{
    CancelOutcome, CancellationReason, GeoPoint, MeetingState, PairKey, Profile, PushMessage,
    TypedPush, UserId,
};
use crate::services::push::PushDispatcher;
use dashmap::DashMap;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Per-pair transition locks.
type PairLocks = Arc<DashMap<PairKey, Arc<Mutex<()>>>>;

/// Effect of an inbound push on the recipient.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "event", rename_all = "snake_case")]
pub enum RemoteOutcome {
    Applied(RemoteEvent),
    /// The store no longer reflects the push (superseded by a later
    /// transition); nothing to show
    Stale,
}

/// Something the recipient's client should surface.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RemoteEvent {
    RequestReceived { from: UserId, message: String },
    RequestAccepted { by: UserId },
    MeetingConfirmed { with: UserId, location: GeoPoint },
    MeetingCancelled { with: UserId, reason: CancellationReason },
    EngagementPing { from: UserId, tag: String },
}

/// Drives meeting requests between two profiles.
#[derive(Clone)]
pub struct MeetingRequestService {
    store: Arc<dyn ProfileStore>,
    push: PushDispatcher,
    /// Max distance between the chooser and a rendezvous point
    meeting_radius_m: f64,
    pair_locks: PairLocks,
}

impl MeetingRequestService {
    pub fn new(store: Arc<dyn ProfileStore>, push: PushDispatcher, meeting_radius_m: f64) -> Self {
        Self {
            store,
            push,
            meeting_radius_m,
            pair_locks: Arc::new(DashMap::new()),
        }
    }

    // ─── Transitions ─────────────────────────────────────────────

    /// NONE -> SENT: `from` asks `to` to meet.
    ///
    /// Returns the sender's updated profile.
    pub async fn send_request(&self, from: &UserId, to: &UserId, message: &str) -> Result<Profile> {
        if from == to {
            return Err(AppError::BadRequest(
                "Cannot send a meeting request to yourself".to_string(),
            ));
        }
        let message = message.trim();
        if message.is_empty() {
            return Err(AppError::BadRequest("Message must not be empty".to_string()));
        }

        let _guard = self.lock_pair(from, to).await;
        let (mut sender, mut recipient) = self.load_pair(from, to).await?;

        if sender.blocked_between(&recipient) {
            return Err(AppError::Blocked);
        }
        if sender.has_meeting_with(to) || recipient.has_meeting_with(from) {
            return Err(AppError::InvalidTransition(format!(
                "A meeting request between {} and {} is already open",
                from, to
            )));
        }

        sender.record_sent(to.clone());
        recipient.record_received(from.clone(), message.to_string());
        self.store
            .update_profiles(&[sender.clone(), recipient.clone()])
            .await?;

        tracing::info!(from = %from, to = %to, "Meeting request sent");

        let push = TypedPush::new(
            from.clone(),
            sender.name.clone(),
            PushMessage::MeetingRequest {
                message: message.to_string(),
            },
        );
        self.push.notify(&recipient, &push).await;

        Ok(sender)
    }

    /// SENT -> LOCATION_PENDING: `recipient` accepts `requester`'s request.
    ///
    /// Returns the recipient's updated profile.
    pub async fn accept(&self, recipient: &UserId, requester: &UserId) -> Result<Profile> {
        let _guard = self.lock_pair(recipient, requester).await;
        let (mut accepting, mut requesting) = self.load_pair(recipient, requester).await?;

        if !accepting.meeting_request_inbox().contains_key(requester) {
            return Err(AppError::InvalidTransition(format!(
                "No open meeting request from {}",
                requester
            )));
        }
        if accepting.blocked_between(&requesting) {
            return Err(AppError::Blocked);
        }

        accepting.record_pending_location(requester.clone());
        requesting.record_pending_location(recipient.clone());
        self.store
            .update_profiles(&[accepting.clone(), requesting.clone()])
            .await?;

        tracing::info!(recipient = %recipient, requester = %requester, "Meeting request accepted");

        let push = TypedPush::new(
            recipient.clone(),
            accepting.name.clone(),
            PushMessage::MeetingAccepted,
        );
        self.push.notify(&requesting, &push).await;

        Ok(accepting)
    }

    /// LOCATION_PENDING -> CONFIRMED: `chooser` picks the rendezvous point.
    ///
    /// The point must lie within the meeting radius of the chooser's current
    /// location; otherwise nothing changes and `OutOfMeetingRadius` is
    /// returned. Returns the chooser's updated profile.
    pub async fn choose_location(
        &self,
        chooser: &UserId,
        peer: &UserId,
        point: GeoPoint,
    ) -> Result<Profile> {
        if !point.is_valid() {
            return Err(AppError::BadRequest(format!(
                "Invalid coordinates: {}",
                point.to_wire()
            )));
        }

        let _guard = self.lock_pair(chooser, peer).await;
        let (mut choosing, mut other) = self.load_pair(chooser, peer).await?;

        if !choosing.meeting_requests_pending_location().contains(peer)
            || !other.meeting_requests_pending_location().contains(chooser)
        {
            return Err(AppError::InvalidTransition(format!(
                "Meeting with {} is not waiting for a location",
                peer
            )));
        }

        let here = choosing.location().ok_or_else(|| {
            AppError::BadRequest("Current location is unavailable".to_string())
        })?;
        let distance_m = here.distance_m(&point);
        if distance_m > self.meeting_radius_m {
            return Err(AppError::OutOfMeetingRadius {
                distance_m,
                max_m: self.meeting_radius_m,
            });
        }

        choosing.record_chosen(peer.clone(), point);
        other.record_chosen(chooser.clone(), point);
        self.store
            .update_profiles(&[choosing.clone(), other.clone()])
            .await?;

        tracing::info!(
            chooser = %chooser,
            peer = %peer,
            lat = point.latitude,
            lon = point.longitude,
            "Meeting location confirmed"
        );

        let push = TypedPush::new(
            chooser.clone(),
            choosing.name.clone(),
            PushMessage::MeetingConfirmed { location: point },
        );
        self.push.notify(&other, &push).await;

        Ok(choosing)
    }

    /// CANCELLED(DECLINED): `recipient` turns down `requester`.
    pub async fn decline(&self, recipient: &UserId, requester: &UserId) -> Result<CancelOutcome> {
        self.cancel(recipient, requester, CancellationReason::Declined)
            .await
    }

    /// Any open state -> CANCELLED(reason), initiated by `actor`.
    ///
    /// Idempotent: returns `AlreadyCancelled` without writing or pushing
    /// when nothing is open between the two.
    pub async fn cancel(
        &self,
        actor: &UserId,
        peer: &UserId,
        reason: CancellationReason,
    ) -> Result<CancelOutcome> {
        let _guard = self.lock_pair(actor, peer).await;
        self.clear_pair(actor, peer, reason, true).await
    }

    /// Record that `actor` blocks `target`, cancelling any open meeting
    /// between them (`PEER_CANCELLED`) in the same write.
    ///
    /// Returns false if the block already existed.
    pub async fn block(&self, actor: &UserId, target: &UserId) -> Result<bool> {
        if actor == target {
            return Err(AppError::BadRequest("Cannot block yourself".to_string()));
        }

        let _guard = self.lock_pair(actor, target).await;
        let mut acting = self.load_profile(actor).await?;
        let mut other = self.store.get_profile_by_uid(target).await?;

        let had_meeting = acting.clear_meeting(target);
        let peer_changed = other
            .as_mut()
            .is_some_and(|other| other.clear_meeting(actor));
        let newly_blocked = acting.block(target.clone());

        if !(had_meeting || peer_changed || newly_blocked) {
            return Ok(false);
        }

        let mut changed = vec![acting.clone()];
        if peer_changed {
            changed.extend(other.clone());
        }
        self.store.update_profiles(&changed).await?;

        tracing::info!(uid = %actor, target = %target, had_meeting, "User blocked");

        if had_meeting || peer_changed {
            if let Some(other) = &other {
                let push = TypedPush::new(
                    actor.clone(),
                    acting.name.clone(),
                    PushMessage::MeetingCancellation {
                        reason: CancellationReason::PeerCancelled,
                    },
                );
                self.push.notify(other, &push).await;
            }
        }

        Ok(newly_blocked)
    }

    // ─── Inbound Pushes ──────────────────────────────────────────

    /// Apply a push received by `recipient`.
    ///
    /// The sender already wrote both profiles, so requests, acceptances and
    /// confirmations are only checked against the store. Cancellations run
    /// the same idempotent cleanup as [`MeetingRequestService::cancel`],
    /// without pushing back.
    pub async fn apply_remote(&self, recipient: &UserId, push: &TypedPush) -> Result<RemoteOutcome> {
        let sender = &push.sender_uid;
        if sender == recipient {
            tracing::warn!(uid = %recipient, "Ignoring push from self");
            return Ok(RemoteOutcome::Stale);
        }

        let event = match &push.message {
            PushMessage::MeetingCancellation { reason } => {
                let reason = *reason;
                let _guard = self.lock_pair(recipient, sender).await;
                let outcome = self.clear_pair(recipient, sender, reason, false).await?;
                tracing::info!(
                    recipient = %recipient,
                    sender = %sender,
                    reason = reason.token(),
                    ?outcome,
                    "Remote cancellation applied"
                );
                Some(RemoteEvent::MeetingCancelled {
                    with: sender.clone(),
                    reason,
                })
            }
            PushMessage::MeetingRequest { .. } => {
                match self.meeting_state(recipient, sender).await? {
                    MeetingState::Received { message } => Some(RemoteEvent::RequestReceived {
                        from: sender.clone(),
                        message,
                    }),
                    _ => None,
                }
            }
            PushMessage::MeetingAccepted => {
                let state = self.meeting_state(recipient, sender).await?;
                (state == MeetingState::LocationPending)
                    .then(|| RemoteEvent::RequestAccepted { by: sender.clone() })
            }
            PushMessage::MeetingConfirmed { location } => {
                match self.meeting_state(recipient, sender).await? {
                    MeetingState::Confirmed(point) if point == *location => {
                        Some(RemoteEvent::MeetingConfirmed {
                            with: sender.clone(),
                            location: point,
                        })
                    }
                    _ => None,
                }
            }
            PushMessage::Engagement { tag } => {
                let me = self.load_profile(recipient).await?;
                (!me.has_blocked(sender)).then(|| RemoteEvent::EngagementPing {
                    from: sender.clone(),
                    tag: tag.clone(),
                })
            }
        };

        match event {
            Some(event) => Ok(RemoteOutcome::Applied(event)),
            None => {
                tracing::debug!(
                    recipient = %recipient,
                    sender = %sender,
                    "Inbound push superseded by store state"
                );
                Ok(RemoteOutcome::Stale)
            }
        }
    }

    // ─── Queries ─────────────────────────────────────────────────

    /// Meeting state with `peer`, as seen by `uid`.
    pub async fn meeting_state(&self, uid: &UserId, peer: &UserId) -> Result<MeetingState> {
        Ok(self.load_profile(uid).await?.meeting_state_with(peer))
    }

    // ─── Helpers ─────────────────────────────────────────────────

    /// Remove the pair from both sides' bookkeeping. Caller holds the pair
    /// lock.
    async fn clear_pair(
        &self,
        actor: &UserId,
        peer: &UserId,
        reason: CancellationReason,
        notify: bool,
    ) -> Result<CancelOutcome> {
        let mut acting = self.load_profile(actor).await?;
        // The peer may have deleted their account already
        let mut other = self.store.get_profile_by_uid(peer).await?;

        let mut changed = Vec::with_capacity(2);
        if acting.clear_meeting(peer) {
            changed.push(acting.clone());
        }
        if let Some(other) = other.as_mut() {
            if other.clear_meeting(actor) {
                changed.push(other.clone());
            }
        }

        if changed.is_empty() {
            tracing::debug!(
                actor = %actor,
                peer = %peer,
                reason = reason.token(),
                "Meeting already cancelled"
            );
            return Ok(CancelOutcome::AlreadyCancelled);
        }

        self.store.update_profiles(&changed).await?;

        tracing::info!(
            actor = %actor,
            peer = %peer,
            reason = reason.token(),
            "Meeting request cancelled"
        );

        if notify {
            if let Some(other) = &other {
                let push = TypedPush::new(
                    actor.clone(),
                    acting.name.clone(),
                    PushMessage::MeetingCancellation { reason },
                );
                self.push.notify(other, &push).await;
            }
        }

        Ok(CancelOutcome::Cancelled)
    }

    async fn lock_pair(&self, a: &UserId, b: &UserId) -> OwnedMutexGuard<()> {
        let lock = self
            .pair_locks
            .entry(PairKey::new(a, b))
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        lock.lock_owned().await
    }

    async fn load_profile(&self, uid: &UserId) -> Result<Profile> {
        self.store
            .get_profile_by_uid(uid)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Profile {}", uid)))
    }

    async fn load_pair(&self, a: &UserId, b: &UserId) -> Result<(Profile, Profile)> {
        Ok((self.load_profile(a).await?, self.load_profile(b).await?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryProfileStore;
    use crate::models::Gender;
    use crate::services::push::RecordingTransport;
    use chrono::NaiveDate;

    fn profile(uid: &str) -> Profile {
        let mut p = Profile::new(
            uid,
            format!("User {}", uid),
            Gender::Other,
            NaiveDate::from_ymd_opt(1995, 1, 1).unwrap(),
        )
        .with_location(GeoPoint::new(46.0, 6.0))
        .unwrap();
        p.fcm_token = Some(format!("token-{}", uid));
        p
    }

    async fn setup() -> (MeetingRequestService, MemoryProfileStore, RecordingTransport) {
        let store = MemoryProfileStore::new();
        store.add_new_profile(&profile("1")).await.unwrap();
        store.add_new_profile(&profile("2")).await.unwrap();
        let transport = RecordingTransport::new();
        let service = MeetingRequestService::new(
            Arc::new(store.clone()),
            PushDispatcher::new(Arc::new(transport.clone())),
            500.0,
        );
        (service, store, transport)
    }

    #[tokio::test]
    async fn test_send_to_self_rejected() {
        let (service, _, _) = setup().await;
        let err = service.send_request(&"1".into(), &"1".into(), "hi").await;
        assert!(matches!(err, Err(AppError::BadRequest(_))));
    }

    #[tokio::test]
    async fn test_empty_message_rejected() {
        let (service, _, transport) = setup().await;
        let err = service.send_request(&"1".into(), &"2".into(), "   ").await;
        assert!(matches!(err, Err(AppError::BadRequest(_))));
        assert!(transport.sent().is_empty());
    }

    #[tokio::test]
    async fn test_send_to_unknown_profile() {
        let (service, _, _) = setup().await;
        let err = service.send_request(&"1".into(), &"404".into(), "hi").await;
        assert!(matches!(err, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_accept_without_request_rejected() {
        let (service, _, _) = setup().await;
        let err = service.accept(&"2".into(), &"1".into()).await;
        assert!(matches!(err, Err(AppError::InvalidTransition(_))));
    }

    #[tokio::test]
    async fn test_choose_location_before_accept_rejected() {
        let (service, _, _) = setup().await;
        service
            .send_request(&"1".into(), &"2".into(), "hi")
            .await
            .unwrap();
        let err = service
            .choose_location(&"1".into(), &"2".into(), GeoPoint::new(46.0, 6.0))
            .await;
        assert!(matches!(err, Err(AppError::InvalidTransition(_))));
    }

    #[tokio::test]
    async fn test_push_failure_keeps_store_write() {
        let (service, store, transport) = setup().await;
        transport.set_fail(true);

        service
            .send_request(&"1".into(), &"2".into(), "hi")
            .await
            .expect("push failure must not fail the transition");

        let recipient = store.get_profile_by_uid(&"2".into()).await.unwrap().unwrap();
        assert_eq!(
            recipient.meeting_request_inbox().get(&UserId::from("1")),
            Some(&"hi".to_string())
        );
    }

    #[tokio::test]
    async fn test_store_failure_surfaces_and_skips_push() {
        let (service, store, transport) = setup().await;
        store.set_fail_writes(true);

        let err = service.send_request(&"1".into(), &"2".into(), "hi").await;

        assert!(matches!(err, Err(AppError::Database(_))));
        assert!(transport.sent().is_empty());
        store.set_fail_writes(false);
        let sender = store.get_profile_by_uid(&"1".into()).await.unwrap().unwrap();
        assert!(sender.meeting_requests_sent().is_empty());
    }

    #[tokio::test]
    async fn test_cancel_with_deleted_peer_cleans_own_side() {
        let (service, store, transport) = setup().await;
        service
            .send_request(&"1".into(), &"2".into(), "hi")
            .await
            .unwrap();
        store.delete_profile_by_uid(&"2".into()).await.unwrap();
        transport.clear();

        let outcome = service
            .cancel(&"1".into(), &"2".into(), CancellationReason::PeerCancelled)
            .await
            .unwrap();

        assert_eq!(outcome, CancelOutcome::Cancelled);
        let sender = store.get_profile_by_uid(&"1".into()).await.unwrap().unwrap();
        assert!(!sender.has_meeting_with(&"2".into()));
        assert!(transport.sent().is_empty());
    }
}
