// SPDX-License-Identifier: MIT
// Copyright 2026 The IceBreakrr developers

//! Meeting request states and cancellation reasons.

use crate::models::profile::{GeoPoint, UserId};
use serde::{Deserialize, Serialize};

/// State of a meeting request with one counterpart, from one side's view.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum MeetingState {
    None,
    /// We sent a request that is still open
    Sent,
    /// The counterpart sent us a request that is still open
    Received { message: String },
    /// Accepted; waiting for a rendezvous point
    LocationPending,
    /// Rendezvous point agreed
    Confirmed(GeoPoint),
}

/// Why a meeting request ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CancellationReason {
    TimeExpired,
    OutOfDistance,
    PeerCancelled,
    ConversationClosed,
    Declined,
}

impl CancellationReason {
    /// Token carried in the `message` field of a cancellation push.
    pub fn token(self) -> &'static str {
        match self {
            CancellationReason::TimeExpired => "TIME",
            CancellationReason::OutOfDistance => "DISTANCE",
            CancellationReason::PeerCancelled => "CANCELLED",
            CancellationReason::ConversationClosed => "CLOSED",
            CancellationReason::Declined => "DECLINED",
        }
    }

    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "TIME" => Some(CancellationReason::TimeExpired),
            "DISTANCE" => Some(CancellationReason::OutOfDistance),
            "CANCELLED" => Some(CancellationReason::PeerCancelled),
            "CLOSED" => Some(CancellationReason::ConversationClosed),
            "DECLINED" => Some(CancellationReason::Declined),
            _ => None,
        }
    }
}

/// Unordered pair of users, used to key per-pair state.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PairKey(UserId, UserId);

impl PairKey {
    pub fn new(a: &UserId, b: &UserId) -> Self {
        if a <= b {
            Self(a.clone(), b.clone())
        } else {
            Self(b.clone(), a.clone())
        }
    }

    pub fn involves(&self, uid: &UserId) -> bool {
        &self.0 == uid || &self.1 == uid
    }
}

/// Result of a cancellation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CancelOutcome {
    Cancelled,
    /// Nothing was open for the pair (duplicate or late cancellation)
    AlreadyCancelled,
}
