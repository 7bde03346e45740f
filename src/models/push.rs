// SPDX-License-Identifier: MIT
// Copyright 2026 The IceBreakrr developers

//! Push notification envelope and its typed interpretation.

use crate::models::meeting::CancellationReason;
use crate::models::profile::{GeoPoint, UserId};
use serde::{Deserialize, Serialize};

pub const MEETING_REQUEST_TITLE: &str = "MEETING REQUEST";
pub const MEETING_RESPONSE_TITLE: &str = "MEETING RESPONSE";
pub const MEETING_CANCELLATION_TITLE: &str = "MEETING CANCELLATION";
pub const ENGAGEMENT_TITLE: &str = "ENGAGEMENT NOTIFICATION";

/// `message` of a response acknowledging an accepted request.
pub const RESPONSE_ACCEPTED: &str = "ACCEPTED";
/// `message` of a response carrying the chosen rendezvous point.
pub const RESPONSE_CONFIRMED: &str = "CONFIRMED";

/// Push payload as carried by FCM data messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushEnvelope {
    pub title: String,
    pub message: String,
    #[serde(rename = "senderUID")]
    pub sender_uid: String,
    #[serde(rename = "senderName")]
    pub sender_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

/// What a push means.
#[derive(Debug, Clone, PartialEq)]
pub enum PushMessage {
    MeetingRequest { message: String },
    MeetingAccepted,
    MeetingConfirmed { location: GeoPoint },
    MeetingCancellation { reason: CancellationReason },
    Engagement { tag: String },
}

/// A push with its sender.
#[derive(Debug, Clone, PartialEq)]
pub struct TypedPush {
    pub sender_uid: UserId,
    pub sender_name: String,
    pub message: PushMessage,
}

/// Errors from interpreting an inbound envelope.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PushError {
    #[error("Unknown push title: {0:?}")]
    UnknownTitle(String),

    #[error("Malformed {title} push: {reason}")]
    Malformed { title: String, reason: String },
}

impl TypedPush {
    pub fn new(sender_uid: UserId, sender_name: impl Into<String>, message: PushMessage) -> Self {
        Self {
            sender_uid,
            sender_name: sender_name.into(),
            message,
        }
    }

    pub fn to_envelope(&self) -> PushEnvelope {
        let (title, message, location) = match &self.message {
            PushMessage::MeetingRequest { message } => {
                (MEETING_REQUEST_TITLE, message.clone(), None)
            }
            PushMessage::MeetingAccepted => {
                (MEETING_RESPONSE_TITLE, RESPONSE_ACCEPTED.to_string(), None)
            }
            PushMessage::MeetingConfirmed { location } => (
                MEETING_RESPONSE_TITLE,
                RESPONSE_CONFIRMED.to_string(),
                Some(location.to_wire()),
            ),
            PushMessage::MeetingCancellation { reason } => {
                (MEETING_CANCELLATION_TITLE, reason.token().to_string(), None)
            }
            PushMessage::Engagement { tag } => (ENGAGEMENT_TITLE, tag.clone(), None),
        };

        PushEnvelope {
            title: title.to_string(),
            message,
            sender_uid: self.sender_uid.to_string(),
            sender_name: self.sender_name.clone(),
            location,
        }
    }
}

impl TryFrom<&PushEnvelope> for TypedPush {
    type Error = PushError;

    fn try_from(envelope: &PushEnvelope) -> Result<Self, Self::Error> {
        let malformed = |reason: &str| PushError::Malformed {
            title: envelope.title.clone(),
            reason: reason.to_string(),
        };

        if envelope.sender_uid.trim().is_empty() {
            return Err(malformed("missing senderUID"));
        }

        let message = match envelope.title.as_str() {
            MEETING_REQUEST_TITLE => PushMessage::MeetingRequest {
                message: envelope.message.clone(),
            },
            MEETING_RESPONSE_TITLE => match envelope.message.as_str() {
                RESPONSE_ACCEPTED => PushMessage::MeetingAccepted,
                RESPONSE_CONFIRMED => {
                    let location = envelope
                        .location
                        .as_deref()
                        .and_then(GeoPoint::parse_wire)
                        .ok_or_else(|| malformed("missing or invalid location"))?;
                    PushMessage::MeetingConfirmed { location }
                }
                _ => return Err(malformed("unknown response kind")),
            },
            MEETING_CANCELLATION_TITLE => {
                let reason = CancellationReason::from_token(&envelope.message)
                    .ok_or_else(|| malformed("unknown cancellation reason"))?;
                PushMessage::MeetingCancellation { reason }
            }
            ENGAGEMENT_TITLE => {
                if envelope.message.is_empty() {
                    return Err(malformed("missing tag"));
                }
                PushMessage::Engagement {
                    tag: envelope.message.clone(),
                }
            }
            other => return Err(PushError::UnknownTitle(other.to_string())),
        };

        Ok(Self {
            sender_uid: UserId::new(envelope.sender_uid.clone()),
            sender_name: envelope.sender_name.clone(),
            message,
        })
    }
}
