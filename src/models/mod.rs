// SPDX-License-Identifier: MIT
// Copyright 2026 The IceBreakrr developers

//! Data models for the application.

pub mod meeting;
pub mod profile;
pub mod push;
pub mod settings;

pub use meeting::{CancelOutcome, CancellationReason, MeetingState, PairKey};
pub use profile::{Gender, GeoPoint, Profile, ReportKind, UserId};
pub use push::{PushEnvelope, PushError, PushMessage, TypedPush};
pub use settings::{AgeRange, DiscoverySettings};
