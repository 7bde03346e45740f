// SPDX-License-Identifier: MIT
// Copyright 2026 The IceBreakrr developers

//! Services module - business logic layer.

pub mod engagement;
pub mod meeting;
pub mod monitor;
pub mod profile;
pub mod push;
pub mod settings;
pub mod watchdog;

pub use engagement::{EngagementManager, TickReport};
pub use meeting::{MeetingRequestService, RemoteEvent, RemoteOutcome};
pub use profile::{ProfileService, ProfileUpdate};
pub use push::{DispatchOutcome, FcmClient, PushDispatcher, PushTransport, RecordingTransport};
pub use settings::SettingsStore;
pub use watchdog::{MeetingWatchdog, WatchdogReport};
