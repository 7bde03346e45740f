// SPDX-License-Identifier: MIT
// Copyright 2026 The IceBreakrr developers

//! Profile model for storage and API.
//!
//! Social bookkeeping fields are private: they only change through the
//! transition helpers below, which the meeting state machine and profile
//! service drive. That keeps the per-counterpart exclusivity invariant in
//! one place.

use crate::geohash::{self, GeoHashError, GEOHASH_PRECISION};
use crate::models::meeting::MeetingState;
use crate::models::settings::DiscoverySettings;
use chrono::{Datelike, NaiveDate};
use geo::{Distance, Haversine, Point};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Stable user identifier (Firebase uid, also the profile document ID).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for UserId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// A WGS84 coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    pub fn is_valid(&self) -> bool {
        (-90.0..=90.0).contains(&self.latitude) && (-180.0..=180.0).contains(&self.longitude)
    }

    /// Great-circle distance in meters.
    pub fn distance_m(&self, other: &GeoPoint) -> f64 {
        Haversine.distance(self.to_point(), other.to_point())
    }

    fn to_point(self) -> Point<f64> {
        Point::new(self.longitude, self.latitude)
    }

    /// Push payload form: `"lat, lon"`.
    pub fn to_wire(&self) -> String {
        format!("{}, {}", self.latitude, self.longitude)
    }

    /// Parse the `"lat, lon"` push payload form.
    pub fn parse_wire(s: &str) -> Option<Self> {
        let (lat, lon) = s.split_once(',')?;
        let point = Self::new(lat.trim().parse().ok()?, lon.trim().parse().ok()?);
        point.is_valid().then_some(point)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Gender {
    Male,
    Female,
    Other,
}

/// Why a profile was reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReportKind {
    InappropriateContent,
    Harassment,
    Spam,
    FakeProfile,
    Other,
}

/// User profile stored in Firestore (`profiles/{uid}`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub uid: UserId,
    pub name: String,
    pub gender: Gender,
    pub birth_date: NaiveDate,
    #[serde(default)]
    pub description: String,
    /// Interests, in the order the user picked them
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub fcm_token: Option<String>,
    /// When the profile was created (RFC3339)
    #[serde(default)]
    pub created_at: String,

    /// Discovery settings; a hidden profile never keeps a location
    #[serde(default)]
    discovery: DiscoverySettings,

    #[serde(default)]
    location: Option<GeoPoint>,
    /// Always `encode(location, GEOHASH_PRECISION)`, absent with the location
    #[serde(default)]
    geohash: Option<String>,

    #[serde(default)]
    has_blocked: BTreeSet<UserId>,
    #[serde(default)]
    meeting_request_sent: BTreeSet<UserId>,
    #[serde(default)]
    meeting_request_inbox: BTreeMap<UserId, String>,
    #[serde(default)]
    meeting_request_pending_location: BTreeSet<UserId>,
    #[serde(default)]
    meeting_request_chosen_localisation: BTreeMap<UserId, GeoPoint>,
    #[serde(default)]
    reports: BTreeMap<UserId, ReportKind>,
}

impl Profile {
    /// A fresh profile with empty social state.
    pub fn new(
        uid: impl Into<UserId>,
        name: impl Into<String>,
        gender: Gender,
        birth_date: NaiveDate,
    ) -> Self {
        Self {
            uid: uid.into(),
            name: name.into(),
            gender,
            birth_date,
            description: String::new(),
            tags: Vec::new(),
            fcm_token: None,
            created_at: String::new(),
            discovery: DiscoverySettings::default(),
            location: None,
            geohash: None,
            has_blocked: BTreeSet::new(),
            meeting_request_sent: BTreeSet::new(),
            meeting_request_inbox: BTreeMap::new(),
            meeting_request_pending_location: BTreeSet::new(),
            meeting_request_chosen_localisation: BTreeMap::new(),
            reports: BTreeMap::new(),
        }
    }

    // ─── Discovery ───────────────────────────────────────────────

    pub fn discovery(&self) -> &DiscoverySettings {
        &self.discovery
    }

    pub fn is_discoverable(&self) -> bool {
        self.discovery.is_discoverable
    }

    /// Replace the discovery settings. Hiding also clears the location.
    pub fn set_discovery(&mut self, settings: DiscoverySettings) {
        if !settings.is_discoverable {
            self.location = None;
            self.geohash = None;
        }
        self.discovery = settings;
    }

    // ─── Location ────────────────────────────────────────────────

    pub fn location(&self) -> Option<GeoPoint> {
        self.location
    }

    pub fn geohash(&self) -> Option<&str> {
        self.geohash.as_deref()
    }

    /// Set or clear the location, recomputing the geohash.
    pub fn set_location(&mut self, location: Option<GeoPoint>) -> Result<(), GeoHashError> {
        self.geohash = match location {
            Some(p) => Some(geohash::encode(p.latitude, p.longitude, GEOHASH_PRECISION)?),
            None => None,
        };
        self.location = location;
        Ok(())
    }

    /// Builder-style variant of [`Profile::set_location`].
    pub fn with_location(mut self, location: GeoPoint) -> Result<Self, GeoHashError> {
        self.set_location(Some(location))?;
        Ok(self)
    }

    /// Age in whole years on `today`.
    pub fn age_on(&self, today: NaiveDate) -> u32 {
        let mut age = today.year() - self.birth_date.year();
        if (today.month(), today.day()) < (self.birth_date.month(), self.birth_date.day()) {
            age -= 1;
        }
        age.max(0) as u32
    }

    /// Tags shared with `other`, in this profile's order.
    pub fn common_tags(&self, other: &Profile) -> Vec<String> {
        self.tags
            .iter()
            .filter(|t| other.tags.contains(t))
            .cloned()
            .collect()
    }

    // ─── Blocking & Reports ──────────────────────────────────────

    pub fn has_blocked(&self, uid: &UserId) -> bool {
        self.has_blocked.contains(uid)
    }

    pub fn blocked_users(&self) -> impl Iterator<Item = &UserId> {
        self.has_blocked.iter()
    }

    /// Whether either profile has blocked the other.
    pub fn blocked_between(&self, other: &Profile) -> bool {
        self.has_blocked(&other.uid) || other.has_blocked(&self.uid)
    }

    /// Record a block. Returns `false` if already blocked.
    pub(crate) fn block(&mut self, uid: UserId) -> bool {
        self.has_blocked.insert(uid)
    }

    pub fn report_of(&self, uid: &UserId) -> Option<ReportKind> {
        self.reports.get(uid).copied()
    }

    /// Record a report. Existing reports are never overwritten.
    pub(crate) fn add_report(&mut self, uid: UserId, kind: ReportKind) -> bool {
        if self.reports.contains_key(&uid) {
            return false;
        }
        self.reports.insert(uid, kind);
        true
    }

    // ─── Meeting Request Bookkeeping ─────────────────────────────

    pub fn meeting_requests_sent(&self) -> &BTreeSet<UserId> {
        &self.meeting_request_sent
    }

    pub fn meeting_request_inbox(&self) -> &BTreeMap<UserId, String> {
        &self.meeting_request_inbox
    }

    pub fn meeting_requests_pending_location(&self) -> &BTreeSet<UserId> {
        &self.meeting_request_pending_location
    }

    pub fn meeting_request_chosen_localisation(&self) -> &BTreeMap<UserId, GeoPoint> {
        &self.meeting_request_chosen_localisation
    }

    /// Meeting state with `peer`, as seen from this profile.
    pub fn meeting_state_with(&self, peer: &UserId) -> MeetingState {
        if self.meeting_request_sent.contains(peer) {
            MeetingState::Sent
        } else if let Some(message) = self.meeting_request_inbox.get(peer) {
            MeetingState::Received {
                message: message.clone(),
            }
        } else if self.meeting_request_pending_location.contains(peer) {
            MeetingState::LocationPending
        } else if let Some(point) = self.meeting_request_chosen_localisation.get(peer) {
            MeetingState::Confirmed(*point)
        } else {
            MeetingState::None
        }
    }

    pub fn has_meeting_with(&self, peer: &UserId) -> bool {
        self.meeting_state_with(peer) != MeetingState::None
    }

    /// Number of bookkeeping collections that mention `peer`.
    pub fn meeting_slots_for(&self, peer: &UserId) -> usize {
        [
            self.meeting_request_sent.contains(peer),
            self.meeting_request_inbox.contains_key(peer),
            self.meeting_request_pending_location.contains(peer),
            self.meeting_request_chosen_localisation.contains_key(peer),
        ]
        .into_iter()
        .filter(|&b| b)
        .count()
    }

    /// Every counterpart currently present in the bookkeeping.
    pub fn meeting_counterparts(&self) -> BTreeSet<UserId> {
        self.meeting_request_sent
            .iter()
            .chain(self.meeting_request_inbox.keys())
            .chain(self.meeting_request_pending_location.iter())
            .chain(self.meeting_request_chosen_localisation.keys())
            .cloned()
            .collect()
    }

    pub(crate) fn record_sent(&mut self, peer: UserId) {
        self.clear_meeting(&peer);
        self.meeting_request_sent.insert(peer);
    }

    pub(crate) fn record_received(&mut self, peer: UserId, message: String) {
        self.clear_meeting(&peer);
        self.meeting_request_inbox.insert(peer, message);
    }

    pub(crate) fn record_pending_location(&mut self, peer: UserId) {
        self.clear_meeting(&peer);
        self.meeting_request_pending_location.insert(peer);
    }

    pub(crate) fn record_chosen(&mut self, peer: UserId, point: GeoPoint) {
        self.clear_meeting(&peer);
        self.meeting_request_chosen_localisation.insert(peer, point);
    }

    /// Drop `peer` from every bookkeeping collection. Returns whether
    /// anything was removed.
    pub(crate) fn clear_meeting(&mut self, peer: &UserId) -> bool {
        let sent = self.meeting_request_sent.remove(peer);
        let inbox = self.meeting_request_inbox.remove(peer).is_some();
        let pending = self.meeting_request_pending_location.remove(peer);
        let chosen = self.meeting_request_chosen_localisation.remove(peer).is_some();
        sent || inbox || pending || chosen
    }

    /// Remove every reference to a deleted user. Returns whether the
    /// profile changed.
    pub(crate) fn purge_user(&mut self, uid: &UserId) -> bool {
        let meeting = self.clear_meeting(uid);
        let blocked = self.has_blocked.remove(uid);
        meeting || blocked
    }
}
