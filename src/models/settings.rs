// SPDX-License-Identifier: MIT
// Copyright 2026 The IceBreakrr developers

//! Per-user discovery settings (discoverability and match filters).

use crate::models::profile::Gender;
use serde::{Deserialize, Serialize};

/// Inclusive age bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgeRange {
    pub min: u32,
    pub max: u32,
}

impl AgeRange {
    pub fn contains(&self, age: u32) -> bool {
        (self.min..=self.max).contains(&age)
    }
}

impl Default for AgeRange {
    fn default() -> Self {
        Self { min: 18, max: 99 }
    }
}

/// Settings driving proximity matching.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoverySettings {
    /// Master opt-out: location and tags are only used when true
    #[serde(default)]
    pub is_discoverable: bool,
    /// Search radius in meters
    #[serde(default = "default_radius_m")]
    pub selected_radius_m: f64,
    /// Empty means every gender
    #[serde(default)]
    pub selected_genders: Vec<Gender>,
    #[serde(default)]
    pub age_range: AgeRange,
    /// Candidates must share at least one of these (empty means no filter)
    #[serde(default)]
    pub filtered_tags: Vec<String>,
}

fn default_radius_m() -> f64 {
    1_000.0
}

impl Default for DiscoverySettings {
    fn default() -> Self {
        Self {
            is_discoverable: false,
            selected_radius_m: default_radius_m(),
            selected_genders: Vec::new(),
            age_range: AgeRange::default(),
            filtered_tags: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_json() {
        let settings: DiscoverySettings = serde_json::from_str("{}").unwrap();
        assert_eq!(settings, DiscoverySettings::default());
        assert!(!settings.is_discoverable);
    }

    #[test]
    fn test_age_range_inclusive() {
        let range = AgeRange { min: 20, max: 30 };
        assert!(range.contains(20));
        assert!(range.contains(30));
        assert!(!range.contains(31));
    }
}
