//! Version manifest
//!
//! The manifest is persisted alongside the workflow on each version and
//! cached with it. It is parsed once into this typed form wherever it is
//! consumed; the hot path never searches raw JSON.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::promotion::ValidityWindow;

/// Typed manifest of a promotion version.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    pub policies: ManifestPolicies,
    #[serde(default)]
    pub window: ManifestWindow,
    #[serde(default)]
    pub segments: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ManifestPolicies {
    #[serde(default)]
    pub global_cooldown_days: i32,
    /// Safe default: a manifest that does not say otherwise is exclusive.
    #[serde(default = "default_exclusive")]
    pub exclusive_per_event: bool,
    #[serde(default)]
    pub country: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ManifestWindow {
    pub valid_from_utc: Option<DateTime<Utc>>,
    pub valid_to_utc: Option<DateTime<Utc>>,
}

fn default_exclusive() -> bool {
    true
}

impl Manifest {
    pub fn parse(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    pub fn window(&self) -> ValidityWindow {
        ValidityWindow {
            valid_from: self.window.valid_from_utc,
            valid_to: self.window.valid_to_utc,
        }
    }

    /// Whether the manifest window covers `t`. A missing bound is open.
    pub fn active_at(&self, t: DateTime<Utc>) -> bool {
        self.window().active_at(t)
    }

    /// Whether the contact's segments satisfy the manifest's segment gate.
    /// An absent or empty segment list admits everyone.
    pub fn segments_match(&self, contact_segments: &[String]) -> bool {
        if self.segments.is_empty() {
            return true;
        }
        self.segments
            .iter()
            .any(|required| contact_segments.iter().any(|s| s == required))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_manifest() {
        let raw = r#"{
            "policies": {"globalCooldownDays": 7, "exclusivePerEvent": false, "country": "ES"},
            "window": {"validFromUtc": "2024-01-01T00:00:00Z", "validToUtc": null},
            "segments": ["vip"]
        }"#;
        let manifest = Manifest::parse(raw).unwrap();
        assert_eq!(manifest.policies.global_cooldown_days, 7);
        assert!(!manifest.policies.exclusive_per_event);
        assert_eq!(manifest.policies.country, "ES");
        assert_eq!(manifest.segments, vec!["vip".to_string()]);
        assert!(manifest.window.valid_from_utc.is_some());
    }

    #[test]
    fn test_exclusive_defaults_to_true() {
        let manifest = Manifest::parse(r#"{"policies": {}}"#).unwrap();
        assert!(manifest.policies.exclusive_per_event);
    }

    #[test]
    fn test_segments_match() {
        let manifest = Manifest::parse(r#"{"policies": {}, "segments": ["vip"]}"#).unwrap();
        assert!(!manifest.segments_match(&["regular".to_string()]));
        assert!(manifest.segments_match(&["vip".to_string(), "regular".to_string()]));

        let ungated = Manifest::parse(r#"{"policies": {}}"#).unwrap();
        assert!(ungated.segments_match(&[]));
    }

    #[test]
    fn test_window_filter() {
        let manifest = Manifest::parse(
            r#"{"policies": {}, "window": {"validFromUtc": "2024-01-01T00:00:00Z", "validToUtc": "2024-02-01T00:00:00Z"}}"#,
        )
        .unwrap();
        assert!(manifest.active_at("2024-01-15T00:00:00Z".parse().unwrap()));
        assert!(!manifest.active_at("2024-03-01T00:00:00Z".parse().unwrap()));
    }
}
