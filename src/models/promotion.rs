//! Promotion and promotion-version models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Promotion database model
///
/// The slow-changing root: name, timezone and the global cooldown applied to
/// tier 1 unless a tier overrides it. Country-specific state lives on the
/// versions.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Promotion {
    pub id: Uuid,
    pub name: String,
    pub timezone: String,
    pub global_cooldown_days: i32,
    pub created_at: DateTime<Utc>,
}

/// One immutable-once-published snapshot of a promotion for a country.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct PromotionVersion {
    pub id: Uuid,
    pub promotion_id: Uuid,
    pub version: i32,
    pub country_iso: String,
    pub is_draft: bool,
    pub workflow_payload: String,
    pub manifest_payload: String,
    pub timezone: String,
    pub global_cooldown_days: i32,
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_to: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl PromotionVersion {
    pub fn window(&self) -> ValidityWindow {
        ValidityWindow {
            valid_from: self.valid_from,
            valid_to: self.valid_to,
        }
    }

    /// Whether the version's validity window covers `t`.
    pub fn active_at(&self, t: DateTime<Utc>) -> bool {
        self.window().active_at(t)
    }
}

/// Validity window value object. Half-bounded windows are allowed; a missing
/// bound is open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidityWindow {
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_to: Option<DateTime<Utc>>,
}

impl ValidityWindow {
    /// Construct a window, rejecting `from > to`.
    pub fn new(
        valid_from: Option<DateTime<Utc>>,
        valid_to: Option<DateTime<Utc>>,
    ) -> Result<Self, &'static str> {
        if let (Some(from), Some(to)) = (valid_from, valid_to) {
            if from > to {
                return Err("valid_from must not be after valid_to");
            }
        }
        Ok(Self {
            valid_from,
            valid_to,
        })
    }

    pub fn open() -> Self {
        Self {
            valid_from: None,
            valid_to: None,
        }
    }

    pub fn active_at(&self, t: DateTime<Utc>) -> bool {
        if let Some(from) = self.valid_from {
            if t < from {
                return false;
            }
        }
        if let Some(to) = self.valid_to {
            if t > to {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    #[test]
    fn test_window_rejects_inverted_bounds() {
        assert!(ValidityWindow::new(
            Some(at("2024-02-01T00:00:00Z")),
            Some(at("2024-01-01T00:00:00Z"))
        )
        .is_err());
    }

    #[test]
    fn test_window_active_at() {
        let w = ValidityWindow::new(
            Some(at("2024-01-01T00:00:00Z")),
            Some(at("2024-02-01T00:00:00Z")),
        )
        .unwrap();
        assert!(w.active_at(at("2024-01-15T00:00:00Z")));
        assert!(w.active_at(at("2024-01-01T00:00:00Z")));
        assert!(w.active_at(at("2024-02-01T00:00:00Z")));
        assert!(!w.active_at(at("2023-12-31T23:59:59Z")));
        assert!(!w.active_at(at("2024-02-01T00:00:01Z")));
    }

    #[test]
    fn test_half_bounded_windows_are_open() {
        let from_only = ValidityWindow::new(Some(at("2024-01-01T00:00:00Z")), None).unwrap();
        assert!(from_only.active_at(at("2999-01-01T00:00:00Z")));
        assert!(!from_only.active_at(at("2023-01-01T00:00:00Z")));

        let open = ValidityWindow::open();
        assert!(open.active_at(at("1970-01-01T00:00:00Z")));
    }
}
