//! Contact-reward (grant) models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::constants::grant_statuses;

/// Grant status enum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GrantStatus {
    Pending,
    Granted,
    Rejected,
}

impl GrantStatus {
    /// Allowed transitions: Pending → Granted | Rejected. Terminal states
    /// never transition.
    pub fn can_transition_to(self, next: GrantStatus) -> bool {
        matches!(
            (self, next),
            (GrantStatus::Pending, GrantStatus::Granted)
                | (GrantStatus::Pending, GrantStatus::Rejected)
        )
    }
}

impl std::fmt::Display for GrantStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "{}", grant_statuses::PENDING),
            Self::Granted => write!(f, "{}", grant_statuses::GRANTED),
            Self::Rejected => write!(f, "{}", grant_statuses::REJECTED),
        }
    }
}

impl std::str::FromStr for GrantStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            grant_statuses::PENDING => Ok(Self::Pending),
            grant_statuses::GRANTED => Ok(Self::Granted),
            grant_statuses::REJECTED => Ok(Self::Rejected),
            other => Err(format!("unknown grant status '{}'", other)),
        }
    }
}

/// A persisted award of a reward (or a placeholder) to a contact.
///
/// Standalone aggregate: once written, only `status` may transition.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ContactReward {
    pub id: Uuid,
    pub contact_id: String,
    pub promotion_id: Uuid,
    /// None for a "calculated" placeholder grant.
    pub reward_id: Option<Uuid>,
    pub expression_group_id: Option<Uuid>,
    pub tier_level: i32,
    pub granted_at: DateTime<Utc>,
    pub status: String,
    pub granted_amount: f64,
    pub granted_unit: String,
    pub cooldown_until: Option<DateTime<Utc>>,
    pub source_event_id: Option<String>,
}

impl ContactReward {
    pub fn grant_status(&self) -> GrantStatus {
        self.status.parse().unwrap_or(GrantStatus::Pending)
    }
}

/// Fields of a grant about to be written.
#[derive(Debug, Clone)]
pub struct NewGrant {
    pub contact_id: String,
    pub promotion_id: Uuid,
    pub reward_id: Option<Uuid>,
    pub expression_group_id: Option<Uuid>,
    pub tier_level: i32,
    pub granted_at: DateTime<Utc>,
    pub granted_amount: f64,
    pub granted_unit: String,
    pub cooldown_until: Option<DateTime<Utc>>,
    pub source_event_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_transitions() {
        assert!(GrantStatus::Pending.can_transition_to(GrantStatus::Granted));
        assert!(GrantStatus::Pending.can_transition_to(GrantStatus::Rejected));
        assert!(!GrantStatus::Granted.can_transition_to(GrantStatus::Rejected));
        assert!(!GrantStatus::Rejected.can_transition_to(GrantStatus::Granted));
        assert!(!GrantStatus::Granted.can_transition_to(GrantStatus::Pending));
    }

    #[test]
    fn test_status_roundtrip() {
        for s in ["pending", "granted", "rejected"] {
            let status: GrantStatus = s.parse().unwrap();
            assert_eq!(status.to_string(), s);
        }
        assert!("unknown".parse::<GrantStatus>().is_err());
    }
}
