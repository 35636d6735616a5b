//! Reward models

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::constants::reward_kinds;

/// Reward catalog entry.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Reward {
    pub id: Uuid,
    pub name: String,
    /// One of [`crate::constants::reward_kinds`].
    pub kind: String,
    pub monetary_amount: f64,
    pub monetary_unit: String,
    pub is_active: bool,
}

impl Reward {
    pub fn monetary_value(&self) -> MonetaryValue {
        MonetaryValue {
            amount: self.monetary_amount,
            unit: self.monetary_unit.clone(),
        }
    }
}

/// Monetary value object: non-negative amount in a named unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonetaryValue {
    pub amount: f64,
    pub unit: String,
}

impl MonetaryValue {
    /// Construct a validated monetary value. The unit is trimmed and must be
    /// non-empty; the amount must be non-negative.
    pub fn new(amount: f64, unit: &str) -> Result<Self, &'static str> {
        if amount < 0.0 || !amount.is_finite() {
            return Err("amount must be a non-negative finite number");
        }
        let unit = unit.trim();
        if unit.is_empty() {
            return Err("unit must be non-empty");
        }
        Ok(Self {
            amount,
            unit: unit.to_string(),
        })
    }

    /// Placeholder value written on new grants; the real value is computed
    /// downstream from the outbox event.
    pub fn zero(unit: &str) -> Self {
        Self {
            amount: 0.0,
            unit: unit.to_string(),
        }
    }
}

/// Validate a reward kind identifier.
pub fn validate_reward_kind(kind: &str) -> Result<(), &'static str> {
    if reward_kinds::ALL.contains(&kind) {
        Ok(())
    } else {
        Err("Unsupported reward kind")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_monetary_value_validation() {
        assert!(MonetaryValue::new(10.0, "EUR").is_ok());
        assert!(MonetaryValue::new(-1.0, "EUR").is_err());
        assert!(MonetaryValue::new(1.0, "   ").is_err());
        assert_eq!(MonetaryValue::new(1.0, " EUR ").unwrap().unit, "EUR");
    }

    #[test]
    fn test_validate_reward_kind() {
        assert!(validate_reward_kind("coupon").is_ok());
        assert!(validate_reward_kind("points").is_ok());
        assert!(validate_reward_kind("stocks").is_err());
    }
}
