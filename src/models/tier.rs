//! Rule tier and expression-group models

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A level within a promotion. Tier N+1 is gated on having earned tier N.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct RuleTier {
    pub id: Uuid,
    pub promotion_id: Uuid,
    pub tier_level: i32,
    pub sort_order: i32,
    /// Overrides the promotion's global cooldown when set.
    pub cooldown_days: Option<i32>,
}

/// One rule inside a tier; at most one group fires per tier.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct RuleExpressionGroup {
    pub id: Uuid,
    pub promotion_id: Uuid,
    pub tier_id: Uuid,
    pub sort_order: i32,
    /// The authoring expression tree, persisted as JSON.
    pub expression_payload: String,
}

impl RuleTier {
    /// Name of the workflow rule a group of this tier compiles to.
    pub fn rule_name(&self, group_order: i32) -> String {
        format!("tier:{}:group:{}", self.tier_level, group_order)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rule_name_matches_compiled_form() {
        let tier = RuleTier {
            id: Uuid::new_v4(),
            promotion_id: Uuid::new_v4(),
            tier_level: 2,
            sort_order: 0,
            cooldown_days: None,
        };
        assert_eq!(tier.rule_name(3), "tier:2:group:3");
    }
}
