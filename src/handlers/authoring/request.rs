//! Authoring request DTOs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::constants::MAX_PROMOTION_NAME_LENGTH;

/// Draft upsert request
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct DraftUpsertRequest {
    /// Present when updating an existing promotion
    pub promotion_id: Option<Uuid>,

    #[validate(length(min = 1, max = MAX_PROMOTION_NAME_LENGTH))]
    pub name: String,

    /// IANA timezone of the promotion
    #[serde(default = "default_timezone")]
    pub timezone: String,

    /// Two-letter uppercase country code
    pub country_iso: String,

    pub policies: PoliciesDto,

    #[serde(default)]
    pub window: WindowDto,

    /// Segment codes gating the promotion (empty = everyone)
    #[serde(default)]
    pub segments: Vec<String>,

    /// Global reward pool for the promotion
    #[serde(default)]
    pub global_reward_ids: Vec<Uuid>,

    pub tiers: Vec<TierDto>,
}

fn default_timezone() -> String {
    "UTC".to_string()
}

/// Promotion policies
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoliciesDto {
    #[serde(default)]
    pub global_cooldown_days: i32,

    /// At most one promotion fires per event when true
    #[serde(default = "default_true")]
    pub exclusive_per_event: bool,
}

fn default_true() -> bool {
    true
}

/// Validity window
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowDto {
    pub valid_from_utc: Option<DateTime<Utc>>,
    pub valid_to_utc: Option<DateTime<Utc>>,
}

/// One tier of the draft
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TierDto {
    pub tier_level: i32,

    #[serde(default)]
    pub order: i32,

    /// Overrides the global cooldown for this tier when set
    pub cooldown_days: Option<i32>,

    pub groups: Vec<GroupDto>,
}

/// One expression group of a tier
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupDto {
    #[serde(default)]
    pub order: i32,

    /// Rewards specific to this group; overrides the global pool when non-empty
    #[serde(default)]
    pub reward_ids: Vec<Uuid>,

    /// The logical-rule tree; a missing root skips the group with a warning
    pub expression: Option<ExpressionNode>,
}

/// Boolean connective of a group node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BoolOp {
    #[serde(alias = "and", alias = "AND")]
    And,
    #[serde(alias = "or", alias = "OR")]
    Or,
}

/// A node of the logical-rule tree: either a nested group or a leaf clause.
///
/// Clause fields are optional so an incomplete clause surfaces as a compile
/// warning rather than a deserialization failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged, rename_all_fields = "camelCase")]
pub enum ExpressionNode {
    Group {
        bool_op: BoolOp,
        #[serde(default)]
        children: Vec<ExpressionNode>,
        #[serde(default)]
        order: i32,
    },
    Clause {
        attribute_id: Option<Uuid>,
        operator_id: Option<Uuid>,
        value_raw: Option<String>,
        #[serde(default)]
        order: i32,
    },
}

impl ExpressionNode {
    pub fn order(&self) -> i32 {
        match self {
            Self::Group { order, .. } | Self::Clause { order, .. } => *order,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expression_tree_deserializes() {
        let raw = r#"{
            "boolOp": "And",
            "order": 0,
            "children": [
                {"attributeId": "0191d8a2-0000-7000-8000-000000000001",
                 "operatorId": "0191d8a2-0000-7000-8000-000000000002",
                 "valueRaw": "50", "order": 0},
                {"boolOp": "Or", "order": 1, "children": []}
            ]
        }"#;
        let node: ExpressionNode = serde_json::from_str(raw).unwrap();
        match node {
            ExpressionNode::Group {
                bool_op, children, ..
            } => {
                assert_eq!(bool_op, BoolOp::And);
                assert_eq!(children.len(), 2);
                assert!(matches!(children[0], ExpressionNode::Clause { .. }));
                assert!(matches!(children[1], ExpressionNode::Group { .. }));
            }
            _ => panic!("expected a group"),
        }
    }

    #[test]
    fn test_incomplete_clause_still_deserializes() {
        let node: ExpressionNode = serde_json::from_str(r#"{"valueRaw": "50"}"#).unwrap();
        match node {
            ExpressionNode::Clause {
                attribute_id,
                operator_id,
                ..
            } => {
                assert!(attribute_id.is_none());
                assert!(operator_id.is_none());
            }
            _ => panic!("expected a clause"),
        }
    }
}
