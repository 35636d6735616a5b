//! Workflow wire model.
//!
//! The authoring compiler produces this shape and it is what gets persisted
//! and cached, so the JSON field names are part of the wire contract.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// The only expression type the engine currently understands.
pub const LAMBDA_EXPRESSION: &str = "LambdaExpression";

/// A compiled promotion workflow: a flat list of named boolean rules.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct Workflow {
    pub workflow_name: String,
    pub rules: Vec<WorkflowRule>,
}

/// One rule inside a workflow.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct WorkflowRule {
    pub rule_name: String,
    pub success_event: String,
    pub rule_expression_type: String,
    pub expression: String,
}

impl WorkflowRule {
    pub fn new(
        rule_name: impl Into<String>,
        success_event: impl Into<String>,
        expression: impl Into<String>,
    ) -> Self {
        Self {
            rule_name: rule_name.into(),
            success_event: success_event.into(),
            rule_expression_type: LAMBDA_EXPRESSION.to_string(),
            expression: expression.into(),
        }
    }
}

impl Workflow {
    pub fn new(workflow_name: impl Into<String>, rules: Vec<WorkflowRule>) -> Self {
        Self {
            workflow_name: workflow_name.into(),
            rules,
        }
    }

    /// Look up a rule by name.
    pub fn rule(&self, rule_name: &str) -> Option<&WorkflowRule> {
        self.rules.iter().find(|r| r.rule_name == rule_name)
    }

    /// Content hash of the workflow, used as the compiled-cache key.
    ///
    /// Hashes the serialized form so two workflows with identical names but
    /// different rule bodies never collide in the cache.
    pub fn content_hash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.workflow_name.as_bytes());
        for rule in &self.rules {
            hasher.update(rule.rule_name.as_bytes());
            hasher.update(rule.expression.as_bytes());
        }
        let digest = hasher.finalize();
        let mut out = String::with_capacity(digest.len() * 2);
        for byte in digest {
            out.push_str(&format!("{:02x}", byte));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_shape_is_pascal_case() {
        let wf = Workflow::new(
            "promo:p1:country:ES",
            vec![WorkflowRule::new("tier:1:group:0", "1:0", "ctx.gasto > 50")],
        );

        let json = serde_json::to_value(&wf).unwrap();
        assert_eq!(json["WorkflowName"], "promo:p1:country:ES");
        assert_eq!(json["Rules"][0]["RuleName"], "tier:1:group:0");
        assert_eq!(json["Rules"][0]["SuccessEvent"], "1:0");
        assert_eq!(json["Rules"][0]["RuleExpressionType"], "LambdaExpression");
        assert_eq!(json["Rules"][0]["Expression"], "ctx.gasto > 50");
    }

    #[test]
    fn test_content_hash_changes_with_expression() {
        let a = Workflow::new(
            "promo:p1:country:ES",
            vec![WorkflowRule::new("tier:1:group:0", "1:0", "ctx.gasto > 50")],
        );
        let mut b = a.clone();
        b.rules[0].expression = "ctx.gasto > 60".to_string();

        assert_ne!(a.content_hash(), b.content_hash());
        assert_eq!(a.content_hash(), a.clone().content_hash());
    }

    #[test]
    fn test_roundtrip() {
        let wf = Workflow::new(
            "promo:p1:country:ES",
            vec![WorkflowRule::new("tier:2:group:1", "2:1", "ctx.esVip == true")],
        );
        let json = serde_json::to_string(&wf).unwrap();
        let back: Workflow = serde_json::from_str(&json).unwrap();
        assert_eq!(wf, back);
    }
}
