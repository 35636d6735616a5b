//! Evaluation context.

use std::collections::HashMap;

use serde_json::Value as JsonValue;

/// Flat field→value map the rule expressions read through `ctx.<field>`.
pub type EvalContext = HashMap<String, JsonValue>;

/// Build an evaluation context from a JSON object.
///
/// Non-object values yield an empty context; rules over missing fields then
/// fail closed at evaluation time.
pub fn context_from_json(value: &JsonValue) -> EvalContext {
    match value {
        JsonValue::Object(map) => map.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
        _ => EvalContext::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_context_from_object() {
        let ctx = context_from_json(&json!({"gasto": 60, "club": "gold"}));
        assert_eq!(ctx.get("gasto"), Some(&json!(60)));
        assert_eq!(ctx.get("club"), Some(&json!("gold")));
    }

    #[test]
    fn test_context_from_non_object_is_empty() {
        assert!(context_from_json(&json!(42)).is_empty());
        assert!(context_from_json(&json!(null)).is_empty());
    }
}
