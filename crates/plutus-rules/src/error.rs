//! Engine error types.

use thiserror::Error;

/// Errors produced while parsing or evaluating rule expressions.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Rule '{rule}' not found in workflow '{workflow}'")]
    RuleNotFound { workflow: String, rule: String },

    #[error("Context field '{0}' is missing")]
    MissingField(String),

    #[error("Type error: {0}")]
    Type(String),

    #[error("Rule evaluation timed out after {0}ms")]
    Timeout(u64),

    #[error("Evaluation task failed: {0}")]
    Internal(String),
}
