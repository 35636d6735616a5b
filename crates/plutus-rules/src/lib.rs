//! Workflow rule engine for compiled promotion rules.
//!
//! A workflow is a flat list of named boolean rules, each holding a lambda
//! expression over a `ctx` variable (`ctx.gasto > 50 && ctx.club == "gold"`).
//! This crate parses those expressions into an AST, evaluates them against a
//! JSON evaluation context, and keeps a bounded cache of compiled workflows
//! keyed by content hash.
//!
//! # Example
//!
//! ```ignore
//! use plutus_rules::prelude::*;
//!
//! let engine = WorkflowEngine::new(256, Duration::from_millis(250));
//! let fired = engine.evaluate(&workflow, "tier:1:group:0", &ctx).await?;
//! ```

pub mod context;
pub mod engine;
pub mod error;
pub mod eval;
pub mod parser;
pub mod token;
pub mod workflow;

/// Prelude module - import everything you need with `use plutus_rules::prelude::*`
pub mod prelude {
    pub use crate::context::{context_from_json, EvalContext};
    pub use crate::engine::WorkflowEngine;
    pub use crate::error::EngineError;
    pub use crate::eval::evaluate_rule;
    pub use crate::parser::parse_expression;
    pub use crate::workflow::{Workflow, WorkflowRule, LAMBDA_EXPRESSION};
}
