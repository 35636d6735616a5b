//! Workflow engine with a bounded compiled-workflow cache.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use crate::context::EvalContext;
use crate::error::EngineError;
use crate::eval::evaluate_rule;
use crate::parser::{parse_expression, Expr};
use crate::workflow::Workflow;

/// A workflow compiled to parsed rule expressions.
struct CompiledWorkflow {
    rules: HashMap<String, Arc<Expr>>,
}

impl CompiledWorkflow {
    fn compile(workflow: &Workflow) -> Self {
        let mut rules = HashMap::with_capacity(workflow.rules.len());
        for rule in &workflow.rules {
            match parse_expression(&rule.expression) {
                Ok(expr) => {
                    rules.insert(rule.rule_name.clone(), Arc::new(expr));
                }
                Err(e) => {
                    // An unparseable rule is simply absent; evaluating it
                    // reports RuleNotFound and the caller treats it as
                    // non-matching.
                    tracing::warn!(
                        workflow = %workflow.workflow_name,
                        rule = %rule.rule_name,
                        "Skipping unparseable rule expression: {}",
                        e
                    );
                }
            }
        }
        Self { rules }
    }
}

struct EngineCache {
    compiled: HashMap<String, Arc<CompiledWorkflow>>,
    /// Insertion order, oldest first. Eviction is best-effort, not strict LRU.
    order: VecDeque<String>,
}

/// Evaluates named rules of compiled workflows against JSON contexts.
///
/// Compiled workflows are cached by content hash; the cache holds at most
/// `cap` entries, evicting the oldest insertions.
pub struct WorkflowEngine {
    cap: usize,
    rule_timeout: Duration,
    cache: RwLock<EngineCache>,
}

impl WorkflowEngine {
    pub fn new(cap: usize, rule_timeout: Duration) -> Self {
        Self {
            cap: cap.max(1),
            rule_timeout,
            cache: RwLock::new(EngineCache {
                compiled: HashMap::new(),
                order: VecDeque::new(),
            }),
        }
    }

    /// Evaluate one named rule of a workflow against a context.
    ///
    /// The rule body runs on the blocking pool under the per-rule timeout.
    pub async fn evaluate(
        &self,
        workflow: &Workflow,
        rule_name: &str,
        ctx: &EvalContext,
    ) -> Result<bool, EngineError> {
        let compiled = self.get_or_compile(workflow);
        let expr = compiled
            .rules
            .get(rule_name)
            .cloned()
            .ok_or_else(|| EngineError::RuleNotFound {
                workflow: workflow.workflow_name.clone(),
                rule: rule_name.to_string(),
            })?;

        let ctx = ctx.clone();
        let handle = tokio::task::spawn_blocking(move || evaluate_rule(&expr, &ctx));
        match tokio::time::timeout(self.rule_timeout, handle).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_err)) => Err(EngineError::Internal(join_err.to_string())),
            Err(_) => Err(EngineError::Timeout(self.rule_timeout.as_millis() as u64)),
        }
    }

    /// Number of compiled workflows currently cached.
    pub fn cached_workflows(&self) -> usize {
        self.cache.read().map(|c| c.compiled.len()).unwrap_or(0)
    }

    fn get_or_compile(&self, workflow: &Workflow) -> Arc<CompiledWorkflow> {
        let hash = workflow.content_hash();

        if let Ok(cache) = self.cache.read() {
            if let Some(found) = cache.compiled.get(&hash) {
                return found.clone();
            }
        }

        let compiled = Arc::new(CompiledWorkflow::compile(workflow));
        if let Ok(mut cache) = self.cache.write() {
            // Another request may have compiled it while we were parsing.
            if let Some(found) = cache.compiled.get(&hash) {
                return found.clone();
            }
            cache.compiled.insert(hash.clone(), compiled.clone());
            cache.order.push_back(hash);
            while cache.compiled.len() > self.cap {
                if let Some(oldest) = cache.order.pop_front() {
                    cache.compiled.remove(&oldest);
                } else {
                    break;
                }
            }
        }
        compiled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::context_from_json;
    use crate::workflow::WorkflowRule;
    use serde_json::json;

    fn engine() -> WorkflowEngine {
        WorkflowEngine::new(4, Duration::from_millis(250))
    }

    fn one_rule_workflow(name: &str, expression: &str) -> Workflow {
        Workflow::new(
            name,
            vec![WorkflowRule::new("tier:1:group:0", "1:0", expression)],
        )
    }

    #[tokio::test]
    async fn test_evaluate_fires_on_match() {
        let wf = one_rule_workflow("promo:p1:country:ES", "ctx.gasto > 50");
        let ctx = context_from_json(&json!({"gasto": 60}));

        let fired = engine().evaluate(&wf, "tier:1:group:0", &ctx).await.unwrap();
        assert!(fired);
    }

    #[tokio::test]
    async fn test_unknown_rule_is_not_found() {
        let wf = one_rule_workflow("promo:p1:country:ES", "true");
        let ctx = EvalContext::new();

        let err = engine().evaluate(&wf, "tier:9:group:9", &ctx).await;
        assert!(matches!(err, Err(EngineError::RuleNotFound { .. })));
    }

    #[tokio::test]
    async fn test_unparseable_rule_reports_not_found() {
        let wf = one_rule_workflow("promo:p1:country:ES", "ctx.gasto >");
        let ctx = EvalContext::new();

        let err = engine().evaluate(&wf, "tier:1:group:0", &ctx).await;
        assert!(matches!(err, Err(EngineError::RuleNotFound { .. })));
    }

    #[tokio::test]
    async fn test_cache_reuses_compiled_workflow() {
        let engine = engine();
        let wf = one_rule_workflow("promo:p1:country:ES", "ctx.gasto > 50");
        let ctx = context_from_json(&json!({"gasto": 60}));

        engine.evaluate(&wf, "tier:1:group:0", &ctx).await.unwrap();
        engine.evaluate(&wf, "tier:1:group:0", &ctx).await.unwrap();
        assert_eq!(engine.cached_workflows(), 1);
    }

    #[tokio::test]
    async fn test_cache_evicts_oldest_beyond_cap() {
        let engine = WorkflowEngine::new(2, Duration::from_millis(250));
        let ctx = context_from_json(&json!({"gasto": 60}));

        for i in 0..3 {
            let wf = one_rule_workflow(&format!("promo:p{}:country:ES", i), "ctx.gasto > 50");
            engine.evaluate(&wf, "tier:1:group:0", &ctx).await.unwrap();
        }
        assert_eq!(engine.cached_workflows(), 2);
    }
}
