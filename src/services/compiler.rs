//! Authoring compiler
//!
//! Lowers the nested logical-rule tree of a draft request into a flat
//! workflow of named lambda expressions, validating every clause against the
//! attribute and operator catalogs. Per-group failures become warnings and
//! skip that group; the rest of the workflow still compiles.

use plutus_rules::workflow::{Workflow, WorkflowRule};
use uuid::Uuid;

use crate::{
    constants::operators,
    handlers::authoring::request::{BoolOp, ExpressionNode, TierDto},
    models::{AttributeDataType, Catalogs},
};

/// Result of compiling a draft's tiers.
#[derive(Debug)]
pub struct CompiledPromotion {
    pub workflow: Workflow,
    pub warnings: Vec<String>,
}

/// Outcome of compiling one node or group.
enum CompileOutcome {
    Success(String),
    /// The group is left out of the workflow; the reason becomes a warning.
    Skipped(String),
    /// A clause could not even be resolved against the catalogs.
    Abort(String),
}

/// Compiles draft requests against the loaded catalogs.
pub struct PromotionCompiler<'a> {
    catalogs: &'a Catalogs,
}

impl<'a> PromotionCompiler<'a> {
    pub fn new(catalogs: &'a Catalogs) -> Self {
        Self { catalogs }
    }

    /// Name of the workflow compiled for `(promotion, country)`.
    pub fn workflow_name(promotion_id: Uuid, country_iso: &str) -> String {
        format!(
            "promo:{}:country:{}",
            promotion_id,
            country_iso.to_uppercase()
        )
    }

    /// Compile all tiers of a draft into one workflow.
    ///
    /// Tiers are processed by `(tier_level, order)`, groups by `order`; one
    /// rule per (tier × group) named `tier:{level}:group:{order}`.
    pub fn compile(
        &self,
        promotion_id: Uuid,
        country_iso: &str,
        tiers: &[TierDto],
    ) -> CompiledPromotion {
        let mut warnings = Vec::new();
        let mut rules = Vec::new();

        let mut sorted_tiers: Vec<&TierDto> = tiers.iter().collect();
        sorted_tiers.sort_by_key(|t| (t.tier_level, t.order));

        for tier in sorted_tiers {
            let mut groups: Vec<_> = tier.groups.iter().collect();
            groups.sort_by_key(|g| g.order);

            for group in groups {
                let rule_name = format!("tier:{}:group:{}", tier.tier_level, group.order);

                let root = match &group.expression {
                    Some(node) => node,
                    None => {
                        warnings.push(format!("{}: empty root expression", rule_name));
                        continue;
                    }
                };

                match self.compile_node(root, &rule_name, &mut warnings) {
                    CompileOutcome::Success(expression) => {
                        rules.push(WorkflowRule::new(
                            rule_name.clone(),
                            format!("{}:{}", tier.tier_level, group.order),
                            expression,
                        ));
                    }
                    CompileOutcome::Skipped(reason) | CompileOutcome::Abort(reason) => {
                        warnings.push(format!("{}: {}", rule_name, reason));
                    }
                }
            }
        }

        CompiledPromotion {
            workflow: Workflow::new(Self::workflow_name(promotion_id, country_iso), rules),
            warnings,
        }
    }

    fn compile_node(
        &self,
        node: &ExpressionNode,
        rule_name: &str,
        warnings: &mut Vec<String>,
    ) -> CompileOutcome {
        match node {
            ExpressionNode::Group {
                bool_op, children, ..
            } => self.compile_group(*bool_op, children, rule_name, warnings),
            ExpressionNode::Clause {
                attribute_id,
                operator_id,
                value_raw,
                ..
            } => self.compile_clause(
                *attribute_id,
                *operator_id,
                value_raw.as_deref(),
                rule_name,
                warnings,
            ),
        }
    }

    fn compile_group(
        &self,
        bool_op: BoolOp,
        children: &[ExpressionNode],
        rule_name: &str,
        warnings: &mut Vec<String>,
    ) -> CompileOutcome {
        // An empty group always fires.
        if children.is_empty() {
            return CompileOutcome::Success("true".to_string());
        }

        let mut ordered: Vec<&ExpressionNode> = children.iter().collect();
        ordered.sort_by_key(|c| c.order());

        let mut parts = Vec::with_capacity(ordered.len());
        for child in ordered {
            match self.compile_node(child, rule_name, warnings) {
                CompileOutcome::Success(expr) => parts.push(expr),
                failure => return failure,
            }
        }

        let connective = match bool_op {
            BoolOp::And => " && ",
            BoolOp::Or => " || ",
        };
        CompileOutcome::Success(format!("({})", parts.join(connective)))
    }

    fn compile_clause(
        &self,
        attribute_id: Option<Uuid>,
        operator_id: Option<Uuid>,
        value_raw: Option<&str>,
        rule_name: &str,
        warnings: &mut Vec<String>,
    ) -> CompileOutcome {
        let (attribute_id, operator_id, value_raw) = match (attribute_id, operator_id, value_raw)
        {
            (Some(a), Some(o), Some(v)) => (a, o, v),
            _ => return CompileOutcome::Skipped("clause is missing fields".to_string()),
        };

        let attribute = match self.catalogs.attribute(attribute_id) {
            Some(a) => a,
            None => {
                return CompileOutcome::Abort(format!("unknown attribute {}", attribute_id))
            }
        };
        let operator = match self.catalogs.operator(operator_id) {
            Some(o) => o,
            None => return CompileOutcome::Abort(format!("unknown operator {}", operator_id)),
        };

        let data_type = match attribute.parsed_data_type() {
            Ok(dt) => dt,
            Err(e) => return CompileOutcome::Abort(e),
        };

        // A combination the catalog does not declare is a warning, not a
        // failure; the type-directed lowering below still decides.
        if !self
            .catalogs
            .operator_supports(operator_id, &attribute.data_type)
        {
            warnings.push(format!(
                "{}: operator '{}' is not declared for data type '{}'",
                rule_name, operator.code, attribute.data_type
            ));
        }

        let field = attribute.context_field();
        let op_code = operator.code.as_str();

        match data_type {
            AttributeDataType::Number => {
                let symbol = match binary_symbol(op_code) {
                    Some(s) => s,
                    None => {
                        return CompileOutcome::Skipped(format!(
                            "operator '{}' is not supported for numbers",
                            op_code
                        ))
                    }
                };
                let value: f64 = match value_raw.trim().parse() {
                    Ok(v) => v,
                    Err(_) => {
                        return CompileOutcome::Skipped(format!(
                            "'{}' is not a number",
                            value_raw
                        ))
                    }
                };
                CompileOutcome::Success(format!("ctx.{} {} {}", field, symbol, value))
            }
            AttributeDataType::Bool => {
                let symbol = match binary_symbol(op_code) {
                    Some(s) => s,
                    None => {
                        return CompileOutcome::Skipped(format!(
                            "operator '{}' is not supported for booleans",
                            op_code
                        ))
                    }
                };
                let literal = match value_raw.trim().to_ascii_lowercase().as_str() {
                    "true" => "true",
                    "false" => "false",
                    _ => {
                        return CompileOutcome::Skipped(format!(
                            "'{}' is not a boolean",
                            value_raw
                        ))
                    }
                };
                CompileOutcome::Success(format!("ctx.{} {} {}", field, symbol, literal))
            }
            AttributeDataType::Date => {
                let symbol = match binary_symbol(op_code) {
                    Some(s) => s,
                    None => {
                        return CompileOutcome::Skipped(format!(
                            "operator '{}' is not supported for dates",
                            op_code
                        ))
                    }
                };
                if chrono::DateTime::parse_from_rfc3339(value_raw.trim()).is_err() {
                    return CompileOutcome::Skipped(format!(
                        "'{}' is not an ISO datetime",
                        value_raw
                    ));
                }
                CompileOutcome::Success(format!(
                    "ctx.{} {} parseDateTime({})",
                    field,
                    symbol,
                    quote(value_raw.trim())
                ))
            }
            AttributeDataType::String => match op_code {
                operators::EQ => {
                    CompileOutcome::Success(format!("ctx.{} == {}", field, quote(value_raw)))
                }
                operators::CONTAINS => CompileOutcome::Success(format!(
                    "ctx.{}.Contains({})",
                    field,
                    quote(value_raw)
                )),
                other => CompileOutcome::Skipped(format!(
                    "operator '{}' is not supported for strings",
                    other
                )),
            },
            AttributeDataType::StringArray => match op_code {
                operators::IN => CompileOutcome::Success(format!(
                    "ctx.{}.Contains({})",
                    field,
                    quote(value_raw)
                )),
                other => CompileOutcome::Skipped(format!(
                    "operator '{}' is not supported for string arrays",
                    other
                )),
            },
            AttributeDataType::Guid | AttributeDataType::NumberArray => {
                CompileOutcome::Skipped(format!(
                    "no compiled form for data type '{}'",
                    attribute.data_type
                ))
            }
        }
    }
}

/// Map an operator code to its binary comparison symbol.
fn binary_symbol(op_code: &str) -> Option<&'static str> {
    match op_code {
        operators::GT => Some(">"),
        operators::GTE => Some(">="),
        operators::LT => Some("<"),
        operators::LTE => Some("<="),
        operators::EQ => Some("=="),
        operators::NEQ => Some("!="),
        _ => None,
    }
}

/// Quote a string literal, escaping backslashes and quotes.
fn quote(raw: &str) -> String {
    format!("\"{}\"", raw.replace('\\', "\\\\").replace('"', "\\\""))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::authoring::request::GroupDto;
    use crate::models::Catalogs;
    use crate::test_utils::catalog_fixture;

    fn clause(catalogs: &Catalogs, attr: &str, op: &str, value: &str, order: i32) -> ExpressionNode {
        ExpressionNode::Clause {
            attribute_id: Some(catalog_fixture::attribute_id(catalogs, attr)),
            operator_id: Some(catalog_fixture::operator_id(catalogs, op)),
            value_raw: Some(value.to_string()),
            order,
        }
    }

    fn single_group_tiers(expression: ExpressionNode) -> Vec<TierDto> {
        vec![TierDto {
            tier_level: 1,
            order: 0,
            cooldown_days: None,
            groups: vec![GroupDto {
                order: 0,
                reward_ids: vec![],
                expression: Some(expression),
            }],
        }]
    }

    fn compile(catalogs: &Catalogs, tiers: &[TierDto]) -> CompiledPromotion {
        let compiler = PromotionCompiler::new(catalogs);
        compiler.compile(Uuid::nil(), "es", tiers)
    }

    #[test]
    fn test_workflow_name_uppercases_country() {
        let id = Uuid::nil();
        assert_eq!(
            PromotionCompiler::workflow_name(id, "es"),
            format!("promo:{}:country:ES", id)
        );
    }

    #[test]
    fn test_and_group_compiles_with_parens() {
        let catalogs = catalog_fixture::catalogs();
        let tree = ExpressionNode::Group {
            bool_op: BoolOp::And,
            order: 0,
            children: vec![
                clause(&catalogs, "gasto", "gt", "50", 0),
                clause(&catalogs, "club", "eq", "gold", 1),
            ],
        };
        let compiled = compile(&catalogs, &single_group_tiers(tree));

        assert_eq!(compiled.warnings, Vec::<String>::new());
        assert_eq!(compiled.workflow.rules.len(), 1);
        assert_eq!(
            compiled.workflow.rules[0].expression,
            r#"(ctx.gasto > 50 && ctx.club == "gold")"#
        );
        assert_eq!(compiled.workflow.rules[0].rule_name, "tier:1:group:0");
        assert_eq!(compiled.workflow.rules[0].success_event, "1:0");
    }

    #[test]
    fn test_children_ordered_by_order_field() {
        let catalogs = catalog_fixture::catalogs();
        let tree = ExpressionNode::Group {
            bool_op: BoolOp::Or,
            order: 0,
            children: vec![
                clause(&catalogs, "club", "eq", "gold", 5),
                clause(&catalogs, "gasto", "gt", "50", 1),
            ],
        };
        let compiled = compile(&catalogs, &single_group_tiers(tree));

        assert_eq!(
            compiled.workflow.rules[0].expression,
            r#"(ctx.gasto > 50 || ctx.club == "gold")"#
        );
    }

    #[test]
    fn test_nested_groups_preserve_precedence() {
        let catalogs = catalog_fixture::catalogs();
        let tree = ExpressionNode::Group {
            bool_op: BoolOp::And,
            order: 0,
            children: vec![
                clause(&catalogs, "esVip", "eq", "true", 0),
                ExpressionNode::Group {
                    bool_op: BoolOp::Or,
                    order: 1,
                    children: vec![
                        clause(&catalogs, "gasto", "gte", "100", 0),
                        clause(&catalogs, "club", "eq", "gold", 1),
                    ],
                },
            ],
        };
        let compiled = compile(&catalogs, &single_group_tiers(tree));

        assert_eq!(
            compiled.workflow.rules[0].expression,
            r#"(ctx.esVip == true && (ctx.gasto >= 100 || ctx.club == "gold"))"#
        );
    }

    #[test]
    fn test_empty_group_compiles_to_true() {
        let catalogs = catalog_fixture::catalogs();
        let tree = ExpressionNode::Group {
            bool_op: BoolOp::And,
            order: 0,
            children: vec![],
        };
        let compiled = compile(&catalogs, &single_group_tiers(tree));

        assert_eq!(compiled.workflow.rules[0].expression, "true");
    }

    #[test]
    fn test_contains_on_number_attribute_skips_group() {
        let catalogs = catalog_fixture::catalogs();
        let compiled = compile(
            &catalogs,
            &single_group_tiers(clause(&catalogs, "gasto", "contains", "5", 0)),
        );

        assert!(compiled.workflow.rules.is_empty());
        assert_eq!(compiled.warnings.len(), 2);
        assert!(compiled
            .warnings
            .iter()
            .any(|w| w.contains("not supported for numbers")));
    }

    #[test]
    fn test_unknown_attribute_aborts_group() {
        let catalogs = catalog_fixture::catalogs();
        let tree = ExpressionNode::Clause {
            attribute_id: Some(Uuid::new_v4()),
            operator_id: Some(catalog_fixture::operator_id(&catalogs, "eq")),
            value_raw: Some("x".to_string()),
            order: 0,
        };
        let compiled = compile(&catalogs, &single_group_tiers(tree));

        assert!(compiled.workflow.rules.is_empty());
        assert!(compiled.warnings[0].contains("unknown attribute"));
    }

    #[test]
    fn test_missing_clause_fields_skip_group() {
        let catalogs = catalog_fixture::catalogs();
        let tree = ExpressionNode::Clause {
            attribute_id: None,
            operator_id: None,
            value_raw: None,
            order: 0,
        };
        let compiled = compile(&catalogs, &single_group_tiers(tree));

        assert!(compiled.workflow.rules.is_empty());
        assert!(compiled.warnings[0].contains("missing fields"));
    }

    #[test]
    fn test_missing_root_expression_skips_group() {
        let catalogs = catalog_fixture::catalogs();
        let tiers = vec![TierDto {
            tier_level: 1,
            order: 0,
            cooldown_days: None,
            groups: vec![GroupDto {
                order: 0,
                reward_ids: vec![],
                expression: None,
            }],
        }];
        let compiled = compile(&catalogs, &tiers);

        assert!(compiled.workflow.rules.is_empty());
        assert!(compiled.warnings[0].contains("empty root expression"));
    }

    #[test]
    fn test_undeclared_operator_type_combination_warns_but_compiles() {
        // `gt` is not declared for booleans in the fixture matrix, but the
        // type-directed lowering still accepts the binary mapping.
        let catalogs = catalog_fixture::catalogs();
        let compiled = compile(
            &catalogs,
            &single_group_tiers(clause(&catalogs, "esVip", "gt", "true", 0)),
        );

        assert_eq!(compiled.workflow.rules.len(), 1);
        assert_eq!(compiled.workflow.rules[0].expression, "ctx.esVip > true");
        assert!(compiled
            .warnings
            .iter()
            .any(|w| w.contains("not declared for data type 'bool'")));
    }

    #[test]
    fn test_one_failed_group_does_not_stop_others() {
        let catalogs = catalog_fixture::catalogs();
        let tiers = vec![TierDto {
            tier_level: 1,
            order: 0,
            cooldown_days: None,
            groups: vec![
                GroupDto {
                    order: 0,
                    reward_ids: vec![],
                    expression: Some(clause(&catalogs, "gasto", "contains", "5", 0)),
                },
                GroupDto {
                    order: 1,
                    reward_ids: vec![],
                    expression: Some(clause(&catalogs, "gasto", "gt", "50", 0)),
                },
            ],
        }];
        let compiled = compile(&catalogs, &tiers);

        assert_eq!(compiled.workflow.rules.len(), 1);
        assert_eq!(compiled.workflow.rules[0].rule_name, "tier:1:group:1");
    }

    #[test]
    fn test_string_array_in_and_date_forms() {
        let catalogs = catalog_fixture::catalogs();
        let in_clause = compile(
            &catalogs,
            &single_group_tiers(clause(&catalogs, "tags", "in", "vip", 0)),
        );
        assert_eq!(
            in_clause.workflow.rules[0].expression,
            r#"ctx.tags.Contains("vip")"#
        );

        let date_clause = compile(
            &catalogs,
            &single_group_tiers(clause(&catalogs, "since", "gte", "2024-01-01T00:00:00Z", 0)),
        );
        assert_eq!(
            date_clause.workflow.rules[0].expression,
            r#"ctx.since >= parseDateTime("2024-01-01T00:00:00Z")"#
        );
    }

    #[test]
    fn test_string_escaping() {
        let catalogs = catalog_fixture::catalogs();
        let compiled = compile(
            &catalogs,
            &single_group_tiers(clause(&catalogs, "club", "eq", r#"go"ld\"#, 0)),
        );
        assert_eq!(
            compiled.workflow.rules[0].expression,
            r#"ctx.club == "go\"ld\\""#
        );
    }

    #[tokio::test]
    async fn test_compiled_clause_fires_in_engine() {
        use plutus_rules::prelude::*;
        use std::time::Duration;

        let catalogs = catalog_fixture::catalogs();
        let tree = ExpressionNode::Group {
            bool_op: BoolOp::And,
            order: 0,
            children: vec![clause(&catalogs, "gasto", "gt", "50", 0)],
        };
        let compiled = compile(&catalogs, &single_group_tiers(tree));
        assert!(compiled.warnings.is_empty());

        let engine = WorkflowEngine::new(16, Duration::from_millis(250));
        let matching = context_from_json(&serde_json::json!({"gasto": 60}));
        let missing = context_from_json(&serde_json::json!({"gasto": 40}));

        assert!(engine
            .evaluate(&compiled.workflow, "tier:1:group:0", &matching)
            .await
            .unwrap());
        assert!(!engine
            .evaluate(&compiled.workflow, "tier:1:group:0", &missing)
            .await
            .unwrap());
    }

    #[test]
    fn test_tiers_ordered_by_level_then_order() {
        let catalogs = catalog_fixture::catalogs();
        let tiers = vec![
            TierDto {
                tier_level: 2,
                order: 0,
                cooldown_days: None,
                groups: vec![GroupDto {
                    order: 0,
                    reward_ids: vec![],
                    expression: Some(clause(&catalogs, "gasto", "gt", "100", 0)),
                }],
            },
            TierDto {
                tier_level: 1,
                order: 0,
                cooldown_days: None,
                groups: vec![GroupDto {
                    order: 0,
                    reward_ids: vec![],
                    expression: Some(clause(&catalogs, "gasto", "gt", "50", 0)),
                }],
            },
        ];
        let compiled = compile(&catalogs, &tiers);

        let names: Vec<_> = compiled
            .workflow
            .rules
            .iter()
            .map(|r| r.rule_name.as_str())
            .collect();
        assert_eq!(names, vec!["tier:1:group:0", "tier:2:group:0"]);
    }
}
