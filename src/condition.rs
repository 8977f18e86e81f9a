//! Conditional step gating.

use crate::config::EngineConfig;
use crate::context::ExecutionContext;
use crate::error::EngineError;
use crate::resolver::resolve_path;
use crate::step::{ConditionLogic, ConditionOperator, Step};
use serde_json::Value as JsonValue;
use tracing::warn;

/// Renders a value the way string containment sees it.
fn stringify(value: &JsonValue) -> String {
    match value {
        JsonValue::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Evaluates a condition against the execution context.
///
/// The `field` expression is resolved through the variable resolver; an
/// unresolvable field behaves as a missing value (`exists` is false,
/// `equals` compares against null). An unrecognized operator is satisfied by
/// default so an authoring typo does not block the template; with
/// `strict_operators` it fails the step instead.
pub fn evaluate_condition(
    step_id: &str,
    condition: &ConditionLogic,
    ctx: &ExecutionContext,
    config: &EngineConfig,
) -> Result<bool, EngineError> {
    let resolved = resolve_path(&condition.field, ctx);

    let satisfied = match condition.operator {
        ConditionOperator::Exists => !matches!(resolved, None | Some(JsonValue::Null)),
        ConditionOperator::NotExists => matches!(resolved, None | Some(JsonValue::Null)),
        ConditionOperator::Equals => resolved.unwrap_or(JsonValue::Null) == condition.value,
        ConditionOperator::NotEquals => resolved.unwrap_or(JsonValue::Null) != condition.value,
        ConditionOperator::Contains => {
            let haystack = stringify(&resolved.unwrap_or(JsonValue::Null));
            haystack.contains(&stringify(&condition.value))
        }
        ConditionOperator::NotContains => {
            let haystack = stringify(&resolved.unwrap_or(JsonValue::Null));
            !haystack.contains(&stringify(&condition.value))
        }
        ConditionOperator::Unknown => {
            if config.strict_operators {
                return Err(EngineError::UnknownOperator {
                    step_id: step_id.to_string(),
                    operator: ConditionOperator::Unknown.as_str().to_string(),
                });
            }
            warn!(
                step_id = %step_id,
                field = %condition.field,
                "Unknown condition operator, treating condition as satisfied"
            );
            true
        }
    };

    Ok(satisfied)
}

/// Decides whether a step is eligible to run.
///
/// Non-conditional steps are always eligible; a conditional step with no
/// condition logic is treated the same way.
pub fn step_is_eligible(
    step: &Step,
    ctx: &ExecutionContext,
    config: &EngineConfig,
) -> Result<bool, EngineError> {
    if !step.is_conditional {
        return Ok(true);
    }
    match &step.condition_logic {
        Some(condition) => evaluate_condition(&step.id, condition, ctx, config),
        None => Ok(true),
    }
}
