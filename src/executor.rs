//! Per-step execution: condition gate, template resolution, input building,
//! generation dispatch, output extraction.

use crate::capability::{GenerationCapability, GenerationRequest, TemplateStore, TraceTag};
use crate::condition::step_is_eligible;
use crate::config::EngineConfig;
use crate::context::ExecutionContext;
use crate::error::EngineError;
use crate::resolver::{extract_path, resolve_template};
use crate::step::{Step, StepSource};
use serde_json::{Map, Value as JsonValue, json};
use std::sync::Arc;
use tracing::{debug, info};

/// The result a single step hands back to the orchestrator.
#[derive(Debug, Clone, PartialEq)]
pub struct StepOutcome {
    pub step_id: String,
    pub output: JsonValue,
}

/// Executes individual steps against the external collaborators.
///
/// The executor never mutates shared state: it reads a context snapshot and
/// returns the outcome for the orchestrator to fold in between batches.
pub struct StepExecutor {
    generation: Arc<dyn GenerationCapability>,
    templates: Arc<dyn TemplateStore>,
    config: EngineConfig,
    settings: Option<JsonValue>,
}

impl StepExecutor {
    pub fn new(
        generation: Arc<dyn GenerationCapability>,
        templates: Arc<dyn TemplateStore>,
        config: EngineConfig,
        settings: Option<JsonValue>,
    ) -> Self {
        Self {
            generation,
            templates,
            config,
            settings,
        }
    }

    /// The engine configuration this executor runs under.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Runs one step against a read-only context snapshot.
    ///
    /// A step whose condition is not satisfied short-circuits to
    /// `{"skipped": true, "reason": "condition_not_met"}` without touching the
    /// template store or the generation capability. Any collaborator failure
    /// is fatal to the step and therefore to the run.
    pub async fn execute(
        &self,
        step: &Step,
        ctx: &ExecutionContext,
    ) -> Result<StepOutcome, EngineError> {
        if !step_is_eligible(step, ctx, &self.config)? {
            info!(step_id = %step.id, "Condition not met, skipping step");
            return Ok(StepOutcome {
                step_id: step.id.clone(),
                output: json!({"skipped": true, "reason": "condition_not_met"}),
            });
        }

        let template_data = self.resolve_template_payload(step).await?;
        let input = self.build_input(step, ctx)?;

        debug!(step_id = %step.id, params = input.len(), "Dispatching generation call");
        let request = GenerationRequest {
            template_data,
            input,
            settings: self.settings.clone(),
            trace: TraceTag {
                step_id: step.id.clone(),
                step_name: step.name.clone(),
                parent_template: ctx.template_id.clone(),
            },
        };

        let response = self
            .generation
            .invoke(request)
            .await
            .map_err(|e| EngineError::step_failed(&step.id, e))?;

        let output = if step.output_mapping.is_empty() {
            response.content
        } else {
            let raw = response.as_value();
            let mut mapped = Map::new();
            for (key, path) in &step.output_mapping {
                mapped.insert(key.clone(), extract_path(&raw, path));
            }
            JsonValue::Object(mapped)
        };

        Ok(StepOutcome {
            step_id: step.id.clone(),
            output,
        })
    }

    /// Resolves the template payload this step executes.
    async fn resolve_template_payload(&self, step: &Step) -> Result<JsonValue, EngineError> {
        match &step.source {
            StepSource::Inline(data) => Ok(data.clone()),
            StepSource::Reference(template_ref) => {
                let stored = self
                    .templates
                    .get(template_ref)
                    .await
                    .map_err(|e| EngineError::step_failed(&step.id, e))?
                    .ok_or_else(|| {
                        EngineError::step_failed(
                            &step.id,
                            format!("referenced template not found: {template_ref}"),
                        )
                    })?;

                stored.template_data.ok_or_else(|| {
                    EngineError::step_failed(
                        &step.id,
                        format!("referenced template has no payload: {template_ref}"),
                    )
                })
            }
        }
    }

    /// Resolves every input mapping entry through the variable resolver.
    fn build_input(
        &self,
        step: &Step,
        ctx: &ExecutionContext,
    ) -> Result<Map<String, JsonValue>, EngineError> {
        let mut input = Map::new();
        for (param, template) in &step.input_mapping {
            let value = resolve_template(template, ctx, self.config.strict_variables).map_err(
                |unresolved| EngineError::UnresolvedVariable {
                    step_id: step.id.clone(),
                    expression: unresolved.expression,
                },
            )?;
            input.insert(param.clone(), value);
        }
        Ok(input)
    }
}
