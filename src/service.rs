//! The "execute composite template" operation: the single entry point the
//! surrounding application calls.
//!
//! The service validates the request, drives the orchestrator, combines the
//! outputs, and persists the resulting artifact. Everything external (auth,
//! template storage, generation, persistence) stays behind collaborator
//! traits.

use crate::capability::{
    ArtifactDraft, ArtifactRecord, GenerationCapability, PersistenceSink, StoredTemplate,
    TemplateStore,
};
use crate::combiner::combine_outputs;
use crate::config::EngineConfig;
use crate::context::ExecutionContext;
use crate::error::EngineError;
use crate::executor::StepExecutor;
use crate::orchestrator::Orchestrator;
use crate::step::{FinalOutput, OutputFormat};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue, json};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, info, info_span};

/// Authenticated caller identity, established by the surrounding
/// application's auth layer before the engine is invoked.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Caller {
    pub user_id: String,
}

impl Caller {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
        }
    }
}

/// The execute-composite-template request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecuteRequest {
    pub template_id: String,
    #[serde(default)]
    pub user_inputs: Map<String, JsonValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<JsonValue>,
}

/// The success response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecuteResponse {
    pub success: bool,
    /// The persisted artifact record.
    pub content: ArtifactRecord,
    /// Extracted output per step id.
    pub step_outputs: Map<String, JsonValue>,
    /// The batch plan that was executed.
    pub execution_plan: Vec<Vec<String>>,
    /// The combined artifact per the template's combine strategy.
    pub combined_output: JsonValue,
}

/// Executes composite templates end to end.
pub struct CompositeTemplateService {
    templates: Arc<dyn TemplateStore>,
    generation: Arc<dyn GenerationCapability>,
    sink: Arc<dyn PersistenceSink>,
    config: EngineConfig,
}

impl CompositeTemplateService {
    pub fn new(
        templates: Arc<dyn TemplateStore>,
        generation: Arc<dyn GenerationCapability>,
        sink: Arc<dyn PersistenceSink>,
    ) -> Self {
        Self::with_config(templates, generation, sink, EngineConfig::default())
    }

    pub fn with_config(
        templates: Arc<dyn TemplateStore>,
        generation: Arc<dyn GenerationCapability>,
        sink: Arc<dyn PersistenceSink>,
        config: EngineConfig,
    ) -> Self {
        Self {
            templates,
            generation,
            sink,
            config,
        }
    }

    /// Executes a composite template for an authenticated caller.
    ///
    /// Fails with `Unauthorized` before any planning when no caller identity
    /// is supplied. Template-level validation (existence, compositeness,
    /// non-empty step list) also happens before planning; any step failure
    /// after that aborts the run with no partial result persisted.
    pub async fn execute(
        &self,
        caller: Option<&Caller>,
        request: ExecuteRequest,
        cancellation_token: CancellationToken,
    ) -> Result<ExecuteResponse, EngineError> {
        let caller = caller.ok_or(EngineError::Unauthorized)?;

        let span = info_span!(
            "execute_composite_template",
            template_id = %request.template_id,
            user_id = %caller.user_id,
        );

        async {
            let template = self.load_composite(&request.template_id).await?;

            let ctx = ExecutionContext::new(
                template.id.clone(),
                caller.user_id.clone(),
                request.user_inputs,
            );

            let executor = StepExecutor::new(
                Arc::clone(&self.generation),
                Arc::clone(&self.templates),
                self.config.clone(),
                request.settings,
            );
            let orchestrator = Orchestrator::new(Arc::new(executor));

            let outcome = orchestrator
                .run(&template.steps, ctx, cancellation_token)
                .await?;

            // A template without an explicit combination rule combines every
            // step in plan order as multi-part content.
            let final_output = template.final_output.clone().unwrap_or_else(|| FinalOutput {
                combine_outputs: outcome
                    .plan
                    .iter()
                    .flat_map(|batch| batch.iter().cloned())
                    .collect(),
                output_format: OutputFormat::MultiPart,
            });

            let combined_output = combine_outputs(
                &outcome.context.step_outputs,
                &template.steps,
                &final_output,
            );

            let execution_plan = outcome.plan.to_vec();
            let draft = ArtifactDraft {
                user_id: caller.user_id.clone(),
                kind: "composite_content".to_string(),
                title: template.name.clone(),
                content: combined_output.clone(),
                prompt: format!("Composite template: {}", template.name),
                metadata: json!({
                    "template_id": template.id,
                    "execution_plan": execution_plan,
                    "total_steps": template.steps.len(),
                    "output_format": final_output.output_format.as_str(),
                }),
            };

            let record = self
                .sink
                .save(draft)
                .await
                .map_err(|e| EngineError::PersistenceFailed(e.to_string()))?;

            info!(artifact_id = %record.id, "Combined output persisted");

            Ok(ExecuteResponse {
                success: true,
                content: record,
                step_outputs: outcome.context.step_outputs,
                execution_plan,
                combined_output,
            })
        }
        .instrument(span)
        .await
    }

    /// Fetches and validates the composite template.
    async fn load_composite(&self, template_id: &str) -> Result<StoredTemplate, EngineError> {
        let template = self
            .templates
            .get(template_id)
            .await?
            .ok_or_else(|| EngineError::TemplateNotFound(template_id.to_string()))?;

        if !template.is_composite {
            return Err(EngineError::NotComposite(template_id.to_string()));
        }
        if template.steps.is_empty() {
            return Err(EngineError::EmptyStepList(template_id.to_string()));
        }

        Ok(template)
    }
}
