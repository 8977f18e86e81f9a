//! Per-run execution state threaded through the orchestrator.

use serde_json::{Map, Value as JsonValue};

/// The mutable state of one composite template run.
///
/// Created once per run, seeded from the caller's inputs, and mutated only by
/// the orchestrator between batches. Concurrently-running step executors see a
/// read-only snapshot, so batch boundaries are the only synchronization
/// points.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    /// Caller-supplied parameters. Read-only for the run's lifetime.
    pub user_inputs: Map<String, JsonValue>,
    /// Step id -> extracted output, populated after each batch.
    pub step_outputs: Map<String, JsonValue>,
    /// Flattened variable scope: seeded from `user_inputs`, extended after
    /// each completed step with both `stepId` -> output and `stepId.key` ->
    /// value for every top-level field of that output.
    pub variables: Map<String, JsonValue>,
    /// Id of the composite template being executed.
    pub template_id: String,
    /// Identity of the caller the run belongs to.
    pub user_id: String,
}

impl ExecutionContext {
    /// Creates a context for a new run, seeding `variables` from the user
    /// inputs.
    pub fn new(
        template_id: impl Into<String>,
        user_id: impl Into<String>,
        user_inputs: Map<String, JsonValue>,
    ) -> Self {
        let variables = user_inputs.clone();
        Self {
            user_inputs,
            step_outputs: Map::new(),
            variables,
            template_id: template_id.into(),
            user_id: user_id.into(),
        }
    }

    /// Folds a completed step's output into the context.
    ///
    /// Records the output under `step_outputs[step_id]`, under
    /// `variables[step_id]`, and flattens every top-level field of an object
    /// output into `variables["stepId.field"]`.
    pub fn record_step_output(&mut self, step_id: &str, output: JsonValue) {
        if let JsonValue::Object(fields) = &output {
            for (key, value) in fields {
                self.variables
                    .insert(format!("{step_id}.{key}"), value.clone());
            }
        }
        self.variables.insert(step_id.to_string(), output.clone());
        self.step_outputs.insert(step_id.to_string(), output);
    }
}
