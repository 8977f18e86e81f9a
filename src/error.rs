//! Error types for composite template execution.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Errors raised by the external collaborators (generation capability,
/// template store, persistence sink).
///
/// The engine treats any of them as fatal to the operation that triggered the
/// call (fail-fast, no automatic retry).
#[derive(Debug, Error)]
pub enum CollaboratorError {
    /// The call itself failed (network, provider, quota, ...).
    #[error("Invocation failed: {0}")]
    InvocationFailed(String),

    /// The collaborator responded, but the response could not be understood.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// I/O error while talking to the collaborator.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors that can occur during composite template execution.
#[derive(Debug, Error)]
pub enum EngineError {
    /// No authenticated caller identity was supplied.
    #[error("Authorization required")]
    Unauthorized,

    /// The requested template does not exist in the template store.
    #[error("Template not found: {0}")]
    TemplateNotFound(String),

    /// The requested template is not a composite template.
    #[error("Template {0} is not a composite template")]
    NotComposite(String),

    /// The composite template declares no steps.
    #[error("Template {0} has no steps to execute")]
    EmptyStepList(String),

    /// The planner could not make progress: the remaining steps form a cycle.
    #[error("Circular dependency detected; unplaceable steps: {}", remaining.join(", "))]
    CircularDependency { remaining: Vec<String> },

    /// A step depends on an id that is not part of the step set.
    #[error("Step {step_id} depends on unknown step {depends_on}")]
    UnknownDependency { step_id: String, depends_on: String },

    /// A step failed while executing: its generation call failed or its
    /// referenced template could not be loaded.
    #[error("Step {step_id} failed: {reason}")]
    StepExecutionFailed { step_id: String, reason: String },

    /// Strict variable mode: a `${...}` expression could not be resolved.
    #[error("Step {step_id} references unresolvable variable: {expression}")]
    UnresolvedVariable { step_id: String, expression: String },

    /// Strict operator mode: a condition used an operator the engine does
    /// not recognize.
    #[error("Step {step_id} uses unknown condition operator: {operator}")]
    UnknownOperator { step_id: String, operator: String },

    /// A step exceeded the configured per-step timeout.
    #[error("Step {step_id} timed out after {timeout:?}")]
    StepTimeout { step_id: String, timeout: Duration },

    /// The run was cancelled externally.
    #[error("Execution cancelled")]
    Cancelled,

    /// The run exceeded its configured deadline.
    #[error("Run deadline exceeded after {0:?}")]
    DeadlineExceeded(Duration),

    /// The combined output could not be saved.
    #[error("Failed to persist combined output: {0}")]
    PersistenceFailed(String),

    /// A collaborator error outside any specific step context.
    #[error("Collaborator error: {0}")]
    Collaborator(#[from] CollaboratorError),

    /// JSON (de)serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// The failure payload returned to callers, per the external interface
/// contract: `{ error, details? }`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FailureResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl EngineError {
    /// Converts this error into the caller-facing failure response.
    ///
    /// The short `error` field carries a stable human-readable category; the
    /// full message goes into `details`.
    pub fn to_failure(&self) -> FailureResponse {
        let error = match self {
            EngineError::Unauthorized => "Authorization required",
            EngineError::TemplateNotFound(_) => "Template not found",
            EngineError::NotComposite(_) => "Template is not a composite template",
            EngineError::EmptyStepList(_) => "Template has no steps",
            EngineError::CircularDependency { .. } => "Circular dependency in template steps",
            EngineError::UnknownDependency { .. } => "Step depends on unknown step",
            EngineError::StepExecutionFailed { .. } => "Step execution failed",
            EngineError::UnresolvedVariable { .. } => "Unresolved variable",
            EngineError::UnknownOperator { .. } => "Unknown condition operator",
            EngineError::StepTimeout { .. } => "Step timed out",
            EngineError::Cancelled => "Execution cancelled",
            EngineError::DeadlineExceeded(_) => "Run deadline exceeded",
            EngineError::PersistenceFailed(_) => "Failed to save generated content",
            EngineError::Collaborator(_) => "External service error",
            EngineError::Json(_) => "Invalid JSON",
        };

        FailureResponse {
            error: error.to_string(),
            details: Some(self.to_string()),
        }
    }

    /// Wraps a collaborator failure as a step-level execution failure.
    pub fn step_failed(step_id: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        EngineError::StepExecutionFailed {
            step_id: step_id.into(),
            reason: reason.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_response_carries_details() {
        let err = EngineError::TemplateNotFound("tpl_1".to_string());
        let failure = err.to_failure();

        assert_eq!(failure.error, "Template not found");
        assert!(failure.details.unwrap().contains("tpl_1"));
    }

    #[test]
    fn test_circular_dependency_names_steps() {
        let err = EngineError::CircularDependency {
            remaining: vec!["x".to_string(), "y".to_string()],
        };
        let msg = err.to_string();
        assert!(msg.contains("x"));
        assert!(msg.contains("y"));
    }

    #[test]
    fn test_step_failed_helper() {
        let err = EngineError::step_failed("step_1", "boom");
        match err {
            EngineError::StepExecutionFailed { step_id, reason } => {
                assert_eq!(step_id, "step_1");
                assert_eq!(reason, "boom");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_collaborator_error_conversion() {
        let inner = CollaboratorError::InvocationFailed("provider down".to_string());
        let err: EngineError = inner.into();
        assert!(matches!(err, EngineError::Collaborator(_)));
    }
}
