//! Configuration for composite template execution.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for a composite template run.
///
/// # Examples
///
/// ```
/// use composite_engine::EngineConfig;
/// use std::time::Duration;
///
/// let config = EngineConfig::new()
///     .with_step_timeout(Duration::from_secs(120))
///     .with_run_deadline(Duration::from_secs(600))
///     .with_strict_variables(true);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Timeout for a single step's generation call.
    ///
    /// If `None`, no per-step timeout is applied.
    pub step_timeout: Option<Duration>,

    /// Deadline for the whole run, measured from the start of the first batch.
    ///
    /// If `None`, the run may take arbitrarily long.
    pub run_deadline: Option<Duration>,

    /// When `true`, a `${...}` expression that cannot be resolved fails the
    /// step instead of being left in place as literal token text.
    ///
    /// The lenient default matches the observed behavior of composite
    /// templates in production: an unresolved token is substituted with its
    /// original text and execution continues.
    #[serde(default)]
    pub strict_variables: bool,

    /// When `true`, a condition with an unrecognized operator fails the step
    /// instead of evaluating as satisfied.
    ///
    /// The fail-open default keeps a template runnable in the face of an
    /// authoring typo, at the cost of executing steps the author may have
    /// meant to gate.
    #[serde(default)]
    pub strict_operators: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineConfig {
    /// Creates a configuration with default values: no timeouts, lenient
    /// variable resolution, fail-open unknown operators.
    pub fn new() -> Self {
        Self {
            step_timeout: None,
            run_deadline: None,
            strict_variables: false,
            strict_operators: false,
        }
    }

    /// Sets the per-step timeout.
    pub fn with_step_timeout(mut self, timeout: Duration) -> Self {
        self.step_timeout = Some(timeout);
        self
    }

    /// Sets the whole-run deadline.
    pub fn with_run_deadline(mut self, deadline: Duration) -> Self {
        self.run_deadline = Some(deadline);
        self
    }

    /// Removes the per-step timeout.
    pub fn with_no_step_timeout(mut self) -> Self {
        self.step_timeout = None;
        self
    }

    /// Enables or disables strict variable resolution.
    pub fn with_strict_variables(mut self, strict: bool) -> Self {
        self.strict_variables = strict;
        self
    }

    /// Enables or disables strict condition operators.
    pub fn with_strict_operators(mut self, strict: bool) -> Self {
        self.strict_operators = strict;
        self
    }
}
