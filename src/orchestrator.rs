//! Batch-by-batch run driver.
//!
//! The orchestrator computes the execution plan once, then walks it batch by
//! batch: every step in a batch runs concurrently against the same read-only
//! context snapshot, and completed outputs are folded back into the context
//! before the next batch starts. Batch boundaries are the only
//! synchronization points; the first step failure aborts the run.

use crate::context::ExecutionContext;
use crate::error::EngineError;
use crate::executor::{StepExecutor, StepOutcome};
use crate::planner::{ExecutionPlan, build_plan};
use crate::step::Step;
use futures::future::try_join_all;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, info, info_span, warn};

/// The result of a completed run: the plan that was executed and the final
/// context holding every step's output.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub plan: ExecutionPlan,
    pub context: ExecutionContext,
}

/// Drives a composite template run.
pub struct Orchestrator {
    executor: Arc<StepExecutor>,
}

impl Orchestrator {
    pub fn new(executor: Arc<StepExecutor>) -> Self {
        Self { executor }
    }

    /// Executes the full step list.
    ///
    /// Planning happens before anything executes, so a cyclic step set fails
    /// without a single generation call. The configured run deadline and the
    /// cancellation token are both checked at batch boundaries; the token is
    /// also raced against every in-flight step.
    pub async fn run(
        &self,
        steps: &[Step],
        mut ctx: ExecutionContext,
        cancellation_token: CancellationToken,
    ) -> Result<RunOutcome, EngineError> {
        let plan = build_plan(steps)?;
        let template_id = ctx.template_id.clone();

        let run_span = info_span!(
            "composite_run",
            template_id = %template_id,
            total_steps = plan.step_count(),
            batches = plan.len(),
        );

        async {
            info!("Execution plan computed: {:?}", plan.batches());

            let lookup: HashMap<&str, &Step> =
                steps.iter().map(|s| (s.id.as_str(), s)).collect();
            let run_deadline = self.executor.config().run_deadline;
            let started = Instant::now();

            for (batch_index, batch) in plan.iter().enumerate() {
                if cancellation_token.is_cancelled() {
                    warn!(batch_index, "Run cancelled before batch start");
                    return Err(EngineError::Cancelled);
                }
                if let Some(deadline) = run_deadline
                    && started.elapsed() >= deadline
                {
                    warn!(batch_index, "Run deadline exceeded before batch start");
                    return Err(EngineError::DeadlineExceeded(deadline));
                }

                info!(batch_index, steps = batch.len(), "Executing batch");

                // One snapshot for the whole batch: steps in a batch cannot
                // see each other's output by construction of the plan.
                let snapshot = Arc::new(ctx.clone());

                let step_futures = batch.iter().map(|step_id| {
                    // Plan ids always come from the step list.
                    let step = lookup[step_id.as_str()];
                    self.execute_step(step, Arc::clone(&snapshot), cancellation_token.clone())
                });

                // Fail-fast: the first error drops the remaining futures,
                // cancelling their in-flight generation calls.
                let outcomes = try_join_all(step_futures).await?;

                for StepOutcome { step_id, output } in outcomes {
                    info!(step_id = %step_id, "Step completed");
                    ctx.record_step_output(&step_id, output);
                }
            }

            info!(steps_executed = ctx.step_outputs.len(), "Run completed");
            Ok(RunOutcome { plan, context: ctx })
        }
        .instrument(run_span)
        .await
    }

    /// Executes one step, racing it against cancellation and the configured
    /// per-step timeout.
    async fn execute_step(
        &self,
        step: &Step,
        snapshot: Arc<ExecutionContext>,
        cancellation_token: CancellationToken,
    ) -> Result<StepOutcome, EngineError> {
        let step_span = info_span!("step", step_id = %step.id, step_name = %step.name);

        async {
            let work = self.executor.execute(step, &snapshot);

            if let Some(timeout) = self.executor.config().step_timeout {
                tokio::select! {
                    _ = cancellation_token.cancelled() => {
                        warn!("Step cancelled");
                        Err(EngineError::Cancelled)
                    }
                    timed = tokio::time::timeout(timeout, work) => match timed {
                        Ok(result) => result,
                        Err(_) => {
                            warn!(?timeout, "Step timed out");
                            Err(EngineError::StepTimeout {
                                step_id: step.id.clone(),
                                timeout,
                            })
                        }
                    },
                }
            } else {
                tokio::select! {
                    _ = cancellation_token.cancelled() => {
                        warn!("Step cancelled");
                        Err(EngineError::Cancelled)
                    }
                    result = work => result,
                }
            }
        }
        .instrument(step_span)
        .await
    }
}
