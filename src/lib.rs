//! `composite-engine` - an execution engine for composite content-generation
//! templates.
//!
//! A composite template is a set of steps, each producing one piece of
//! content through an external generation capability. Steps declare
//! dependencies on each other's outputs, forming a DAG; the engine plans that
//! DAG into the smallest number of batches, runs each batch concurrently, and
//! combines the per-step outputs into a single persisted artifact.
//!
//! The pipeline:
//!
//! 1. [`planner`] validates the dependency graph and computes the batch plan
//!    (greedy widest layering, cycle detection).
//! 2. [`resolver`] substitutes `${...}` expressions in step inputs against
//!    the layered [`context`](ExecutionContext) (user inputs, prior step
//!    outputs, flattened variables).
//! 3. [`condition`] gates conditional steps; a failed gate records a skip
//!    marker instead of calling the generator.
//! 4. [`executor`] runs one step: template resolution, input building,
//!    generation dispatch, output extraction.
//! 5. [`orchestrator`] drives the batches with fail-fast semantics,
//!    cancellation, and timeouts.
//! 6. [`combiner`] merges the outputs per the template's combination rule.
//!
//! [`CompositeTemplateService`] ties the pipeline together behind three
//! collaborator traits ([`GenerationCapability`], [`TemplateStore`],
//! [`PersistenceSink`]), so the engine stays independent of any concrete
//! provider or storage backend.
//!
//! # Example
//!
//! ```ignore
//! use composite_engine::{Caller, CompositeTemplateService, ExecuteRequest};
//! use tokio_util::sync::CancellationToken;
//!
//! let service = CompositeTemplateService::new(templates, generation, sink);
//! let caller = Caller::new("user_1");
//! let response = service
//!     .execute(Some(&caller), request, CancellationToken::new())
//!     .await?;
//! println!("{}", response.combined_output);
//! ```

pub mod capability;
pub mod combiner;
pub mod condition;
pub mod config;
pub mod context;
pub mod error;
pub mod executor;
pub mod orchestrator;
pub mod planner;
pub mod resolver;
pub mod service;
pub mod step;

pub use capability::{
    ArtifactDraft, ArtifactRecord, GenerationCapability, GenerationRequest, GenerationResponse,
    PersistenceSink, StoredTemplate, TemplateStore, TraceTag,
};
pub use combiner::combine_outputs;
pub use config::EngineConfig;
pub use context::ExecutionContext;
pub use error::{CollaboratorError, EngineError, FailureResponse};
pub use executor::{StepExecutor, StepOutcome};
pub use orchestrator::{Orchestrator, RunOutcome};
pub use planner::{ExecutionPlan, build_plan};
pub use service::{Caller, CompositeTemplateService, ExecuteRequest, ExecuteResponse};
pub use step::{
    ConditionLogic, ConditionOperator, FinalOutput, OutputFormat, Step, StepSource,
};
