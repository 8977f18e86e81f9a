//! Collaborator seams: the generation capability, the template store, and
//! the persistence sink.
//!
//! The engine never talks to a concrete backend; each external collaborator
//! is an object-safe async trait held behind an `Arc`, so runs can fan steps
//! out across tasks while tests substitute in-memory fakes.

use crate::error::CollaboratorError;
use crate::step::{FinalOutput, Step};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

/// Traceability tag attached to every generation call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TraceTag {
    pub step_id: String,
    pub step_name: String,
    pub parent_template: String,
}

/// One generation request: the resolved template payload plus the step's
/// resolved input object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// The template payload to generate from.
    pub template_data: JsonValue,
    /// Resolved input parameters, one entry per `input_mapping` key.
    pub input: Map<String, JsonValue>,
    /// Caller-supplied generation settings, passed through untouched.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub settings: Option<JsonValue>,
    /// Provenance of the call.
    pub trace: TraceTag,
}

/// A generation response: the produced content plus whatever else the
/// capability returned.
///
/// Output mappings resolve dotted paths against the full response object
/// (`content` and the extra fields together), so `as_value` rebuilds it.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GenerationResponse {
    /// The produced content.
    pub content: JsonValue,
    /// Any additional response fields.
    #[serde(flatten)]
    pub extra: Map<String, JsonValue>,
}

impl GenerationResponse {
    /// Wraps bare content into a response.
    pub fn new(content: JsonValue) -> Self {
        Self {
            content,
            extra: Map::new(),
        }
    }

    /// The full response as a single JSON object, for path extraction.
    pub fn as_value(&self) -> JsonValue {
        let mut map = self.extra.clone();
        map.insert("content".to_string(), self.content.clone());
        JsonValue::Object(map)
    }
}

/// The external content-generation capability.
#[async_trait]
pub trait GenerationCapability: Send + Sync {
    /// Produces content for one step. A non-success response surfaces as a
    /// `CollaboratorError`, which is fatal to the run.
    async fn invoke(&self, request: GenerationRequest) -> Result<GenerationResponse, CollaboratorError>;
}

/// A template record as the store returns it.
///
/// For a composite template the interesting parts are `steps` and
/// `final_output`; for a step's `template_ref` lookup only `template_data`
/// matters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredTemplate {
    pub id: String,
    pub name: String,
    /// Whether this template is a composite (multi-step) template.
    #[serde(default)]
    pub is_composite: bool,
    /// Inline payload, present for single (referenced) templates.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_data: Option<JsonValue>,
    /// Step graph, present for composite templates.
    #[serde(default)]
    pub steps: Vec<Step>,
    /// Final-output combination rule, present for composite templates.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_output: Option<FinalOutput>,
}

/// The external template store.
#[async_trait]
pub trait TemplateStore: Send + Sync {
    /// Fetches a template by id. `Ok(None)` means the id is unknown.
    async fn get(&self, template_id: &str) -> Result<Option<StoredTemplate>, CollaboratorError>;
}

/// A combined-output artifact about to be saved.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactDraft {
    pub user_id: String,
    /// Artifact kind, e.g. `composite_content`.
    pub kind: String,
    pub title: String,
    /// The combined output.
    pub content: JsonValue,
    /// Human-readable provenance of the generation.
    pub prompt: String,
    /// Run metadata: execution plan, step count, template id.
    pub metadata: JsonValue,
}

/// A persisted artifact record as the sink returns it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactRecord {
    pub id: String,
    pub user_id: String,
    pub kind: String,
    pub title: String,
    pub content: JsonValue,
    #[serde(default)]
    pub metadata: JsonValue,
}

/// The external persistence sink for combined outputs.
#[async_trait]
pub trait PersistenceSink: Send + Sync {
    /// Saves the combined artifact, returning the stored record.
    async fn save(&self, draft: ArtifactDraft) -> Result<ArtifactRecord, CollaboratorError>;
}
