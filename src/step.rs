//! The step model: one node of a composite template's workflow graph.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;

/// The template payload a step executes: either a reference to a stored
/// template or an inline payload.
///
/// Exactly one of the two wire fields `template_ref` / `template_data` must be
/// present; the enum makes the XOR structural.
#[derive(Debug, Clone, PartialEq)]
pub enum StepSource {
    /// Execute a stored template, looked up by id at step execution time.
    Reference(String),
    /// Execute an inline template payload.
    Inline(JsonValue),
}

/// A single comparison gating a conditional step.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConditionLogic {
    /// Variable-path expression resolved against the execution context.
    pub field: String,
    /// Comparison operator applied to the resolved value.
    pub operator: ConditionOperator,
    /// Right-hand operand.
    #[serde(default)]
    pub value: JsonValue,
}

/// Condition operators.
///
/// Unrecognized wire strings deserialize to `Unknown` rather than failing, so
/// that whether an unknown operator blocks execution is a runtime policy
/// decision (see `EngineConfig::strict_operators`), not a parse error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConditionOperator {
    Equals,
    NotEquals,
    Contains,
    NotContains,
    Exists,
    NotExists,
    Unknown,
}

impl ConditionOperator {
    /// The wire name of this operator.
    pub fn as_str(&self) -> &'static str {
        match self {
            ConditionOperator::Equals => "equals",
            ConditionOperator::NotEquals => "not_equals",
            ConditionOperator::Contains => "contains",
            ConditionOperator::NotContains => "not_contains",
            ConditionOperator::Exists => "exists",
            ConditionOperator::NotExists => "not_exists",
            ConditionOperator::Unknown => "unknown",
        }
    }
}

impl Serialize for ConditionOperator {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ConditionOperator {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(match s.as_str() {
            "equals" => ConditionOperator::Equals,
            "not_equals" => ConditionOperator::NotEquals,
            "contains" => ConditionOperator::Contains,
            "not_contains" => ConditionOperator::NotContains,
            "exists" => ConditionOperator::Exists,
            "not_exists" => ConditionOperator::NotExists,
            _ => ConditionOperator::Unknown,
        })
    }
}

/// How per-step outputs are merged into the template's final artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Ordered list of `{step_id, step_name, content}` entries.
    #[default]
    MultiPart,
    /// Ordered list of the raw outputs (concatenation left to the renderer).
    Single,
    /// The full output map plus provenance metadata.
    Collection,
    /// Unrecognized format: step outputs are passed through unchanged.
    Unknown,
}

impl OutputFormat {
    /// The wire name of this format.
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::MultiPart => "multi_part",
            OutputFormat::Single => "single",
            OutputFormat::Collection => "collection",
            OutputFormat::Unknown => "unknown",
        }
    }
}

impl Serialize for OutputFormat {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for OutputFormat {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(match s.as_str() {
            "multi_part" => OutputFormat::MultiPart,
            "single" => OutputFormat::Single,
            "collection" => OutputFormat::Collection,
            _ => OutputFormat::Unknown,
        })
    }
}

/// The template's final-output combination rule.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct FinalOutput {
    /// Step ids to combine, in presentation order.
    #[serde(default)]
    pub combine_outputs: Vec<String>,
    /// Combine strategy.
    #[serde(default)]
    pub output_format: OutputFormat,
}

/// One unit of work in a composite template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "StepWire", into = "StepWire")]
pub struct Step {
    /// Unique key within the template.
    pub id: String,
    /// Display label.
    pub name: String,
    /// Ids of steps that must complete before this one is eligible.
    pub depends_on: Vec<String>,
    /// Whether `condition_logic` gates execution.
    pub is_conditional: bool,
    /// The gate, evaluated only when `is_conditional` is true.
    pub condition_logic: Option<ConditionLogic>,
    /// Parameter name -> template string containing `${...}` expressions.
    pub input_mapping: BTreeMap<String, String>,
    /// Result key -> dotted path into the raw generation response.
    /// Empty mapping passes the raw content result through unchanged.
    pub output_mapping: BTreeMap<String, String>,
    /// The template payload to execute.
    pub source: StepSource,
}

impl Step {
    /// Creates a step with an inline template payload and no dependencies.
    pub fn inline(id: impl Into<String>, name: impl Into<String>, template_data: JsonValue) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            depends_on: Vec::new(),
            is_conditional: false,
            condition_logic: None,
            input_mapping: BTreeMap::new(),
            output_mapping: BTreeMap::new(),
            source: StepSource::Inline(template_data),
        }
    }

    /// Creates a step that references a stored template.
    pub fn reference(
        id: impl Into<String>,
        name: impl Into<String>,
        template_ref: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            depends_on: Vec::new(),
            is_conditional: false,
            condition_logic: None,
            input_mapping: BTreeMap::new(),
            output_mapping: BTreeMap::new(),
            source: StepSource::Reference(template_ref.into()),
        }
    }

    /// Adds dependencies on the given step ids.
    pub fn with_depends_on<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.depends_on.extend(ids.into_iter().map(Into::into));
        self
    }

    /// Marks the step conditional with the given gate.
    pub fn with_condition(mut self, condition: ConditionLogic) -> Self {
        self.is_conditional = true;
        self.condition_logic = Some(condition);
        self
    }

    /// Adds an input mapping entry.
    pub fn with_input(mut self, param: impl Into<String>, template: impl Into<String>) -> Self {
        self.input_mapping.insert(param.into(), template.into());
        self
    }

    /// Adds an output mapping entry.
    pub fn with_output(mut self, key: impl Into<String>, path: impl Into<String>) -> Self {
        self.output_mapping.insert(key.into(), path.into());
        self
    }
}

/// Wire representation of a step, with `template_ref` / `template_data` as
/// sibling optional fields.
#[derive(Serialize, Deserialize)]
struct StepWire {
    id: String,
    name: String,
    #[serde(default)]
    depends_on: Vec<String>,
    #[serde(default)]
    is_conditional: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    condition_logic: Option<ConditionLogic>,
    #[serde(default)]
    input_mapping: BTreeMap<String, String>,
    #[serde(default)]
    output_mapping: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    template_ref: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    template_data: Option<JsonValue>,
}

impl TryFrom<StepWire> for Step {
    type Error = String;

    fn try_from(wire: StepWire) -> Result<Self, Self::Error> {
        let source = match (wire.template_ref, wire.template_data) {
            (Some(r), None) => StepSource::Reference(r),
            (None, Some(d)) => StepSource::Inline(d),
            (Some(_), Some(_)) => {
                return Err(format!(
                    "step {}: template_ref and template_data are mutually exclusive",
                    wire.id
                ));
            }
            (None, None) => {
                return Err(format!(
                    "step {}: one of template_ref or template_data is required",
                    wire.id
                ));
            }
        };

        Ok(Step {
            id: wire.id,
            name: wire.name,
            depends_on: wire.depends_on,
            is_conditional: wire.is_conditional,
            condition_logic: wire.condition_logic,
            input_mapping: wire.input_mapping,
            output_mapping: wire.output_mapping,
            source,
        })
    }
}

impl From<Step> for StepWire {
    fn from(step: Step) -> Self {
        let (template_ref, template_data) = match step.source {
            StepSource::Reference(r) => (Some(r), None),
            StepSource::Inline(d) => (None, Some(d)),
        };

        StepWire {
            id: step.id,
            name: step.name,
            depends_on: step.depends_on,
            is_conditional: step.is_conditional,
            condition_logic: step.condition_logic,
            input_mapping: step.input_mapping,
            output_mapping: step.output_mapping,
            template_ref,
            template_data,
        }
    }
}
