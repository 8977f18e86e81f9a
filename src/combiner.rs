//! Combination of per-step outputs into the template's final artifact.

use crate::step::{FinalOutput, OutputFormat, Step};
use serde_json::{Map, Value as JsonValue, json};
use tracing::debug;

/// Merges step outputs according to the template's `final_output` rule.
///
/// - `multi_part`: ordered list of `{step_id, step_name, content}` entries,
///   one per listed step id that produced an output;
/// - `single`: ordered list of the raw outputs for the listed ids
///   (concatenation is the renderer's concern);
/// - `collection`: the full output map plus provenance metadata;
/// - anything else: the output map passed through unchanged.
pub fn combine_outputs(
    step_outputs: &Map<String, JsonValue>,
    steps: &[Step],
    final_output: &FinalOutput,
) -> JsonValue {
    debug!(
        format = final_output.output_format.as_str(),
        listed = final_output.combine_outputs.len(),
        produced = step_outputs.len(),
        "Combining step outputs"
    );

    match final_output.output_format {
        OutputFormat::MultiPart => {
            let parts: Vec<JsonValue> = final_output
                .combine_outputs
                .iter()
                .filter_map(|step_id| {
                    step_outputs.get(step_id).map(|content| {
                        json!({
                            "step_id": step_id,
                            "step_name": step_name(steps, step_id),
                            "content": content,
                        })
                    })
                })
                .collect();
            JsonValue::Array(parts)
        }
        OutputFormat::Single => {
            let parts: Vec<JsonValue> = final_output
                .combine_outputs
                .iter()
                .filter_map(|step_id| step_outputs.get(step_id).cloned())
                .collect();
            JsonValue::Array(parts)
        }
        OutputFormat::Collection => json!({
            "items": step_outputs,
            "metadata": {
                "execution_order": final_output.combine_outputs,
                "total_steps": step_outputs.len(),
            }
        }),
        OutputFormat::Unknown => JsonValue::Object(step_outputs.clone()),
    }
}

/// Display name of a step, null when the id is not part of the step list.
fn step_name(steps: &[Step], step_id: &str) -> JsonValue {
    steps
        .iter()
        .find(|s| s.id == step_id)
        .map(|s| JsonValue::String(s.name.clone()))
        .unwrap_or(JsonValue::Null)
}
