//! Runtime `${...}` variable resolution against the layered execution scope.
//!
//! Templates are scanned with an explicit tokenizer rather than a regex so
//! that nested braces, escaped dollars, and unterminated tokens are handled
//! deterministically. Resolution routes the first path segment through the
//! context's scopes in priority order (user inputs, variables, step outputs),
//! then descends dot-separated segments into the current value.

use crate::context::ExecutionContext;
use serde_json::Value as JsonValue;

/// A `${...}` expression that could not be resolved.
///
/// In lenient mode the original token text is substituted in place; in strict
/// mode this becomes a step failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unresolved {
    /// The expression inside the token, e.g. `intro.text`.
    pub expression: String,
}

/// One piece of a scanned template.
#[derive(Debug, PartialEq)]
enum Piece {
    Literal(String),
    /// A `${expr}` token; `raw` is the full original text including
    /// delimiters, kept so lenient resolution can restore it verbatim.
    Token { expr: String, raw: String },
}

/// Scans a template into literal runs and `${...}` tokens.
///
/// `\$` escapes a literal dollar sign. A `$` not followed by `{`, and an
/// unterminated `${...`, are treated as literal text. Braces nest inside a
/// token: `${a{b}c}` yields the expression `a{b}c`.
fn scan(template: &str) -> Vec<Piece> {
    let mut pieces = Vec::new();
    let mut literal = String::new();
    let mut chars = template.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '\\' if chars.peek() == Some(&'$') => {
                chars.next();
                literal.push('$');
            }
            '$' if chars.peek() == Some(&'{') => {
                chars.next();
                let mut expr = String::new();
                let mut depth = 1usize;
                let mut terminated = false;

                for inner in chars.by_ref() {
                    match inner {
                        '{' => {
                            depth += 1;
                            expr.push(inner);
                        }
                        '}' => {
                            depth -= 1;
                            if depth == 0 {
                                terminated = true;
                                break;
                            }
                            expr.push(inner);
                        }
                        _ => expr.push(inner),
                    }
                }

                if terminated {
                    if !literal.is_empty() {
                        pieces.push(Piece::Literal(std::mem::take(&mut literal)));
                    }
                    let raw = format!("${{{expr}}}");
                    pieces.push(Piece::Token { expr, raw });
                } else {
                    // Unterminated token: keep the raw text as literal.
                    literal.push_str("${");
                    literal.push_str(&expr);
                }
            }
            _ => literal.push(ch),
        }
    }

    if !literal.is_empty() {
        pieces.push(Piece::Literal(literal));
    }

    pieces
}

/// Resolves a dot-separated path expression against the execution context.
///
/// First-segment routing, in priority order:
/// 1. `user_input` / `user_inputs` routes to the caller's inputs;
/// 2. `variables` routes to the flattened variable scope;
/// 3. a segment matching a key in `step_outputs` routes to that output;
/// 4. otherwise the segment is looked up in `variables`.
///
/// Each subsequent segment indexes one level deeper: object fields by key,
/// arrays by numeric index. Returns `None` as soon as a segment cannot be
/// resolved.
pub fn resolve_path(expression: &str, ctx: &ExecutionContext) -> Option<JsonValue> {
    let expression = expression.trim();
    if expression.is_empty() {
        return None;
    }

    let mut segments = expression.split('.');
    let first = segments.next()?;

    let mut current: JsonValue = match first {
        "user_input" | "user_inputs" => JsonValue::Object(ctx.user_inputs.clone()),
        "variables" => JsonValue::Object(ctx.variables.clone()),
        seg => {
            if let Some(output) = ctx.step_outputs.get(seg) {
                output.clone()
            } else if let Some(value) = ctx.variables.get(seg) {
                value.clone()
            } else {
                return None;
            }
        }
    };

    for segment in segments {
        current = descend(&current, segment)?;
    }

    Some(current)
}

/// Indexes one segment into a value: object field by key, array by position.
fn descend(value: &JsonValue, segment: &str) -> Option<JsonValue> {
    match value {
        JsonValue::Object(map) => map.get(segment).cloned(),
        JsonValue::Array(items) => segment
            .parse::<usize>()
            .ok()
            .and_then(|idx| items.get(idx).cloned()),
        _ => None,
    }
}

/// Extracts a dotted path from a raw value, without any scope routing.
///
/// Used by output mapping to pick fields out of a generation response.
/// A missing path yields `Null` rather than an error.
pub fn extract_path(value: &JsonValue, path: &str) -> JsonValue {
    let mut current = value.clone();
    for segment in path.split('.') {
        match descend(&current, segment) {
            Some(next) => current = next,
            None => return JsonValue::Null,
        }
    }
    current
}

/// Renders a value into interpolated text.
fn stringify(value: &JsonValue) -> String {
    match value {
        JsonValue::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Resolves every `${...}` token in a template string.
///
/// A template that consists of exactly one token resolves to the value's
/// native type; mixed templates produce a string with each token replaced by
/// its stringified value. Text without tokens is returned unchanged.
///
/// When `strict` is false, an unresolvable token is substituted with its
/// original text and resolution continues; when `strict` is true, the first
/// unresolvable token aborts with [`Unresolved`].
pub fn resolve_template(
    template: &str,
    ctx: &ExecutionContext,
    strict: bool,
) -> Result<JsonValue, Unresolved> {
    let pieces = scan(template);

    // Whole-value substitution: the template is a single token.
    if let [Piece::Token { expr, raw }] = pieces.as_slice() {
        return match resolve_path(expr, ctx) {
            Some(value) => Ok(value),
            None if strict => Err(Unresolved {
                expression: expr.clone(),
            }),
            None => Ok(JsonValue::String(raw.clone())),
        };
    }

    let mut rendered = String::new();
    for piece in &pieces {
        match piece {
            Piece::Literal(text) => rendered.push_str(text),
            Piece::Token { expr, raw } => match resolve_path(expr, ctx) {
                Some(value) => rendered.push_str(&stringify(&value)),
                None if strict => {
                    return Err(Unresolved {
                        expression: expr.clone(),
                    });
                }
                None => rendered.push_str(raw),
            },
        }
    }

    Ok(JsonValue::String(rendered))
}
