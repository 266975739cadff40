//! JSON extraction from free-form model text.
//!
//! Model output is untrusted prose that usually wraps one JSON object
//! (markdown fences, leading commentary, trailing notes). This module is
//! the single place that turns such a blob into typed data; anything it
//! cannot extract is a `Parse` failure, never retried.

use serde::de::DeserializeOwned;

use super::LlmError;

/// Locate the first well-formed JSON object substring in `text`.
///
/// Walks brace depth while honoring string literals and escapes, so braces
/// inside values do not terminate the object early.
pub fn extract_json_object(text: &str) -> Result<&str, LlmError> {
    let start = text
        .find('{')
        .ok_or_else(|| LlmError::Parse("no JSON object in model output".into()))?;

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in text[start..].char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' if in_string => escaped = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Ok(&text[start..start + i + c.len_utf8()]);
                }
            }
            _ => {}
        }
    }

    Err(LlmError::Parse("unterminated JSON object in model output".into()))
}

/// Extract and deserialize the first JSON object in `text`.
pub fn parse_json_block<T: DeserializeOwned>(text: &str) -> Result<T, LlmError> {
    let block = extract_json_object(text)?;
    serde_json::from_str(block).map_err(|e| LlmError::Parse(e.to_string()))
}
