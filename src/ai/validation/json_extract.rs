//! JSON Extraction from Provider Output
//!
//! Models often wrap JSON in prose or markdown fences. The extractor prefers
//! the body of a fenced block when one parses; otherwise it walks successive
//! openers in the text and returns the first balanced span that parses.

use serde_json::Value;
use thiserror::Error;

/// Which literal the caller expects
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JsonShape {
    Object,
    Array,
    /// Whichever of `{` or `[` appears first
    Any,
}

impl JsonShape {
    fn openers(&self) -> &'static [char] {
        match self {
            JsonShape::Object => &['{'],
            JsonShape::Array => &['['],
            JsonShape::Any => &['{', '['],
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExtractError {
    #[error("no JSON found in response")]
    NoJson,

    #[error("unbalanced JSON starting at byte {0}")]
    Unbalanced(usize),

    #[error("invalid JSON: {0}")]
    Invalid(String),
}

/// Extract and parse the first balanced JSON literal of any shape
pub fn extract_json(raw: &str) -> Result<Value, ExtractError> {
    extract_json_shaped(raw, JsonShape::Any)
}

/// Extract and parse the first balanced JSON literal of the given shape
pub fn extract_json_shaped(raw: &str, shape: JsonShape) -> Result<Value, ExtractError> {
    let text = raw.trim_start_matches('\u{feff}');
    for block in fenced_blocks(text) {
        if let Ok(value) = scan(block, shape) {
            return Ok(value);
        }
    }
    scan(text, shape)
}

/// Try each opener in turn; report the first failure if none parses
fn scan(text: &str, shape: JsonShape) -> Result<Value, ExtractError> {
    let mut first_error = None;
    let mut from = 0;

    while let Some(offset) = text[from..].find(shape.openers()) {
        let start = from + offset;
        let attempt = balanced_span(text, start).and_then(|span| {
            serde_json::from_str(span).map_err(|e| ExtractError::Invalid(e.to_string()))
        });
        match attempt {
            Ok(value) => return Ok(value),
            Err(e) => {
                first_error.get_or_insert(e);
            }
        }
        // openers are ASCII
        from = start + 1;
    }

    Err(first_error.unwrap_or(ExtractError::NoJson))
}

/// Balanced literal opening at `start`, honoring string literals and escapes
fn balanced_span(text: &str, start: usize) -> Result<&str, ExtractError> {
    let mut stack: Vec<char> = Vec::new();
    let mut in_string = false;
    let mut escape = false;

    for (i, ch) in text[start..].char_indices() {
        if in_string {
            if escape {
                escape = false;
            } else if ch == '\\' {
                escape = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }

        match ch {
            '"' => in_string = true,
            '{' => stack.push('}'),
            '[' => stack.push(']'),
            '}' | ']' => {
                if stack.pop() != Some(ch) {
                    return Err(ExtractError::Unbalanced(start));
                }
                if stack.is_empty() {
                    return Ok(&text[start..start + i + ch.len_utf8()]);
                }
            }
            _ => {}
        }
    }

    Err(ExtractError::Unbalanced(start))
}

/// Bodies of markdown code fences, language tag stripped
fn fenced_blocks(text: &str) -> impl Iterator<Item = &str> {
    let mut rest = text;
    std::iter::from_fn(move || {
        let open = rest.find("```")?;
        let after = &rest[open + 3..];
        let body_start = after.find('\n').map_or(after.len(), |i| i + 1);
        let body = &after[body_start..];
        let close = body.find("```")?;
        rest = &body[close + 3..];
        Some(&body[..close])
    })
}

/// Required non-empty string field
pub fn required_str<'a>(value: &'a Value, field: &str) -> Result<&'a str, String> {
    value
        .get(field)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| format!("missing required field '{}'", field))
}

/// Optional string field, empty strings treated as absent
pub fn optional_str<'a>(value: &'a Value, field: &str) -> Option<&'a str> {
    value
        .get(field)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}
