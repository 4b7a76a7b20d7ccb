//! Tolerant JSON extraction from raw model output.
//!
//! LLMs rarely return clean JSON: they wrap it in prose, code fences,
//! or leave trailing commas. This module implements a fallback ladder:
//! 1. parse the whole text
//! 2. parse the first balanced `{...}` span
//! 3. strip trailing commas from that span and parse again
//!
//! Pure function, no I/O; failures are typed so the attempt engine can
//! classify them as retryable.

use serde_json::Value;
use thiserror::Error;

/// Extraction failure after the whole ladder has been tried.
#[derive(Debug, Clone, Error)]
pub enum ExtractError {
    #[error("no JSON object found in text")]
    NoObject,

    #[error("candidate span did not parse: {0}")]
    Unparseable(String),
}

/// Extract the first JSON object embedded in `text`.
pub fn extract_json_object(text: &str) -> Result<Value, ExtractError> {
    let trimmed = text.trim();

    // Rung 1: the whole text is the object
    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(trimmed) {
        return Ok(Value::Object(map));
    }

    // Rung 2: first balanced brace span
    let span = match first_object_span(trimmed) {
        Some(s) => s,
        None => return Err(ExtractError::NoObject),
    };

    match serde_json::from_str::<Value>(span) {
        Ok(Value::Object(map)) => return Ok(Value::Object(map)),
        Ok(_) => return Err(ExtractError::NoObject),
        Err(_) => {}
    }

    // Rung 3: repair trailing commas and retry
    let repaired = strip_trailing_commas(span);
    match serde_json::from_str::<Value>(&repaired) {
        Ok(Value::Object(map)) => Ok(Value::Object(map)),
        Ok(_) => Err(ExtractError::NoObject),
        Err(e) => Err(ExtractError::Unparseable(e.to_string())),
    }
}

/// Locate the first balanced `{...}` span, respecting string literals.
fn first_object_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let bytes = text.as_bytes();
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, &b) in bytes.iter().enumerate().skip(start) {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..=i]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Remove commas that directly precede a closing brace or bracket,
/// outside of string literals.
fn strip_trailing_commas(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_string = false;
    let mut escaped = false;

    for c in text.chars() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            out.push(c);
            continue;
        }
        match c {
            '"' => {
                in_string = true;
                out.push(c);
            }
            '}' | ']' => {
                // Drop a dangling comma (and the whitespace after it)
                while out
                    .chars()
                    .last()
                    .map(|p| p.is_whitespace())
                    .unwrap_or(false)
                {
                    out.pop();
                }
                if out.ends_with(',') {
                    out.pop();
                }
                out.push(c);
            }
            _ => out.push(c),
        }
    }
    out
}
