//! Tolerant decoding of model replies into a [`VisionReading`]

use serde::Deserialize;
use serde_json::Value;

use crate::{
    error::{AppError, AppResult},
    models::cover::VisionReading,
};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawReading {
    title: Value,
    author: Value,
    #[serde(alias = "authors")]
    author_list: Value,
    isbn: Value,
    publisher: Value,
    confidence: Value,
    text: Value,
}

/// Placeholders models use instead of null
const EMPTY_MARKERS: &[&str] = &["", "null", "none", "unknown", "n/a", "not visible"];

/// Decode a reply that should be a JSON object, possibly wrapped in a code
/// fence or surrounded by prose
pub fn parse_reading(provider: &str, reply: &str) -> AppResult<VisionReading> {
    let object = extract_json_object(reply)
        .ok_or_else(|| AppError::upstream(provider, "reply contains no JSON object"))?;
    let raw: RawReading = serde_json::from_str(object)
        .map_err(|e| AppError::upstream(provider, format!("reply is not valid JSON: {}", e)))?;

    Ok(VisionReading {
        title: text_value(&raw.title),
        author: text_value(&raw.author).or_else(|| text_value(&raw.author_list)),
        isbn: text_value(&raw.isbn),
        publisher: text_value(&raw.publisher),
        confidence: confidence_value(&raw.confidence),
        text: lines_value(&raw.text),
    })
}

/// The outermost `{...}` of a reply, after stripping code fences
fn extract_json_object(reply: &str) -> Option<&str> {
    let body = strip_code_fence(reply);
    let start = body.find('{')?;
    let end = body.rfind('}')?;
    (end > start).then(|| &body[start..=end])
}

fn strip_code_fence(reply: &str) -> &str {
    let Some(open) = reply.find("```") else {
        return reply;
    };
    let after_open = &reply[open + 3..];
    // skip the language tag line, e.g. ```json
    let content = match after_open.find('\n') {
        Some(newline) => &after_open[newline + 1..],
        None => after_open,
    };
    match content.find("```") {
        Some(close) => &content[..close],
        None => content,
    }
}

fn text_value(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(items) => items
            .iter()
            .filter_map(text_value)
            .collect::<Vec<_>>()
            .join(", "),
        _ => return None,
    };
    if EMPTY_MARKERS.contains(&text.to_lowercase().as_str()) {
        None
    } else {
        Some(text)
    }
}

fn lines_value(value: &Value) -> Option<String> {
    match value {
        Value::Array(items) => {
            let lines: Vec<String> = items.iter().filter_map(text_value).collect();
            (!lines.is_empty()).then(|| lines.join("\n"))
        }
        other => text_value(other),
    }
}

/// Numbers or numeric strings; percentages are scaled down, result clamped to `0..=1`
fn confidence_value(value: &Value) -> f64 {
    let raw = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().trim_end_matches('%').trim().parse::<f64>().ok(),
        _ => None,
    };
    match raw {
        Some(c) if c.is_finite() && c > 1.0 && c <= 100.0 => c / 100.0,
        Some(c) if c.is_finite() => c.clamp(0.0, 1.0),
        _ => 0.0,
    }
}
