//! Embedded JSON detection.

use serde_json::Value;

/// True if the trimmed text is bracketed like a JSON object or array.
pub fn looks_structured(text: &str) -> bool {
    let trimmed = text.trim();
    (trimmed.starts_with('{') && trimmed.ends_with('}'))
        || (trimmed.starts_with('[') && trimmed.ends_with(']'))
}

/// Parse a string that may carry an embedded JSON object or array.
///
/// Anything that isn't bracketed, or fails to parse, comes back as the
/// original string.
pub fn parse_embedded(text: &str) -> Value {
    if looks_structured(text) {
        match serde_json::from_str::<Value>(text.trim()) {
            Ok(value @ (Value::Object(_) | Value::Array(_))) => return value,
            Ok(_) => {}
            Err(e) => {
                tracing::trace!(error = %e, "embedded payload is not valid JSON, keeping text");
            }
        }
    }
    Value::String(text.to_string())
}

/// Normalize a possibly absent value for display. Absent becomes `null`
/// and strings are checked for embedded JSON; other values pass through.
pub fn normalize(value: Option<Value>) -> Value {
    match value {
        None => Value::Null,
        Some(Value::String(text)) if looks_structured(&text) => parse_embedded(&text),
        Some(other) => other,
    }
}
