use serde_json::{Map, Value};
use thiserror::Error;

const EXCERPT_CHARS: usize = 200;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("could not decode structured output: {reason} (raw: {excerpt})")]
pub struct ExtractionError {
    pub reason: String,
    pub excerpt: String,
}

impl ExtractionError {
    fn new(reason: impl Into<String>, raw_text: &str) -> Self {
        Self { reason: reason.into(), excerpt: excerpt(raw_text) }
    }
}

/// Pulls the JSON object out of model text that may carry prose, code fences
/// or other noise around it.
///
/// The candidate is the slice from the first `{` to the last `}`; without
/// both braces the whole text is tried. The candidate must decode to a JSON
/// object. No schema checks happen here.
#[derive(Clone, Debug, Default)]
pub struct StructuredOutputExtractor;

impl StructuredOutputExtractor {
    pub fn new() -> Self {
        Self
    }

    pub fn extract(&self, raw_text: &str) -> Result<Map<String, Value>, ExtractionError> {
        let candidate = candidate_payload(raw_text);
        match serde_json::from_str::<Value>(candidate) {
            Ok(Value::Object(object)) => Ok(object),
            Ok(other) => Err(ExtractionError::new(
                format!("expected a JSON object, found {}", json_kind(&other)),
                raw_text,
            )),
            Err(error) => Err(ExtractionError::new(error.to_string(), raw_text)),
        }
    }
}

fn candidate_payload(raw_text: &str) -> &str {
    match (raw_text.find('{'), raw_text.rfind('}')) {
        (Some(start), Some(end)) if start <= end => &raw_text[start..=end],
        _ => raw_text,
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn excerpt(raw_text: &str) -> String {
    let mut chars = raw_text.chars();
    let head = chars.by_ref().take(EXCERPT_CHARS).collect::<String>();
    if chars.next().is_some() {
        format!("{head}…")
    } else {
        head
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::StructuredOutputExtractor;

    #[test]
    fn extracts_object_wrapped_in_prose() {
        let object = StructuredOutputExtractor::new()
            .extract(r#"blah blah {"a":1} trailing"#)
            .expect("embedded object");

        assert_eq!(serde_json::Value::Object(object), json!({"a": 1}));
    }

    #[test]
    fn extracts_object_from_code_fence() {
        let raw = "好的，以下是问题：\n```json\n{\"questions\": [{\"id\": 1}]}\n```\n希望有帮助！";
        let object = StructuredOutputExtractor::new().extract(raw).expect("fenced object");

        assert!(object.contains_key("questions"));
    }

    #[test]
    fn text_without_braces_fails_and_keeps_raw_text() {
        let error = StructuredOutputExtractor::new()
            .extract("no braces here")
            .expect_err("nothing to decode");

        assert_eq!(error.excerpt, "no braces here");
        assert!(!error.reason.is_empty());
    }

    #[test]
    fn malformed_payload_between_braces_fails() {
        let error = StructuredOutputExtractor::new()
            .extract(r#"result: {"a": 1,, } done"#)
            .expect_err("invalid json");

        assert!(error.excerpt.contains("result:"));
    }

    #[test]
    fn reversed_braces_fall_back_to_whole_text() {
        let error = StructuredOutputExtractor::new()
            .extract("} nothing useful {")
            .expect_err("reversed braces");

        assert_eq!(error.excerpt, "} nothing useful {");
    }

    #[test]
    fn bare_non_object_json_is_rejected() {
        let error = StructuredOutputExtractor::new().extract("[1, 2, 3]").expect_err("array");

        assert!(error.reason.contains("an array"));
    }

    #[test]
    fn long_raw_text_is_truncated_in_excerpt() {
        let raw = "x".repeat(500);
        let error = StructuredOutputExtractor::new().extract(&raw).expect_err("not json");

        assert_eq!(error.excerpt.chars().count(), 201);
        assert!(error.excerpt.ends_with('…'));
    }
}
