pub mod answer;
pub mod question;
pub mod quote;
pub mod record;

use serde_json::Value;

use crate::errors::PayloadError;

pub(crate) fn required_str<'a>(
    value: &'a Value,
    key: &str,
    path: &str,
) -> Result<&'a str, PayloadError> {
    match value.get(key) {
        None | Some(Value::Null) => Err(PayloadError::MissingField(format!("{path}.{key}"))),
        Some(Value::String(text)) => Ok(text.as_str()),
        Some(_) => {
            Err(PayloadError::WrongType { field: format!("{path}.{key}"), expected: "a string" })
        }
    }
}

pub(crate) fn optional_str(value: &Value, key: &str, path: &str) -> Result<String, PayloadError> {
    match value.get(key) {
        None | Some(Value::Null) => Ok(String::new()),
        Some(Value::String(text)) => Ok(text.trim().to_string()),
        Some(_) => {
            Err(PayloadError::WrongType { field: format!("{path}.{key}"), expected: "a string" })
        }
    }
}

/// Reads an optional list of strings. Blank entries are dropped.
pub(crate) fn string_list(
    value: &Value,
    key: &str,
    path: &str,
) -> Result<Vec<String>, PayloadError> {
    let field = format!("{path}.{key}");
    let items = match value.get(key) {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(Value::Array(items)) => items,
        Some(_) => return Err(PayloadError::WrongType { field, expected: "an array of strings" }),
    };

    let mut strings = Vec::with_capacity(items.len());
    for item in items {
        match item {
            Value::String(text) if !text.trim().is_empty() => strings.push(text.trim().to_string()),
            Value::String(_) => {}
            Value::Number(number) => strings.push(number.to_string()),
            _ => {
                return Err(PayloadError::WrongType {
                    field: field.clone(),
                    expected: "an array of strings",
                })
            }
        }
    }
    Ok(strings)
}
