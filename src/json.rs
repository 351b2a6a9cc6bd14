//! Helpers for describing untrusted JSON input in error messages.

use serde_json::Value;

/// Article-prefixed name of a JSON value's type, e.g. "an array"
pub(crate) fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_kind_names() {
        assert_eq!(kind(&json!(null)), "null");
        assert_eq!(kind(&json!([1])), "an array");
        assert_eq!(kind(&json!({"a": 1})), "an object");
    }
}
