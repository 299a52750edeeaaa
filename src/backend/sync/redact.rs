//! Sensitive-field redaction for change payloads.
//!
//! Any object key whose lowercase form contains one of [`SENSITIVE_MARKERS`]
//! is dropped, at every depth, including objects nested in arrays. This is a
//! substring match on names only: it also drops harmless keys such as
//! `keyword`, and it misses credentials stored under unrelated names.

use serde_json::{Map, Value};

pub const SENSITIVE_MARKERS: [&str; 4] = ["password", "token", "secret", "key"];

pub fn is_sensitive_key(key: &str) -> bool {
    let key = key.to_ascii_lowercase();
    SENSITIVE_MARKERS.iter().any(|marker| key.contains(marker))
}

/// Copy of `value` with every sensitive key removed
pub fn redact_sensitive(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .filter(|(key, _)| !is_sensitive_key(key))
                .map(|(key, inner)| (key.clone(), redact_sensitive(inner)))
                .collect::<Map<String, Value>>(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(redact_sensitive).collect()),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_removes_nested_sensitive_keys() {
        let input = json!({
            "percentage": 91,
            "password": "hunter2",
            "student": {
                "name": "Ada",
                "apiKey": "abc",
                "sessions": [{"refresh_token": "r1", "device": "ipad"}]
            }
        });
        let expected = json!({
            "percentage": 91,
            "student": {
                "name": "Ada",
                "sessions": [{"device": "ipad"}]
            }
        });
        assert_eq!(redact_sensitive(&input), expected);
    }

    #[test]
    fn test_scalars_pass_through() {
        assert_eq!(redact_sensitive(&json!("password")), json!("password"));
        assert_eq!(redact_sensitive(&Value::Null), Value::Null);
    }

    #[test]
    fn test_match_is_case_insensitive_substring() {
        assert!(is_sensitive_key("ClientSecret"));
        assert!(is_sensitive_key("keyword"));
        assert!(!is_sensitive_key("credential"));
    }
}
