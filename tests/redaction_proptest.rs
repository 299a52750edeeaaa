//! Property-based tests for payload redaction

use proptest::prelude::*;
use serde_json::{Map, Value};

use classroom_sync::backend::sync::redact::{is_sensitive_key, redact_sensitive};

fn json_leaf() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::from),
        "[a-z ]{0,12}".prop_map(Value::String),
    ]
}

fn json_key() -> impl Strategy<Value = String> {
    prop_oneof![
        "[a-zA-Z_]{1,10}",
        Just("password".to_string()),
        Just("refreshToken".to_string()),
        Just("CLIENT_SECRET".to_string()),
        Just("apiKey".to_string()),
        Just("keyword".to_string()),
    ]
}

/// Keys over `a..=j` can never contain a sensitive marker
fn safe_key() -> impl Strategy<Value = String> + Clone {
    "[a-j]{1,8}"
}

fn json_value_with<K>(keys: K) -> impl Strategy<Value = Value>
where
    K: Strategy<Value = String> + Clone + 'static,
{
    json_leaf().prop_recursive(4, 64, 6, move |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..6).prop_map(Value::Array),
            prop::collection::btree_map(keys.clone(), inner, 0..6)
                .prop_map(|map| Value::Object(map.into_iter().collect::<Map<String, Value>>())),
        ]
    })
}

fn json_value() -> impl Strategy<Value = Value> {
    json_value_with(json_key().boxed())
}

fn no_sensitive_keys(value: &Value) -> bool {
    match value {
        Value::Object(map) => map
            .iter()
            .all(|(key, inner)| !is_sensitive_key(key) && no_sensitive_keys(inner)),
        Value::Array(items) => items.iter().all(no_sensitive_keys),
        _ => true,
    }
}

proptest! {
    #[test]
    fn test_redacted_payload_has_no_sensitive_keys(value in json_value()) {
        prop_assert!(no_sensitive_keys(&redact_sensitive(&value)));
    }

    #[test]
    fn test_redaction_is_idempotent(value in json_value()) {
        let once = redact_sensitive(&value);
        prop_assert_eq!(redact_sensitive(&once), once.clone());
    }

    #[test]
    fn test_clean_payloads_are_untouched(value in json_value_with(safe_key())) {
        prop_assert_eq!(redact_sensitive(&value), value);
    }
}
