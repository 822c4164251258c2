//! Conversions between property values and JSON.

use base64::Engine;
use docrest_datastore::Value;

/// Render a property value as JSON.
///
/// Keys become their URL-safe string, bytes are base64 encoded, and
/// calendar types use ISO 8601.
pub fn property_to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::Integer(i) => serde_json::Value::Number((*i).into()),
        Value::Float(f) => serde_json::Number::from_f64(*f)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        Value::String(s) => serde_json::Value::String(s.clone()),
        Value::Bytes(b) => {
            // JSON doesn't have bytes, so we base64 encode
            let encoded = base64::engine::general_purpose::STANDARD.encode(b);
            serde_json::Value::String(encoded)
        }
        Value::Date(_) | Value::DateTime(_) | Value::Time(_) | Value::Key(_) => {
            serde_json::Value::String(value.to_string())
        }
        Value::List(items) => serde_json::Value::Array(items.iter().map(property_to_json).collect()),
        Value::Map(map) => serde_json::Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), property_to_json(v)))
                .collect(),
        ),
    }
}

/// Convert untyped JSON into a property value.
///
/// Strings stay strings; only the field layer knows when a string should
/// become a key or a timestamp.
pub fn json_to_property(json: &serde_json::Value) -> Value {
    match json {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Bool(*b),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::Integer(i)
            } else if let Some(f) = n.as_f64() {
                Value::Float(f)
            } else {
                // Fallback for very large numbers
                Value::String(n.to_string())
            }
        }
        serde_json::Value::String(s) => Value::String(s.clone()),
        serde_json::Value::Array(arr) => Value::List(arr.iter().map(json_to_property).collect()),
        serde_json::Value::Object(map) => Value::Map(
            map.iter()
                .map(|(k, v)| (k.clone(), json_to_property(v)))
                .collect(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use collection_literals::btree;
    use docrest_datastore::Key;
    use serde_json::json;

    #[test]
    fn scalars_to_json() {
        assert_eq!(property_to_json(&Value::from(3)), json!(3));
        assert_eq!(property_to_json(&Value::from(true)), json!(true));
        assert_eq!(property_to_json(&Value::from("x")), json!("x"));
        assert_eq!(property_to_json(&Value::Float(f64::NAN)), json!(null));
    }

    #[test]
    fn special_types_render_as_strings() {
        let key = Key::with_id("Note", 1);
        assert_eq!(
            property_to_json(&Value::from(key.clone())),
            json!(key.urlsafe())
        );

        let date = NaiveDate::from_ymd_opt(2023, 1, 9).unwrap();
        assert_eq!(property_to_json(&Value::from(date)), json!("2023-01-09"));

        assert_eq!(property_to_json(&Value::Bytes(b"hi".to_vec())), json!("aGk="));
    }

    #[test]
    fn nested_values_to_json() {
        let value = Value::Map(btree! {
            "tags".to_string() => Value::from(vec!["a", "b"]),
            "n".to_string() => Value::from(1),
        });
        assert_eq!(
            property_to_json(&value),
            json!({"tags": ["a", "b"], "n": 1})
        );
    }

    #[test]
    fn json_numbers_to_property() {
        match json_to_property(&json!({"integer": 42, "float": 2.75, "negative": -100})) {
            Value::Map(map) => {
                assert_eq!(map.get("integer"), Some(&Value::Integer(42)));
                assert_eq!(map.get("negative"), Some(&Value::Integer(-100)));
                if let Some(Value::Float(f)) = map.get("float") {
                    assert!((f - 2.75).abs() < 0.001);
                } else {
                    panic!("expected float");
                }
            }
            other => panic!("expected map, got {:?}", other),
        }
    }

    #[test]
    fn json_arrays_become_lists() {
        assert_eq!(
            json_to_property(&json!(["a", null])),
            Value::List(vec![Value::from("a"), Value::Null])
        );
    }
}
