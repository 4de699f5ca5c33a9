//! Conversion between Firestore's typed value encoding and plain JSON.

use serde_json::{Map, Number, Value};

/// Decode a document's `fields` map into a plain JSON object.
pub fn decode_fields(fields: &Map<String, Value>) -> Value {
    Value::Object(
        fields
            .iter()
            .map(|(k, v)| (k.clone(), decode_value(v)))
            .collect(),
    )
}

/// Decode a single typed value such as `{"integerValue": "42"}`.
///
/// Unknown encodings become `null`.
pub fn decode_value(value: &Value) -> Value {
    let Some(obj) = value.as_object() else {
        return Value::Null;
    };
    let Some((kind, inner)) = obj.iter().next() else {
        return Value::Null;
    };

    match kind.as_str() {
        "stringValue" | "timestampValue" | "referenceValue" | "bytesValue" => inner.clone(),
        "booleanValue" => inner.clone(),
        // Integers travel as strings.
        "integerValue" => match inner {
            Value::String(s) => s
                .parse::<i64>()
                .map(|n| Value::Number(n.into()))
                .unwrap_or(Value::Null),
            Value::Number(_) => inner.clone(),
            _ => Value::Null,
        },
        "doubleValue" => match inner {
            Value::Number(_) => inner.clone(),
            Value::String(s) => s
                .parse::<f64>()
                .ok()
                .and_then(Number::from_f64)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            _ => Value::Null,
        },
        "mapValue" => match inner.get("fields").and_then(Value::as_object) {
            Some(fields) => decode_fields(fields),
            None => Value::Object(Map::new()),
        },
        "arrayValue" => Value::Array(
            inner
                .get("values")
                .and_then(Value::as_array)
                .map(|values| values.iter().map(decode_value).collect())
                .unwrap_or_default(),
        ),
        "geoPointValue" => inner.clone(),
        _ => Value::Null,
    }
}

/// Encode a string as a Firestore value.
pub fn string_value(s: &str) -> Value {
    serde_json::json!({ "stringValue": s })
}
