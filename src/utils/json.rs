use serde_json::{Map, Value};

/// Distinguishes "key absent" from "key explicitly null" in partial-update
/// payloads, where the two mean "leave unchanged" and "clear the field".
pub enum NullableValue<T> {
    Omitted,
    Null,
    Value(T),
}

/// Parses a request body as a JSON object. Empty bodies and non-object
/// payloads are rejected with the message the API contract expects.
pub fn parse_object(bytes: &[u8]) -> Result<Map<String, Value>, String> {
    if bytes.is_empty() {
        return Err("Request body cannot be empty".to_string());
    }
    match serde_json::from_slice::<Value>(bytes) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) | Err(_) => Err("Request body must be a JSON object".to_string()),
    }
}

pub fn classify_nullable_str(optional_value: Option<&Value>) -> Result<NullableValue<String>, String> {
    match optional_value {
        None => Ok(NullableValue::Omitted),
        Some(Value::Null) => Ok(NullableValue::Null),
        Some(Value::String(s)) => Ok(NullableValue::Value(s.to_owned())),
        Some(other) => Err(format!("expected string or null, got {other}")),
    }
}

pub fn classify_nullable_int(optional_value: Option<&Value>) -> Result<NullableValue<i32>, String> {
    match optional_value {
        None => Ok(NullableValue::Omitted),
        Some(Value::Null) => Ok(NullableValue::Null),
        Some(Value::Number(n)) => n
            .as_i64()
            .and_then(|v| i32::try_from(v).ok())
            .map(NullableValue::Value)
            .ok_or_else(|| format!("expected integer, got {n}")),
        Some(other) => Err(format!("expected integer or null, got {other}")),
    }
}

/// Present, string-typed and non-empty, mirroring the truthiness check the
/// frontend was built against.
pub fn non_empty_str<'a>(data: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    data.get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}

pub fn opt_i32(data: &Map<String, Value>, key: &str) -> Option<i32> {
    data.get(key)
        .and_then(Value::as_i64)
        .and_then(|v| i32::try_from(v).ok())
}
