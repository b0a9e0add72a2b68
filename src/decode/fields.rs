//! Lenient field access on loosely-typed JSON objects

use super::DecodeError;
use serde_json::{Map, Value};

type Object = Map<String, Value>;

/// Returns the array at a JSON pointer, or an empty slice
pub(crate) fn collection<'a>(root: &'a Value, pointer: &str) -> &'a [Value] {
    root.pointer(pointer)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

/// Returns the top-level array, or the array under `data`
pub(crate) fn root_or_data(root: &Value) -> &[Value] {
    match root {
        Value::Array(items) => items,
        _ => collection(root, "/data"),
    }
}

pub(crate) fn as_object(value: &Value) -> Result<&Object, DecodeError> {
    value.as_object().ok_or(DecodeError::NotAnObject)
}

/// Reads an unsigned integer that may be encoded as a number or a numeric string
fn unsigned(value: &Value) -> Option<u64> {
    match value {
        Value::Number(number) => number.as_u64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

/// Reads a required id, failing on absence, null or an out-of-range value
pub(crate) fn required_id<T: TryFrom<u64>>(
    object: &Object,
    field: &'static str,
) -> Result<T, DecodeError> {
    let value = match object.get(field) {
        None | Some(Value::Null) => return Err(DecodeError::MissingField(field)),
        Some(value) => value,
    };

    unsigned(value)
        .and_then(|number| T::try_from(number).ok())
        .ok_or_else(|| DecodeError::InvalidField {
            field,
            value: value.to_string(),
        })
}

/// Reads an optional id; absent, null and malformed values all become `None`
pub(crate) fn optional_id<T: TryFrom<u64>>(object: &Object, field: &str) -> Option<T> {
    object
        .get(field)
        .and_then(unsigned)
        .and_then(|number| T::try_from(number).ok())
}

/// Reads a required, non-empty name; numbers are accepted and stringified
pub(crate) fn required_name(object: &Object, field: &'static str) -> Result<String, DecodeError> {
    match object.get(field) {
        None | Some(Value::Null) => Err(DecodeError::MissingField(field)),
        Some(Value::String(text)) if !text.trim().is_empty() => Ok(text.clone()),
        Some(Value::Number(number)) => Ok(number.to_string()),
        Some(other) => Err(DecodeError::InvalidField {
            field,
            value: other.to_string(),
        }),
    }
}

/// Reads an optional string
pub(crate) fn optional_str(object: &Object, field: &str) -> Option<String> {
    object.get(field).and_then(Value::as_str).map(str::to_string)
}
