// src/pipeline/extra.rs
use serde_json::{Map, Value};

/// Decoded `extra` payload. Always a mapping, possibly empty.
pub type Extra = Map<String, Value>;

/// Marker key for a decoded value that is not itself an object.
pub const VALUE_KEY: &str = "_value";
/// Marker key for a string that could not be decoded as JSON.
pub const RAW_KEY: &str = "_raw";

/// Shape of a record's raw `extra` field before decoding
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ExtraInput<'a> {
    /// Field missing or null
    Absent,
    /// Already a JSON object
    Object(&'a Map<String, Value>),
    /// A string that may contain encoded JSON
    Text(&'a str),
    /// Any other non-null value
    Scalar(&'a Value),
}

impl<'a> ExtraInput<'a> {
    pub fn classify(value: Option<&'a Value>) -> Self {
        match value {
            None | Some(Value::Null) => ExtraInput::Absent,
            Some(Value::Object(map)) => ExtraInput::Object(map),
            Some(Value::String(text)) => ExtraInput::Text(text),
            Some(other) => ExtraInput::Scalar(other),
        }
    }

    pub fn decode(self) -> Extra {
        match self {
            ExtraInput::Absent => Extra::new(),
            ExtraInput::Object(map) => map.clone(),
            ExtraInput::Text(text) => decode_text(text.trim()),
            ExtraInput::Scalar(value) => wrap(VALUE_KEY, value.clone()),
        }
    }
}

/// Normalize a record's `extra` field into a mapping. Never fails.
pub fn normalize_extra(value: Option<&Value>) -> Extra {
    ExtraInput::classify(value).decode()
}

fn decode_text(text: &str) -> Extra {
    if text.is_empty() {
        return Extra::new();
    }

    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(map)) => map,
        Ok(other) => wrap(VALUE_KEY, other),
        Err(_) => wrap(RAW_KEY, Value::String(text.to_string())),
    }
}

fn wrap(key: &str, value: Value) -> Extra {
    let mut extra = Extra::new();
    extra.insert(key.to_string(), value);
    extra
}
