use crate::error::{Error, Errors};
use crate::reflect::ScalarValue;
use crate::tree::{Message, Value};
use serde_json::{json, Map, Number};

/// JSON formatting style.
#[derive(Clone, Copy)]
pub enum JsonStyle {
    /// Compact: no whitespace between tokens.
    Compact,
    /// Pretty: 2-space indented, one entry per line.
    Pretty,
}

/// A message as a JSON object keyed by field name. Oneofs render as an
/// object holding only the chosen option.
pub fn message_to_value(message: &Message) -> serde_json::Value {
    let fields: Map<String, serde_json::Value> = message
        .fields
        .iter()
        .map(|(name, value)| (name.clone(), value_to_json(value)))
        .collect();
    serde_json::Value::Object(fields)
}

fn value_to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Message(m) => message_to_value(m),
        Value::Scalar(s) => scalar_to_json(s),
        Value::List(items) => serde_json::Value::Array(items.iter().map(value_to_json).collect()),
        Value::Map { entries, .. } => serde_json::Value::Object(
            entries
                .iter()
                .map(|(key, v)| (key.clone(), value_to_json(v)))
                .collect(),
        ),
    }
}

fn scalar_to_json(scalar: &ScalarValue) -> serde_json::Value {
    match scalar {
        ScalarValue::String(s) => serde_json::Value::String(s.clone()),
        ScalarValue::Bool(b) => serde_json::Value::Bool(*b),
        ScalarValue::Int(n) => serde_json::Value::Number((*n).into()),
        // Non-finite floats have no JSON form.
        ScalarValue::Float(f) => Number::from_f64(*f)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
    }
}

pub fn to_json(message: &Message, style: JsonStyle) -> String {
    let value = message_to_value(message);
    let out = match style {
        JsonStyle::Compact => serde_json::to_string(&value),
        JsonStyle::Pretty => serde_json::to_string_pretty(&value),
    };
    // Serializing a serde_json::Value cannot fail.
    out.unwrap_or_default()
}

pub fn to_json_pretty(message: &Message) -> String {
    to_json(message, JsonStyle::Pretty)
}

fn error_to_json(err: &Error) -> serde_json::Value {
    json!({
        "code": err.code(),
        "message": err.message(),
        "begin": err.span.map(|s| s.start),
        "end": err.span.map(|s| s.end),
        "filename": err.filename,
        "context": err.context,
    })
}

/// Serialize errors to a JSON array string.
pub fn errors_to_json(errors: &Errors) -> String {
    let items: Vec<serde_json::Value> = errors.iter().map(error_to_json).collect();
    serde_json::Value::Array(items).to_string()
}
