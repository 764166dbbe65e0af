//! Tag value coercion.
//!
//! Hints are matched exactly: Jaeger's own `int64` / `float64` types fall
//! through to the "no hint" branch, which leaves JSON numbers untouched.

use serde_json::Value;

use crate::error::ConversionError;
use crate::model::Scalar;

const TRUTHY_WORDS: [&str; 5] = ["true", "1", "t", "y", "yes"];

/// Convert `value` according to `type_hint`.
///
/// A `bool` hint uses plain truthiness, so the string `"false"` is `true`
/// (non-empty). Downstream consumers rely on this.
pub fn convert_tag_value(value: &Value, type_hint: &str) -> Result<Scalar, ConversionError> {
    match type_hint {
        "bool" | "boolean" => Ok(Scalar::Bool(truthy(value))),
        "string" | "str" => Ok(Scalar::Text(render(value))),
        "int" | "integer" => to_int(value).map(Scalar::Int),
        "float" | "double" => to_float(value).map(Scalar::Float),
        _ => Ok(match value {
            Value::String(s) => {
                let lowered = s.to_lowercase();
                Scalar::Bool(TRUTHY_WORDS.contains(&lowered.as_str()))
            }
            other => Scalar::from_json(other),
        }),
    }
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|x| x != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(fields) => !fields.is_empty(),
    }
}

fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn to_int(value: &Value) -> Result<i64, ConversionError> {
    let fail = || ConversionError {
        value: render(value),
        target: "int",
    };
    match value {
        Value::Bool(b) => Ok(i64::from(*b)),
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|x| x.is_finite()).map(|x| x.trunc() as i64))
            .ok_or_else(fail),
        Value::String(s) => s.trim().parse::<i64>().map_err(|_| fail()),
        _ => Err(fail()),
    }
}

fn to_float(value: &Value) -> Result<f64, ConversionError> {
    let fail = || ConversionError {
        value: render(value),
        target: "float",
    };
    match value {
        Value::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
        Value::Number(n) => n.as_f64().ok_or_else(fail),
        Value::String(s) => s.trim().parse::<f64>().map_err(|_| fail()),
        _ => Err(fail()),
    }
}
