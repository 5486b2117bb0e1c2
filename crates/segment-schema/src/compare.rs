//! Semantic comparison of JSON documents held as strings.
//!
//! Rule documents are stored verbatim, so formatting and key order differ
//! between what the user wrote and what the API returns. Two documents are
//! equivalent when they decode to the same JSON tree: objects compare as
//! unordered maps, arrays element-wise in order, and numbers by value.

use crate::SchemaError;
use serde_json::Value;

/// Report whether two JSON documents are semantically equal.
///
/// If either side is empty the comparison is literal, so an empty document
/// only equals another empty document.
pub fn json_equivalent(old: &str, new: &str) -> Result<bool, SchemaError> {
    if old.is_empty() || new.is_empty() {
        return Ok(old == new);
    }
    let old: Value = serde_json::from_str(old)?;
    let new: Value = serde_json::from_str(new)?;
    Ok(values_equal(&old, &new))
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_f64(), y.as_f64()) {
            (Some(x), Some(y)) => x == y,
            _ => x == y,
        },
        (Value::Array(xs), Value::Array(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| values_equal(x, y))
        }
        (Value::Object(xs), Value::Object(ys)) => {
            xs.len() == ys.len()
                && xs
                    .iter()
                    .all(|(k, x)| ys.get(k).is_some_and(|y| values_equal(x, y)))
        }
        _ => a == b,
    }
}

/// Check that `text` is a JSON object. Used to validate rule documents before
/// any remote call is made.
pub fn validate_json_object(field: &str, text: &str) -> Result<(), SchemaError> {
    let value: Value = serde_json::from_str(text)?;
    if value.is_object() {
        Ok(())
    } else {
        Err(SchemaError::UnexpectedShape {
            field: field.to_owned(),
            expected: "JSON object",
        })
    }
}
