//! Cell values stored in block slots.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A single slot value.
///
/// Serialized untagged, so JSON `null`, `3`, `2.5` and `"normal"` map to
/// `Null`, `Int`, `Float` and `Text` respectively.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// SQL `NULL`. Read back as the column default.
    Null,
    /// Integer cell.
    Int(i64),
    /// Floating point cell.
    Float(f64),
    /// Categorical cell.
    Text(String),
}

impl Value {
    /// Whether the value is `Null`.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Numeric view of the value, if it has one.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(v) => Some(*v as f64),
            Value::Float(v) => Some(*v),
            Value::Null | Value::Text(_) => None,
        }
    }

    /// Text view of the value, if it is categorical.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Round floats to `digits` decimal places; other values are returned as is.
    pub fn round(&self, digits: u32) -> Value {
        match self {
            Value::Float(v) => {
                let scale = 10f64.powi(digits as i32);
                Value::Float((v * scale).round() / scale)
            }
            other => other.clone(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Int(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn untagged_json_mapping() {
        let values: Vec<Value> = serde_json::from_str(r#"[null, 3, 2.5, "normal"]"#).unwrap();
        assert_eq!(
            values,
            vec![
                Value::Null,
                Value::Int(3),
                Value::Float(2.5),
                Value::Text("normal".into())
            ]
        );
    }

    #[test]
    fn rounding_only_touches_floats() {
        assert_eq!(Value::Float(1.23456).round(2), Value::Float(1.23));
        assert_eq!(Value::Float(-0.005).round(1), Value::Float(-0.0));
        assert_eq!(Value::Int(7).round(2), Value::Int(7));
        assert_eq!(Value::from("x").round(2), Value::from("x"));
    }

    #[test]
    fn numeric_views() {
        assert_eq!(Value::Int(2).as_f64(), Some(2.0));
        assert_eq!(Value::Float(0.5).as_f64(), Some(0.5));
        assert_eq!(Value::Null.as_f64(), None);
        assert_eq!(Value::from(None::<f64>), Value::Null);
        assert_eq!(Value::from("a").as_str(), Some("a"));
    }
}
