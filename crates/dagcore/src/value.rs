use crate::{DagError, FunctionError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Dynamic value type for supplied data and function results
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "value")]
pub enum Value {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    /// One observation per row, e.g. a column of household incomes.
    Series(Vec<f64>),
    Array(Vec<Value>),
    Object(BTreeMap<String, Value>),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_series(&self) -> Option<&[f64]> {
        match self {
            Value::Series(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Series(_) => "series",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
        }
    }

    /// Applies `f` element-wise. Numbers map to numbers, series to series.
    pub fn map(&self, f: impl Fn(f64) -> f64) -> Result<Value, FunctionError> {
        match self {
            Value::Number(n) => Ok(Value::Number(f(*n))),
            Value::Series(s) => Ok(Value::Series(s.iter().map(|x| f(*x)).collect())),
            other => Err(numeric_type_error(other)),
        }
    }

    /// Combines two numeric values element-wise, broadcasting a number
    /// against a series.
    pub fn zip_with(
        &self,
        other: &Value,
        f: impl Fn(f64, f64) -> f64,
    ) -> Result<Value, FunctionError> {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => Ok(Value::Number(f(*a, *b))),
            (Value::Number(a), Value::Series(b)) => {
                Ok(Value::Series(b.iter().map(|y| f(*a, *y)).collect()))
            }
            (Value::Series(a), Value::Number(b)) => {
                Ok(Value::Series(a.iter().map(|x| f(*x, *b)).collect()))
            }
            (Value::Series(a), Value::Series(b)) => {
                if a.len() != b.len() {
                    return Err(FunctionError::LengthMismatch {
                        left: a.len(),
                        right: b.len(),
                    });
                }
                Ok(Value::Series(
                    a.iter().zip(b.iter()).map(|(x, y)| f(*x, *y)).collect(),
                ))
            }
            (Value::Number(_) | Value::Series(_), other) | (other, _) => {
                Err(numeric_type_error(other))
            }
        }
    }
}

fn numeric_type_error(value: &Value) -> FunctionError {
    FunctionError::InvalidInputType {
        field: "value".to_string(),
        expected: "number or series".to_string(),
        actual: value.type_name().to_string(),
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<Vec<f64>> for Value {
    fn from(s: Vec<f64>) -> Self {
        Value::Series(s)
    }
}

/// Numbers that have no `f64` form are rejected rather than coerced.
impl TryFrom<serde_json::Value> for Value {
    type Error = DagError;

    fn try_from(json: serde_json::Value) -> Result<Self, Self::Error> {
        Ok(match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_f64() {
                Some(x) => Value::Number(x),
                None => return Err(DagError::InvalidValue(format!("{} is not an f64", n))),
            },
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                // Homogeneous numeric arrays are columns.
                let numbers: Option<Vec<f64>> = items.iter().map(|v| v.as_f64()).collect();
                match numbers {
                    Some(series) if !items.is_empty() => Value::Series(series),
                    _ => Value::Array(
                        items
                            .into_iter()
                            .map(Value::try_from)
                            .collect::<Result<_, _>>()?,
                    ),
                }
            }
            serde_json::Value::Object(obj) => Value::Object(
                obj.into_iter()
                    .map(|(k, v)| Ok((k, Value::try_from(v)?)))
                    .collect::<Result<_, DagError>>()?,
            ),
        })
    }
}
