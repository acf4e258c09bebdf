use crate::{FunctionError, Value};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Read-only parameter bundle threaded to every function that declares
/// `needs_params`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParameterBundle {
    entries: BTreeMap<String, Value>,
}

impl ParameterBundle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.entries.insert(name.into(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.entries.get(name)
    }

    pub fn require(&self, name: &str) -> Result<&Value, FunctionError> {
        self.get(name)
            .ok_or_else(|| FunctionError::MissingParameter(name.to_string()))
    }

    pub fn require_f64(&self, name: &str) -> Result<f64, FunctionError> {
        let value = self.require(name)?;
        value.as_f64().ok_or_else(|| FunctionError::InvalidInputType {
            field: name.to_string(),
            expected: "number".to_string(),
            actual: value.type_name().to_string(),
        })
    }

    /// Returns a bundle where `user` entries override or extend these ones.
    pub fn merged_with(&self, user: &ParameterBundle) -> ParameterBundle {
        let mut entries = self.entries.clone();
        for (name, value) in &user.entries {
            if entries.insert(name.clone(), value.clone()).is_some() {
                tracing::debug!("Parameter '{}' overridden by user value", name);
            }
        }
        ParameterBundle { entries }
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(String, Value)> for ParameterBundle {
    fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}
