use crate::{FunctionError, ParameterBundle, Value};
use std::fmt;
use std::sync::Arc;

/// Executable body of a function node.
///
/// Bodies are pure: the result may depend only on the declared inputs and,
/// when requested, the parameter bundle.
pub trait Function: Send + Sync {
    fn call(&self, ctx: &FunctionContext) -> Result<Value, FunctionError>;
}

impl<F> Function for F
where
    F: Fn(&FunctionContext) -> Result<Value, FunctionError> + Send + Sync,
{
    fn call(&self, ctx: &FunctionContext) -> Result<Value, FunctionError> {
        self(ctx)
    }
}

/// A named computation step and the names of the values it consumes.
#[derive(Clone)]
pub struct FunctionSpec {
    pub name: String,
    /// Declared input names, in declaration order and without duplicates.
    pub inputs: Vec<String>,
    pub needs_params: bool,
    pub body: Arc<dyn Function>,
}

impl FunctionSpec {
    pub fn new<I, S, F>(name: impl Into<String>, inputs: I, body: F) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        F: Fn(&FunctionContext) -> Result<Value, FunctionError> + Send + Sync + 'static,
    {
        Self::with_body(name, inputs, Arc::new(body))
    }

    /// Build a spec around an existing [`Function`] implementation
    pub fn with_body<I, S>(name: impl Into<String>, inputs: I, body: Arc<dyn Function>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut declared: Vec<String> = Vec::new();
        for input in inputs {
            let input = input.into();
            if !declared.contains(&input) {
                declared.push(input);
            }
        }

        Self {
            name: name.into(),
            inputs: declared,
            needs_params: false,
            body,
        }
    }

    /// Marks the function as consuming the parameter bundle.
    pub fn with_params(mut self) -> Self {
        self.needs_params = true;
        self
    }
}

impl fmt::Debug for FunctionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionSpec")
            .field("name", &self.name)
            .field("inputs", &self.inputs)
            .field("needs_params", &self.needs_params)
            .finish_non_exhaustive()
    }
}

/// Arguments handed to a function body
#[derive(Clone)]
pub struct FunctionContext {
    /// Name of the node being evaluated
    pub name: String,

    /// Resolved input values, in declaration order
    pub inputs: Vec<(String, Arc<Value>)>,

    /// Present only when the function declares `needs_params`
    pub params: Option<Arc<ParameterBundle>>,
}

impl FunctionContext {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            inputs: Vec::new(),
            params: None,
        }
    }

    pub fn with_input(mut self, name: impl Into<String>, value: Arc<Value>) -> Self {
        self.inputs.push((name.into(), value));
        self
    }

    pub fn with_params(mut self, params: Arc<ParameterBundle>) -> Self {
        self.params = Some(params);
        self
    }

    /// Get required input or return error
    pub fn require_input(&self, name: &str) -> Result<&Value, FunctionError> {
        self.inputs
            .iter()
            .find(|(input, _)| input == name)
            .map(|(_, value)| value.as_ref())
            .ok_or_else(|| FunctionError::MissingInput(name.to_string()))
    }

    /// Get a required scalar input
    pub fn input_f64(&self, name: &str) -> Result<f64, FunctionError> {
        let value = self.require_input(name)?;
        value.as_f64().ok_or_else(|| FunctionError::InvalidInputType {
            field: name.to_string(),
            expected: "number".to_string(),
            actual: value.type_name().to_string(),
        })
    }

    /// Get the parameter bundle, failing if the function did not declare it
    pub fn params(&self) -> Result<&ParameterBundle, FunctionError> {
        self.params
            .as_deref()
            .ok_or(FunctionError::ParamsUnavailable)
    }
}
