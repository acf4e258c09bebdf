use thiserror::Error;

/// Top-level error returned by a simulation call. Always carries exactly one
/// root cause.
#[derive(Error, Debug)]
pub enum DagError {
    #[error("Graph error: {0}")]
    Graph(#[from] GraphError),

    #[error("No value supplied for data node: {0}")]
    MissingData(String),

    #[error("Function '{name}' failed: {source}")]
    FunctionExecution {
        name: String,
        #[source]
        source: FunctionError,
    },

    #[error("Invalid value: {0}")]
    InvalidValue(String),

    #[error("Execution cancelled")]
    Cancelled,

    #[error("Execution error: {0}")]
    Execution(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors detected while building the graph or resolving a plan, before
/// any function body runs.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("Input '{missing}' required by '{required_by}' matches no function or supplied data")]
    UnresolvedInput {
        missing: String,
        required_by: String,
    },

    #[error("Function '{0}' declares itself as an input")]
    SelfDependency(String),

    #[error("Unknown target: {0}")]
    UnknownTarget(String),

    #[error("Cyclic dependency detected: {}", .path.join(" -> "))]
    Cycle { path: Vec<String> },

    #[error("Function '{0}' is defined by more than one override layer")]
    OverrideConflict(String),
}

/// Failures raised by function bodies.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FunctionError {
    #[error("Missing required input: {0}")]
    MissingInput(String),

    #[error("Invalid input type for '{field}': expected {expected}, got {actual}")]
    InvalidInputType {
        field: String,
        expected: String,
        actual: String,
    },

    #[error("Missing parameter: {0}")]
    MissingParameter(String),

    #[error("Parameters requested by a function that does not declare them")]
    ParamsUnavailable,

    #[error("Series length mismatch: {left} vs {right}")]
    LengthMismatch { left: usize, right: usize },

    #[error("Execution failed: {0}")]
    ExecutionFailed(String),
}
