//! Core abstractions for the dependency-graph simulator
//!
//! This crate provides the fundamental types that all other components
//! depend on: values, function specifications, parameters, supplied data,
//! the error taxonomy and execution events. It has no scheduling logic.

mod data;
mod error;
pub mod events;
mod function;
mod params;
mod value;

pub use data::DataSet;
pub use error::{DagError, FunctionError, GraphError};
pub use events::*;
pub use function::{Function, FunctionContext, FunctionSpec};
pub use params::ParameterBundle;
pub use value::Value;

/// Result type for simulator operations
pub type Result<T> = std::result::Result<T, DagError>;
