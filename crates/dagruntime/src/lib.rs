//! Dependency-graph construction and execution
//!
//! This crate turns a registry of named functions plus a pool of named data
//! into a DAG, resolves the minimal closure needed for a set of targets and
//! executes it sequentially or on a bounded worker pool.

mod closure;
mod executor;
mod graph;
mod loader;
mod registry;
mod runtime;

pub use closure::{ExecutionPlan, Targets};
pub use executor::{DagExecutor, ExecutionOptions, ExecutionResult};
pub use graph::{Dag, NodeKind};
pub use loader::{DataSource, JsonFileSource, ParameterSource};
pub use registry::{FunctionRegistry, OverridePolicy, OverrideReport};
pub use runtime::{DagRuntime, RuntimeConfig, Simulation, SimulationRequest};
pub use tokio_util::sync::CancellationToken;
