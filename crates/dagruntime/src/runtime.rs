use crate::closure::{ExecutionPlan, Targets};
use crate::executor::{DagExecutor, ExecutionOptions, ExecutionResult};
use crate::graph::Dag;
use crate::registry::{FunctionRegistry, OverridePolicy};
use dagcore::{DataSet, EventBus, ExecutionEvent, ParameterBundle, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Main entry point: owns the base registry and baseline parameters and runs
/// simulations against them
pub struct DagRuntime {
    registry: Arc<FunctionRegistry>,
    baseline_params: Arc<ParameterBundle>,
    config: RuntimeConfig,
    event_bus: Arc<EventBus>,
}

impl DagRuntime {
    /// Create a runtime with default settings
    pub fn new(registry: FunctionRegistry) -> Self {
        Self::with_config(registry, RuntimeConfig::default())
    }

    /// Create a runtime with custom configuration
    pub fn with_config(registry: FunctionRegistry, config: RuntimeConfig) -> Self {
        let event_bus = Arc::new(EventBus::new(config.event_buffer_size));

        Self {
            registry: Arc::new(registry),
            baseline_params: Arc::new(ParameterBundle::new()),
            config,
            event_bus,
        }
    }

    /// Parameters that user parameters override or extend
    pub fn with_baseline_params(mut self, params: ParameterBundle) -> Self {
        self.baseline_params = Arc::new(params);
        self
    }

    pub fn registry(&self) -> &FunctionRegistry {
        &self.registry
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Subscribe to execution events
    pub fn subscribe_events(&self) -> tokio::sync::broadcast::Receiver<ExecutionEvent> {
        self.event_bus.subscribe()
    }

    pub fn event_bus(&self) -> &Arc<EventBus> {
        &self.event_bus
    }

    /// Apply the request's override layers and build its graph and plan.
    ///
    /// Every build-time error surfaces here, before any function runs.
    pub fn plan(&self, request: &SimulationRequest) -> Result<(Dag, ExecutionPlan)> {
        let effective = self
            .registry
            .resolve_layers(&request.overrides, self.config.override_policy)?;
        let dag = Dag::build(&effective, request.data.names())?;
        let plan = ExecutionPlan::resolve(&dag, request.targets.clone())?;
        Ok((dag, plan))
    }

    /// Plan and execute a simulation
    pub async fn run(&self, request: SimulationRequest) -> Result<Simulation> {
        self.run_with_cancellation(request, CancellationToken::new())
            .await
    }

    /// Plan and execute a simulation that fails with `Cancelled` once
    /// `cancellation` fires. Other calls on this runtime are unaffected.
    pub async fn run_with_cancellation(
        &self,
        request: SimulationRequest,
        cancellation: CancellationToken,
    ) -> Result<Simulation> {
        let (dag, plan) = self.plan(&request)?;

        tracing::info!(
            "Running simulation: {} targets, {} planned nodes, {} shadowed functions",
            plan.targets().len(),
            plan.len(),
            dag.shadowed().len()
        );

        let params = Arc::new(self.baseline_params.merged_with(&request.params));
        let executor = DagExecutor::new(self.config.execution.clone())
            .with_events(Arc::clone(&self.event_bus));
        let result = executor
            .execute_with_cancellation(&dag, &plan, &request.data, params, cancellation)
            .await?;

        Ok(Simulation { result, dag, plan })
    }
}

/// Inputs of one simulation
#[derive(Debug, Clone)]
pub struct SimulationRequest {
    pub data: DataSet,
    /// Override layers applied on top of the base registry, in order
    pub overrides: Vec<FunctionRegistry>,
    /// User parameters, merged over the runtime's baseline
    pub params: ParameterBundle,
    pub targets: Targets,
}

impl SimulationRequest {
    pub fn new(data: DataSet) -> Self {
        Self {
            data,
            overrides: Vec::new(),
            params: ParameterBundle::new(),
            targets: Targets::All,
        }
    }

    pub fn with_override(mut self, overrides: FunctionRegistry) -> Self {
        self.overrides.push(overrides);
        self
    }

    pub fn with_params(mut self, params: ParameterBundle) -> Self {
        self.params = params;
        self
    }

    pub fn with_targets(mut self, targets: impl Into<Targets>) -> Self {
        self.targets = targets.into();
        self
    }
}

/// Outcome of a simulation together with the graph and plan it ran
#[derive(Debug, Clone)]
pub struct Simulation {
    pub result: ExecutionResult,
    pub dag: Dag,
    pub plan: ExecutionPlan,
}

/// Configuration for the runtime
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub execution: ExecutionOptions,
    pub event_buffer_size: usize,
    pub override_policy: OverridePolicy,
}

impl RuntimeConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            execution: ExecutionOptions::default(),
            event_buffer_size: 1000,
            override_policy: OverridePolicy::default(),
        }
    }
}
