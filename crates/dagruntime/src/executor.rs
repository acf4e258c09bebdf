use crate::closure::ExecutionPlan;
use crate::graph::Dag;
use chrono::Utc;
use dagcore::{
    DagError, DataSet, EventBus, ExecutionEvent, ExecutionId, FunctionContext, FunctionError,
    Function, FunctionSpec, ParameterBundle, Result, Value,
};
use futures::stream::{FuturesUnordered, StreamExt};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::collections::{HashMap, HashSet, VecDeque};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

type BodyOutcome = (String, std::result::Result<Value, FunctionError>, u64);

/// How a plan is executed
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionOptions {
    /// Run independent functions concurrently on a worker pool
    pub parallel: bool,
    /// Release intermediate values once their last consumer has run
    pub gc: bool,
    /// Maximum number of function bodies in flight in parallel mode
    pub worker_count: usize,
}

impl Default for ExecutionOptions {
    fn default() -> Self {
        Self {
            parallel: false,
            gc: true,
            worker_count: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
        }
    }
}

/// Result of executing a plan
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    pub execution_id: ExecutionId,
    /// Values of the requested targets
    pub outputs: HashMap<String, Value>,
    /// Non-target values still held when the call completed
    pub retained: HashMap<String, Value>,
    /// Names released by garbage collection, in release order
    pub released: Vec<String>,
    pub executed_functions: usize,
    pub duration_ms: u64,
}

impl ExecutionResult {
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.outputs.get(name)
    }

    /// Look up a non-target value that was not released
    pub fn retained_value(&self, name: &str) -> Option<&Value> {
        self.retained.get(name)
    }
}

/// Executes resolved plans, sequentially or on a bounded worker pool
pub struct DagExecutor {
    options: ExecutionOptions,
    events: Arc<EventBus>,
}

impl DagExecutor {
    pub fn new(options: ExecutionOptions) -> Self {
        Self {
            options,
            events: Arc::new(EventBus::default()),
        }
    }

    /// Publish execution events on a shared bus
    pub fn with_events(mut self, events: Arc<EventBus>) -> Self {
        self.events = events;
        self
    }

    pub fn options(&self) -> &ExecutionOptions {
        &self.options
    }

    /// Execute `plan` over `dag` and return the values of its targets.
    ///
    /// Any failure aborts the whole call; no partial results are returned.
    pub async fn execute(
        &self,
        dag: &Dag,
        plan: &ExecutionPlan,
        data: &DataSet,
        params: Arc<ParameterBundle>,
    ) -> Result<ExecutionResult> {
        self.execute_with_cancellation(dag, plan, data, params, CancellationToken::new())
            .await
    }

    /// Like [`execute`](Self::execute), but stops dispatching and fails with
    /// `Cancelled` once `cancellation` fires. The token only governs this call.
    pub async fn execute_with_cancellation(
        &self,
        dag: &Dag,
        plan: &ExecutionPlan,
        data: &DataSet,
        params: Arc<ParameterBundle>,
        cancellation: CancellationToken,
    ) -> Result<ExecutionResult> {
        let execution_id = ExecutionId::new_v4();
        let start_time = Instant::now();

        self.events.emit(ExecutionEvent::ExecutionStarted {
            execution_id,
            targets: plan.targets().to_vec(),
            planned_nodes: plan.len(),
            timestamp: Utc::now(),
        });

        tracing::info!(
            "Starting execution {}: {} nodes, parallel={}, gc={}",
            execution_id,
            plan.len(),
            self.options.parallel,
            self.options.gc
        );

        let mut run = Run {
            execution_id,
            dag,
            plan,
            data,
            params,
            events: &self.events,
            store: ResultStore::new(dag, plan, self.options.gc),
            executed_functions: 0,
        };

        let outcome = if self.options.parallel {
            run.execute_parallel(self.options.worker_count.max(1), &cancellation)
                .await
        } else {
            run.execute_sequential(&cancellation).await
        };

        let duration_ms = start_time.elapsed().as_millis() as u64;

        self.events.emit(ExecutionEvent::ExecutionCompleted {
            execution_id,
            success: outcome.is_ok(),
            duration_ms,
            timestamp: Utc::now(),
        });

        match outcome {
            Ok(()) => {
                tracing::info!("Execution {} completed in {}ms", execution_id, duration_ms);
                let executed_functions = run.executed_functions;
                let (outputs, retained, released) = run.store.finish(plan)?;
                Ok(ExecutionResult {
                    execution_id,
                    outputs,
                    retained,
                    released,
                    executed_functions,
                    duration_ms,
                })
            }
            Err(e) => {
                tracing::error!("Execution {} failed: {}", execution_id, e);
                Err(e)
            }
        }
    }
}

/// Per-call execution state
struct Run<'a> {
    execution_id: ExecutionId,
    dag: &'a Dag,
    plan: &'a ExecutionPlan,
    data: &'a DataSet,
    params: Arc<ParameterBundle>,
    events: &'a EventBus,
    store: ResultStore,
    executed_functions: usize,
}

impl<'a> Run<'a> {
    /// One body at a time, in plan order. Bodies still run on the blocking
    /// pool so the async workers stay free.
    async fn execute_sequential(&mut self, cancellation: &CancellationToken) -> Result<()> {
        let (dag, plan) = (self.dag, self.plan);
        for name in plan.order() {
            if cancellation.is_cancelled() {
                return Err(DagError::Cancelled);
            }

            let Some(spec) = dag.spec(name) else {
                self.load_data(name)?;
                continue;
            };

            let ctx = self.context_for(spec)?;
            self.function_started(name);
            let task = spawn_body(name.clone(), Arc::clone(&spec.body), ctx);

            tokio::select! {
                _ = cancellation.cancelled() => {
                    return Err(DagError::Cancelled);
                }
                joined = task => {
                    let (_, result, duration_ms) = joined.map_err(join_error)?;
                    self.function_finished(name, result, duration_ms)?;
                }
            }
        }
        Ok(())
    }

    async fn execute_parallel(
        &mut self,
        worker_count: usize,
        cancellation: &CancellationToken,
    ) -> Result<()> {
        let (dag, plan) = (self.dag, self.plan);

        // Distinct planned inputs not yet written to the store
        let mut pending: HashMap<String, usize> = plan
            .order()
            .iter()
            .map(|name| {
                let distinct: HashSet<&String> = dag.inputs(name).iter().collect();
                (name.clone(), distinct.len())
            })
            .collect();

        let mut ready: VecDeque<String> = plan
            .order()
            .iter()
            .filter(|name| pending[*name] == 0)
            .cloned()
            .collect();
        let mut running = FuturesUnordered::new();

        loop {
            if cancellation.is_cancelled() {
                return Err(DagError::Cancelled);
            }

            // Dispatch ready nodes up to the worker limit
            while let Some(name) = ready.pop_front() {
                let Some(spec) = dag.spec(&name) else {
                    self.load_data(&name)?;
                    self.mark_ready_consumers(&name, &mut pending, &mut ready);
                    continue;
                };

                if running.len() >= worker_count {
                    ready.push_front(name);
                    break;
                }

                let ctx = self.context_for(spec)?;
                self.function_started(&name);
                running.push(spawn_body(name, Arc::clone(&spec.body), ctx));
            }

            // If nothing is running and nothing is ready, we're done
            if running.is_empty() {
                break;
            }

            tokio::select! {
                _ = cancellation.cancelled() => {
                    return Err(DagError::Cancelled);
                }
                Some(joined) = running.next() => {
                    let (name, result, duration_ms) = joined.map_err(join_error)?;
                    self.function_finished(&name, result, duration_ms)?;
                    self.mark_ready_consumers(&name, &mut pending, &mut ready);
                }
            }
        }

        if let Some((name, _)) = pending.iter().find(|(_, count)| **count > 0) {
            return Err(DagError::Execution(format!(
                "Node {} never became ready",
                name
            )));
        }

        Ok(())
    }

    fn load_data(&mut self, name: &str) -> Result<()> {
        let value = self
            .data
            .get(name)
            .cloned()
            .ok_or_else(|| DagError::MissingData(name.to_string()))?;
        tracing::debug!("Loaded data node {}", name);
        self.store.insert(name, value);
        Ok(())
    }

    fn context_for(&self, spec: &FunctionSpec) -> Result<FunctionContext> {
        let mut ctx = FunctionContext::new(spec.name.clone());
        for input in &spec.inputs {
            let value = self.store.get(input).ok_or_else(|| {
                DagError::Execution(format!(
                    "Input '{}' of '{}' is not available",
                    input, spec.name
                ))
            })?;
            ctx = ctx.with_input(input.clone(), value);
        }
        if spec.needs_params {
            ctx = ctx.with_params(Arc::clone(&self.params));
        }
        Ok(ctx)
    }

    fn function_started(&self, name: &str) {
        tracing::debug!("Starting function {}", name);
        self.events.emit(ExecutionEvent::FunctionStarted {
            execution_id: self.execution_id,
            name: name.to_string(),
            timestamp: Utc::now(),
        });
    }

    /// Record a finished body: store its value exactly once, then release
    /// inputs that have no remaining consumers.
    fn function_finished(
        &mut self,
        name: &str,
        result: std::result::Result<Value, FunctionError>,
        duration_ms: u64,
    ) -> Result<()> {
        match result {
            Ok(value) => {
                tracing::debug!("Function {} completed in {}ms", name, duration_ms);
                self.events.emit(ExecutionEvent::FunctionCompleted {
                    execution_id: self.execution_id,
                    name: name.to_string(),
                    duration_ms,
                    timestamp: Utc::now(),
                });
                self.store.insert(name, Arc::new(value));
                self.executed_functions += 1;

                for released in self.store.consumed(self.dag, self.plan, name) {
                    tracing::debug!("Released {}", released);
                    self.events.emit(ExecutionEvent::ValueReleased {
                        execution_id: self.execution_id,
                        name: released,
                        timestamp: Utc::now(),
                    });
                }
                Ok(())
            }
            Err(e) => {
                tracing::error!("Function {} failed: {}", name, e);
                self.events.emit(ExecutionEvent::FunctionFailed {
                    execution_id: self.execution_id,
                    name: name.to_string(),
                    error: e.to_string(),
                    timestamp: Utc::now(),
                });
                Err(DagError::FunctionExecution {
                    name: name.to_string(),
                    source: e,
                })
            }
        }
    }

    /// Decrement the pending count of every planned consumer of `name` and
    /// queue those that just became ready.
    fn mark_ready_consumers(
        &self,
        name: &str,
        pending: &mut HashMap<String, usize>,
        ready: &mut VecDeque<String>,
    ) {
        for consumer in self.dag.consumers(name) {
            if let Some(count) = pending.get_mut(&consumer) {
                *count -= 1;
                if *count == 0 {
                    ready.push_back(consumer);
                }
            }
        }
    }
}

/// Run a body on the blocking pool. A panic is caught and reported as an
/// `ExecutionFailed` error of that body.
fn spawn_body(
    name: String,
    body: Arc<dyn Function>,
    ctx: FunctionContext,
) -> JoinHandle<BodyOutcome> {
    tokio::task::spawn_blocking(move || {
        let start = Instant::now();
        let result = panic::catch_unwind(AssertUnwindSafe(|| body.call(&ctx)))
            .unwrap_or_else(|payload| {
                Err(FunctionError::ExecutionFailed(format!(
                    "panicked: {}",
                    panic_message(payload.as_ref())
                )))
            });
        let duration_ms = start.elapsed().as_millis() as u64;
        (name, result, duration_ms)
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

fn join_error(e: tokio::task::JoinError) -> DagError {
    DagError::Execution(format!("Task join error: {}", e))
}

/// Values computed during one call, with per-node consumer counts for
/// garbage collection
struct ResultStore {
    values: HashMap<String, Arc<Value>>,
    remaining_consumers: HashMap<String, usize>,
    released: Vec<String>,
    gc: bool,
}

impl ResultStore {
    fn new(dag: &Dag, plan: &ExecutionPlan, gc: bool) -> Self {
        Self {
            values: HashMap::with_capacity(plan.len()),
            remaining_consumers: plan.consumer_counts(dag),
            released: Vec::new(),
            gc,
        }
    }

    fn insert(&mut self, name: &str, value: Arc<Value>) {
        self.values.insert(name.to_string(), value);
    }

    fn get(&self, name: &str) -> Option<Arc<Value>> {
        self.values.get(name).cloned()
    }

    /// `name` has run; returns the inputs released as a result.
    fn consumed(&mut self, dag: &Dag, plan: &ExecutionPlan, name: &str) -> Vec<String> {
        let mut released = Vec::new();
        for input in dag.inputs(name) {
            let Some(count) = self.remaining_consumers.get_mut(input) else {
                continue;
            };
            *count = count.saturating_sub(1);
            if *count == 0 && self.gc && !plan.is_target(input) {
                if self.values.remove(input).is_some() {
                    self.released.push(input.clone());
                    released.push(input.clone());
                }
            }
        }
        released
    }

    fn finish(
        self,
        plan: &ExecutionPlan,
    ) -> Result<(HashMap<String, Value>, HashMap<String, Value>, Vec<String>)> {
        let mut values = self.values;
        let mut outputs = HashMap::with_capacity(plan.targets().len());
        for target in plan.targets() {
            let value = values.remove(target).ok_or_else(|| {
                DagError::Execution(format!("Target {} was not computed", target))
            })?;
            outputs.insert(target.clone(), Arc::unwrap_or_clone(value));
        }
        let retained = values
            .into_iter()
            .map(|(name, value)| (name, Arc::unwrap_or_clone(value)))
            .collect();
        Ok((outputs, retained, self.released))
    }
}
