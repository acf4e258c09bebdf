// crates/dagruntime/tests/runtime_test.rs

use dagcore::{
    DagError, DataSet, ExecutionEvent, Function, FunctionContext, FunctionError, FunctionSpec,
    GraphError, ParameterBundle, Value,
};
use dagruntime::{
    CancellationToken, DagRuntime, DataSource, FunctionRegistry, JsonFileSource, OverridePolicy,
    OverrideReport, ParameterSource, RuntimeConfig, SimulationRequest, Targets,
};
use std::io::Write;
use std::sync::Arc;

/// Multiplies its single input by a fixed factor
struct Scale {
    input: &'static str,
    factor: f64,
}

impl Function for Scale {
    fn call(&self, ctx: &FunctionContext) -> Result<Value, FunctionError> {
        let factor = self.factor;
        ctx.require_input(self.input)?.map(|x| x * factor)
    }
}

fn scale(name: &str, input: &'static str, factor: f64) -> FunctionSpec {
    FunctionSpec::with_body(name, [input], Arc::new(Scale { input, factor }))
}

fn base_registry() -> FunctionRegistry {
    FunctionRegistry::new()
        .with(FunctionSpec::new(
            "gross_income",
            ["wage", "bonus"],
            |ctx: &FunctionContext| {
                ctx.require_input("wage")?
                    .zip_with(ctx.require_input("bonus")?, |w, b| w + b)
            },
        ))
        .with(
            FunctionSpec::new("net_income", ["gross_income"], |ctx: &FunctionContext| {
                let rate = ctx.params()?.require_f64("tax_rate")?;
                ctx.require_input("gross_income")?.map(|g| g * (1.0 - rate))
            })
            .with_params(),
        )
        .with(scale("pension", "wage", 0.05))
}

fn data() -> DataSet {
    DataSet::new().with("wage", 100.0).with("bonus", 20.0)
}

fn runtime() -> DagRuntime {
    DagRuntime::new(base_registry())
        .with_baseline_params(ParameterBundle::new().with("tax_rate", 0.1))
}

#[test]
fn test_register_replaces_in_place() {
    let mut registry = base_registry();
    registry.register(scale("gross_income", "wage", 2.0));

    assert_eq!(registry.len(), 3);
    assert_eq!(registry.names(), vec!["gross_income", "net_income", "pension"]);
    assert_eq!(registry.get("gross_income").unwrap().inputs, vec!["wage"]);
}

#[test]
fn test_merge_derives_added_and_replaced() {
    let base = base_registry();
    let overrides = FunctionRegistry::new()
        .with(scale("pension", "wage", 0.1))
        .with(scale("savings", "bonus", 0.5));

    let (merged, report) = base.merge(&overrides);

    assert_eq!(
        report,
        OverrideReport {
            added: vec!["savings".to_string()],
            replaced: vec!["pension".to_string()],
        }
    );
    assert_eq!(
        merged.names(),
        vec!["gross_income", "net_income", "pension", "savings"]
    );
    assert_eq!(base.len(), 3, "Base registry is untouched");
}

#[test]
fn test_override_inputs_replace_base_inputs() {
    let overrides = FunctionRegistry::new().with(scale("gross_income", "wage", 2.0));

    let effective = base_registry().with_overrides(&overrides);

    assert_eq!(effective.get("gross_income").unwrap().inputs, vec!["wage"]);
    assert_eq!(
        effective.get("net_income").unwrap().inputs,
        vec!["gross_income"]
    );
}

#[test]
fn test_layers_last_write_wins() {
    let first = FunctionRegistry::new().with(scale("pension", "wage", 0.1));
    let second = FunctionRegistry::new().with(scale("pension", "bonus", 0.2));

    let effective = base_registry()
        .resolve_layers(&[first, second], OverridePolicy::LastWriteWins)
        .unwrap();

    assert_eq!(effective.get("pension").unwrap().inputs, vec!["bonus"]);
}

#[test]
fn test_layers_reject_conflicts() {
    let first = FunctionRegistry::new().with(scale("pension", "wage", 0.1));
    let second = FunctionRegistry::new().with(scale("pension", "bonus", 0.2));

    let err = base_registry()
        .resolve_layers(&[first.clone(), second], OverridePolicy::RejectConflicts)
        .unwrap_err();
    assert_eq!(err, GraphError::OverrideConflict("pension".to_string()));

    // Overriding a base entry from a single layer is not a conflict
    assert!(base_registry()
        .resolve_layers(&[first], OverridePolicy::RejectConflicts)
        .is_ok());
}

#[tokio::test]
async fn test_run_merges_baseline_and_user_params() {
    let runtime = runtime();

    let baseline = runtime
        .run(SimulationRequest::new(data()).with_targets(Targets::names(["net_income"])))
        .await
        .unwrap();
    assert_eq!(baseline.result.get("net_income"), Some(&Value::Number(108.0)));

    let user = runtime
        .run(
            SimulationRequest::new(data())
                .with_params(ParameterBundle::new().with("tax_rate", 0.5))
                .with_targets(Targets::names(["net_income"])),
        )
        .await
        .unwrap();
    assert_eq!(user.result.get("net_income"), Some(&Value::Number(60.0)));
}

#[tokio::test]
async fn test_run_applies_overrides() {
    let overrides = FunctionRegistry::new().with(scale("gross_income", "wage", 2.0));

    let simulation = runtime()
        .run(
            SimulationRequest::new(DataSet::new().with("wage", 100.0))
                .with_override(overrides)
                .with_targets(Targets::names(["net_income", "pension"])),
        )
        .await
        .unwrap();

    assert_eq!(
        simulation.result.get("net_income"),
        Some(&Value::Number(180.0))
    );
    assert_eq!(simulation.result.get("pension"), Some(&Value::Number(5.0)));
    assert!(!simulation.plan.contains("bonus"));
}

#[tokio::test]
async fn test_all_targets_returns_every_node() {
    let simulation = runtime()
        .run(SimulationRequest::new(data()))
        .await
        .unwrap();

    assert_eq!(simulation.result.outputs.len(), simulation.dag.len());
    assert!(simulation.result.released.is_empty());
    assert_eq!(simulation.result.get("wage"), Some(&Value::Number(100.0)));
}

#[tokio::test]
async fn test_build_errors_surface_before_execution() {
    let err = runtime()
        .run(
            SimulationRequest::new(DataSet::new().with("wage", 100.0))
                .with_targets(Targets::names(["net_income"])),
        )
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        DagError::Graph(GraphError::UnresolvedInput { ref missing, ref required_by })
            if missing == "bonus" && required_by == "gross_income"
    ));
}

#[tokio::test]
async fn test_failed_run_broadcasts_failure_before_returning() {
    let runtime = runtime();
    let mut events = runtime.subscribe_events();
    let failing = FunctionRegistry::new().with(FunctionSpec::new(
        "pension",
        ["wage"],
        |_: &FunctionContext| -> Result<Value, FunctionError> {
            Err(FunctionError::ExecutionFailed("no pension table".to_string()))
        },
    ));

    let err = runtime
        .run(
            SimulationRequest::new(data())
                .with_override(failing)
                .with_targets(Targets::names(["pension"])),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, DagError::FunctionExecution { ref name, .. } if name == "pension"));

    let mut received = Vec::new();
    while let Ok(event) = events.try_recv() {
        received.push(event);
    }
    assert!(received.iter().any(|event| matches!(
        event,
        ExecutionEvent::FunctionFailed { name, .. } if name == "pension"
    )));
    assert!(matches!(
        received.last(),
        Some(ExecutionEvent::ExecutionCompleted { success: false, .. })
    ));

    // A planning failure never starts an execution
    runtime
        .run(SimulationRequest::new(DataSet::new()).with_targets(Targets::names(["pension"])))
        .await
        .unwrap_err();
    assert!(events.try_recv().is_err());
}

#[tokio::test]
async fn test_config_from_json() {
    let config = RuntimeConfig::from_json(
        r#"{
            "execution": { "parallel": true, "worker_count": 2, "gc": false },
            "override_policy": "reject_conflicts"
        }"#,
    )
    .unwrap();

    assert!(config.execution.parallel);
    assert!(!config.execution.gc);
    assert_eq!(config.execution.worker_count, 2);
    assert_eq!(config.event_buffer_size, 1000);
    assert_eq!(config.override_policy, OverridePolicy::RejectConflicts);

    let runtime = DagRuntime::with_config(base_registry(), config)
        .with_baseline_params(ParameterBundle::new().with("tax_rate", 0.1));
    let simulation = runtime
        .run(SimulationRequest::new(data()).with_targets(Targets::names(["net_income"])))
        .await
        .unwrap();

    assert_eq!(
        simulation.result.retained_value("gross_income"),
        Some(&Value::Number(120.0))
    );
}

#[tokio::test]
async fn test_cancellation_is_scoped_to_one_run() {
    let runtime = runtime();
    let request = || SimulationRequest::new(data()).with_targets(Targets::names(["net_income"]));

    let token = CancellationToken::new();
    token.cancel();
    let err = runtime
        .run_with_cancellation(request(), token)
        .await
        .unwrap_err();
    assert!(matches!(err, DagError::Cancelled));

    let simulation = runtime.run(request()).await.unwrap();
    assert_eq!(
        simulation.result.get("net_income"),
        Some(&Value::Number(108.0))
    );
}

#[tokio::test]
async fn test_json_file_sources() {
    let mut data_file = tempfile::NamedTempFile::new().unwrap();
    write!(
        data_file,
        r#"{{"wage": [100, 200], "bonus": 20, "region": "north"}}"#
    )
    .unwrap();
    let mut params_file = tempfile::NamedTempFile::new().unwrap();
    write!(params_file, r#"{{"tax_rate": 0.5}}"#).unwrap();

    let data = JsonFileSource::new(data_file.path()).load_data().await.unwrap();
    let params = JsonFileSource::new(params_file.path())
        .load_params()
        .await
        .unwrap();

    assert_eq!(
        data.get("wage").map(|v| &**v),
        Some(&Value::Series(vec![100.0, 200.0]))
    );
    assert_eq!(
        data.get("region").map(|v| &**v),
        Some(&Value::String("north".to_string()))
    );
    assert_eq!(params.require_f64("tax_rate").unwrap(), 0.5);

    let simulation = runtime()
        .run(
            SimulationRequest::new(data)
                .with_params(params)
                .with_targets(Targets::names(["net_income"])),
        )
        .await
        .unwrap();
    assert_eq!(
        simulation.result.get("net_income"),
        Some(&Value::Series(vec![60.0, 110.0]))
    );
}

#[tokio::test]
async fn test_json_source_rejects_non_object() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "[1, 2, 3]").unwrap();

    let err = JsonFileSource::new(file.path()).load_data().await.unwrap_err();

    assert!(matches!(err, DagError::Io(_)));
}
