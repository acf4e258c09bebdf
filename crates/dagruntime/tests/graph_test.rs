// crates/dagruntime/tests/graph_test.rs

use dagcore::{FunctionContext, FunctionError, FunctionSpec, GraphError, Value};
use dagruntime::{Dag, ExecutionPlan, FunctionRegistry, NodeKind, Targets};

fn constant(ctx: &FunctionContext) -> Result<Value, FunctionError> {
    Ok(Value::Number(ctx.inputs.len() as f64))
}

fn spec(name: &str, inputs: &[&str]) -> FunctionSpec {
    FunctionSpec::new(name, inputs.iter().copied(), constant)
}

fn income_registry() -> FunctionRegistry {
    FunctionRegistry::new()
        .with(spec("gross_income", &["wage", "bonus"]))
        .with(spec("net_income", &["gross_income", "tax_rate"]))
}

#[test]
fn test_build_contains_functions_and_data() {
    let dag = Dag::build(&income_registry(), ["wage", "bonus", "tax_rate"]).unwrap();

    assert_eq!(dag.len(), 5);
    assert_eq!(dag.function_names(), vec!["gross_income", "net_income"]);
    assert_eq!(dag.data_names(), vec!["bonus", "tax_rate", "wage"]);
    assert_eq!(dag.kind("wage"), Some(NodeKind::Data));
    assert_eq!(dag.kind("net_income"), Some(NodeKind::Function));
    assert_eq!(dag.kind("missing"), None);
    assert_eq!(dag.inputs("net_income"), &["gross_income", "tax_rate"]);
    assert!(dag.inputs("wage").is_empty());
    assert_eq!(dag.consumers("gross_income"), vec!["net_income"]);
    assert!(dag.consumers("net_income").is_empty());
}

#[test]
fn test_unresolved_input_names_function_and_missing_input() {
    let err = Dag::build(&income_registry(), ["wage", "bonus"]).unwrap_err();

    assert_eq!(
        err,
        GraphError::UnresolvedInput {
            missing: "tax_rate".to_string(),
            required_by: "net_income".to_string(),
        }
    );
}

#[test]
fn test_self_dependency_rejected_at_build() {
    let registry = FunctionRegistry::new().with(spec("loop", &["loop", "x"]));

    let err = Dag::build(&registry, ["x"]).unwrap_err();

    assert_eq!(err, GraphError::SelfDependency("loop".to_string()));
}

#[test]
fn test_two_node_cycle_reports_full_path() {
    let registry = FunctionRegistry::new()
        .with(spec("a", &["b"]))
        .with(spec("b", &["a"]));

    let err = Dag::build(&registry, Vec::<String>::new()).unwrap_err();

    match err {
        GraphError::Cycle { path } => {
            assert!(
                path == vec!["a", "b"] || path == vec!["b", "a"],
                "unexpected cycle path: {:?}",
                path
            );
        }
        other => panic!("expected cycle error, got {:?}", other),
    }
}

#[test]
fn test_longer_cycle_excludes_entry_tail() {
    let registry = FunctionRegistry::new()
        .with(spec("x", &["a"]))
        .with(spec("a", &["b"]))
        .with(spec("b", &["c"]))
        .with(spec("c", &["a", "seed"]));

    let err = Dag::build(&registry, ["seed"]).unwrap_err();

    assert_eq!(
        err,
        GraphError::Cycle {
            path: vec!["a".to_string(), "b".to_string(), "c".to_string()],
        }
    );
    assert!(err.to_string().contains("a -> b -> c"));
}

#[test]
fn test_supplied_data_shadows_function() {
    // gross_income's own inputs are never supplied, which is fine once it is shadowed
    let dag = Dag::build(&income_registry(), ["gross_income", "tax_rate"]).unwrap();

    assert_eq!(dag.kind("gross_income"), Some(NodeKind::Data));
    assert_eq!(dag.shadowed(), &["gross_income"]);
    assert!(!dag.contains("wage"));

    let plan = ExecutionPlan::resolve(&dag, Targets::names(["net_income"])).unwrap();
    assert_eq!(plan.order(), &["gross_income", "tax_rate", "net_income"]);
}

#[test]
fn test_closure_order_matches_declared_inputs() {
    let dag = Dag::build(&income_registry(), ["wage", "bonus", "tax_rate"]).unwrap();

    let plan = ExecutionPlan::resolve(&dag, Targets::names(["net_income"])).unwrap();

    assert_eq!(
        plan.order(),
        &["wage", "bonus", "gross_income", "tax_rate", "net_income"]
    );
    assert_eq!(plan.targets(), &["net_income"]);
}

#[test]
fn test_closure_excludes_unneeded_nodes() {
    let registry = income_registry().with(spec("unrelated", &["other"]));
    let dag = Dag::build(&registry, ["wage", "bonus", "tax_rate", "other"]).unwrap();

    let plan = ExecutionPlan::resolve(&dag, Targets::names(["gross_income"])).unwrap();

    assert_eq!(plan.order(), &["wage", "bonus", "gross_income"]);
    assert!(!plan.contains("unrelated"));
    assert!(!plan.contains("tax_rate"));
}

#[test]
fn test_closure_is_deterministic() {
    let registry = income_registry()
        .with(spec("a", &["wage", "tax_rate"]))
        .with(spec("b", &["bonus", "a"]))
        .with(spec("c", &["b", "gross_income", "a"]));

    let first = Dag::build(&registry, ["wage", "bonus", "tax_rate"]).unwrap();
    let second = Dag::build(&registry, ["tax_rate", "bonus", "wage"]).unwrap();
    let targets = Targets::names(["c", "net_income"]);

    let plans: Vec<ExecutionPlan> = (0..5)
        .map(|i| {
            let dag = if i % 2 == 0 { &first } else { &second };
            ExecutionPlan::resolve(dag, targets.clone()).unwrap()
        })
        .collect();

    for plan in &plans[1..] {
        assert_eq!(plan, &plans[0]);
    }
}

#[test]
fn test_every_node_follows_its_inputs() {
    let registry = income_registry()
        .with(spec("a", &["wage", "tax_rate"]))
        .with(spec("b", &["bonus", "a"]))
        .with(spec("c", &["b", "gross_income", "a"]));
    let dag = Dag::build(&registry, ["wage", "bonus", "tax_rate"]).unwrap();

    let plan = ExecutionPlan::resolve(&dag, Targets::All).unwrap();

    assert_eq!(plan.len(), dag.len());
    for (position, name) in plan.order().iter().enumerate() {
        for input in dag.inputs(name) {
            let input_position = plan.order().iter().position(|n| n == input).unwrap();
            assert!(
                input_position < position,
                "{} must run before {}",
                input,
                name
            );
        }
    }
}

#[test]
fn test_unknown_target_rejected() {
    let dag = Dag::build(&income_registry(), ["wage", "bonus", "tax_rate"]).unwrap();

    let err = ExecutionPlan::resolve(&dag, Targets::names(["net_income", "pension"])).unwrap_err();

    assert_eq!(err, GraphError::UnknownTarget("pension".to_string()));
}

#[test]
fn test_duplicate_targets_collapse() {
    let dag = Dag::build(&income_registry(), ["wage", "bonus", "tax_rate"]).unwrap();

    let plan =
        ExecutionPlan::resolve(&dag, Targets::names(["gross_income", "gross_income"])).unwrap();

    assert_eq!(plan.targets(), &["gross_income"]);
    assert_eq!(plan.order(), &["wage", "bonus", "gross_income"]);
}

#[test]
fn test_consumer_counts_cover_plan() {
    let registry = income_registry().with(spec("bonus_share", &["bonus", "gross_income"]));
    let dag = Dag::build(&registry, ["wage", "bonus", "tax_rate"]).unwrap();
    let plan = ExecutionPlan::resolve(&dag, Targets::names(["net_income", "bonus_share"])).unwrap();

    let counts = plan.consumer_counts(&dag);

    assert_eq!(counts["bonus"], 2);
    assert_eq!(counts["gross_income"], 2);
    assert_eq!(counts["wage"], 1);
    assert_eq!(counts["net_income"], 0);
}

#[test]
fn test_deep_chain_does_not_exhaust_stack() {
    let mut registry = FunctionRegistry::new();
    registry.register(spec("step_0", &["seed"]));
    for i in 1..20_000 {
        let previous = format!("step_{}", i - 1);
        registry.register(spec(&format!("step_{}", i), &[previous.as_str()]));
    }
    let dag = Dag::build(&registry, ["seed"]).unwrap();

    let plan = ExecutionPlan::resolve(&dag, Targets::names(["step_19999"])).unwrap();

    assert_eq!(plan.len(), 20_001);
    assert_eq!(plan.order()[0], "seed");
}
