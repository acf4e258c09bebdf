// crates/dagcli/src/main.rs

use anyhow::Result;
use clap::{Parser, Subcommand};
use dagcore::{DagError, ExecutionEvent, ParameterBundle};
use dagruntime::{
    DagRuntime, DataSource, JsonFileSource, ParameterSource, RuntimeConfig, SimulationRequest,
    Targets,
};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "dagsim")]
#[command(about = "Dependency-graph tax and transfer simulator", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a simulation
    Run {
        /// Path to a JSON object of supplied data
        #[arg(short, long)]
        data: PathBuf,

        /// Path to a JSON object of user parameters
        #[arg(short, long)]
        params: Option<PathBuf>,

        /// Target to compute (repeatable). Defaults to every node
        #[arg(short, long = "target")]
        targets: Vec<String>,

        /// Path to a JSON runtime configuration
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Run independent functions concurrently
        #[arg(long)]
        parallel: bool,

        /// Worker pool size for parallel execution
        #[arg(long)]
        workers: Option<usize>,

        /// Keep every intermediate value until the run completes
        #[arg(long)]
        no_gc: bool,

        /// Show verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Print the execution order for the given targets without running it
    Plan {
        /// Path to a JSON object of supplied data
        #[arg(short, long)]
        data: PathBuf,

        /// Target to plan for (repeatable). Defaults to every node
        #[arg(short, long = "target")]
        targets: Vec<String>,
    },

    /// List the registered model functions
    Functions,
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn targets_from(names: Vec<String>) -> Targets {
    if names.is_empty() {
        Targets::All
    } else {
        Targets::Names(names)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            data,
            params,
            targets,
            config,
            parallel,
            workers,
            no_gc,
            verbose,
        } => {
            init_logging(verbose);

            let mut runtime_config = match config {
                Some(path) => RuntimeConfig::from_json(&std::fs::read_to_string(path)?)?,
                None => RuntimeConfig::default(),
            };
            if parallel {
                runtime_config.execution.parallel = true;
            }
            if let Some(workers) = workers {
                runtime_config.execution.worker_count = workers;
            }
            if no_gc {
                runtime_config.execution.gc = false;
            }
            tracing::debug!("Runtime configuration: {:?}", runtime_config);

            run_simulation(data, params, targets_from(targets), runtime_config).await?;
        }

        Commands::Plan { data, targets } => {
            init_logging(false);
            print_plan(data, targets_from(targets)).await?;
        }

        Commands::Functions => {
            list_functions();
        }
    }

    Ok(())
}

async fn run_simulation(
    data: PathBuf,
    params: Option<PathBuf>,
    targets: Targets,
    config: RuntimeConfig,
) -> Result<()> {
    println!("Loading data from: {}", data.display());
    let data = JsonFileSource::new(data).load_data().await?;
    let params = match params {
        Some(path) => JsonFileSource::new(path).load_params().await?,
        None => ParameterBundle::new(),
    };

    println!("   Data columns: {}", data.len());
    println!("   User parameters: {}", params.len());
    println!();

    let runtime = DagRuntime::with_config(dagfunctions::registry(), config)
        .with_baseline_params(dagfunctions::baseline_params());

    // Print events as they arrive
    let mut events = runtime.subscribe_events();
    let event_task = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                ExecutionEvent::ExecutionStarted { planned_nodes, .. } => {
                    println!("Execution started ({} nodes planned)", planned_nodes);
                }
                ExecutionEvent::FunctionCompleted {
                    name, duration_ms, ..
                } => {
                    println!("  {} completed in {}ms", name, duration_ms);
                }
                ExecutionEvent::FunctionFailed { name, error, .. } => {
                    println!("  {} failed: {}", name, error);
                }
                ExecutionEvent::ValueReleased { name, .. } => {
                    println!("  released {}", name);
                }
                ExecutionEvent::ExecutionCompleted {
                    success,
                    duration_ms,
                    ..
                } => {
                    if success {
                        println!("Execution completed in {}ms", duration_ms);
                    } else {
                        println!("Execution failed after {}ms", duration_ms);
                    }
                    break;
                }
                ExecutionEvent::FunctionStarted { .. } => {}
            }
        }
    });

    let request = SimulationRequest::new(data)
        .with_params(params)
        .with_targets(targets);
    let outcome = runtime.run(request).await;

    // Planning errors never reach the executor, so no completion event follows.
    // Execution errors still drain the failure events already broadcast.
    if matches!(outcome, Err(DagError::Graph(_))) {
        event_task.abort();
    } else {
        let _ = event_task.await;
    }
    let simulation = outcome?;

    println!();
    println!("Execution Summary:");
    println!("   Execution ID: {}", simulation.result.execution_id);
    println!("   Order: {}", simulation.plan.order().join(", "));
    println!(
        "   Functions executed: {}",
        simulation.result.executed_functions
    );
    if !simulation.dag.shadowed().is_empty() {
        println!(
            "   Replaced by supplied data: {}",
            simulation.dag.shadowed().join(", ")
        );
    }

    println!();
    println!("Outputs:");
    for target in simulation.plan.targets() {
        if let Some(value) = simulation.result.get(target) {
            println!("   {}: {}", target, serde_json::to_string(value)?);
        }
    }

    Ok(())
}

async fn print_plan(data: PathBuf, targets: Targets) -> Result<()> {
    let data = JsonFileSource::new(data).load_data().await?;
    let runtime = DagRuntime::new(dagfunctions::registry());
    let request = SimulationRequest::new(data).with_targets(targets);

    let (dag, plan) = runtime.plan(&request)?;

    println!("Execution order ({} of {} nodes):", plan.len(), dag.len());
    for (position, name) in plan.order().iter().enumerate() {
        let inputs = dag.inputs(name);
        if inputs.is_empty() {
            println!("  {:>3}. {}", position + 1, name);
        } else {
            println!("  {:>3}. {} <- {}", position + 1, name, inputs.join(", "));
        }
    }

    Ok(())
}

fn list_functions() {
    println!("Available Functions:");
    println!();

    for spec in dagfunctions::registry().iter() {
        let params = if spec.needs_params { " +params" } else { "" };
        println!("  • {}({}){}", spec.name, spec.inputs.join(", "), params);
    }
}
