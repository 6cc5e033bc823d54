// crates/studiocli/src/main.rs

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use studiocore::{ExecutionEvent, ExecutionStatus, NodeExecutionState, Value, WorkflowGraph};
use studioruntime::{
    ExecutionStateStore, ExecutionStrategy, RuntimeConfig, StudioRuntime, WorkflowResult,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "studio")]
#[command(about = "Node graph workflow runner", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum StrategyArg {
    Sequential,
    Parallel,
}

impl From<StrategyArg> for ExecutionStrategy {
    fn from(arg: StrategyArg) -> Self {
        match arg {
            StrategyArg::Sequential => ExecutionStrategy::Sequential,
            StrategyArg::Parallel => ExecutionStrategy::LevelParallel,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a workflow file
    Run {
        /// Path to workflow JSON file
        #[arg(short, long)]
        file: PathBuf,

        /// Input data for entry nodes as a JSON object
        #[arg(short, long)]
        input: Option<String>,

        /// Scheduling strategy (overrides the config file)
        #[arg(short, long, value_enum)]
        strategy: Option<StrategyArg>,

        /// Runtime config JSON file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Write node states here for a later `rerun`
        #[arg(long)]
        save_states: Option<PathBuf>,

        /// Show verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Re-run one node and its dependents, reusing saved upstream results
    Rerun {
        /// Path to workflow JSON file
        #[arg(short, long)]
        file: PathBuf,

        /// Node states written by `run --save-states`
        #[arg(long)]
        states: PathBuf,

        /// Instance id to re-run
        #[arg(short, long)]
        target: String,

        /// Show verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Validate a workflow file
    Validate {
        /// Path to workflow JSON file
        file: PathBuf,
    },

    /// List available node types
    Nodes,

    /// Create a new example workflow
    Init {
        /// Output file path
        #[arg(short, long, default_value = "workflow.json")]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            file,
            input,
            strategy,
            config,
            save_states,
            verbose,
        } => {
            init_logging(verbose);
            let mut config = match config {
                Some(path) => RuntimeConfig::from_file(&path)
                    .with_context(|| format!("failed to load config {}", path.display()))?,
                None => RuntimeConfig::default(),
            };
            if let Some(strategy) = strategy {
                config.strategy = strategy.into();
            }
            run_workflow(file, input, config, save_states).await?;
        }

        Commands::Rerun {
            file,
            states,
            target,
            verbose,
        } => {
            init_logging(verbose);
            rerun_node(file, states, target).await?;
        }

        Commands::Validate { file } => {
            validate_workflow(file)?;
        }

        Commands::Nodes => {
            list_nodes();
        }

        Commands::Init { output } => {
            create_example_workflow(output)?;
        }
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn load_workflow(file: &Path) -> Result<WorkflowGraph> {
    let json = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read {}", file.display()))?;
    WorkflowGraph::from_json(&json).with_context(|| format!("invalid workflow {}", file.display()))
}

fn standard_runtime(config: RuntimeConfig) -> StudioRuntime {
    StudioRuntime::with_config(Arc::new(studionodes::standard_catalog()), config)
}

/// Print node transitions as they happen
fn spawn_event_printer(runtime: &StudioRuntime) -> tokio::task::JoinHandle<()> {
    let mut events = runtime.subscribe_events();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                ExecutionEvent::WorkflowStarted { .. } => {
                    println!("▶️  Workflow started");
                }
                ExecutionEvent::NodeStateChanged { node_id, state, .. } => match state.status {
                    ExecutionStatus::Pending => {}
                    ExecutionStatus::Running => println!("  ⚡ Starting node: {}", node_id),
                    ExecutionStatus::Completed => println!("  ✅ Node {} completed", node_id),
                    ExecutionStatus::Error => {
                        let message = state.error.map(|e| e.to_string()).unwrap_or_default();
                        println!("  ❌ Node {} failed: {}", node_id, message);
                    }
                },
                ExecutionEvent::Progress { percent, .. } => {
                    println!("     📊 {}%", percent);
                }
                ExecutionEvent::WorkflowCompleted {
                    success,
                    duration_ms,
                    ..
                } => {
                    if success {
                        println!("✨ Workflow completed successfully in {}ms", duration_ms);
                    } else {
                        println!("💥 Workflow failed after {}ms", duration_ms);
                    }
                }
            }
        }
    })
}

async fn run_workflow(
    file: PathBuf,
    input: Option<String>,
    config: RuntimeConfig,
    save_states: Option<PathBuf>,
) -> Result<()> {
    println!("🚀 Loading workflow from: {}", file.display());
    let workflow = load_workflow(&file)?;

    println!("📋 Workflow: {}", workflow.name);
    println!("   Nodes: {}", workflow.nodes.len());
    println!("   Connections: {}", workflow.connections.len());
    println!("   Strategy: {:?}", config.strategy);
    println!();

    let inputs: HashMap<String, Value> = match input {
        Some(input_str) => {
            let json: serde_json::Value = serde_json::from_str(&input_str)?;
            match json {
                serde_json::Value::Object(obj) => obj
                    .into_iter()
                    .map(|(k, v)| (k, Value::from_plain_json(v)))
                    .collect(),
                _ => anyhow::bail!("Input must be a JSON object"),
            }
        }
        None => HashMap::new(),
    };

    let runtime = standard_runtime(config);
    let event_task = spawn_event_printer(&runtime);

    let mut store = ExecutionStateStore::new();
    let result = runtime.run_with_store(&workflow, inputs, &mut store).await;

    // Wait for events to finish printing
    tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
    event_task.abort();

    print_summary(&result);
    if let Some(path) = save_states {
        save_node_states(&path, &store.snapshot())?;
        println!("💾 Node states written to {}", path.display());
    }

    if !result.success {
        anyhow::bail!("workflow failed");
    }
    Ok(())
}

async fn rerun_node(file: PathBuf, states: PathBuf, target: String) -> Result<()> {
    let workflow = load_workflow(&file)?;
    let raw = std::fs::read_to_string(&states)
        .with_context(|| format!("failed to read {}", states.display()))?;
    let snapshot: HashMap<String, NodeExecutionState> = serde_json::from_str(&raw)?;

    println!("🔁 Re-running '{}' in {}", target, workflow.name);

    let runtime = standard_runtime(RuntimeConfig::default());
    let event_task = spawn_event_printer(&runtime);

    let mut store = ExecutionStateStore::from_snapshot(snapshot);
    let result = runtime.run_scoped(&workflow, &target, &mut store).await;

    tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
    event_task.abort();

    print_summary(&result);
    save_node_states(&states, &store.snapshot())?;

    if !result.success {
        anyhow::bail!("re-run failed");
    }
    Ok(())
}

fn save_node_states(path: &Path, states: &HashMap<String, NodeExecutionState>) -> Result<()> {
    let json = serde_json::to_string_pretty(states)?;
    std::fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

fn print_summary(result: &WorkflowResult) {
    println!();
    println!("📊 Execution Summary:");
    println!("   Execution ID: {}", result.execution_id);
    println!(
        "   Completed: {}/{} nodes",
        result.completed_nodes(),
        result.node_states.len()
    );
    println!("   Duration: {}ms", result.duration.as_millis());

    let failed = result.failed_nodes();
    if !failed.is_empty() {
        println!("   Failed: {}", failed.join(", "));
    }
    if let Some(error) = &result.error {
        println!(
            "   Error: [{}] {} (node: {})",
            error.code,
            error.message,
            error.node_id.as_deref().unwrap_or("-")
        );
    }

    if !result.outputs.is_empty() {
        println!();
        println!("📤 Outputs:");
        for (label, outputs) in &result.outputs {
            println!("   {}:", label);
            for (key, value) in outputs {
                println!("     {}: {}", key, value.to_json());
            }
        }
    }
}

fn validate_workflow(file: PathBuf) -> Result<()> {
    println!("🔍 Validating workflow: {}", file.display());

    let workflow = load_workflow(&file)?;
    let runtime = standard_runtime(RuntimeConfig::default());
    runtime.validate(&workflow)?;

    println!("✅ Workflow is valid:");
    println!("   Name: {}", workflow.name);
    println!("   Nodes: {}", workflow.nodes.len());
    println!("   Connections: {}", workflow.connections.len());

    Ok(())
}

fn list_nodes() {
    println!("📦 Available Node Types:");
    println!();

    let catalog = studionodes::standard_catalog();
    for node_type in catalog.list_node_types() {
        let Some(entry) = catalog.get(&node_type) else {
            continue;
        };
        println!("  • {} ({})", entry.id, entry.category);
        println!("    {}", entry.description);
        for port in &entry.inputs {
            let marker = if port.required { "*" } else { "" };
            println!("      in  {}{}: {:?}", port.id, marker, port.port_type);
        }
        for port in &entry.outputs {
            println!("      out {}: {:?}", port.id, port.port_type);
        }
    }
}

fn create_example_workflow(output: PathBuf) -> Result<()> {
    use studiocore::WorkflowBuilder;

    let workflow = WorkflowBuilder::new("Example Prompt Workflow")
        .description("Builds a prompt from a subject and logs it")
        .add_node("subject", "text.input")
        .with_label("Subject")
        .add_node("prompt", "text.template")
        .with_label("Prompt")
        .with_config("template", "{input}, {var:style} style")
        .add_node("log", "debug.log")
        .with_label("Log Prompt")
        .connect("subject", "text", "prompt", "input")
        .connect("prompt", "text", "log", "message")
        .entry("subject")
        .exit("log")
        .variable("style", "cinematic")
        .build();

    std::fs::write(&output, workflow.to_json()?)?;

    println!("✨ Created example workflow: {}", output.display());
    println!();
    println!("Run it with:");
    println!(
        "  studio run --file {} --input '{{\"text\": \"a lighthouse at dusk\"}}'",
        output.display()
    );

    Ok(())
}
