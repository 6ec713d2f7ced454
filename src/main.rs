use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use rivulet_config::ProjectDef;
use rivulet_connection::MemoryBackend;
use rivulet_flow::Assets;
use rivulet_runtime::Runtime;

/// Rivulet - a cooperative runtime for flow graphs
#[derive(Parser)]
#[command(name = "rivulet")]
#[command(version, about, long_about = None)]
struct Cli {
  #[command(subcommand)]
  command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
  /// Run a project's main flow
  Run {
    /// Path to the project file (JSON), or `-` for stdin
    project_file: PathBuf,

    /// Number of ticks to run before stopping
    #[arg(long, default_value_t = 100)]
    ticks: usize,

    /// Pause between ticks
    #[arg(long, default_value_t = 10)]
    tick_interval_ms: u64,

    /// MQTT backend to run against
    #[arg(long, value_enum, default_value_t = BackendKind::Memory)]
    backend: BackendKind,
  },

  /// Load and validate a project without running it
  Validate {
    /// Path to the project file (JSON), or `-` for stdin
    project_file: PathBuf,
  },
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum BackendKind {
  /// In-process loopback broker
  Memory,
  /// No backend; every MQTT operation fails as unsupported
  None,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .with_writer(io::stderr)
    .init();

  let cli = Cli::parse();

  match cli.command {
    Some(Commands::Run {
      project_file,
      ticks,
      tick_interval_ms,
      backend,
    }) => run_project(&project_file, ticks, Duration::from_millis(tick_interval_ms), backend)?,
    Some(Commands::Validate { project_file }) => validate_project(&project_file)?,
    None => {
      println!("rivulet - use --help to see available commands");
    }
  }

  Ok(())
}

fn run_project(
  project_file: &Path,
  ticks: usize,
  interval: Duration,
  backend: BackendKind,
) -> Result<()> {
  let project = read_project(project_file)?;

  let runtime = Runtime::from_project(&project).context("failed to load project")?;
  eprintln!(
    "Loaded project: {} ({} flows)",
    runtime.assets().name,
    runtime.assets().flows.len()
  );
  let mut runtime = match backend {
    BackendKind::Memory => {
      let events = runtime.event_sender();
      runtime.with_backend(MemoryBackend::new(events))
    }
    BackendKind::None => runtime,
  };

  runtime.start().context("failed to start runtime")?;

  let mut steps = 0;
  for tick in 0..ticks {
    if tick > 0 && !interval.is_zero() {
      thread::sleep(interval);
    }
    steps += runtime
      .tick()
      .with_context(|| format!("runtime halted on tick {tick}"))?;
  }
  runtime.stop();

  eprintln!("Ran {ticks} ticks, {steps} component executions");

  let globals: serde_json::Map<String, serde_json::Value> = runtime
    .global_variables()
    .iter()
    .map(|(name, value)| (name.clone(), value.to_json()))
    .collect();
  let output = serde_json::json!({
    "errors": runtime.errors(),
    "global_variables": globals,
  });

  println!("{}", serde_json::to_string_pretty(&output)?);

  Ok(())
}

fn validate_project(project_file: &Path) -> Result<()> {
  let project = read_project(project_file)?;
  let assets = Assets::load(&project)
    .with_context(|| format!("invalid project: {}", project_file.display()))?;

  for (index, flow) in assets.flows.iter().enumerate() {
    eprintln!(
      "flow {index} '{}': {} components, {} start",
      flow.name,
      flow.components.len(),
      flow.start_components().len()
    );
  }
  println!("{} is valid", project_file.display());

  Ok(())
}

fn read_project(project_file: &Path) -> Result<ProjectDef> {
  let content = if project_file == Path::new("-") {
    let mut buffer = String::new();
    io::stdin()
      .read_to_string(&mut buffer)
      .context("failed to read project from stdin")?;
    buffer
  } else {
    std::fs::read_to_string(project_file)
      .with_context(|| format!("failed to read project file: {}", project_file.display()))?
  };

  serde_json::from_str(&content)
    .with_context(|| format!("failed to parse project file: {}", project_file.display()))
}
