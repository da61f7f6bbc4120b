use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use trellis_config::{load_documents, Config};
use trellis_connector::ConnectorRegistry;
use trellis_runner::Runner;

/// Trellis - a declarative, dependency-aware workflow runner
#[derive(Parser)]
#[command(name = "trellis")]
#[command(version, about, long_about = None)]
struct Cli {
  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Run a flow to completion
  Run {
    /// Flow document(s), merged in order (later files override earlier)
    #[arg(short = 'f', long = "file", required = true)]
    files: Vec<PathBuf>,

    /// Serve the read-only status API on this address while running
    #[arg(long)]
    serve: Option<SocketAddr>,
  },
}

fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
    )
    .init();

  let cli = Cli::parse();

  match cli.command {
    Commands::Run { files, serve } => {
      let rt = tokio::runtime::Runtime::new()?;
      rt.block_on(run_flow(files, serve))
    }
  }
}

async fn run_flow(files: Vec<PathBuf>, serve: Option<SocketAddr>) -> Result<()> {
  let merged = load_documents(&files).context("failed to load flow documents")?;
  let config: Config =
    serde_json::from_value(merged).context("merged document is not a valid flow config")?;
  let flow = config.resolve().context("failed to resolve sources")?;

  let registry = ConnectorRegistry::with_builtins();
  let runner = Runner::new(flow, registry).context("flow validation failed")?;

  if let Some(addr) = serve {
    let listener = tokio::net::TcpListener::bind(addr)
      .await
      .with_context(|| format!("failed to bind status api to {addr}"))?;
    tokio::spawn(trellis_api::serve(listener, runner.handle()));
  }

  runner.run().await?;

  let run = runner.run_state();
  let summary = serde_json::json!({
    "run_id": run.run_id,
    "steps": run.steps,
    "outputs": runner.flows(),
  });
  println!("{}", serde_json::to_string_pretty(&summary)?);

  if run.has_failures() {
    anyhow::bail!("run finished with failed steps");
  }
  Ok(())
}
