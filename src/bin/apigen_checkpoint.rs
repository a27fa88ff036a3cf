//! CLI: inspect, clear and exercise checkpoint stores of generation runs.
//!
//! Usage: `apigen_checkpoint [--checkpoint-dir DIR] <status|clear|demo> [OPTIONS]`
//!
//! `demo` drives a toy generation pipeline (memoized spec fetch, one checkpointed model
//! generation per endpoint) through the run controller. `--fail-at` aborts at an
//! endpoint so the next invocation can resume.
//!
//! Set RUST_LOG=apigen_checkpoint=debug to see every persisted write.

use std::path::{Path, PathBuf};
use std::process;

use apigen_checkpoint::config::DEFAULT_CHECKPOINT_DIR;
use apigen_checkpoint::{
  CheckpointConfig, CheckpointError, Memoizer, ResumePolicy, RunController, RunKey, StdinPrompt,
  StoreSummary, checkpointed_fold,
};
use chrono::Utc;
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Inspect, clear and exercise checkpoint stores of generation runs.
#[derive(Parser, Debug)]
#[command(name = "apigen_checkpoint")]
#[command(
  after_help = r#"Environment variables (override the matching flags when set):
  APIGEN_CHECKPOINT_DIR   Checkpoint root directory (default: .checkpoints).
  APIGEN_RESUME           ask | yes | no. What to do with leftover state of a run.

Examples:
  apigen_checkpoint demo --destination ./out --endpoints /a,/b,/c --fail-at /c
  apigen_checkpoint status
  apigen_checkpoint demo --destination ./out --endpoints /a,/b,/c --resume yes"#
)]
struct Args {
  /// Checkpoint root directory. Overridden by APIGEN_CHECKPOINT_DIR if set.
  #[arg(long, global = true, value_name = "DIR", default_value = DEFAULT_CHECKPOINT_DIR)]
  checkpoint_dir: PathBuf,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Show the stored state of a run (default: the last unfinished run).
  Status {
    /// Destination folder identifying the run.
    #[arg(long, value_name = "DIR")]
    destination: Option<PathBuf>,
  },
  /// Discard the stored state of a run (default: the last unfinished run).
  Clear {
    /// Destination folder identifying the run.
    #[arg(long, value_name = "DIR")]
    destination: Option<PathBuf>,
  },
  /// Run a toy generation pipeline with checkpointing.
  Demo {
    /// Destination folder; also the identity of the run.
    #[arg(long, value_name = "DIR")]
    destination: PathBuf,
    /// Comma-separated endpoint paths.
    #[arg(long, value_delimiter = ',', required = true)]
    endpoints: Vec<String>,
    /// Abort when this endpoint is reached (simulates a crash).
    #[arg(long, value_name = "ENDPOINT")]
    fail_at: Option<String>,
    /// ask | yes | no. Overridden by APIGEN_RESUME if set.
    #[arg(long, value_name = "POLICY")]
    resume: Option<ResumePolicy>,
  },
}

#[derive(Debug, thiserror::Error)]
enum DemoError {
  #[error(transparent)]
  Checkpoint(#[from] CheckpointError),
  #[error("aborted at endpoint {0}")]
  Aborted(String),
  #[error("writing model file: {0}")]
  Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct DemoSpec {
  endpoints: Vec<String>,
  fetched_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct GeneratedModel {
  endpoint: String,
  file: PathBuf,
}

#[tokio::main]
async fn main() {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .with_writer(std::io::stderr)
    .init();

  let args = Args::parse();
  let config = CheckpointConfig {
    root: args.checkpoint_dir.clone(),
    resume: match &args.command {
      Command::Demo {
        resume: Some(policy),
        ..
      } => *policy,
      _ => ResumePolicy::Ask,
    },
  };
  // Env vars override flags.
  let config = match config.with_env_overrides() {
    Ok(c) => c,
    Err(e) => {
      eprintln!("Error: {}", e);
      process::exit(2);
    }
  };
  info!(root = %config.root.display(), resume = %config.resume, "options (env or flags)");

  let controller = RunController::new(config, StdinPrompt);
  let outcome = match args.command {
    Command::Status { destination } => status(&controller, destination.as_deref()).await,
    Command::Clear { destination } => clear(&controller, destination.as_deref()).await,
    Command::Demo {
      destination,
      endpoints,
      fail_at,
      ..
    } => demo(&controller, destination, endpoints, fail_at).await,
  };
  if let Err(e) = outcome {
    eprintln!("Pipeline error: {}", e);
    process::exit(1);
  }
}

/// Run key from `--destination`, else the last unfinished run.
async fn resolve_key(
  controller: &RunController,
  destination: Option<&Path>,
) -> Result<Option<RunKey>, CheckpointError> {
  match destination {
    Some(d) => Ok(Some(RunKey::from_path(d))),
    None => controller.last_run_key().await,
  }
}

async fn status(controller: &RunController, destination: Option<&Path>) -> Result<(), DemoError> {
  let Some(key) = resolve_key(controller, destination).await? else {
    println!("No unfinished run recorded.");
    return Ok(());
  };
  match controller.inspect(&key).await? {
    Some(summary) => print_summary(&summary, &controller.config().root.join(key.store_file_name())),
    None => println!("No checkpoint state for {}.", key),
  }
  Ok(())
}

fn print_summary(summary: &StoreSummary, path: &Path) {
  println!("Run: {}", summary.run_key);
  println!("  Store: {}", path.display());
  println!("  Cached steps: {}", summary.memo_entries);
  for lp in &summary.loops {
    println!(
      "  Loop '{}': {} item(s) done",
      lp.loop_id,
      lp.items_done()
    );
  }
}

async fn clear(controller: &RunController, destination: Option<&Path>) -> Result<(), DemoError> {
  let Some(key) = resolve_key(controller, destination).await? else {
    println!("No unfinished run recorded.");
    return Ok(());
  };
  if controller.clear(&key).await? {
    println!("Cleared checkpoint state for {}.", key);
  } else {
    println!("No checkpoint state for {}.", key);
  }
  Ok(())
}

async fn demo(
  controller: &RunController,
  destination: PathBuf,
  endpoints: Vec<String>,
  fail_at: Option<String>,
) -> Result<(), DemoError> {
  let key = RunKey::from_path(&destination);
  let (resumed, models) = controller
    .run_pipeline(&key, |run| async move {
      let memo = run.memoizer();
      let spec: DemoSpec = memo
        .call("fetch_spec", endpoints, |endpoints| async move {
          println!("fetching spec");
          Ok::<_, DemoError>(DemoSpec {
            endpoints,
            fetched_at: Utc::now().to_rfc3339(),
          })
        })
        .await?;
      info!(fetched_at = %spec.fetched_at, endpoints = spec.endpoints.len(), "spec ready");

      let models = checkpointed_fold(
        run.store(),
        "models",
        spec.endpoints.clone(),
        Vec::<GeneratedModel>::new(),
        |_, endpoint, mut acc| {
          let memo = &memo;
          let destination = &destination;
          let fail_at = fail_at.as_deref();
          async move {
            if fail_at == Some(endpoint.as_str()) {
              return Err(DemoError::Aborted(endpoint));
            }
            acc.push(generate_model(memo, destination, endpoint).await?);
            Ok(acc)
          }
        },
      )
      .await?;
      Ok::<_, DemoError>((run.resumed(), models))
    })
    .await?;

  println!("Pipeline completed.");
  println!("  Resumed: {}", resumed);
  let names: Vec<&str> = models.iter().map(|m| m.endpoint.as_str()).collect();
  println!("  Models: {}", names.join(", "));
  Ok(())
}

/// Memoized stand-in for the expensive model generation call.
async fn generate_model(
  memo: &Memoizer,
  destination: &Path,
  endpoint: String,
) -> Result<GeneratedModel, DemoError> {
  memo
    .call("generate_model", endpoint, |endpoint| async move {
      println!("generating model for {}", endpoint);
      let name = endpoint.trim_matches('/').replace('/', "_");
      let name = if name.is_empty() { "root".to_string() } else { name };
      let file = destination.join("models").join(format!("{name}.model.ts"));
      if let Some(parent) = file.parent() {
        tokio::fs::create_dir_all(parent).await?;
      }
      tokio::fs::write(&file, format!("// model for {endpoint}\nexport interface Model {{}}\n")).await?;
      Ok(GeneratedModel { endpoint, file })
    })
    .await
}
