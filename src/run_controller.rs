//! Run lifecycle: detect leftover state, offer resume, clear the store on success.
//!
//! - [RunController::start]: open the run's store; resume or wipe leftover state.
//! - [RunController::finish_success]: clear the store after the whole pipeline succeeded.
//! - [RunController::run_pipeline]: both of the above around a pipeline closure, clearing
//!   only when the closure returns `Ok`.

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::config::{CheckpointConfig, ResumePolicy};
use crate::error::{CheckpointError, Result};
use crate::memoize::Memoizer;
use crate::prompt::ResumePrompt;
use crate::sequence::SequenceCheckpoint;
use crate::store::{CheckpointStore, JsonFileStore, remove_file_durably, summarize, write_json_atomic};
use crate::types::{RunKey, RunState, StoreSummary};

/// File under the checkpoint root naming the most recently started run.
pub const LAST_RUN_FILENAME: &str = "last_run.json";

#[derive(Debug, Serialize, Deserialize)]
struct LastRun {
  run_key: RunKey,
  started_at: DateTime<Utc>,
}

/// One started run: its key, lifecycle state and store.
#[derive(Clone)]
pub struct Run {
  key: RunKey,
  state: RunState,
  store: Arc<JsonFileStore>,
}

impl Run {
  pub fn key(&self) -> &RunKey {
    &self.key
  }

  pub fn state(&self) -> RunState {
    self.state
  }

  /// True if the run continues from leftover state.
  pub fn resumed(&self) -> bool {
    self.state == RunState::Resuming
  }

  /// The run's store.
  pub fn store(&self) -> Arc<dyn CheckpointStore> {
    self.store.clone()
  }

  /// Location of the run's store file.
  pub fn store_path(&self) -> PathBuf {
    self.store.path().to_path_buf()
  }

  /// A memoizer writing to this run's store.
  pub fn memoizer(&self) -> Memoizer {
    Memoizer::new(self.store())
  }

  /// Opens a checkpointed loop in this run's store.
  pub async fn sequence<T, A>(
    &self,
    loop_id: impl Into<String>,
    items: impl IntoIterator<Item = T>,
    initial: A,
  ) -> Result<SequenceCheckpoint<T, A>>
  where
    A: Serialize + DeserializeOwned,
  {
    SequenceCheckpoint::open(self.store(), loop_id, items, initial).await
  }
}

/// Starts and finishes runs against the checkpoint root from [CheckpointConfig].
pub struct RunController {
  config: CheckpointConfig,
  prompt: Box<dyn ResumePrompt>,
}

impl RunController {
  pub fn new(config: CheckpointConfig, prompt: impl ResumePrompt + 'static) -> Self {
    Self {
      config,
      prompt: Box::new(prompt),
    }
  }

  pub fn config(&self) -> &CheckpointConfig {
    &self.config
  }

  /// Opens the store for `run_key`. Leftover state is resumed or wiped according to the
  /// resume policy (asking the prompt under [ResumePolicy::Ask]).
  #[instrument(level = "trace", skip(self))]
  pub async fn start(&self, run_key: &RunKey) -> Result<Run> {
    let store = Arc::new(JsonFileStore::open(&self.config.root, run_key).await?);
    self.record_last_run(run_key).await?;

    let mut state = RunState::Fresh;
    if store.exists_any().await? {
      let summary = summarize(store.as_ref(), run_key.as_str()).await?;
      if self.should_resume(&summary)? {
        state = state.transition(RunState::Resuming)?;
        info!(
          run_key = %run_key,
          cached_steps = summary.memo_entries,
          loops = summary.loops.len(),
          "resuming previous run"
        );
      } else {
        store.clear().await?;
        state = state.transition(RunState::Fresh)?;
        info!(run_key = %run_key, "previous run discarded, starting fresh");
      }
    } else {
      info!(run_key = %run_key, "starting fresh run");
    }

    Ok(Run {
      key: run_key.clone(),
      state,
      store,
    })
  }

  /// Marks `run` completed and clears its store. Calling it again is a no-op.
  ///
  /// Only call this once the whole pipeline succeeded; a failed run must keep its store.
  #[instrument(level = "trace", skip(self, run), fields(run_key = %run.key))]
  pub async fn finish_success(&self, run: &mut Run) -> Result<()> {
    run.state = run.state.transition(RunState::Completed)?;
    run.store.clear().await?;
    self.forget_last_run(&run.key).await?;
    info!(run_key = %run.key, "run completed, checkpoints cleared");
    run.state = run.state.transition(RunState::Fresh)?;
    Ok(())
  }

  /// Starts `run_key`, runs `pipeline`, and clears the store only if it returns `Ok`.
  /// On error the store is left for the next invocation and the error is returned as is.
  pub async fn run_pipeline<T, E, F, Fut>(&self, run_key: &RunKey, pipeline: F) -> std::result::Result<T, E>
  where
    E: From<CheckpointError>,
    F: FnOnce(Run) -> Fut,
    Fut: Future<Output = std::result::Result<T, E>>,
  {
    let mut run = self.start(run_key).await?;
    match pipeline(run.clone()).await {
      Ok(value) => {
        self.finish_success(&mut run).await?;
        Ok(value)
      }
      Err(e) => {
        warn!(
          run_key = %run_key,
          store = %run.store_path().display(),
          "pipeline failed, checkpoints kept for resume"
        );
        Err(e)
      }
    }
  }

  /// Summary of the stored state of `run_key` without starting it. `None` if nothing is stored.
  pub async fn inspect(&self, run_key: &RunKey) -> Result<Option<StoreSummary>> {
    let store = JsonFileStore::open(&self.config.root, run_key).await?;
    if !store.exists_any().await? {
      return Ok(None);
    }
    summarize(&store, run_key.as_str()).await.map(Some)
  }

  /// Wipes the stored state of `run_key`. Returns whether anything was stored.
  ///
  /// Meant for tooling; a [Run] of the same key still open in this process keeps its
  /// in-memory view of the store.
  pub async fn clear(&self, run_key: &RunKey) -> Result<bool> {
    let store = JsonFileStore::open(&self.config.root, run_key).await?;
    let had_state = store.exists_any().await?;
    store.clear().await?;
    self.forget_last_run(run_key).await?;
    Ok(had_state)
  }

  /// Key of the most recently started run that has not finished yet.
  pub async fn last_run_key(&self) -> Result<Option<RunKey>> {
    let path = self.last_run_path();
    let bytes = match tokio::fs::read(&path).await {
      Ok(b) => b,
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
      Err(e) => return Err(CheckpointError::io(format!("reading {}", path.display()), e)),
    };
    let last: LastRun = serde_json::from_slice(&bytes)
      .map_err(|e| CheckpointError::corrupt(&path, format!("invalid JSON: {e}")))?;
    Ok(Some(last.run_key))
  }

  fn should_resume(&self, summary: &StoreSummary) -> Result<bool> {
    match self.config.resume {
      ResumePolicy::Always => Ok(true),
      ResumePolicy::Never => Ok(false),
      ResumePolicy::Ask => self.prompt.confirm_resume(summary),
    }
  }

  fn last_run_path(&self) -> PathBuf {
    self.config.root.join(LAST_RUN_FILENAME)
  }

  async fn record_last_run(&self, run_key: &RunKey) -> Result<()> {
    let last = LastRun {
      run_key: run_key.clone(),
      started_at: Utc::now(),
    };
    write_json_atomic(&self.last_run_path(), &last).await
  }

  async fn forget_last_run(&self, run_key: &RunKey) -> Result<()> {
    if self.last_run_key().await?.as_ref() != Some(run_key) {
      return Ok(());
    }
    remove_file_durably(&self.last_run_path()).await.map(|_| ())
  }
}
