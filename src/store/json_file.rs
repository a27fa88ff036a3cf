//! Checkpoint store kept as one JSON file per run under the checkpoint root.
//!
//! Every `set` rewrites the whole file: write `<name>.tmp`, `sync_all`, rename over the
//! target, then sync the directory. A crash leaves either the old or the new file, plus at
//! most a stale `<name>.tmp` that `open` never reads. `clear` syncs the directory after
//! removing the file, so a cleared run does not come back after a crash.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument};

use super::CheckpointStore;
use crate::error::{CheckpointError, Result};
use crate::types::{RunKey, STORE_FORMAT_VERSION, StoreFile};

/// Loads a store file from `path`. `Ok(None)` if the file does not exist; any other read
/// or parse failure is an error, since a half-read store can't be trusted.
#[instrument(level = "trace", skip(path))]
pub(crate) async fn load_store_file(path: &Path) -> Result<Option<StoreFile>> {
  let bytes = match tokio::fs::read(path).await {
    Ok(b) => b,
    Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
    Err(e) => {
      return Err(CheckpointError::io(
        format!("reading {}", path.display()),
        e,
      ));
    }
  };
  let file: StoreFile = serde_json::from_slice(&bytes)
    .map_err(|e| CheckpointError::corrupt(path, format!("invalid JSON: {e}")))?;
  if file.version != STORE_FORMAT_VERSION {
    return Err(CheckpointError::corrupt(
      path,
      format!(
        "unsupported format version {} (expected {})",
        file.version, STORE_FORMAT_VERSION
      ),
    ));
  }
  Ok(Some(file))
}

/// Writes `file` to `path` atomically. Creates the parent directory if needed.
#[instrument(level = "trace", skip(path, file))]
pub(crate) async fn save_store_file(path: &Path, file: &StoreFile) -> Result<()> {
  write_json_atomic(path, file).await
}

/// Writes `value` as pretty JSON to `path` through a synced tmp file and a rename, then
/// syncs the directory. Readers see the old or the new contents, never a torn write.
pub(crate) async fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
  let json = serde_json::to_vec_pretty(value)?;
  let parent = parent_dir(path);
  if let Some(parent) = parent {
    tokio::fs::create_dir_all(parent)
      .await
      .map_err(|e| CheckpointError::io(format!("creating {}", parent.display()), e))?;
  }

  let tmp = tmp_path(path);
  let mut out = tokio::fs::File::create(&tmp)
    .await
    .map_err(|e| CheckpointError::io(format!("creating {}", tmp.display()), e))?;
  out
    .write_all(&json)
    .await
    .map_err(|e| CheckpointError::io(format!("writing {}", tmp.display()), e))?;
  out
    .sync_all()
    .await
    .map_err(|e| CheckpointError::io(format!("syncing {}", tmp.display()), e))?;
  drop(out);

  tokio::fs::rename(&tmp, path)
    .await
    .map_err(|e| CheckpointError::io(format!("renaming onto {}", path.display()), e))?;

  sync_dir(parent).await
}

fn parent_dir(path: &Path) -> Option<&Path> {
  path.parent().filter(|p| !p.as_os_str().is_empty())
}

/// Flushes directory entries (creates, renames, removals) of `dir` to disk.
async fn sync_dir(dir: Option<&Path>) -> Result<()> {
  #[cfg(unix)]
  if let Some(dir) = dir {
    let handle = tokio::fs::File::open(dir)
      .await
      .map_err(|e| CheckpointError::io(format!("opening {}", dir.display()), e))?;
    handle
      .sync_all()
      .await
      .map_err(|e| CheckpointError::io(format!("syncing {}", dir.display()), e))?;
  }
  #[cfg(not(unix))]
  let _ = dir;
  Ok(())
}

pub(crate) fn tmp_path(path: &Path) -> PathBuf {
  let mut name = path.file_name().unwrap_or_default().to_os_string();
  name.push(".tmp");
  path.with_file_name(name)
}

/// Removes `path` and its leftover tmp file, syncing the directory if anything was removed.
/// Returns whether `path` existed.
pub(crate) async fn remove_file_durably(path: &Path) -> Result<bool> {
  let existed = remove_if_exists(path).await?;
  let had_tmp = remove_if_exists(&tmp_path(path)).await?;
  if existed || had_tmp {
    sync_dir(parent_dir(path)).await?;
  }
  Ok(existed)
}

async fn remove_if_exists(path: &Path) -> Result<bool> {
  match tokio::fs::remove_file(path).await {
    Ok(()) => Ok(true),
    Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
    Err(e) => Err(CheckpointError::io(format!("removing {}", path.display()), e)),
  }
}

/// Store for one run, persisted at `<root>/run-<hash>.json`.
///
/// The file contents are held in memory behind one lock; the lock is kept across the
/// awaited disk write, so no reader can observe a value that is not yet durable.
pub struct JsonFileStore {
  path: PathBuf,
  run_key: RunKey,
  /// `None` while no file exists on disk.
  state: Mutex<Option<StoreFile>>,
}

impl JsonFileStore {
  /// Attaches to the store of `run_key` under `root`, or prepares an empty one.
  ///
  /// Fails if the file exists but cannot be read, does not parse, has an unknown format
  /// version, or belongs to a different run key.
  #[instrument(level = "trace", skip(root))]
  pub async fn open(root: &Path, run_key: &RunKey) -> Result<Self> {
    let path = root.join(run_key.store_file_name());
    let state = load_store_file(&path).await?;
    if let Some(file) = &state {
      if file.run_key != run_key.as_str() {
        return Err(CheckpointError::corrupt(
          &path,
          format!(
            "store belongs to run '{}', not '{}'",
            file.run_key, run_key
          ),
        ));
      }
      info!(
        path = %path.display(),
        entries = file.entries.len(),
        "attached to existing checkpoint store"
      );
    }
    Ok(Self {
      path,
      run_key: run_key.clone(),
      state: Mutex::new(state),
    })
  }

  /// Location of the store file (it may not exist yet).
  pub fn path(&self) -> &Path {
    &self.path
  }

  pub fn run_key(&self) -> &RunKey {
    &self.run_key
  }
}

#[async_trait]
impl CheckpointStore for JsonFileStore {
  async fn get(&self, key: &str) -> Result<Option<Value>> {
    let state = self.state.lock().await;
    Ok(state.as_ref().and_then(|f| f.entries.get(key).cloned()))
  }

  #[instrument(level = "trace", skip(self, value))]
  async fn set(&self, key: &str, value: Value) -> Result<()> {
    let mut state = self.state.lock().await;
    // Write a copy first; memory only changes once the disk has the new version.
    let mut next = state
      .clone()
      .unwrap_or_else(|| StoreFile::new(self.run_key.as_str()));
    next.entries.insert(key.to_string(), value);
    next.updated_at = Utc::now();
    save_store_file(&self.path, &next).await?;
    debug!(key, path = %self.path.display(), "checkpoint entry persisted");
    *state = Some(next);
    Ok(())
  }

  #[instrument(level = "trace", skip(self))]
  async fn remove(&self, key: &str) -> Result<bool> {
    let mut state = self.state.lock().await;
    let Some(current) = state.as_ref() else {
      return Ok(false);
    };
    if !current.entries.contains_key(key) {
      return Ok(false);
    }
    let mut next = current.clone();
    next.entries.remove(key);
    next.updated_at = Utc::now();
    save_store_file(&self.path, &next).await?;
    debug!(key, path = %self.path.display(), "checkpoint entry removed");
    *state = Some(next);
    Ok(true)
  }

  async fn keys(&self) -> Result<Vec<String>> {
    let state = self.state.lock().await;
    Ok(
      state
        .as_ref()
        .map(|f| f.entries.keys().cloned().collect())
        .unwrap_or_default(),
    )
  }

  #[instrument(level = "trace", skip(self))]
  async fn clear(&self) -> Result<()> {
    let mut state = self.state.lock().await;
    remove_file_durably(&self.path).await?;
    if state.take().is_some() {
      info!(path = %self.path.display(), "checkpoint store cleared");
    }
    Ok(())
  }

  async fn exists_any(&self) -> Result<bool> {
    let state = self.state.lock().await;
    Ok(state.as_ref().is_some_and(|f| !f.entries.is_empty()))
  }
}
