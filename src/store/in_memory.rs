//! In-memory implementation of [CheckpointStore](super::CheckpointStore).

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;

use super::CheckpointStore;
use crate::error::{CheckpointError, Result};

/// Store backed by a `HashMap`. Clones share the same entries, so dropping every
/// component built over one clone and rebuilding over another behaves like a restart.
#[derive(Clone, Default)]
pub struct InMemoryStore {
  entries: Arc<Mutex<HashMap<String, Value>>>,
  fail_writes: Arc<AtomicBool>,
}

impl InMemoryStore {
  pub fn new() -> Self {
    Self::default()
  }

  /// Makes every following `set` and `remove` fail with an IO error (simulates a full or read-only disk).
  pub fn set_fail_writes(&self, fail: bool) {
    self.fail_writes.store(fail, Ordering::SeqCst);
  }

  /// Number of stored entries.
  pub async fn len(&self) -> usize {
    self.entries.lock().await.len()
  }
}

#[async_trait]
impl CheckpointStore for InMemoryStore {
  async fn get(&self, key: &str) -> Result<Option<Value>> {
    Ok(self.entries.lock().await.get(key).cloned())
  }

  async fn set(&self, key: &str, value: Value) -> Result<()> {
    let mut entries = self.entries.lock().await;
    if self.fail_writes.load(Ordering::SeqCst) {
      return Err(CheckpointError::io(
        format!("writing '{key}'"),
        std::io::Error::other("writes disabled"),
      ));
    }
    entries.insert(key.to_string(), value);
    Ok(())
  }

  async fn remove(&self, key: &str) -> Result<bool> {
    let mut entries = self.entries.lock().await;
    if self.fail_writes.load(Ordering::SeqCst) {
      return Err(CheckpointError::io(
        format!("removing '{key}'"),
        std::io::Error::other("writes disabled"),
      ));
    }
    Ok(entries.remove(key).is_some())
  }

  async fn keys(&self) -> Result<Vec<String>> {
    let mut keys: Vec<String> = self.entries.lock().await.keys().cloned().collect();
    keys.sort();
    Ok(keys)
  }

  async fn clear(&self) -> Result<()> {
    self.entries.lock().await.clear();
    Ok(())
  }

  async fn exists_any(&self) -> Result<bool> {
    Ok(!self.entries.lock().await.is_empty())
  }
}
