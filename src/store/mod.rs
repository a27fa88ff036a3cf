//! Durable key/value store scoped to one generation run.
//!
//! - [JsonFileStore]: one JSON document per run, rewritten atomically on every `set`.
//! - [InMemoryStore]: shared `HashMap`, for tests and dry runs.
//!
//! Keys are namespaced: memoized results under `memo/`, loop progress under `loop/`.

mod in_memory;
mod json_file;

pub use in_memory::InMemoryStore;
pub use json_file::JsonFileStore;
pub(crate) use json_file::{remove_file_durably, write_json_atomic};

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;
use crate::fingerprint::Fingerprint;
use crate::types::{IterationRecord, LoopProgress, StoreSummary};

/// Key prefix for memoized step results.
pub const MEMO_PREFIX: &str = "memo/";
/// Key prefix for checkpointed loop progress.
pub const LOOP_PREFIX: &str = "loop/";

/// Store key of a memoized result.
pub fn memo_key(fingerprint: &Fingerprint) -> String {
  format!("{MEMO_PREFIX}{fingerprint}")
}

/// Store key of a loop's iteration record.
pub fn loop_key(loop_id: &str) -> String {
  format!("{LOOP_PREFIX}{loop_id}")
}

/// Key/value persistence for one run.
///
/// Every method is serialized against every other method on the same store, and `set`
/// returns only once the value would survive a crash.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
  /// Value stored under `key`, if any.
  async fn get(&self, key: &str) -> Result<Option<Value>>;

  /// Stores `value` under `key`, replacing any previous value.
  async fn set(&self, key: &str, value: Value) -> Result<()>;

  /// Deletes `key`. Returns whether it was present; durable on return like `set`.
  async fn remove(&self, key: &str) -> Result<bool>;

  /// All keys currently stored, sorted.
  async fn keys(&self) -> Result<Vec<String>>;

  /// Removes every entry of the run.
  async fn clear(&self) -> Result<()>;

  /// True if at least one entry is stored.
  async fn exists_any(&self) -> Result<bool>;
}

/// Counts memoized results and collects loop progress for display.
pub async fn summarize(store: &dyn CheckpointStore, run_key: &str) -> Result<StoreSummary> {
  let mut memo_entries = 0;
  let mut loops = Vec::new();
  for key in store.keys().await? {
    if key.starts_with(MEMO_PREFIX) {
      memo_entries += 1;
    } else if key.starts_with(LOOP_PREFIX) {
      if let Some(value) = store.get(&key).await? {
        let record: IterationRecord = serde_json::from_value(value)?;
        loops.push(LoopProgress {
          loop_id: record.loop_id,
          last_completed_index: record.last_completed_index,
        });
      }
    }
  }
  loops.sort_by(|a, b| a.loop_id.cmp(&b.loop_id));
  Ok(StoreSummary {
    run_key: run_key.to_string(),
    memo_entries,
    loops,
  })
}
