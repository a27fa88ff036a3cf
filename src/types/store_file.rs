//! On-disk layout of one run's checkpoint store.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Current store file format version.
pub const STORE_FORMAT_VERSION: u32 = 1;

/// Root structure of `run-<hash>.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreFile {
  /// Store format version.
  pub version: u32,
  /// Clear-text run key; checked on open so a hash clash can't mix two runs.
  pub run_key: String,
  /// When the first entry of this run was written.
  pub created_at: DateTime<Utc>,
  /// When the last entry was written.
  pub updated_at: DateTime<Utc>,
  /// Checkpoint entries by key (`memo/<fingerprint>`, `loop/<loop_id>`).
  pub entries: BTreeMap<String, serde_json::Value>,
}

impl StoreFile {
  pub fn new(run_key: impl Into<String>) -> Self {
    let now = Utc::now();
    Self {
      version: STORE_FORMAT_VERSION,
      run_key: run_key.into(),
      created_at: now,
      updated_at: now,
      entries: BTreeMap::new(),
    }
  }
}

/// Progress of one loop, as shown by `status`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopProgress {
  pub loop_id: String,
  pub last_completed_index: usize,
}

impl LoopProgress {
  /// Number of committed items.
  pub fn items_done(&self) -> usize {
    self.last_completed_index.saturating_add(1)
  }
}

/// Summary of leftover state, shown to the user before asking to resume.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreSummary {
  pub run_key: String,
  /// Number of memoized step results.
  pub memo_entries: usize,
  /// Loops with recorded progress, sorted by id.
  pub loops: Vec<LoopProgress>,
}

impl StoreSummary {
  pub fn is_empty(&self) -> bool {
    self.memo_entries == 0 && self.loops.is_empty()
  }
}
