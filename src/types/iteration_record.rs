//! Persisted progress of one checkpointed iteration.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Progress of one checkpointed loop: how far it got and the caller's state at that point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IterationRecord {
  pub loop_id: String,
  /// Index of the last item whose processing was committed.
  pub last_completed_index: usize,
  /// `std::any::type_name` of the accumulator when the snapshot was taken.
  pub accumulator_type: String,
  /// Accumulator value as it stood right after `last_completed_index`.
  pub accumulator: serde_json::Value,
  pub updated_at: DateTime<Utc>,
}

impl IterationRecord {
  /// Index of the next item to hand out. `None` if the stored index has no successor,
  /// which only a damaged store can produce.
  pub fn next_index(&self) -> Option<usize> {
    self.last_completed_index.checked_add(1)
  }
}
