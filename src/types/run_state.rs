//! Lifecycle state of one generation run.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{CheckpointError, Result};

/// Lifecycle state of one generation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
  /// No usable leftover state; every step runs from scratch.
  Fresh,
  /// Leftover state was found and the user chose to continue from it.
  Resuming,
  /// The pipeline finished without error; the store is about to be cleared.
  Completed,
}

impl RunState {
  /// Whether moving from `self` to `to` is a legal lifecycle step.
  ///
  /// `Fresh -> Fresh` covers a declined resume; `Fresh -> Completed` a run that
  /// finished on its first attempt.
  pub fn can_transition_to(self, to: RunState) -> bool {
    matches!(
      (self, to),
      (RunState::Fresh, RunState::Fresh)
        | (RunState::Fresh, RunState::Resuming)
        | (RunState::Fresh, RunState::Completed)
        | (RunState::Resuming, RunState::Completed)
        | (RunState::Completed, RunState::Fresh)
    )
  }

  /// Returns `to` if the transition is legal.
  pub fn transition(self, to: RunState) -> Result<RunState> {
    if self.can_transition_to(to) {
      Ok(to)
    } else {
      Err(CheckpointError::InvalidTransition { from: self, to })
    }
  }
}

impl fmt::Display for RunState {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      RunState::Fresh => write!(f, "fresh"),
      RunState::Resuming => write!(f, "resuming"),
      RunState::Completed => write!(f, "completed"),
    }
  }
}
