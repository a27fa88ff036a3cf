//! Error types for the checkpoint layer.
//!
//! Three families, kept apart so callers can tell them apart:
//! - storage: the persisted store could not be read or written (fatal for the run)
//! - usage: a stored value does not fit what the caller asked for
//! - control: illegal run state transitions, prompt and config failures
//!
//! Errors produced by wrapped work never pass through this type; they come back
//! to the caller as the caller's own error type.

use std::path::PathBuf;

use thiserror::Error;

use crate::types::RunState;

/// Error raised by the checkpoint layer itself.
#[derive(Debug, Error)]
pub enum CheckpointError {
  #[error("IO error: {context}")]
  Io {
    context: String,
    #[source]
    source: std::io::Error,
  },

  #[error("Corrupt checkpoint store {}: {reason}", path.display())]
  Corrupt { path: PathBuf, reason: String },

  #[error("Serialization error: {0}")]
  Serialization(#[from] serde_json::Error),

  #[error("Stored value for '{key}' does not match the requested type: {reason}")]
  ValueShape { key: String, reason: String },

  #[error("Accumulator for loop '{loop_id}' is incompatible with the stored snapshot: {reason}")]
  AccumulatorMismatch { loop_id: String, reason: String },

  #[error("Invalid run state transition: {from} -> {to}")]
  InvalidTransition { from: RunState, to: RunState },

  #[error("Resume prompt failed: {0}")]
  Prompt(String),

  #[error("Configuration error: {0}")]
  Config(String),
}

impl CheckpointError {
  /// Create an IO error with context.
  pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
    Self::Io {
      context: context.into(),
      source,
    }
  }

  /// Create a corruption error for the store at `path`.
  pub fn corrupt(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
    Self::Corrupt {
      path: path.into(),
      reason: reason.into(),
    }
  }

  /// True for caller mistakes: a cached value or snapshot that does not fit the request.
  pub fn is_usage_error(&self) -> bool {
    matches!(
      self,
      Self::ValueShape { .. } | Self::AccumulatorMismatch { .. }
    )
  }

  /// True when the persisted store itself failed. These abort the run.
  pub fn is_storage_error(&self) -> bool {
    matches!(
      self,
      Self::Io { .. } | Self::Corrupt { .. } | Self::Serialization(_)
    )
  }
}

/// Result type alias for the checkpoint layer.
pub type Result<T> = std::result::Result<T, CheckpointError>;
