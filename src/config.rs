//! Checkpoint configuration: where stores live and how leftover state is handled.
//!
//! Values come from CLI flags or [Default], then environment variables override them:
//!
//! - `APIGEN_CHECKPOINT_DIR`: checkpoint root directory (default `.checkpoints`)
//! - `APIGEN_RESUME`: `ask`, `yes` or `no`

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::{CheckpointError, Result};

/// Default checkpoint root, relative to the working directory.
pub const DEFAULT_CHECKPOINT_DIR: &str = ".checkpoints";
/// Environment variable overriding the checkpoint root.
pub const CHECKPOINT_DIR_ENV: &str = "APIGEN_CHECKPOINT_DIR";
/// Environment variable overriding the resume policy.
pub const RESUME_ENV: &str = "APIGEN_RESUME";

/// What to do when a run finds leftover checkpoint state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResumePolicy {
  /// Ask the user.
  #[default]
  Ask,
  /// Resume without asking.
  Always,
  /// Discard leftover state and start fresh.
  Never,
}

impl FromStr for ResumePolicy {
  type Err = CheckpointError;

  fn from_str(s: &str) -> Result<Self> {
    match s.trim().to_ascii_lowercase().as_str() {
      "ask" => Ok(ResumePolicy::Ask),
      "yes" | "always" | "true" => Ok(ResumePolicy::Always),
      "no" | "never" | "false" => Ok(ResumePolicy::Never),
      other => Err(CheckpointError::Config(format!(
        "unknown resume policy '{other}' (expected ask, yes or no)"
      ))),
    }
  }
}

impl fmt::Display for ResumePolicy {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ResumePolicy::Ask => write!(f, "ask"),
      ResumePolicy::Always => write!(f, "yes"),
      ResumePolicy::Never => write!(f, "no"),
    }
  }
}

/// Checkpoint settings for one process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckpointConfig {
  /// Directory holding one store file per run plus the last-run pointer.
  pub root: PathBuf,
  pub resume: ResumePolicy,
}

impl Default for CheckpointConfig {
  fn default() -> Self {
    Self {
      root: PathBuf::from(DEFAULT_CHECKPOINT_DIR),
      resume: ResumePolicy::Ask,
    }
  }
}

impl CheckpointConfig {
  /// Defaults with environment overrides applied.
  pub fn from_env() -> Result<Self> {
    Self::default().with_env_overrides()
  }

  /// Applies `APIGEN_CHECKPOINT_DIR` and `APIGEN_RESUME` over the current values.
  pub fn with_env_overrides(self) -> Result<Self> {
    self.with_overrides_from(|name| std::env::var(name).ok())
  }

  /// Applies overrides looked up through `lookup` (an environment stand-in).
  pub fn with_overrides_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
    if let Some(dir) = lookup(CHECKPOINT_DIR_ENV).filter(|d| !d.trim().is_empty()) {
      self.root = PathBuf::from(dir);
    }
    if let Some(policy) = lookup(RESUME_ENV).filter(|p| !p.trim().is_empty()) {
      self.resume = policy.parse()?;
    }
    Ok(self)
  }
}
