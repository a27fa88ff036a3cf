//! Stable identity of a generation run.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Stable identity of a generation run (usually the destination folder).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunKey(String);

impl RunKey {
  pub fn new(key: impl Into<String>) -> Self {
    Self(key.into())
  }

  /// Run key for a destination folder. The longest existing ancestor is canonicalized
  /// (so a symlinked destination names the same run) and the missing tail is appended
  /// as is, so the key is the same before and after the folder is created.
  pub fn from_path(path: &Path) -> Self {
    let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    let normalized: PathBuf = absolute.components().collect();
    Self(resolve_existing_prefix(&normalized).to_string_lossy().into_owned())
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }

  /// File name of this run's store under the checkpoint root.
  pub fn store_file_name(&self) -> String {
    let mut hasher = Sha256::new();
    hasher.update(self.0.as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    format!("run-{}.json", &digest[..16])
  }
}

fn resolve_existing_prefix(path: &Path) -> PathBuf {
  let mut tail = Vec::new();
  let mut current = path;
  loop {
    if let Ok(real) = std::fs::canonicalize(current) {
      return tail.iter().rev().fold(real, |acc, part| acc.join(part));
    }
    match (current.parent(), current.file_name()) {
      (Some(parent), Some(name)) => {
        tail.push(name.to_os_string());
        current = parent;
      }
      _ => return path.to_path_buf(),
    }
  }
}

impl fmt::Display for RunKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

impl From<&str> for RunKey {
  fn from(s: &str) -> Self {
    Self::new(s)
  }
}
