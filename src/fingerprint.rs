//! Deterministic fingerprints for memoized calls.
//!
//! A fingerprint is `sha256(canonical_json({"args": .., "step": ..}))` in lowercase hex.
//! Object keys are sorted at every depth before hashing, so struct field order and map
//! iteration order never change the result.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use tracing::instrument;

use crate::error::Result;

/// Deterministic key identifying one memoized call.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
  /// Fingerprint of `step` called with `args`.
  #[instrument(level = "trace", skip(args))]
  pub fn of<A: Serialize + ?Sized>(step: &str, args: &A) -> Result<Self> {
    let mut call = Map::new();
    call.insert("args".to_string(), serde_json::to_value(args)?);
    call.insert("step".to_string(), Value::from(step));
    let canonical = canonical_json(&Value::Object(call))?;

    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    Ok(Self(format!("{:x}", hasher.finalize())))
  }

  /// Uses `raw` verbatim as the fingerprint. The caller owns injectivity.
  pub fn from_raw(raw: impl Into<String>) -> Self {
    Self(raw.into())
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl fmt::Display for Fingerprint {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

/// Renders `value` as compact JSON with object keys sorted at every depth.
pub fn canonical_json(value: &Value) -> Result<String> {
  Ok(serde_json::to_string(&sorted(value))?)
}

fn sorted(value: &Value) -> Value {
  match value {
    Value::Object(map) => {
      let mut entries: Vec<(&String, &Value)> = map.iter().collect();
      entries.sort_by(|a, b| a.0.cmp(b.0));
      let mut out = Map::new();
      for (k, v) in entries {
        out.insert(k.clone(), sorted(v));
      }
      Value::Object(out)
    }
    Value::Array(items) => Value::Array(items.iter().map(sorted).collect()),
    other => other.clone(),
  }
}
