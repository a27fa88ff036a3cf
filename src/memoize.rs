//! Call memoization: run an expensive step at most once successfully per run.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use apigen_checkpoint::{CheckpointError, InMemoryStore, Memoizer};
//!
//! # async fn example() -> Result<(), CheckpointError> {
//! let memo = Memoizer::new(Arc::new(InMemoryStore::new()));
//! let models: Vec<String> = memo
//!   .call("generate_model", "/pets".to_string(), |path| async move {
//!     Ok::<_, CheckpointError>(vec![format!("{path}.model.ts")])
//!   })
//!   .await?;
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info, instrument, warn};

use crate::error::CheckpointError;
use crate::fingerprint::Fingerprint;
use crate::store::{CheckpointStore, memo_key};

type Gate = Arc<tokio::sync::Mutex<()>>;

/// Wraps work closures so their results are persisted and replayed from the run's store.
pub struct Memoizer {
  store: Arc<dyn CheckpointStore>,
  /// One gate per fingerprint currently being computed.
  in_flight: Mutex<HashMap<Fingerprint, Gate>>,
}

impl Memoizer {
  pub fn new(store: Arc<dyn CheckpointStore>) -> Self {
    Self {
      store,
      in_flight: Mutex::new(HashMap::new()),
    }
  }

  /// Runs `f` with `args` unless a result for `(step, args)` is already stored.
  #[instrument(level = "trace", skip(self, args, f))]
  pub async fn call<A, T, E, F, Fut>(&self, step: &str, args: A, f: F) -> Result<T, E>
  where
    A: Serialize,
    T: Serialize + DeserializeOwned,
    E: From<CheckpointError>,
    F: FnOnce(A) -> Fut,
    Fut: Future<Output = Result<T, E>>,
  {
    let fingerprint = Fingerprint::of(step, &args)?;
    self.memoize(&fingerprint, move || f(args)).await
  }

  /// Returns the stored result for `fingerprint`, or runs `f` and stores its result.
  ///
  /// Nothing is stored when `f` fails; its error comes back as is. The result is durable
  /// before it is returned. Concurrent calls with the same fingerprint wait for each other,
  /// so the body runs once.
  pub async fn memoize<T, E, F, Fut>(&self, fingerprint: &Fingerprint, f: F) -> Result<T, E>
  where
    T: Serialize + DeserializeOwned,
    E: From<CheckpointError>,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>>,
  {
    let key = memo_key(fingerprint);
    if let Some(value) = self.cached(&key).await? {
      info!(fingerprint = %fingerprint, "skipping step, result already checkpointed");
      return Ok(value);
    }

    let gate = self.gate(fingerprint);
    let outcome = {
      let _guard = gate.lock().await;
      self.run_gated(&key, fingerprint, f).await
    };
    self.release(fingerprint, gate);
    outcome
  }

  async fn run_gated<T, E, F, Fut>(&self, key: &str, fingerprint: &Fingerprint, f: F) -> Result<T, E>
  where
    T: Serialize + DeserializeOwned,
    E: From<CheckpointError>,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>>,
  {
    // Another task may have finished the same step while we waited on the gate.
    if let Some(value) = self.cached(key).await? {
      info!(fingerprint = %fingerprint, "skipping step, computed by a concurrent caller");
      return Ok(value);
    }

    match f().await {
      Ok(value) => {
        let json = serde_json::to_value(&value).map_err(CheckpointError::from)?;
        self.store.set(key, json).await?;
        debug!(fingerprint = %fingerprint, "step result checkpointed");
        Ok(value)
      }
      Err(e) => {
        warn!(fingerprint = %fingerprint, "step failed, nothing checkpointed");
        Err(e)
      }
    }
  }

  /// Decodes the stored value under `key`. A value that does not fit `T` is a usage error.
  async fn cached<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, CheckpointError> {
    match self.store.get(key).await? {
      Some(value) => serde_json::from_value(value)
        .map(Some)
        .map_err(|e| CheckpointError::ValueShape {
          key: key.to_string(),
          reason: e.to_string(),
        }),
      None => Ok(None),
    }
  }

  fn gate(&self, fingerprint: &Fingerprint) -> Gate {
    let mut table = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
    table.entry(fingerprint.clone()).or_default().clone()
  }

  fn release(&self, fingerprint: &Fingerprint, gate: Gate) {
    let mut table = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
    // Only the table and this caller still hold it: nobody else is waiting.
    if Arc::strong_count(&gate) == 2 {
      table.remove(fingerprint);
    }
  }
}
