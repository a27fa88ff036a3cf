//! Checkpointed iteration over an ordered list of work items.
//!
//! The caller gets each item together with the current accumulator, computes the next
//! accumulator, and hands it back with [PendingItem::commit]. The commit is persisted
//! before the next item is handed out, so after a crash the store holds exactly the
//! items finished so far.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use apigen_checkpoint::{CheckpointError, InMemoryStore, SequenceCheckpoint};
//!
//! # async fn example() -> Result<(), CheckpointError> {
//! let store = Arc::new(InMemoryStore::new());
//! let endpoints = vec!["/a".to_string(), "/b".to_string()];
//! let mut models = SequenceCheckpoint::open(store, "models", endpoints, Vec::<String>::new()).await?;
//! while let Some(step) = models.next() {
//!   let mut acc = step.accumulator().clone();
//!   acc.push(format!("{}.model.ts", step.item()));
//!   step.commit(acc).await?;
//! }
//! let all = models.into_accumulator();
//! # Ok(())
//! # }
//! ```

use std::future::Future;
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info, instrument};

use crate::error::{CheckpointError, Result};
use crate::store::{CheckpointStore, loop_key};
use crate::types::IterationRecord;

/// Cursor over `items` whose progress and accumulator live in the run's store.
pub struct SequenceCheckpoint<T, A> {
  store: Arc<dyn CheckpointStore>,
  loop_id: String,
  items: Vec<T>,
  next_index: usize,
  resumed_at: Option<usize>,
  accumulator: A,
}

impl<T, A> SequenceCheckpoint<T, A>
where
  A: Serialize + DeserializeOwned,
{
  /// Opens the loop `loop_id`. If progress is stored, the accumulator is restored and the
  /// cursor starts after the last committed index; otherwise it starts at 0 with `initial`.
  ///
  /// Fails with [CheckpointError::AccumulatorMismatch] when the stored snapshot does not
  /// decode into `A` without loss.
  #[instrument(level = "trace", skip_all)]
  pub async fn open(
    store: Arc<dyn CheckpointStore>,
    loop_id: impl Into<String>,
    items: impl IntoIterator<Item = T>,
    initial: A,
  ) -> Result<Self> {
    let loop_id = loop_id.into();
    let items: Vec<T> = items.into_iter().collect();

    let (next_index, resumed_at, accumulator) = match store.get(&loop_key(&loop_id)).await? {
      Some(value) => {
        let (record, resume_at) = decode_record(&loop_id, value)?;
        let accumulator = restore_accumulator::<A>(&record)?;
        info!(
          loop_id = %loop_id,
          resume_at,
          total = items.len(),
          "resuming checkpointed loop"
        );
        (resume_at, Some(resume_at), accumulator)
      }
      None => (0, None, initial),
    };

    Ok(Self {
      store,
      loop_id,
      items,
      next_index,
      resumed_at,
      accumulator,
    })
  }

  pub fn loop_id(&self) -> &str {
    &self.loop_id
  }

  /// Index the loop resumed at, if progress was restored from the store.
  pub fn resumed_at(&self) -> Option<usize> {
    self.resumed_at
  }

  /// Number of items not yet committed.
  pub fn remaining(&self) -> usize {
    self.items.len().saturating_sub(self.next_index)
  }

  /// The accumulator as of the last commit (or the initial/restored value).
  pub fn accumulator(&self) -> &A {
    &self.accumulator
  }

  /// Next uncommitted item, or `None` when the sequence is exhausted.
  ///
  /// Dropping the returned item without committing leaves the cursor where it is, so the
  /// same item is offered again.
  #[allow(clippy::should_implement_trait)]
  pub fn next(&mut self) -> Option<PendingItem<'_, T, A>> {
    if self.next_index >= self.items.len() {
      return None;
    }
    let index = self.next_index;
    Some(PendingItem {
      cursor: self,
      index,
    })
  }

  pub fn into_accumulator(self) -> A {
    self.accumulator
  }

  async fn persist(&mut self, index: usize, next: A) -> Result<()> {
    let snapshot = serde_json::to_value(&next)?;
    // A snapshot that can't be restored would make the run impossible to resume.
    round_trip::<A>(&snapshot).map_err(|reason| CheckpointError::AccumulatorMismatch {
      loop_id: self.loop_id.clone(),
      reason: format!(
        "{} does not survive a checkpoint: {reason}",
        std::any::type_name::<A>()
      ),
    })?;
    let record = IterationRecord {
      loop_id: self.loop_id.clone(),
      last_completed_index: index,
      accumulator_type: std::any::type_name::<A>().to_string(),
      accumulator: snapshot,
      updated_at: Utc::now(),
    };
    self
      .store
      .set(&loop_key(&self.loop_id), serde_json::to_value(&record)?)
      .await?;
    debug!(loop_id = %self.loop_id, index, "loop progress checkpointed");
    self.accumulator = next;
    self.next_index = index + 1;
    Ok(())
  }
}

/// An item handed out by [SequenceCheckpoint::next], waiting for its result.
pub struct PendingItem<'a, T, A> {
  cursor: &'a mut SequenceCheckpoint<T, A>,
  index: usize,
}

impl<T, A> PendingItem<'_, T, A>
where
  A: Serialize + DeserializeOwned,
{
  /// Position of the item in the original sequence.
  pub fn index(&self) -> usize {
    self.index
  }

  pub fn item(&self) -> &T {
    &self.cursor.items[self.index]
  }

  /// Accumulator as it stood after the previous item.
  pub fn accumulator(&self) -> &A {
    &self.cursor.accumulator
  }

  /// Records the item as done with `next` as the new accumulator. Durable on return.
  ///
  /// Fails with [CheckpointError::AccumulatorMismatch], writing nothing, if `next` would not
  /// decode back to the same value (for example a float NaN, stored as `null`).
  pub async fn commit(self, next: A) -> Result<()> {
    self.cursor.persist(self.index, next).await
  }
}

/// Folds `items` through `f`, checkpointing after each item.
///
/// `f` receives the item index, a clone of the item and the current accumulator. The
/// first error from `f` stops the fold and is returned unchanged; that item is not
/// recorded and will be processed again on the next run.
pub async fn checkpointed_fold<T, A, E, F, Fut>(
  store: Arc<dyn CheckpointStore>,
  loop_id: impl Into<String>,
  items: impl IntoIterator<Item = T>,
  initial: A,
  mut f: F,
) -> std::result::Result<A, E>
where
  T: Clone,
  A: Serialize + DeserializeOwned + Clone,
  E: From<CheckpointError>,
  F: FnMut(usize, T, A) -> Fut,
  Fut: Future<Output = std::result::Result<A, E>>,
{
  let mut cursor = SequenceCheckpoint::open(store, loop_id, items, initial).await?;
  while let Some(step) = cursor.next() {
    let next = f(step.index(), step.item().clone(), step.accumulator().clone()).await?;
    step.commit(next).await?;
  }
  Ok(cursor.into_accumulator())
}

/// Decodes a stored record and the index to resume at.
fn decode_record(loop_id: &str, value: serde_json::Value) -> Result<(IterationRecord, usize)> {
  let record: IterationRecord =
    serde_json::from_value(value).map_err(|e| CheckpointError::ValueShape {
      key: loop_key(loop_id),
      reason: format!("not an iteration record: {e}"),
    })?;
  if record.loop_id != loop_id {
    return Err(CheckpointError::ValueShape {
      key: loop_key(loop_id),
      reason: format!("record belongs to loop '{}'", record.loop_id),
    });
  }
  let Some(next_index) = record.next_index() else {
    return Err(CheckpointError::ValueShape {
      key: loop_key(loop_id),
      reason: format!(
        "last_completed_index {} is out of range",
        record.last_completed_index
      ),
    });
  };
  Ok((record, next_index))
}

/// Decodes the stored accumulator. Rejects snapshots that only decode by dropping or
/// inventing data: re-encoding must give back exactly what was stored.
fn restore_accumulator<A: Serialize + DeserializeOwned>(record: &IterationRecord) -> Result<A> {
  round_trip::<A>(&record.accumulator).map_err(|reason| CheckpointError::AccumulatorMismatch {
    loop_id: record.loop_id.clone(),
    reason: format!(
      "stored {} as {}: {reason}",
      record.accumulator_type,
      std::any::type_name::<A>()
    ),
  })
}

/// Decodes `snapshot` as `A` and checks that encoding it again gives `snapshot` back.
fn round_trip<A: Serialize + DeserializeOwned>(snapshot: &serde_json::Value) -> std::result::Result<A, String> {
  let value: A =
    serde_json::from_value(snapshot.clone()).map_err(|e| format!("does not decode: {e}"))?;
  let reencoded = serde_json::to_value(&value).map_err(|e| format!("does not encode: {e}"))?;
  if &reencoded != snapshot {
    return Err("decodes only with data loss".to_string());
  }
  Ok(value)
}
