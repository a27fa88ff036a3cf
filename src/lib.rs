//! # apigen-checkpoint
//!
//! Durable checkpoint/resume layer for long, externally paid generation pipelines
//! (spec parsing → model generation → test generation). An interrupted run picks up
//! where it stopped without paying again for finished steps and without skipping or
//! repeating work items.
//!
//! ## Architecture
//!
//! - [store]: one durable key/value store per run ([JsonFileStore], [InMemoryStore]).
//! - [memoize]: [Memoizer] runs a step at most once successfully per run.
//! - [sequence]: [SequenceCheckpoint] walks an ordered list of items, persisting progress
//!   and the caller's accumulator after every item.
//! - [run_controller]: [RunController] finds leftover state, asks to resume, and clears the
//!   store when the whole pipeline succeeded.
//!
//! Set RUST_LOG=apigen_checkpoint=debug to see every persisted write.

pub mod config;
pub mod error;
pub mod fingerprint;
#[cfg(test)]
mod fingerprint_test;
pub mod memoize;
#[cfg(test)]
mod memoize_test;
pub mod prompt;
pub mod run_controller;
pub mod sequence;
pub mod store;
pub mod types;

pub use config::{CheckpointConfig, ResumePolicy};
pub use error::{CheckpointError, Result};
pub use fingerprint::Fingerprint;
pub use memoize::Memoizer;
pub use prompt::{FixedAnswer, ResumePrompt, StdinPrompt};
pub use run_controller::{Run, RunController};
pub use sequence::{PendingItem, SequenceCheckpoint, checkpointed_fold};
pub use store::{CheckpointStore, InMemoryStore, JsonFileStore};
pub use types::{IterationRecord, RunKey, RunState, StoreSummary};
