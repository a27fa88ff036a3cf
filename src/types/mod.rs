//! Data types persisted or exchanged by the checkpoint layer.

mod iteration_record;
#[cfg(test)]
mod iteration_record_test;
mod run_key;
mod run_state;
#[cfg(test)]
mod run_state_test;
mod store_file;
#[cfg(test)]
mod store_file_test;

pub use iteration_record::IterationRecord;
pub use run_key::RunKey;
pub use run_state::RunState;
pub use store_file::{LoopProgress, STORE_FORMAT_VERSION, StoreFile, StoreSummary};
