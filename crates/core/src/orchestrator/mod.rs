//! Match orchestration.
//!
//! [`MatchOrchestrator`] runs the per-file state machine; [`BatchScheduler`]
//! fans it out over many files with bounded concurrency and a single-run
//! lock.

mod batch;
mod runner;
mod types;

pub use batch::{BatchScheduler, RunLock, RunLockGuard};
pub use runner::{EnrichmentCache, MatchOrchestrator};
pub use types::*;
