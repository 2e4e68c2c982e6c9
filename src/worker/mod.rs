//! Worker pool for parallel vanity address search.
//!
//! This module provides:
//! - Derive-and-match workers fed directly by a key source or by the batch queue
//! - Hit and counter events flowing to the aggregator
//! - Pool lifecycle with deadline-bounded joins

mod cpu;
mod event;
mod pool;

pub use cpu::{BatchFeed, CpuWorker, WorkerSettings, STALL_WARN_RETRIES};
pub use event::{Hit, WorkerEvent};
pub use pool::{join_until, WorkerPool};
