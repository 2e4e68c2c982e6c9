//! # tron_vanity
//!
//! High-performance TRON vanity address generator.
//!
//! ## Architecture
//!
//! - `crypto`: Address derivation from candidate private keys
//! - `matcher`: Prefix/suffix pattern matching
//! - `source`: Candidate key sources (CPU entropy, OpenCL accelerator) and the batch queue producer
//! - `worker`: Derive-and-match workers and the worker pool
//! - `aggregator`: Single consumer of worker counters and hits
//! - `controller`: Run lifecycle, cancellation and shutdown
//! - `sink`: Append-only persistence of matches
//! - `config`: Runtime configuration

pub mod aggregator;
pub mod config;
pub mod controller;
pub mod crypto;
pub mod logging;
pub mod matcher;
pub mod sink;
pub mod source;
pub mod stats;
pub mod worker;

pub use aggregator::{Aggregator, Phase};
pub use config::Config;
pub use controller::{CancelHandle, Controller, KeySupply, Outcome, RunError, RunSummary};
pub use crypto::{Address, AddressCodec, DerivationError};
pub use matcher::{matches, Pattern};
pub use sink::{FileSink, ResultSink, SinkError};
pub use source::{Candidate, CpuSource, KeyBatch, KeySource, Producer, SourceError};
pub use stats::{Progress, Stats};
pub use worker::{Hit, WorkerEvent, WorkerPool};

#[cfg(feature = "gpu")]
pub use source::gpu::GpuSource;
