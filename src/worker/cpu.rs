//! CPU worker that derives and tests candidate addresses.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use chrono::Local;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use tracing::{debug, warn};

use crate::crypto::{AddressCodec, DerivationError};
use crate::matcher::Pattern;
use crate::source::{KeyBatch, KeySource};

use super::{Hit, WorkerEvent};

/// Consecutive empty queue polls before a stall warning is raised.
pub const STALL_WARN_RETRIES: u32 = 50;

/// Where a worker gets its key batches from.
pub enum BatchFeed {
    /// The worker owns its source and generates batches itself.
    Direct(Box<dyn KeySource>),
    /// Batches are dequeued from a producer thread.
    Queue(Receiver<KeyBatch>),
}

/// Tunables shared by every worker of a pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerSettings {
    /// Candidates requested per batch (direct feeds)
    pub batch_size: usize,
    /// Successful derivations between counter flushes
    pub report_granularity: u64,
    /// Bounded wait for stop-flag checks and queue polling
    pub poll_interval: Duration,
}

enum Acquire {
    Batch(KeyBatch),
    Retry,
    Closed,
}

/// A worker that derives addresses for candidate keys and tests them.
pub struct CpuWorker {
    /// Worker ID
    id: usize,
    /// The pattern to match against
    pattern: Pattern,
    /// Address derivation
    codec: AddressCodec,
    /// Batch input
    feed: BatchFeed,
    /// Channel to the aggregator
    events: Sender<WorkerEvent>,
    /// Shared stop flag
    stop_flag: Arc<AtomicBool>,
    settings: WorkerSettings,
}

impl CpuWorker {
    /// Creates a new worker.
    pub fn new(
        id: usize,
        pattern: Pattern,
        feed: BatchFeed,
        events: Sender<WorkerEvent>,
        stop_flag: Arc<AtomicBool>,
        settings: WorkerSettings,
    ) -> Self {
        Self {
            id,
            pattern,
            codec: AddressCodec::new(),
            feed,
            events,
            stop_flag,
            settings,
        }
    }

    /// Runs the worker loop.
    ///
    /// Tests every candidate of every batch until:
    /// - Stop flag is set (checked before each candidate)
    /// - The batch queue is closed
    ///
    /// Invalid candidates are skipped and not counted. Hits are sent
    /// immediately; attempt counts every `report_granularity` derivations
    /// and once more on exit.
    pub fn run(mut self) {
        debug!(worker = self.id, "worker started");
        let mut pending: u64 = 0;

        'search: while !self.is_stopped() {
            let batch = match self.acquire() {
                Acquire::Batch(batch) => batch,
                Acquire::Retry => continue,
                Acquire::Closed => break,
            };

            for candidate in &batch {
                if self.is_stopped() {
                    break 'search;
                }

                let address = match self.codec.derive(candidate) {
                    Ok(address) => address,
                    Err(DerivationError::InvalidKey) => continue,
                };
                pending += 1;

                if self.pattern.matches(&address) {
                    self.emit(WorkerEvent::Hit(Hit {
                        address,
                        private_key: *candidate,
                        worker_id: self.id,
                        found_at: Local::now(),
                    }));
                }

                if pending >= self.settings.report_granularity {
                    self.flush(&mut pending);
                }
            }
        }

        self.flush(&mut pending);
        debug!(worker = self.id, "worker exited");
    }

    /// Returns the worker ID.
    pub fn id(&self) -> usize {
        self.id
    }

    #[inline]
    fn is_stopped(&self) -> bool {
        self.stop_flag.load(Ordering::Relaxed)
    }

    fn acquire(&mut self) -> Acquire {
        match &mut self.feed {
            BatchFeed::Direct(source) => match source.next_batch(self.settings.batch_size) {
                Ok(batch) => Acquire::Batch(batch),
                Err(e) => {
                    warn!(worker = self.id, error = %e, "key source failed, retrying");
                    thread::sleep(self.settings.poll_interval);
                    Acquire::Retry
                }
            },
            BatchFeed::Queue(batches) => {
                let mut waits = 0u32;
                loop {
                    match batches.recv_timeout(self.settings.poll_interval) {
                        Ok(batch) => return Acquire::Batch(batch),
                        Err(RecvTimeoutError::Disconnected) => return Acquire::Closed,
                        Err(RecvTimeoutError::Timeout) => {
                            if self.stop_flag.load(Ordering::Relaxed) {
                                return Acquire::Retry;
                            }
                            waits += 1;
                            if waits >= STALL_WARN_RETRIES {
                                warn!(
                                    worker = self.id,
                                    waited_ms = (self.settings.poll_interval * waits).as_millis() as u64,
                                    "no key batch available, key source is stalling"
                                );
                                let _ = self.events.send(WorkerEvent::Stalled { worker_id: self.id });
                                waits = 0;
                            }
                        }
                    }
                }
            }
        }
    }

    fn flush(&self, pending: &mut u64) {
        if *pending > 0 {
            self.emit(WorkerEvent::Attempts {
                worker_id: self.id,
                count: *pending,
            });
            *pending = 0;
        }
    }

    fn emit(&self, event: WorkerEvent) {
        // Ignore if the aggregator is gone
        let _ = self.events.send(event);
    }
}
