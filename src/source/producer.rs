//! Dedicated producer thread feeding the bounded batch queue.

use std::io;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Receiver, SendTimeoutError, Sender};
use tracing::{debug, error};

use super::{KeyBatch, KeySource, SourceError};
use crate::worker::join_until;

/// Runs one [`KeySource`] on its own thread and pushes its batches into a
/// bounded queue shared by all workers.
///
/// A full queue blocks the producer (backpressure). The stop flag is
/// checked between send attempts, so a blocked producer exits within one
/// poll interval. A batch still held when stopping is dropped.
pub struct Producer {
    handle: JoinHandle<Result<(), SourceError>>,
    produced: Arc<AtomicU64>,
}

impl Producer {
    /// Spawns the producer thread and returns the consumer end of the queue.
    pub fn spawn(
        mut source: Box<dyn KeySource>,
        batch_size: usize,
        queue_depth: usize,
        stop_flag: Arc<AtomicBool>,
        poll_interval: Duration,
    ) -> io::Result<(Self, Receiver<KeyBatch>)> {
        let (batch_tx, batch_rx) = bounded(queue_depth);
        let produced = Arc::new(AtomicU64::new(0));
        let counter = produced.clone();

        let handle = thread::Builder::new()
            .name("vanity-keygen".into())
            .spawn(move || {
                let result = produce(
                    source.as_mut(),
                    &batch_tx,
                    batch_size,
                    &stop_flag,
                    &counter,
                    poll_interval,
                );
                match &result {
                    Ok(()) => debug!(source = source.name(), "key producer exited"),
                    Err(e) => error!(source = source.name(), error = %e, "key producer failed"),
                }
                result
            })?;

        Ok((Self { handle, produced }, batch_rx))
    }

    /// Number of batches the source has produced so far.
    pub fn batches_produced(&self) -> u64 {
        self.produced.load(Ordering::Relaxed)
    }

    /// Returns true once the producer thread has exited.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Waits for the thread until `deadline`.
    ///
    /// Returns `None` when the thread is still running at the deadline; it
    /// is then detached and whatever it holds is discarded.
    pub fn shutdown(self, deadline: Instant, poll_interval: Duration) -> Option<Result<(), SourceError>> {
        join_until(self.handle, deadline, poll_interval).map(|joined| {
            joined.unwrap_or_else(|_| Err(SourceError::Device("key producer panicked".into())))
        })
    }
}

fn produce(
    source: &mut dyn KeySource,
    batch_tx: &Sender<KeyBatch>,
    batch_size: usize,
    stop_flag: &AtomicBool,
    produced: &AtomicU64,
    poll_interval: Duration,
) -> Result<(), SourceError> {
    debug!(source = source.name(), batch_size, "key producer started");

    while !stop_flag.load(Ordering::Relaxed) {
        let mut batch = source.next_batch(batch_size)?;
        produced.fetch_add(1, Ordering::Relaxed);

        loop {
            match batch_tx.send_timeout(batch, poll_interval) {
                Ok(()) => break,
                Err(SendTimeoutError::Timeout(returned)) => {
                    if stop_flag.load(Ordering::Relaxed) {
                        return Ok(());
                    }
                    batch = returned;
                }
                Err(SendTimeoutError::Disconnected(_)) => return Ok(()),
            }
        }
    }

    Ok(())
}
