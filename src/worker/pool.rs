//! Worker pool management.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::Sender;
use tracing::warn;

use crate::matcher::Pattern;

use super::cpu::{BatchFeed, CpuWorker, WorkerSettings};
use super::WorkerEvent;

/// Manages a pool of workers for parallel vanity address search.
pub struct WorkerPool {
    /// Worker thread handles
    handles: Vec<JoinHandle<()>>,
    /// Shared stop flag
    stop_flag: Arc<AtomicBool>,
}

impl WorkerPool {
    /// Spawns one worker thread per feed.
    ///
    /// If a spawn fails the stop flag is raised so the workers already
    /// started wind down, and the error is returned.
    pub fn spawn(
        feeds: Vec<BatchFeed>,
        pattern: &Pattern,
        settings: WorkerSettings,
        events: Sender<WorkerEvent>,
        stop_flag: Arc<AtomicBool>,
    ) -> io::Result<Self> {
        let mut handles = Vec::with_capacity(feeds.len());

        for (id, feed) in feeds.into_iter().enumerate() {
            let worker = CpuWorker::new(
                id,
                pattern.clone(),
                feed,
                events.clone(),
                stop_flag.clone(),
                settings,
            );

            let spawned = thread::Builder::new()
                .name(format!("vanity-worker-{}", id))
                .spawn(move || worker.run());

            match spawned {
                Ok(handle) => handles.push(handle),
                Err(e) => {
                    stop_flag.store(true, Ordering::Relaxed);
                    return Err(e);
                }
            }
        }

        Ok(Self { handles, stop_flag })
    }

    /// Returns the number of workers.
    pub fn num_workers(&self) -> usize {
        self.handles.len()
    }

    /// Signals all workers to stop.
    pub fn stop(&self) {
        self.stop_flag.store(true, Ordering::Relaxed);
    }

    /// Returns true if the pool has been signaled to stop.
    pub fn is_stopped(&self) -> bool {
        self.stop_flag.load(Ordering::Relaxed)
    }

    /// Returns true once every worker thread has exited.
    pub fn all_finished(&self) -> bool {
        self.handles.iter().all(|handle| handle.is_finished())
    }

    /// Stops the workers and waits for them until `deadline`.
    ///
    /// Workers still running at the deadline are detached. Returns how many
    /// were abandoned that way.
    pub fn join(mut self, deadline: Instant, poll_interval: Duration) -> usize {
        self.stop();

        let mut abandoned = 0;
        for (id, handle) in std::mem::take(&mut self.handles).into_iter().enumerate() {
            match join_until(handle, deadline, poll_interval) {
                Some(Ok(())) => {}
                Some(Err(_)) => warn!(worker = id, "worker panicked"),
                None => {
                    warn!(worker = id, "worker did not exit before the shutdown deadline, abandoning it");
                    abandoned += 1;
                }
            }
        }
        abandoned
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        // Unjoined workers must not outlive the search
        self.stop();
    }
}

/// Waits for `handle` until `deadline`.
///
/// Returns `None` and detaches the thread if it is still running at the
/// deadline.
pub fn join_until<T>(
    handle: JoinHandle<T>,
    deadline: Instant,
    poll_interval: Duration,
) -> Option<thread::Result<T>> {
    while !handle.is_finished() {
        let now = Instant::now();
        if now >= deadline {
            return None;
        }
        thread::sleep(poll_interval.min(deadline - now));
    }
    Some(handle.join())
}
