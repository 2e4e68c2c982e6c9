//! Run lifecycle: start the pipeline, watch for a stop condition, shut down.
//!
//! ```text
//! KeySource ──> [Producer ──> bounded queue] ──> WorkerPool ──> events ──> Aggregator ──> ResultSink
//! ```
//!
//! The controller thread doubles as the aggregator thread. It stops the run
//! when the target hit count is reached, when the operator cancels, or when
//! the shared key source fails.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError};
use tracing::{error, info, warn};

use crate::aggregator::{Aggregator, Phase};
use crate::config::{Config, ConfigError};
use crate::matcher::Pattern;
use crate::sink::{ResultSink, SinkError};
use crate::source::{open_accelerator, CpuSource, KeySource, Producer, SourceError};
use crate::worker::{BatchFeed, Hit, WorkerEvent, WorkerPool, WorkerSettings};

#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Sink(#[from] SinkError),

    #[error("failed to spawn thread: {0}")]
    Spawn(#[from] io::Error),
}

/// Requests a graceful stop of a running search. Cheap to clone and safe to
/// use from a signal handler.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    /// Requests cancellation. Returns false if it was already requested.
    pub fn cancel(&self) -> bool {
        !self.0.swap(true, Ordering::Relaxed)
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// How workers are supplied with candidate keys.
pub enum KeySupply {
    /// Every worker owns a source built by the closure (called with the worker id).
    PerWorker(Box<dyn FnMut(usize) -> Box<dyn KeySource>>),
    /// One source runs on a producer thread and feeds all workers through the queue.
    Shared(Box<dyn KeySource>),
}

/// Why a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    TargetReached,
    Cancelled,
    /// The shared key source failed, or every worker exited unexpectedly.
    SourceFailed,
}

impl Outcome {
    /// Process exit code for this outcome.
    pub fn exit_code(self) -> i32 {
        match self {
            Outcome::TargetReached | Outcome::Cancelled => 0,
            Outcome::SourceFailed => 2,
        }
    }
}

/// Final report of a run.
#[derive(Debug)]
pub struct RunSummary {
    pub outcome: Outcome,
    pub phase: Phase,
    pub total_attempts: u64,
    pub hits_found: u32,
    pub elapsed: Duration,
    /// Every hit of the run, in arrival order
    pub hits: Vec<Hit>,
    /// Threads still running at the shutdown deadline
    pub abandoned_threads: usize,
    pub stall_warnings: u64,
    /// The error that ended the shared key source, if any
    pub source_error: Option<SourceError>,
}

/// Owns one search run.
pub struct Controller<S: ResultSink> {
    config: Config,
    pattern: Pattern,
    sink: S,
    cancel: CancelHandle,
}

impl<S: ResultSink> Controller<S> {
    /// Validates `config` and prepares a run that records hits into `sink`.
    pub fn new(config: Config, sink: S) -> Result<Self, RunError> {
        config.validate()?;
        let pattern = config.pattern();
        Ok(Self {
            config,
            pattern,
            sink,
            cancel: CancelHandle::default(),
        })
    }

    pub fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Runs with the key source selected by the configuration.
    pub fn run(self) -> Result<RunSummary, RunError> {
        let supply = if self.config.gpu {
            KeySupply::Shared(open_accelerator(
                self.config.gpu_device,
                self.config.batch_size,
            )?)
        } else {
            KeySupply::PerWorker(Box::new(|_| -> Box<dyn KeySource> {
                Box::new(CpuSource::new())
            }))
        };
        self.run_with(supply)
    }

    /// Runs with an explicit key supply. Blocks until the run is over.
    pub fn run_with(self, supply: KeySupply) -> Result<RunSummary, RunError> {
        let Self {
            config,
            pattern,
            sink,
            cancel,
        } = self;

        let workers = config.worker_count();
        let poll = config.poll_interval();
        let settings = WorkerSettings {
            batch_size: config.batch_size,
            report_granularity: config.report_granularity,
            poll_interval: poll,
        };
        let stop_flag = Arc::new(AtomicBool::new(false));
        let (event_tx, event_rx) = unbounded();

        let (producer, feeds, source_name) = match supply {
            KeySupply::PerWorker(mut make_source) => {
                let feeds: Vec<BatchFeed> = (0..workers)
                    .map(|id| BatchFeed::Direct(make_source(id)))
                    .collect();
                (None, feeds, "per-worker".to_string())
            }
            KeySupply::Shared(source) => {
                let name = source.name().to_string();
                let (producer, batches) = Producer::spawn(
                    source,
                    config.batch_size,
                    config.queue_depth,
                    stop_flag.clone(),
                    poll,
                )?;
                let feeds = (0..workers)
                    .map(|_| BatchFeed::Queue(batches.clone()))
                    .collect();
                (Some(producer), feeds, name)
            }
        };

        let pool = match WorkerPool::spawn(feeds, &pattern, settings, event_tx, stop_flag.clone()) {
            Ok(pool) => pool,
            Err(e) => {
                if let Some(producer) = producer {
                    let _ = producer.shutdown(Instant::now() + config.shutdown_timeout(), poll);
                }
                return Err(RunError::Spawn(e));
            }
        };

        info!(
            pattern = %pattern,
            workers = pool.num_workers(),
            batch_size = config.batch_size,
            source = %source_name,
            "search started"
        );

        let mut aggregator = Aggregator::new(sink, config.count, config.report_interval());

        let outcome = loop {
            if aggregator.target_reached() {
                break Outcome::TargetReached;
            }
            if cancel.is_cancelled() {
                break Outcome::Cancelled;
            }
            if producer.as_ref().is_some_and(|p| p.is_finished()) {
                break Outcome::SourceFailed;
            }

            let wait = aggregator.time_until_report(Instant::now()).min(poll);
            match event_rx.recv_timeout(wait) {
                Ok(event) => {
                    aggregator.handle(event);
                    drain(&event_rx, &mut aggregator);
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    error!("all workers exited unexpectedly");
                    break Outcome::SourceFailed;
                }
            }

            aggregator.maybe_report(Instant::now());
        };

        aggregator.begin_draining();
        info!(reason = ?outcome, "stopping search");
        stop_flag.store(true, Ordering::Relaxed);
        let deadline = Instant::now() + config.shutdown_timeout();
        let mut abandoned_threads = 0;

        let mut source_error = None;
        if let Some(producer) = producer {
            match producer.shutdown(deadline, poll) {
                Some(Ok(())) => {}
                Some(Err(e)) => source_error = Some(e),
                None => {
                    warn!("key producer did not exit before the shutdown deadline, abandoning it");
                    abandoned_threads += 1;
                }
            }
        }

        // Keep consuming while workers wind down so their last counters and
        // hits are not lost
        while !pool.all_finished() && Instant::now() < deadline {
            if let Ok(event) = event_rx.recv_timeout(poll) {
                aggregator.handle(event);
            }
        }
        abandoned_threads += pool.join(deadline, poll);
        drain(&event_rx, &mut aggregator);

        let summary = aggregator.finish();
        let phase = aggregator.phase();
        let stall_warnings = aggregator.stall_warnings();
        let (_, hits) = aggregator.into_parts();

        Ok(RunSummary {
            outcome,
            phase,
            total_attempts: summary.total_attempts,
            hits_found: summary.hits_found,
            elapsed: summary.elapsed,
            hits,
            abandoned_threads,
            stall_warnings,
            source_error,
        })
    }
}

fn drain<S: ResultSink>(events: &Receiver<WorkerEvent>, aggregator: &mut Aggregator<S>) {
    for event in events.try_iter() {
        aggregator.handle(event);
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;
    use crate::sink::FileSink;
    use crate::source::KeyBatch;
    use crate::AddressCodec;

    // Derives TABy3CywcfrijA3kmcxipCW8SK4QJJWZdd
    const AB_KEY: &str = "5eed000000000000000000000000000000000000000000000000000000000e11";
    const AB_ADDRESS: &str = "TABy3CywcfrijA3kmcxipCW8SK4QJJWZdd";
    const CURVE_ORDER: &str = "fffffffffffffffffffffffffffffffebaaedce6af48a03bbfd25e8cd0364141";

    fn key(hex_str: &str) -> [u8; 32] {
        hex::decode(hex_str).unwrap().try_into().unwrap()
    }

    /// One batch holding a single valid key between invalid ones.
    fn ab_batch() -> Vec<[u8; 32]> {
        vec![[0u8; 32], key(CURVE_ORDER), key(AB_KEY), [0u8; 32]]
    }

    /// Returns the scripted batch once, then batches of invalid zero keys.
    struct ScriptedSource {
        script: Option<Vec<[u8; 32]>>,
    }

    impl KeySource for ScriptedSource {
        fn next_batch(&mut self, size: usize) -> Result<KeyBatch, SourceError> {
            Ok(match self.script.take() {
                Some(keys) => KeyBatch::new(keys),
                None => KeyBatch::zeroed(size),
            })
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }

    struct BrokenSource;

    impl KeySource for BrokenSource {
        fn next_batch(&mut self, _size: usize) -> Result<KeyBatch, SourceError> {
            Err(SourceError::Device("device lost".into()))
        }

        fn name(&self) -> &str {
            "broken"
        }
    }

    fn test_config(prefix: &str, suffix: &str, output: &std::path::Path) -> Config {
        Config {
            prefix: prefix.into(),
            suffix: suffix.into(),
            workers: Some(2),
            batch_size: 4,
            report_interval: 60.0,
            report_granularity: 1,
            output: output.to_path_buf(),
            shutdown_timeout: 2.0,
            poll_interval_ms: 5,
            ..Config::default()
        }
    }

    fn controller(config: Config) -> Controller<FileSink> {
        let sink = FileSink::open(&config.output).unwrap();
        Controller::new(config, sink).unwrap()
    }

    fn assert_single_ab_hit(summary: &RunSummary, output: &std::path::Path) {
        assert_eq!(summary.outcome, Outcome::TargetReached);
        assert_eq!(summary.phase, Phase::Stopped);
        assert_eq!(summary.hits_found, 1);
        assert_eq!(summary.total_attempts, 1);
        assert_eq!(summary.abandoned_threads, 0);
        assert_eq!(summary.hits[0].address, AB_ADDRESS);
        assert_eq!(summary.hits[0].private_key_hex(), AB_KEY);

        let contents = std::fs::read_to_string(output).unwrap();
        assert!(contents.contains(&format!("Address: {}\n", AB_ADDRESS)));
        assert!(contents.contains(&format!("Private Key: {}\n", AB_KEY)));
    }

    #[test]
    fn test_scripted_key_is_found_through_queue() {
        assert_eq!(AddressCodec::new().derive(&key(AB_KEY)).unwrap(), AB_ADDRESS);

        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("found.txt");
        let supply = KeySupply::Shared(Box::new(ScriptedSource {
            script: Some(ab_batch()),
        }));

        let summary = controller(test_config("AB", "", &output))
            .run_with(supply)
            .unwrap();
        assert_single_ab_hit(&summary, &output);
        assert!(summary.source_error.is_none());
    }

    #[test]
    fn test_scripted_key_is_found_per_worker() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("found.txt");
        let supply = KeySupply::PerWorker(Box::new(|id| -> Box<dyn KeySource> {
            Box::new(ScriptedSource {
                script: (id == 0).then(ab_batch),
            })
        }));

        let summary = controller(test_config("AB", "", &output))
            .run_with(supply)
            .unwrap();
        assert_single_ab_hit(&summary, &output);
    }

    #[test]
    fn test_cpu_search_finds_suffix() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("found.txt");
        let mut config = test_config("", "ab", &output);
        config.batch_size = 256;
        config.report_granularity = 100;

        let summary = controller(config).run().unwrap();
        assert_eq!(summary.outcome, Outcome::TargetReached);
        assert!(summary.hits_found >= 1);
        assert!(summary.hits[0].address.ends_with("ab"));
        assert!(summary.total_attempts >= 1);

        let derived = AddressCodec::new()
            .derive(&summary.hits[0].private_key)
            .unwrap();
        assert_eq!(derived, summary.hits[0].address);
    }

    #[test]
    fn test_cancel_stops_run() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("found.txt");
        // '0' is outside the Base58 alphabet, so nothing ever matches
        let controller = controller(test_config("0", "", &output));
        let cancel = controller.cancel_handle();

        let canceller = thread::spawn(move || {
            thread::sleep(Duration::from_millis(200));
            let first = cancel.cancel();
            let second = cancel.cancel();
            (first, second, cancel.is_cancelled())
        });

        let started = Instant::now();
        let summary = controller.run().unwrap();
        assert_eq!(canceller.join().unwrap(), (true, false, true));

        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(summary.outcome, Outcome::Cancelled);
        assert_eq!(summary.phase, Phase::Stopped);
        assert_eq!(summary.hits_found, 0);
        assert!(summary.total_attempts > 0);
        assert_eq!(summary.outcome.exit_code(), 0);
    }

    #[test]
    fn test_source_failure_ends_run() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("found.txt");

        let summary = controller(test_config("AB", "", &output))
            .run_with(KeySupply::Shared(Box::new(BrokenSource)))
            .unwrap();
        assert_eq!(summary.outcome, Outcome::SourceFailed);
        assert_eq!(summary.outcome.exit_code(), 2);
        assert!(matches!(summary.source_error, Some(SourceError::Device(_))));
        assert_eq!(summary.hits_found, 0);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("found.txt");
        let mut config = test_config("AB", "", &output);
        config.batch_size = 0;

        let sink = FileSink::open(&output).unwrap();
        assert!(matches!(
            Controller::new(config, sink),
            Err(RunError::Config(_))
        ));
    }
}
