//! Single consumer of worker events.
//!
//! The aggregator owns the global counters, the collected hits and the result
//! sink. Workers only ever talk to it through [`WorkerEvent`]s, so none of its
//! state needs synchronization.

use std::time::{Duration, Instant};

use tracing::{error, info, warn};

use crate::sink::ResultSink;
use crate::stats::{format_elapsed, format_number, Progress, Stats};
use crate::worker::{Hit, WorkerEvent};

/// Lifecycle of a search run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Running,
    /// Stop requested; late events are still accepted.
    Draining,
    Stopped,
}

pub struct Aggregator<S: ResultSink> {
    sink: S,
    stats: Stats,
    hits: Vec<Hit>,
    /// Hits to collect before stopping; 0 runs until cancelled
    target: usize,
    report_interval: Duration,
    next_report: Instant,
    phase: Phase,
    stall_warnings: u64,
    sink_failures: u64,
}

impl<S: ResultSink> Aggregator<S> {
    pub fn new(sink: S, target: usize, report_interval: Duration) -> Self {
        let stats = Stats::new();
        let next_report = stats.start_time() + report_interval;
        Self {
            sink,
            stats,
            hits: Vec::new(),
            target,
            report_interval,
            next_report,
            phase: Phase::Running,
            stall_warnings: 0,
            sink_failures: 0,
        }
    }

    /// Applies one worker event.
    pub fn handle(&mut self, event: WorkerEvent) {
        match event {
            WorkerEvent::Attempts { count, .. } => self.stats.record_attempts(count),
            WorkerEvent::Hit(hit) => self.record_hit(hit),
            WorkerEvent::Stalled { .. } => self.stall_warnings += 1,
        }
    }

    fn record_hit(&mut self, hit: Hit) {
        if self.phase != Phase::Running {
            warn!(address = %hit.address, "match arrived while draining, keeping it");
        }

        // A failed write must not lose the key; it is still reported and counted
        if let Err(e) = self.sink.record(&hit) {
            self.sink_failures += 1;
            error!(
                address = %hit.address,
                private_key = %hit.private_key_hex(),
                error = %e,
                "failed to persist match"
            );
        }

        self.stats.record_hit();
        info!(
            address = %hit.address,
            worker = hit.worker_id,
            found = self.stats.hits_found(),
            "match found"
        );
        self.hits.push(hit);
    }

    /// Returns true once the requested number of hits has been collected.
    pub fn target_reached(&self) -> bool {
        self.target > 0 && self.hits.len() >= self.target
    }

    /// Time left until the next progress report is due.
    pub fn time_until_report(&self, now: Instant) -> Duration {
        self.next_report.saturating_duration_since(now)
    }

    /// Emits a progress report if one is due.
    pub fn maybe_report(&mut self, now: Instant) -> Option<Progress> {
        if self.phase != Phase::Running || now < self.next_report {
            return None;
        }

        let progress = self.stats.report_at(now);
        info!("{}", progress);

        // Skip missed slots instead of reporting in a burst
        while self.next_report <= now {
            self.next_report += self.report_interval;
        }
        Some(progress)
    }

    /// Leaves `Running`. Returns false if draining had already begun.
    pub fn begin_draining(&mut self) -> bool {
        if self.phase != Phase::Running {
            return false;
        }
        self.phase = Phase::Draining;
        true
    }

    /// Moves to `Stopped` and logs the final summary.
    pub fn finish(&mut self) -> Progress {
        let summary = self.stats.summary_at(Instant::now());
        if self.phase != Phase::Stopped {
            self.phase = Phase::Stopped;
            info!(
                elapsed = %format_elapsed(summary.elapsed),
                searched = %format_number(summary.total_attempts),
                average_rate = %format_number(summary.average_rate as u64),
                found = summary.hits_found,
                "search finished"
            );
        }
        summary
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    pub fn hits(&self) -> &[Hit] {
        &self.hits
    }

    /// Number of stall warnings raised by workers.
    pub fn stall_warnings(&self) -> u64 {
        self.stall_warnings
    }

    /// Number of hits the sink failed to persist.
    pub fn sink_failures(&self) -> u64 {
        self.sink_failures
    }

    /// Consumes the aggregator, returning the sink and the collected hits.
    pub fn into_parts(self) -> (S, Vec<Hit>) {
        (self.sink, self.hits)
    }
}

#[cfg(test)]
mod tests {
    use std::io;

    use chrono::Local;

    use super::*;
    use crate::sink::SinkError;

    #[derive(Default)]
    struct MemorySink {
        records: Vec<String>,
        fail: bool,
    }

    impl ResultSink for MemorySink {
        fn record(&mut self, hit: &Hit) -> Result<(), SinkError> {
            if self.fail {
                return Err(SinkError::Io {
                    path: "memory".into(),
                    source: io::Error::new(io::ErrorKind::Other, "disk full"),
                });
            }
            self.records.push(hit.address.clone());
            Ok(())
        }
    }

    fn hit(address: &str) -> WorkerEvent {
        WorkerEvent::Hit(Hit {
            address: address.into(),
            private_key: [1u8; 32],
            worker_id: 0,
            found_at: Local::now(),
        })
    }

    #[test]
    fn test_counts_and_target() {
        let mut agg = Aggregator::new(MemorySink::default(), 2, Duration::from_secs(5));
        agg.handle(WorkerEvent::Attempts { worker_id: 0, count: 400 });
        agg.handle(WorkerEvent::Attempts { worker_id: 1, count: 600 });
        agg.handle(hit("TAAA"));
        assert!(!agg.target_reached());
        agg.handle(hit("TBBB"));
        assert!(agg.target_reached());

        assert_eq!(agg.stats().total_attempts(), 1000);
        assert_eq!(agg.stats().hits_found(), 2);

        let (sink, hits) = agg.into_parts();
        assert_eq!(sink.records, vec!["TAAA", "TBBB"]);
        assert_eq!(hits.len(), 2);
    }

    #[test]
    fn test_zero_target_never_reached() {
        let mut agg = Aggregator::new(MemorySink::default(), 0, Duration::from_secs(5));
        for _ in 0..10 {
            agg.handle(hit("TAAA"));
        }
        assert!(!agg.target_reached());
    }

    #[test]
    fn test_phase_transitions() {
        let mut agg = Aggregator::new(MemorySink::default(), 1, Duration::from_secs(5));
        assert_eq!(agg.phase(), Phase::Running);
        assert!(agg.begin_draining());
        assert!(!agg.begin_draining());
        assert_eq!(agg.phase(), Phase::Draining);

        // Late hits are still persisted
        agg.handle(hit("TLATE"));
        assert_eq!(agg.stats().hits_found(), 1);

        agg.finish();
        assert_eq!(agg.phase(), Phase::Stopped);
        assert!(!agg.begin_draining());
        let (sink, _) = agg.into_parts();
        assert_eq!(sink.records, vec!["TLATE"]);
    }

    #[test]
    fn test_sink_failure_still_counts() {
        let sink = MemorySink {
            fail: true,
            ..Default::default()
        };
        let mut agg = Aggregator::new(sink, 1, Duration::from_secs(5));
        agg.handle(hit("TAAA"));
        assert!(agg.target_reached());
        assert_eq!(agg.sink_failures(), 1);
        assert_eq!(agg.hits()[0].address, "TAAA");
    }

    #[test]
    fn test_report_schedule() {
        let mut agg = Aggregator::new(MemorySink::default(), 1, Duration::from_secs(5));
        let start = agg.stats().start_time();

        assert!(agg.maybe_report(start + Duration::from_secs(1)).is_none());
        assert_eq!(
            agg.time_until_report(start + Duration::from_secs(1)),
            Duration::from_secs(4)
        );

        agg.handle(WorkerEvent::Attempts { worker_id: 0, count: 500 });
        let progress = agg.maybe_report(start + Duration::from_secs(5)).unwrap();
        assert_eq!(progress.total_attempts, 500);
        assert_eq!(progress.instant_rate, 100.0);

        // Missed slots are skipped
        assert!(agg.maybe_report(start + Duration::from_secs(17)).is_some());
        assert_eq!(
            agg.time_until_report(start + Duration::from_secs(17)),
            Duration::from_secs(3)
        );
    }

    #[test]
    fn test_stall_warnings_counted() {
        let mut agg = Aggregator::new(MemorySink::default(), 1, Duration::from_secs(5));
        agg.handle(WorkerEvent::Stalled { worker_id: 3 });
        agg.handle(WorkerEvent::Stalled { worker_id: 1 });
        assert_eq!(agg.stall_warnings(), 2);
    }
}
