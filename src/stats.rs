//! Search statistics and progress reporting.

use std::fmt;
use std::time::{Duration, Instant};

/// Global search statistics.
///
/// Owned by the aggregator and updated only from its thread; workers send
/// deltas instead of touching these counters.
#[derive(Debug, Clone)]
pub struct Stats {
    total_attempts: u64,
    hits_found: u32,
    start_time: Instant,
    last_report_time: Instant,
    last_report_count: u64,
}

impl Default for Stats {
    fn default() -> Self {
        Self::new()
    }
}

impl Stats {
    pub fn new() -> Self {
        Self::starting_at(Instant::now())
    }

    /// Creates statistics whose clock starts at `start`.
    pub fn starting_at(start: Instant) -> Self {
        Self {
            total_attempts: 0,
            hits_found: 0,
            start_time: start,
            last_report_time: start,
            last_report_count: 0,
        }
    }

    /// Adds a worker's attempt delta.
    pub fn record_attempts(&mut self, count: u64) {
        self.total_attempts = self.total_attempts.saturating_add(count);
    }

    /// Counts one hit.
    pub fn record_hit(&mut self) {
        self.hits_found = self.hits_found.saturating_add(1);
    }

    pub fn total_attempts(&self) -> u64 {
        self.total_attempts
    }

    pub fn hits_found(&self) -> u32 {
        self.hits_found
    }

    pub fn start_time(&self) -> Instant {
        self.start_time
    }

    /// Returns the elapsed time since the search started.
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Produces a periodic report and starts the next measurement window.
    ///
    /// The instantaneous rate covers the attempts since the previous report.
    pub fn report_at(&mut self, now: Instant) -> Progress {
        let window = now.saturating_duration_since(self.last_report_time);
        let delta = self.total_attempts - self.last_report_count;

        let progress = Progress {
            elapsed: now.saturating_duration_since(self.start_time),
            total_attempts: self.total_attempts,
            instant_rate: rate(delta, window),
            average_rate: self.average_rate_at(now),
            hits_found: self.hits_found,
        };

        self.last_report_time = now;
        self.last_report_count = self.total_attempts;
        progress
    }

    /// Cumulative figures at `now`, without touching the report window.
    pub fn summary_at(&self, now: Instant) -> Progress {
        let average_rate = self.average_rate_at(now);
        Progress {
            elapsed: now.saturating_duration_since(self.start_time),
            total_attempts: self.total_attempts,
            instant_rate: average_rate,
            average_rate,
            hits_found: self.hits_found,
        }
    }

    fn average_rate_at(&self, now: Instant) -> f64 {
        rate(self.total_attempts, now.saturating_duration_since(self.start_time))
    }
}

fn rate(count: u64, over: Duration) -> f64 {
    let secs = over.as_secs_f64();
    if secs > 0.0 {
        count as f64 / secs
    } else {
        0.0
    }
}

/// A snapshot of search progress.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Progress {
    pub elapsed: Duration,
    pub total_attempts: u64,
    /// Attempts per second since the previous report
    pub instant_rate: f64,
    /// Attempts per second since the start
    pub average_rate: f64,
    pub hits_found: u32,
}

impl fmt::Display for Progress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "elapsed {} | searched {} | instant {}/s | average {}/s | found {}",
            format_elapsed(self.elapsed),
            format_number(self.total_attempts),
            format_number(self.instant_rate as u64),
            format_number(self.average_rate as u64),
            self.hits_found
        )
    }
}

/// Formats a duration as `HH:MM:SS`.
pub fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    format!("{:02}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
}

pub fn format_number(n: u64) -> String {
    if n >= 1_000_000_000 {
        format!("{:.2}B", n as f64 / 1_000_000_000.0)
    } else if n >= 1_000_000 {
        format!("{:.2}M", n as f64 / 1_000_000.0)
    } else if n >= 1_000 {
        format!("{:.2}K", n as f64 / 1_000.0)
    } else {
        n.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instant_and_average_rates() {
        let t0 = Instant::now();
        let mut stats = Stats::starting_at(t0);

        stats.record_attempts(600);
        stats.record_attempts(400);
        let first = stats.report_at(t0 + Duration::from_secs(2));
        assert_eq!(first.total_attempts, 1000);
        assert_eq!(first.instant_rate, 500.0);
        assert_eq!(first.average_rate, 500.0);

        stats.record_attempts(3000);
        stats.record_hit();
        let second = stats.report_at(t0 + Duration::from_secs(4));
        assert_eq!(second.instant_rate, 1500.0);
        assert_eq!(second.average_rate, 1000.0);
        assert_eq!(second.hits_found, 1);
        assert_eq!(second.elapsed, Duration::from_secs(4));
    }

    #[test]
    fn test_zero_window_has_zero_rate() {
        let t0 = Instant::now();
        let mut stats = Stats::starting_at(t0);
        stats.record_attempts(10);
        let progress = stats.report_at(t0);
        assert_eq!(progress.instant_rate, 0.0);
        assert_eq!(progress.average_rate, 0.0);
    }

    #[test]
    fn test_summary_keeps_report_window() {
        let t0 = Instant::now();
        let mut stats = Stats::starting_at(t0);
        stats.record_attempts(100);
        let summary = stats.summary_at(t0 + Duration::from_secs(1));
        assert_eq!(summary.average_rate, 100.0);

        let report = stats.report_at(t0 + Duration::from_secs(2));
        assert_eq!(report.instant_rate, 50.0);
    }

    #[test]
    fn test_formatting() {
        assert_eq!(format_number(999), "999");
        assert_eq!(format_number(1_500), "1.50K");
        assert_eq!(format_number(2_000_000), "2.00M");
        assert_eq!(format_number(3_250_000_000), "3.25B");
        assert_eq!(format_elapsed(Duration::from_secs(3725)), "01:02:05");
    }

    #[test]
    fn test_progress_display() {
        let progress = Progress {
            elapsed: Duration::from_secs(65),
            total_attempts: 12_300,
            instant_rate: 2_000.0,
            average_rate: 1_500.0,
            hits_found: 2,
        };
        assert_eq!(
            progress.to_string(),
            "elapsed 00:01:05 | searched 12.30K | instant 2.00K/s | average 1.50K/s | found 2"
        );
    }
}
