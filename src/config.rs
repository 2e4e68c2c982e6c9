//! Runtime configuration for the vanity address generator.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::crypto::ADDRESS_LEN;
use crate::matcher::Pattern;

/// Longest prefix plus suffix: every character of the address except the leading `T`.
pub const MAX_PATTERN_LEN: usize = ADDRESS_LEN - 1;

/// TRON Vanity Address Generator
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// Characters that must follow the leading 'T' (Base58, case-sensitive)
    #[arg(short, long, default_value = "")]
    pub prefix: String,

    /// Characters the address must end with (Base58, case-sensitive)
    #[arg(short, long, default_value = "")]
    pub suffix: String,

    /// Stop after finding N addresses (0 = run until interrupted)
    #[arg(short = 'n', long, default_value = "1")]
    pub count: usize,

    /// Candidate keys per batch
    #[arg(short, long, default_value = "100000")]
    pub batch_size: usize,

    /// Number of worker threads (default: number of CPU cores)
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Progress report interval in seconds
    #[arg(short, long, default_value = "5.0")]
    pub report_interval: f64,

    /// Derivations a worker performs between counter updates
    #[arg(long = "report-every", default_value = "10000")]
    pub report_granularity: u64,

    /// Batches buffered between the GPU and the workers
    #[arg(long, default_value = "10")]
    pub queue_depth: usize,

    /// File that found addresses are appended to
    #[arg(short, long, default_value = "found_addresses.txt")]
    pub output: PathBuf,

    /// Generate candidate keys on the GPU (requires OpenCL)
    #[arg(long, default_value = "false")]
    pub gpu: bool,

    /// GPU device index to use
    #[arg(long, default_value = "0")]
    pub gpu_device: usize,

    /// List GPU devices and exit
    #[arg(long, default_value = "false")]
    pub list_devices: bool,

    /// Seconds to wait for threads to exit when stopping
    #[arg(long, default_value = "2.0")]
    pub shutdown_timeout: f64,

    /// Stop-flag and queue polling interval in milliseconds
    #[arg(long, default_value = "100")]
    pub poll_interval_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            prefix: String::new(),
            suffix: String::new(),
            count: 1,
            batch_size: 100_000,
            workers: None,
            report_interval: 5.0,
            report_granularity: 10_000,
            queue_depth: 10,
            output: PathBuf::from("found_addresses.txt"),
            gpu: false,
            gpu_device: 0,
            list_devices: false,
            shutdown_timeout: 2.0,
            poll_interval_ms: 100,
        }
    }
}

impl Config {
    /// Returns the number of workers, defaulting to CPU count
    pub fn worker_count(&self) -> usize {
        self.workers.unwrap_or_else(num_cpus::get)
    }

    /// Validates the configuration
    ///
    /// The Base58 alphabet is not checked. A pattern containing `0`, `O`,
    /// `I` or `l` never matches.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let total_len = self.prefix.len() + self.suffix.len();
        if total_len > MAX_PATTERN_LEN {
            return Err(ConfigError::InvalidPattern(format!(
                "Combined prefix + suffix cannot be longer than {} characters (got {})",
                MAX_PATTERN_LEN, total_len
            )));
        }

        if self.batch_size == 0 {
            return Err(ConfigError::Invalid("batch size must be at least 1".into()));
        }
        if self.worker_count() == 0 {
            return Err(ConfigError::Invalid("worker count must be at least 1".into()));
        }
        if self.queue_depth == 0 {
            return Err(ConfigError::Invalid("queue depth must be at least 1".into()));
        }
        if self.report_granularity == 0 {
            return Err(ConfigError::Invalid("--report-every must be at least 1".into()));
        }
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid("poll interval must be at least 1 ms".into()));
        }

        check_seconds("report interval", self.report_interval)?;
        check_seconds("shutdown timeout", self.shutdown_timeout)?;

        Ok(())
    }

    /// Builds the pattern to match against.
    pub fn pattern(&self) -> Pattern {
        Pattern::new(self.prefix.clone(), self.suffix.clone())
    }

    pub fn report_interval(&self) -> Duration {
        Duration::from_secs_f64(self.report_interval)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.shutdown_timeout)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Short description of the key source, for the banner.
    pub fn source_description(&self) -> String {
        if self.gpu {
            format!("GPU device {}", self.gpu_device)
        } else {
            "CPU".into()
        }
    }
}

fn check_seconds(what: &str, secs: f64) -> Result<(), ConfigError> {
    // Also guards Duration::from_secs_f64, which panics on these values
    if !secs.is_finite() || secs <= 0.0 || secs > u32::MAX as f64 {
        return Err(ConfigError::Invalid(format!(
            "{} must be a positive number of seconds (got {})",
            what, secs
        )));
    }
    Ok(())
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid pattern: {0}")]
    InvalidPattern(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
