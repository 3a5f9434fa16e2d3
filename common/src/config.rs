//! Configuration types for runtime and execution settings

use std::time::Duration;

/// Runtime configuration for tokio and thread pools
#[derive(Debug, Clone, Copy, Default)]
pub struct RuntimeConfig {
    /// Number of worker threads (0 = number of CPU cores)
    pub max_workers: usize,
    /// Number of blocking threads (0 = tokio default of 512)
    pub max_blocking_threads: usize,
}

/// Transfer configuration: buffer sizing and throughput window geometry
#[derive(Debug, Clone, Copy)]
pub struct TransferConfig {
    /// Size of the read buffer, every write is at most this large (bytes)
    pub chunk_size: u64,
    /// Length of history used to compute the current rate
    pub rate_window: Duration,
    /// Width of one bucket of rate history, must evenly divide `rate_window`
    pub rate_resolution: Duration,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            chunk_size: 128 * 1024,
            rate_window: Duration::from_secs(10),
            rate_resolution: Duration::from_millis(100),
        }
    }
}

impl TransferConfig {
    /// Validate configuration and return errors if invalid
    pub fn validate(&self) -> Result<(), String> {
        if self.chunk_size == 0 {
            return Err("chunk_size must be greater than zero".to_string());
        }
        if usize::try_from(self.chunk_size).is_err() {
            return Err(format!("chunk_size {} is too large", self.chunk_size));
        }
        counter::bucket_count(self.rate_window, self.rate_resolution)
            .map(|_| ())
            .map_err(|err| format!("invalid rate window: {err}"))
    }
}

/// Output and logging configuration
#[derive(Debug, Clone, Copy, Default)]
pub struct OutputConfig {
    /// Suppress error output
    pub quiet: bool,
    /// Verbosity level: 0=ERROR, 1=INFO, 2=DEBUG, 3=TRACE
    pub verbose: u8,
    /// Print summary statistics at the end
    pub print_summary: bool,
}

impl OutputConfig {
    pub(crate) fn log_level(&self) -> &'static str {
        if self.quiet && self.verbose == 0 {
            return "off";
        }
        match self.verbose {
            0 => "error",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    }
}
