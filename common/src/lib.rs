//! Common utilities and types for cpipe tools
//!
//! This crate holds the pieces shared by the `cpipe` sub-commands: endpoint resolution, the
//! metered stream copy, per-transfer progress tracking and the local `ls`/`rm`/`stat`
//! operations, plus [`run`], which sets up logging and the tokio runtime and drives progress
//! output around an operation.
//!
//! # Progress
//!
//! Every transfer owns a [`progress::Progress`] backed by a sliding-window
//! [`counter::Counter`]. The copy loop records each successful write and a background thread
//! renders the current rate (from the window), the average rate and the running total.
//! Progress is drawn to stderr either as an animated spinner or as periodic text blocks, so
//! stdout stays usable as a copy destination.

use std::io::IsTerminal;
use std::sync::Arc;
use std::time::Duration;

use tracing::instrument;

pub mod config;
pub mod copy;
pub mod endpoint;
pub mod ls;
pub mod progress;
pub mod rm;
pub mod stat;

#[cfg(test)]
mod testutils;

pub use config::{OutputConfig, RuntimeConfig, TransferConfig};
pub use endpoint::{parse_labels, parse_uri, Endpoint};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum ProgressType {
    /// Progress bar when stderr is a terminal, text updates otherwise
    #[default]
    #[value(alias = "Auto")]
    Auto,
    /// Animated single-line spinner
    #[value(alias = "ProgressBar")]
    ProgressBar,
    /// Periodic multi-line text blocks, suited for log files
    #[value(alias = "TextUpdates")]
    TextUpdates,
}

#[derive(Debug)]
pub struct ProgressSettings {
    pub progress_type: ProgressType,
    pub progress_delay: Option<String>,
    pub progress: Arc<progress::Progress>,
}

impl ProgressSettings {
    fn resolve_type(&self) -> ProgressType {
        match self.progress_type {
            ProgressType::Auto => {
                if std::io::stderr().is_terminal() {
                    ProgressType::ProgressBar
                } else {
                    ProgressType::TextUpdates
                }
            }
            other => other,
        }
    }
}

fn parse_delay(delay: Option<&str>, progress_type: ProgressType) -> anyhow::Result<Duration> {
    match delay {
        Some(delay) => humantime::parse_duration(delay)
            .map_err(|err| anyhow::anyhow!("invalid progress delay {:?}: {}", delay, err)),
        None if progress_type == ProgressType::ProgressBar => Ok(Duration::from_millis(200)),
        None => Ok(Duration::from_secs(10)),
    }
}

struct ProgressThread {
    stop: std::sync::mpsc::Sender<()>,
    handle: std::thread::JoinHandle<()>,
}

impl ProgressThread {
    fn start(settings: ProgressSettings) -> anyhow::Result<Self> {
        let progress_type = settings.resolve_type();
        let delay = parse_delay(settings.progress_delay.as_deref(), progress_type)?;
        let progress = settings.progress;
        let (stop, stopped) = std::sync::mpsc::channel::<()>();
        let handle = std::thread::spawn(move || {
            let printer = progress::ProgressPrinter::new(&*progress);
            match progress_type {
                ProgressType::ProgressBar => {
                    let bar = indicatif::ProgressBar::new_spinner();
                    while let Err(std::sync::mpsc::RecvTimeoutError::Timeout) =
                        stopped.recv_timeout(delay)
                    {
                        bar.set_message(printer.status_line());
                        bar.tick();
                    }
                    bar.finish_with_message(printer.status_line());
                }
                _ => {
                    while let Err(std::sync::mpsc::RecvTimeoutError::Timeout) =
                        stopped.recv_timeout(delay)
                    {
                        eprintln!("{}", printer.print());
                    }
                }
            }
        });
        Ok(Self { stop, handle })
    }

    fn finish(self) {
        // the receiver may already be gone if the printer thread panicked
        let _ = self.stop.send(());
        if self.handle.join().is_err() {
            tracing::error!("progress printer thread panicked");
        }
    }
}

fn init_tracing(output: &OutputConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(output.log_level()));
    // a subscriber may already be installed when running from tests
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn build_runtime(runtime: &RuntimeConfig) -> std::io::Result<tokio::runtime::Runtime> {
    let mut builder = tokio::runtime::Builder::new_multi_thread();
    builder.enable_all();
    if runtime.max_workers > 0 {
        builder.worker_threads(runtime.max_workers);
    }
    if runtime.max_blocking_threads > 0 {
        builder.max_blocking_threads(runtime.max_blocking_threads);
    }
    builder.build()
}

/// Runs `func` on a fresh tokio runtime with logging and optional progress output.
///
/// Returns `None` if anything failed; the error has already been logged unless quiet mode is
/// on. The summary is printed to stderr when requested.
#[instrument(skip(func))]
pub fn run<Fut, Summary>(
    progress: Option<ProgressSettings>,
    output: OutputConfig,
    runtime: RuntimeConfig,
    func: impl FnOnce() -> Fut,
) -> Option<Summary>
where
    Summary: std::fmt::Display,
    Fut: std::future::Future<Output = anyhow::Result<Summary>>,
{
    init_tracing(&output);
    let runtime = match build_runtime(&runtime) {
        Ok(runtime) => runtime,
        Err(error) => {
            tracing::error!("failed to start tokio runtime: {:#}", error);
            return None;
        }
    };
    let printer = match progress.map(ProgressThread::start).transpose() {
        Ok(printer) => printer,
        Err(error) => {
            tracing::error!("{:#}", error);
            return None;
        }
    };
    let res = runtime.block_on(func());
    if let Some(printer) = printer {
        printer.finish();
    }
    match res {
        Ok(summary) => {
            if output.print_summary {
                eprintln!("{summary}");
            }
            Some(summary)
        }
        Err(error) => {
            tracing::error!("{:#}", error);
            None
        }
    }
}
