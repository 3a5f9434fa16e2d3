use std::sync::Arc;

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use tracing::instrument;

#[derive(Parser, Debug, Clone)]
#[command(
    name = "cpipe",
    version,
    about = "Copy byte streams between files, pipes and object storage while reporting throughput",
    long_about = "`cpipe` copies a single byte stream from a source to a destination and reports the transfer rate while it runs.

Endpoints are given as URIs:
    -                       standard input (source) or standard output (destination)
    /path, file:///path     local file
    gcs://bucket/object     Google Cloud Storage object
    b2://bucket/object      Backblaze B2 object

EXAMPLES:
    # Copy a file with a live progress bar
    cpipe cp /data/image.raw /backup/image.raw --progress

    # Stream from a pipe into a file, printing throughput every 5 seconds
    tar c /srv | cpipe cp - /backup/srv.tar --progress-type text-updates --progress-delay 5s

    # Inspect a local file
    cpipe stat /backup/srv.tar"
)]
struct Args {
    #[command(subcommand)]
    command: Command,

    // Progress & output
    /// Verbose level: -v INFO / -vv DEBUG / -vvv TRACE (default: ERROR)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count, global = true, help_heading = "Progress & output")]
    verbose: u8,

    /// Quiet mode, don't report errors
    #[arg(short = 'q', long = "quiet", global = true, help_heading = "Progress & output")]
    quiet: bool,

    // Advanced settings
    /// Number of worker threads (0 = number of CPU cores)
    #[arg(
        long,
        default_value = "0",
        value_name = "N",
        global = true,
        help_heading = "Advanced settings"
    )]
    max_workers: usize,

    /// Number of blocking worker threads (0 = Tokio default of 512)
    #[arg(
        long,
        default_value = "0",
        value_name = "N",
        global = true,
        help_heading = "Advanced settings"
    )]
    max_blocking_threads: usize,
}

#[derive(Subcommand, Debug, Clone)]
enum Command {
    /// Copy a stream from a source to a destination
    Cp(CpArgs),
    /// List a directory
    Ls(LsArgs),
    /// Remove a file or directory
    Rm(RmArgs),
    /// Print information about a file
    Stat(StatArgs),
}

#[derive(clap::Args, Debug, Clone)]
struct CpArgs {
    // Copy options
    /// Comma-separated key=value pairs attached to object storage uploads
    #[arg(long, value_name = "LABELS", help_heading = "Copy options")]
    labels: Option<String>,

    /// Size of each read from the source; writes never exceed it
    ///
    /// Accepts byte sizes like "64KiB", "1MiB", or plain numbers in bytes.
    #[arg(
        long,
        default_value = "128KiB",
        value_name = "SIZE",
        help_heading = "Copy options"
    )]
    chunk_size: bytesize::ByteSize,

    // Progress & output
    /// Show progress
    #[arg(long, help_heading = "Progress & output")]
    progress: bool,

    /// Set the type of progress display
    ///
    /// If specified, --progress flag is implied.
    #[arg(long, value_name = "TYPE", help_heading = "Progress & output")]
    progress_type: Option<common::ProgressType>,

    /// Set delay between progress updates
    ///
    /// Default is 200ms for interactive mode (`ProgressBar`) and 10s for non-interactive mode (`TextUpdates`). If specified, --progress flag is implied. Accepts human-readable durations like "200ms", "10s", "5min".
    #[arg(long, value_name = "DELAY", help_heading = "Progress & output")]
    progress_delay: Option<String>,

    /// Print summary at the end
    #[arg(long, help_heading = "Progress & output")]
    summary: bool,

    // Throughput measurement
    /// How much recent history the current transfer rate is computed over
    #[arg(
        long,
        default_value = "10s",
        value_name = "DURATION",
        help_heading = "Throughput measurement"
    )]
    rate_window: humantime::Duration,

    /// Granularity of the rate history; must evenly divide --rate-window
    #[arg(
        long,
        default_value = "100ms",
        value_name = "DURATION",
        help_heading = "Throughput measurement"
    )]
    rate_resolution: humantime::Duration,

    // ARGUMENTS
    /// Source URI
    src: String,

    /// Destination URI
    dst: String,
}

#[derive(clap::Args, Debug, Clone)]
struct LsArgs {
    /// Print summary at the end
    #[arg(long, help_heading = "Progress & output")]
    summary: bool,

    /// Path to list
    path: String,
}

#[derive(clap::Args, Debug, Clone)]
struct RmArgs {
    /// Remove directories and their contents
    #[arg(short, long)]
    recursive: bool,

    /// Print summary at the end
    #[arg(long, help_heading = "Progress & output")]
    summary: bool,

    /// Path to remove
    path: String,
}

#[derive(clap::Args, Debug, Clone)]
struct StatArgs {
    /// Path to inspect
    path: String,
}

fn transfer_config(args: &CpArgs) -> common::TransferConfig {
    common::TransferConfig {
        chunk_size: args.chunk_size.as_u64(),
        rate_window: args.rate_window.into(),
        rate_resolution: args.rate_resolution.into(),
    }
}

fn parse_endpoint(uri: &str) -> Result<common::Endpoint> {
    common::parse_uri(uri).map_err(|err| anyhow!("{}: {}", uri, err))
}

#[instrument(skip(progress))]
async fn async_cp(
    args: CpArgs,
    progress: Option<Arc<common::progress::Progress>>,
) -> Result<common::copy::Summary> {
    let transfer = transfer_config(&args);
    transfer.validate().map_err(|err| anyhow!(err))?;
    let src = parse_endpoint(&args.src)?;
    let dst = parse_endpoint(&args.dst)?;
    if let Some(labels) = &args.labels {
        let labels = common::parse_labels(labels);
        if !labels.is_empty() && src.is_local() && dst.is_local() {
            tracing::warn!("labels apply to object storage only, ignoring: {:?}", labels);
        }
    }
    let progress = match progress {
        Some(progress) => progress,
        None => Arc::new(common::progress::Progress::new(
            transfer.rate_window,
            transfer.rate_resolution,
        )?),
    };
    let settings = common::copy::Settings {
        chunk_size: usize::try_from(transfer.chunk_size)?,
    };
    match common::copy::copy(&*progress, &src, &dst, &settings).await {
        Ok(summary) => Ok(summary),
        Err(error) => {
            if args.summary {
                return Err(anyhow!("{}\n\n{}", error, &error.summary));
            }
            Err(anyhow!("{}", error))
        }
    }
}

fn cp(args: CpArgs, output: common::OutputConfig, runtime: common::RuntimeConfig) -> bool {
    let transfer = transfer_config(&args);
    // an invalid window is reported by async_cp once logging is up
    let progress = common::progress::Progress::new(transfer.rate_window, transfer.rate_resolution)
        .ok()
        .map(Arc::new);
    let show_progress =
        args.progress || args.progress_type.is_some() || args.progress_delay.is_some();
    let progress_settings = progress
        .as_ref()
        .filter(|_| show_progress)
        .map(|progress| common::ProgressSettings {
            progress_type: args.progress_type.unwrap_or_default(),
            progress_delay: args.progress_delay.clone(),
            progress: Arc::clone(progress),
        });
    let output = common::OutputConfig {
        print_summary: args.summary,
        ..output
    };
    let func = move || async_cp(args, progress);
    common::run(progress_settings, output, runtime, func).is_some()
}

fn ls(args: LsArgs, output: common::OutputConfig, runtime: common::RuntimeConfig) -> bool {
    let output = common::OutputConfig {
        print_summary: args.summary,
        ..output
    };
    let func = move || async move {
        let endpoint = parse_endpoint(&args.path)?;
        let names = common::ls::ls(&endpoint).await?;
        for name in &names {
            println!("{name}");
        }
        Ok::<_, anyhow::Error>(common::ls::Summary {
            entries: names.len(),
        })
    };
    common::run(None, output, runtime, func).is_some()
}

fn rm(args: RmArgs, output: common::OutputConfig, runtime: common::RuntimeConfig) -> bool {
    let settings = common::rm::Settings {
        recursive: args.recursive,
    };
    let output = common::OutputConfig {
        print_summary: args.summary,
        ..output
    };
    let func = move || async move {
        let endpoint = parse_endpoint(&args.path)?;
        Ok::<_, anyhow::Error>(common::rm::rm(&endpoint, &settings).await?)
    };
    common::run(None, output, runtime, func).is_some()
}

fn stat(args: StatArgs, output: common::OutputConfig, runtime: common::RuntimeConfig) -> bool {
    let func = move || async move {
        let endpoint = parse_endpoint(&args.path)?;
        let info = common::stat::stat(&endpoint).await?;
        print!("{info}");
        Ok::<_, anyhow::Error>(info)
    };
    common::run(None, output, runtime, func).is_some()
}

fn main() -> Result<()> {
    let args = Args::parse();
    let output = common::OutputConfig {
        quiet: args.quiet,
        verbose: args.verbose,
        print_summary: false,
    };
    let runtime = common::RuntimeConfig {
        max_workers: args.max_workers,
        max_blocking_threads: args.max_blocking_threads,
    };
    let success = match args.command {
        Command::Cp(cp_args) => cp(cp_args, output, runtime),
        Command::Ls(ls_args) => ls(ls_args, output, runtime),
        Command::Rm(rm_args) => rm(rm_args, output, runtime),
        Command::Stat(stat_args) => stat(stat_args, output, runtime),
    };
    if !success {
        std::process::exit(1);
    }
    Ok(())
}
