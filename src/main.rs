//! Threadwatch main entry point
//!
//! This is the command-line interface for the Threadwatch imageboard poller.

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use threadwatch::config::{compute_config_hash, load_config, validate, Config};
use threadwatch::filter::FilterSet;
use threadwatch::output::{
    create_archive, resolve_output_path, ArchiveFormat, ConsoleOutput, Output, OutputMode,
    RunStatus, Sink,
};
use threadwatch::poller::{check_connections, HttpTransport, PollOptions, Poller};
use threadwatch::target::{resolve_targets, TargetRegistry};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Threadwatch: an imageboard thread poller
///
/// Threadwatch follows boards and threads on an imageboard, downloading the
/// files posted to them or archiving their posts. Without an output mode it
/// only checks that every target can be reached.
#[derive(Parser, Debug)]
#[command(name = "threadwatch")]
#[command(version)]
#[command(about = "Follows imageboard threads and archives or downloads them", long_about = None)]
struct Cli {
    /// Boards or threads to follow, e.g. `g` or `/g/123456`
    #[arg(value_name = "TARGETS", required = true)]
    targets: Vec<String>,

    /// Imageboard the targets live on [default: 4chan]
    #[arg(short, long)]
    imageboard: Option<String>,

    /// Download directory or archive path [default: .]
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// What to do with posts: `fd` downloads files, `ar` archives posts
    #[arg(short, long)]
    mode: Option<OutputMode>,

    /// Archive format: `plaintext` or `sqlite` [default: plaintext]
    #[arg(long)]
    output_format: Option<ArchiveFormat>,

    /// Skip posts matching `field:regex` or a bare regex on the comment
    #[arg(short, long = "filter", value_name = "PATTERN")]
    filters: Vec<String>,

    /// Connect over HTTPS
    #[arg(long)]
    ssl: bool,

    /// Limit the number of concurrent connections
    #[arg(long)]
    cap_connections: bool,

    /// Keep polling until interrupted
    #[arg(short, long)]
    continuous: bool,

    /// Seconds between iterations in continuous mode [default: 30]
    #[arg(long, value_name = "SECS")]
    refresh_interval: Option<u64>,

    /// Show debug output
    #[arg(short, long)]
    debug: bool,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "debug")]
    quiet: bool,

    /// Path to a TOML configuration file
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,
}

impl Cli {
    /// Applies command-line flags on top of the file configuration
    fn merge_into(&self, mut config: Config) -> Config {
        if let Some(imageboard) = &self.imageboard {
            config.poller.imageboard = imageboard.clone();
        }
        config.poller.ssl |= self.ssl;
        config.poller.cap_connections |= self.cap_connections;
        config.poller.continuous |= self.continuous;
        if let Some(interval) = self.refresh_interval {
            config.poller.refresh_interval = interval;
        }

        if let Some(output) = &self.output {
            config.output.path = output.clone();
        }
        if self.mode.is_some() {
            config.output.mode = self.mode;
        }
        if let Some(format) = self.output_format {
            config.output.format = format;
        }
        config.filters.patterns.extend(self.filters.iter().cloned());
        config
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    setup_logging(cli.debug, cli.quiet);

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// Sets up the logging/tracing subscriber
fn setup_logging(debug: bool, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else if debug {
        EnvFilter::new("threadwatch=debug,info")
    } else {
        EnvFilter::new("threadwatch=info,warn")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Runs the pre-flight checks, then polls
///
/// Pre-flight failures are reported and turned into a failing exit code
/// before any network activity.
async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let output = ConsoleOutput;

    let file_config = match &cli.config {
        Some(path) => {
            tracing::debug!("Loading configuration from: {}", path.display());
            load_config(path)
                .with_context(|| format!("Failed to load configuration from {}", path.display()))?
        }
        None => Config::default(),
    };
    let config = cli.merge_into(file_config);
    validate(&config)?;
    let imageboard = config.poller.imageboard.as_str();

    let (targets, failed) = resolve_targets(&cli.targets, imageboard);
    for pattern in &failed {
        output.write_error(&format!("Invalid target \"{}\"", pattern));
    }
    if targets.is_empty() {
        output.write_error("No valid targets provided.");
        return Ok(ExitCode::FAILURE);
    }
    let registry = TargetRegistry::from(targets);

    let path = match config.output.mode {
        Some(mode) => match resolve_output_path(&config.output.path, mode, config.output.format) {
            Some(path) => Some((mode, path)),
            None => {
                output.write_error("The given output path cannot be written to.");
                return Ok(ExitCode::FAILURE);
            }
        },
        None => None,
    };

    let (filters, failed) = FilterSet::compile(&config.filters.patterns, imageboard);
    for pattern in &failed {
        output.write_error(&format!("Invalid filter pattern \"{}\"", pattern));
    }

    let sink = match &path {
        Some((mode, path)) => Some(
            create_archive(*mode, config.output.format, path)
                .with_context(|| format!("Could not create {}", path.display()))?,
        ),
        None => None,
    };

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            return;
        }
        tracing::info!("Interrupted, stopping... (press Ctrl-C again to quit now)");
        on_interrupt.cancel();

        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted again, exiting");
            std::process::exit(130);
        }
    });

    let transport = HttpTransport::new(config.poller.ssl)?;
    let options = PollOptions::from_config(&config);

    let Some(mut sink) = sink else {
        let reachable = check_connections(
            &transport,
            &output,
            &registry,
            options.max_connections,
            &cancel,
        )
        .await;
        tracing::debug!("{} of {} targets reachable", reachable, registry.len());
        return Ok(ExitCode::SUCCESS);
    };

    let run_id = match &mut sink {
        Sink::Sqlite(archive) => Some(archive.start_run(&compute_config_hash(&config)?)?),
        _ => None,
    };

    tracing::debug!(
        "Polling {} targets on {} ({} filters)",
        registry.len(),
        imageboard,
        filters.len()
    );
    let mut poller = Poller::new(transport, output, imageboard, registry, sink)?
        .with_filters(filters)
        .with_options(options);
    let summary = poller.run(cancel).await;
    tracing::debug!("{:?}", summary);

    if let (Sink::Sqlite(mut archive), Some(run_id)) = (poller.into_sink(), run_id) {
        let status = if summary.cancelled {
            RunStatus::Interrupted
        } else {
            RunStatus::Completed
        };
        archive.finish_run(run_id, status)?;
    }

    Ok(ExitCode::SUCCESS)
}
