//! sync command - Mirror a bucket (or a prefix of it) to another bucket
//!
//! Runs the full job: connection test, enumeration (or resume from the state
//! snapshot), batch transfers with retries and an optional checksum pass.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use ms_core::stats::format_duration;
use ms_core::{
    Error, ProgressCallback, StateStore, SyncJob, SyncProgress, SyncSettings, SyncStats,
};
use serde::Serialize;

use super::{ConnectionArgs, connect, fail, shutdown_token};
use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig};

/// Mirror objects from the source bucket to the destination bucket
#[derive(Args, Debug)]
pub struct SyncArgs {
    #[command(flatten)]
    pub connection: ConnectionArgs,

    /// Only sync keys starting with this prefix
    #[arg(short = 'p', long)]
    pub prefix: Option<String>,

    /// Show what would be synced without transferring anything
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Transfer even when entity tags match
    #[arg(long)]
    pub force: bool,

    /// Continue from the saved state of an interrupted run
    #[arg(long)]
    pub resume: bool,

    /// Compare SHA-256 digests after each transfer
    #[arg(long)]
    pub verify_checksum: bool,

    /// Only sync keys matching these glob patterns
    #[arg(long, num_args = 1..)]
    pub include: Vec<String>,

    /// Skip keys matching these glob patterns
    #[arg(long, num_args = 1..)]
    pub exclude: Vec<String>,

    /// Objects transferred concurrently per batch
    #[arg(long)]
    pub max_concurrency: Option<usize>,

    /// Attempts per object before giving up
    #[arg(long)]
    pub max_retries: Option<u32>,

    /// State snapshot location
    #[arg(long)]
    pub state_file: Option<PathBuf>,

    /// Start without probing both buckets first
    #[arg(long)]
    pub skip_connection_test: bool,
}

impl SyncArgs {
    /// Layer command-line options over the `[sync]` section
    fn apply(&self, settings: &mut SyncSettings) {
        if let Some(prefix) = &self.prefix {
            settings.prefix = prefix.clone();
        }
        if !self.include.is_empty() {
            settings.include = self.include.clone();
        }
        if !self.exclude.is_empty() {
            settings.exclude = self.exclude.clone();
        }
        if let Some(n) = self.max_concurrency {
            settings.max_concurrency = n;
        }
        if let Some(n) = self.max_retries {
            settings.max_retries = n;
        }
        if let Some(path) = &self.state_file {
            settings.state_file = path.clone();
        }
        settings.dry_run |= self.dry_run;
        settings.force |= self.force;
        settings.verify_checksum |= self.verify_checksum;
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SyncSummary {
    source: String,
    destination: String,
    dry_run: bool,
    #[serde(flatten)]
    stats: SyncStats,
}

impl fmt::Display for SyncSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.dry_run {
            writeln!(f, "[DRY RUN] nothing was transferred")?;
        }
        writeln!(f, "{} -> {}", self.source, self.destination)?;
        write!(f, "{}", self.stats.report())
    }
}

/// Execute the sync command
pub async fn execute(args: SyncArgs, output_config: OutputConfig, log_file: &Path) -> ExitCode {
    let formatter = Formatter::new(output_config);

    let mut config = match args.connection.load_config() {
        Ok(c) => c,
        Err(e) => return fail(&formatter, "Invalid configuration", &e),
    };
    args.apply(&mut config.sync);
    if let Err(e) = config.validate() {
        return fail(&formatter, "Invalid configuration", &e);
    }

    let options = ms_core::SyncOptions {
        resume: args.resume,
        ..config.sync.to_options()
    };
    let source = config.source.bucket.clone();
    let destination = config.destination.bucket.clone();

    let syncer = match connect(&config).await {
        Ok(s) => s,
        Err(e) => return fail(&formatter, "Failed to create client", &e),
    };
    let syncer = syncer
        .with_state_store(StateStore::new(&config.sync.state_file))
        .with_cancellation(shutdown_token());

    if !args.skip_connection_test && !syncer.test_connections(&source, &destination).await {
        formatter.error("Connection test failed. Check your credentials and bucket names.");
        return ExitCode::NetworkError;
    }

    let progress = formatter.progress_enabled().then(progress_bar);
    let syncer = match &progress {
        Some(pb) => syncer.with_progress(progress_callback(pb.clone())),
        None => syncer,
    };

    let job = SyncJob::new(&source, &destination)
        .with_prefix(&config.sync.prefix)
        .with_options(options);

    let result = syncer.sync_all(&job).await;
    if let Some(pb) = progress {
        pb.finish_and_clear();
    }

    match result {
        Ok(stats) => {
            let failed = stats.failed_files;
            formatter.output(&SyncSummary {
                source,
                destination,
                dry_run: job.options.dry_run,
                stats,
            });
            if failed > 0 {
                formatter.error(&format!(
                    "Sync completed with {failed} failures. Check {} for details.",
                    log_file.display()
                ));
                ExitCode::GeneralError
            } else {
                formatter.success("Sync completed");
                ExitCode::Success
            }
        }
        Err(Error::Interrupted) => {
            formatter.warning("Sync interrupted; progress saved. Run again with --resume to continue.");
            ExitCode::Interrupted
        }
        Err(e) => fail(&formatter, "Sync failed", &e),
    }
}

fn progress_bar() -> ProgressBar {
    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .expect("Valid template")
            .progress_chars("#>-"),
    );
    pb.set_message("Listing objects...");
    pb
}

fn progress_callback(pb: ProgressBar) -> ProgressCallback {
    Arc::new(move |p: &SyncProgress| {
        pb.set_length(p.total);
        pb.set_position(p.processed);
        pb.set_message(progress_message(p));
    })
}

fn progress_message(p: &SyncProgress) -> String {
    let eta = p.eta.map(format_duration).unwrap_or_else(|| "unknown".into());
    format!(
        "batch {}/{} | {} synced, {} skipped, {} failed | ETA {eta}",
        p.batch, p.batches, p.stats.synced_files, p.stats.skipped_files, p.stats.failed_files
    )
}
