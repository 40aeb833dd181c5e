//! sync-object command - Sync one object by key

use std::fmt;

use clap::Args;
use ms_core::stats::format_bytes;
use ms_core::{SyncOptions, SyncOutcome};
use serde::Serialize;

use super::{ConnectionArgs, connect, fail};
use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig};

/// Sync a single object
#[derive(Args, Debug)]
pub struct SyncObjectArgs {
    #[command(flatten)]
    pub connection: ConnectionArgs,

    /// Object key to sync
    #[arg(short = 'k', long)]
    pub key: String,

    /// Show what would be synced without transferring anything
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Transfer even when entity tags match
    #[arg(long)]
    pub force: bool,

    /// Compare SHA-256 digests after the transfer
    #[arg(long)]
    pub verify_checksum: bool,
}

#[derive(Debug, Serialize)]
struct ObjectOutput {
    key: String,
    size: u64,
    #[serde(flatten)]
    outcome: SyncOutcome,
}

impl fmt::Display for ObjectOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.outcome {
            SyncOutcome::Synced { bytes } => {
                write!(f, "Synced: {} ({})", self.key, format_bytes(*bytes))
            }
            SyncOutcome::Skipped => write!(f, "Skipped: {} (unchanged)", self.key),
            SyncOutcome::DryRun => write!(f, "[DRY RUN] Would sync: {}", self.key),
            SyncOutcome::Failed { error } => write!(f, "Failed to sync: {} - {error}", self.key),
        }
    }
}

/// Execute the sync-object command
pub async fn execute(args: SyncObjectArgs, output_config: OutputConfig) -> ExitCode {
    let formatter = Formatter::new(output_config);

    let config = match args.connection.load_config() {
        Ok(c) => c,
        Err(e) => return fail(&formatter, "Invalid configuration", &e),
    };
    if let Err(e) = config.validate() {
        return fail(&formatter, "Invalid configuration", &e);
    }

    let syncer = match connect(&config).await {
        Ok(s) => s,
        Err(e) => return fail(&formatter, "Failed to create client", &e),
    };

    let source = &config.source.bucket;
    let destination = &config.destination.bucket;
    if !syncer.test_connections(source, destination).await {
        formatter.error("Connection test failed. Check your credentials and bucket names.");
        return ExitCode::NetworkError;
    }

    let record = match syncer.head_source(source, &args.key).await {
        Ok(r) => r,
        Err(e) if e.is_not_found() => {
            formatter.error(&format!("Source object not found: {}", args.key));
            return ExitCode::NotFound;
        }
        Err(e) => return fail(&formatter, "Failed to read source object", &e),
    };

    let options = SyncOptions {
        dry_run: args.dry_run,
        force: args.force,
        verify_checksum: args.verify_checksum,
        ..config.sync.to_options()
    };
    let outcome = syncer
        .sync_object(&record, source, destination, &options)
        .await;

    let output = ObjectOutput {
        key: record.key,
        size: record.size,
        outcome,
    };
    if output.outcome.is_success() {
        formatter.output(&output);
        ExitCode::Success
    } else if formatter.is_json() {
        formatter.json(&output);
        ExitCode::GeneralError
    } else {
        formatter.error(&output.to_string());
        ExitCode::GeneralError
    }
}
