//! Subcommands
//!
//! Commands that talk to storage share [`ConnectionArgs`]: bucket names,
//! endpoints and credentials come from flags, then `SRC_AWS_*` /
//! `DEST_AWS_*` environment variables, then the `--config` file.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Args, Subcommand};
use ms_core::{Config, EndpointConfig, Syncer};
use ms_s3::S3Client;
use tokio_util::sync::CancellationToken;

use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig};

pub mod check;
pub mod cleanup;
pub mod init;
pub mod logs;
pub mod status;
pub mod sync;
pub mod sync_object;
pub mod verify;

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Mirror every object under a prefix from source to destination
    Sync(sync::SyncArgs),

    /// Sync a single object
    SyncObject(sync_object::SyncObjectArgs),

    /// Check that both buckets are reachable with the given credentials
    Test(check::TestArgs),

    /// Compare content checksums of source and destination objects
    Verify(verify::VerifyArgs),

    /// Show the saved state of an unfinished sync
    Status(status::StatusArgs),

    /// Remove the state snapshot (and optionally the log file)
    Cleanup(cleanup::CleanupArgs),

    /// Write a configuration file template
    Init(init::InitArgs),

    /// Show recent log lines
    Logs(logs::LogsArgs),
}

impl Commands {
    /// Whether the command talks to storage and should append to the log file
    pub fn writes_log(&self) -> bool {
        matches!(
            self,
            Commands::Sync(_) | Commands::SyncObject(_) | Commands::Test(_) | Commands::Verify(_)
        )
    }

    /// Configuration file named on the command line, if any
    pub fn config_path(&self) -> Option<&Path> {
        let connection = match self {
            Commands::Sync(args) => &args.connection,
            Commands::SyncObject(args) => &args.connection,
            Commands::Test(args) => &args.connection,
            Commands::Verify(args) => &args.connection,
            _ => return None,
        };
        connection.config.as_deref()
    }
}

/// Execute a command
pub async fn execute(command: Commands, output_config: OutputConfig, log_file: &Path) -> ExitCode {
    match command {
        Commands::Sync(args) => sync::execute(args, output_config, log_file).await,
        Commands::SyncObject(args) => sync_object::execute(args, output_config).await,
        Commands::Test(args) => check::execute(args, output_config).await,
        Commands::Verify(args) => verify::execute(args, output_config).await,
        Commands::Status(args) => status::execute(args, output_config),
        Commands::Cleanup(args) => cleanup::execute(args, output_config, log_file),
        Commands::Init(args) => init::execute(args, output_config),
        Commands::Logs(args) => logs::execute(args, output_config, log_file).await,
    }
}

/// Buckets, endpoints and credentials for both sides
#[derive(Args, Debug, Default, Clone)]
pub struct ConnectionArgs {
    /// Source bucket
    #[arg(short = 's', long = "source")]
    pub source_bucket: Option<String>,

    /// Destination bucket
    #[arg(short = 'd', long = "dest")]
    pub dest_bucket: Option<String>,

    /// TOML configuration file; flags override its values
    #[arg(short = 'c', long, env = "MSYNC_CONFIG")]
    pub config: Option<PathBuf>,

    /// Source endpoint URL
    #[arg(long, env = "SRC_AWS_ENDPOINT")]
    pub source_endpoint: Option<String>,

    #[arg(long, env = "SRC_AWS_REGION")]
    pub source_region: Option<String>,

    #[arg(long, env = "SRC_AWS_ACCESS_KEY_ID", hide_env_values = true)]
    pub source_access_key: Option<String>,

    #[arg(long, env = "SRC_AWS_SECRET_ACCESS_KEY", hide_env_values = true)]
    pub source_secret_key: Option<String>,

    /// Use path-style addressing for the source
    #[arg(long)]
    pub source_path_style: bool,

    /// Destination endpoint URL
    #[arg(long, env = "DEST_AWS_ENDPOINT")]
    pub dest_endpoint: Option<String>,

    #[arg(long, env = "DEST_AWS_REGION")]
    pub dest_region: Option<String>,

    #[arg(long, env = "DEST_AWS_ACCESS_KEY_ID", hide_env_values = true)]
    pub dest_access_key: Option<String>,

    #[arg(long, env = "DEST_AWS_SECRET_ACCESS_KEY", hide_env_values = true)]
    pub dest_secret_key: Option<String>,

    /// Use path-style addressing for the destination
    #[arg(long)]
    pub dest_path_style: bool,
}

impl ConnectionArgs {
    /// Configuration file (or defaults) with command-line values layered on top
    ///
    /// The result is not validated; callers apply their own overrides first.
    pub fn load_config(&self) -> ms_core::Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::load(path)?,
            None => Config::default(),
        };

        overlay(
            &mut config.source,
            &self.source_bucket,
            &self.source_endpoint,
            &self.source_region,
            &self.source_access_key,
            &self.source_secret_key,
            self.source_path_style,
        );
        overlay(
            &mut config.destination,
            &self.dest_bucket,
            &self.dest_endpoint,
            &self.dest_region,
            &self.dest_access_key,
            &self.dest_secret_key,
            self.dest_path_style,
        );
        Ok(config)
    }
}

fn overlay(
    target: &mut EndpointConfig,
    bucket: &Option<String>,
    endpoint: &Option<String>,
    region: &Option<String>,
    access_key: &Option<String>,
    secret_key: &Option<String>,
    path_style: bool,
) {
    for (slot, value) in [
        (&mut target.bucket, bucket),
        (&mut target.endpoint, endpoint),
        (&mut target.region, region),
        (&mut target.access_key, access_key),
        (&mut target.secret_key, secret_key),
    ] {
        if let Some(value) = value {
            *slot = value.clone();
        }
    }
    target.force_path_style |= path_style;
}

/// Build a syncer over S3 clients for both sides of a validated config
pub async fn connect(config: &Config) -> ms_core::Result<Syncer> {
    let source = S3Client::new(&config.source).await?;
    let dest = S3Client::new(&config.destination).await?;
    Ok(Syncer::new(Arc::new(source), Arc::new(dest)))
}

/// Token cancelled on the first Ctrl-C
pub fn shutdown_token() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nReceived Ctrl-C. Finishing the current batch...");
            trigger.cancel();
        }
    });
    token
}

/// Report an engine error and pick the matching exit code
pub fn fail(formatter: &Formatter, context: &str, error: &ms_core::Error) -> ExitCode {
    formatter.error(&format!("{context}: {error}"));
    ExitCode::from_error(error)
}
