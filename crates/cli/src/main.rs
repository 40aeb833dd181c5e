//! msync - resumable bucket-to-bucket sync for S3-compatible storage
//!
//! Thin front-end over the `ms-core` engine: argument parsing, logging
//! setup, Ctrl-C handling and console output.

mod commands;
mod exit_code;
mod logging;
mod output;

use std::path::PathBuf;

use clap::Parser;
use ms_core::{Config, LoggingConfig};

use crate::commands::Commands;
use crate::exit_code::ExitCode;
use crate::logging::LogSettings;
use crate::output::{Formatter, OutputConfig};

#[derive(Parser, Debug)]
#[command(name = "msync", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output JSON instead of human-readable text
    #[arg(long, global = true)]
    json: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    /// Only print errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Also print log events on the console
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log level (debug, info, warn, error) [default: info]
    #[arg(long, global = true, env = "MSYNC_LOG_LEVEL")]
    log_level: Option<String>,

    /// Log file [default: .msync.log]
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,
}

impl Cli {
    /// Flags win over the `[logging]` section of `--config`
    fn logging(&self) -> LoggingConfig {
        let from_file = self
            .command
            .config_path()
            .and_then(|path| Config::load(path).ok())
            .map(|config| config.logging)
            .unwrap_or_default();

        LoggingConfig {
            level: self.log_level.clone().unwrap_or(from_file.level),
            file: self.log_file.clone().unwrap_or(from_file.file),
        }
    }
}

#[tokio::main]
async fn main() -> std::process::ExitCode {
    let cli = Cli::parse();
    let output_config = OutputConfig {
        json: cli.json,
        no_color: cli.no_color,
        quiet: cli.quiet,
    };

    let logging = cli.logging();
    let settings = LogSettings {
        level: &logging.level,
        file: cli.command.writes_log().then_some(logging.file.as_path()),
        verbose: cli.verbose,
    };
    if let Err(e) = logging::init(&settings) {
        Formatter::new(output_config).error(&format!("{e:#}"));
        return ExitCode::UsageError.into();
    }

    commands::execute(cli.command, output_config, &logging.file)
        .await
        .into()
}
