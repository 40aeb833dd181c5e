//! init command - Write a configuration file template

use std::path::PathBuf;

use clap::Args;
use ms_core::{Config, EndpointConfig};

use super::fail;
use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig};

/// Write a configuration file template
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Configuration file to create
    #[arg(short = 'f', long, default_value = "msync.toml")]
    pub file: PathBuf,

    /// Overwrite an existing file
    #[arg(long)]
    pub force: bool,
}

fn template() -> Config {
    let side = |bucket: &str| EndpointConfig {
        bucket: bucket.to_string(),
        endpoint: "https://s3.amazonaws.com".to_string(),
        region: "us-east-1".to_string(),
        access_key: "YOUR_ACCESS_KEY".to_string(),
        secret_key: "YOUR_SECRET_KEY".to_string(),
        force_path_style: false,
    };

    let mut config = Config {
        source: side("source-bucket"),
        destination: side("destination-bucket"),
        ..Default::default()
    };
    config.sync.exclude = vec!["*.tmp".to_string(), "*.log".to_string()];
    config
}

/// Execute the init command
pub fn execute(args: InitArgs, output_config: OutputConfig) -> ExitCode {
    let formatter = Formatter::new(output_config);

    if args.file.exists() && !args.force {
        formatter.error(&format!(
            "{} already exists; use --force to overwrite",
            args.file.display()
        ));
        return ExitCode::UsageError;
    }

    if let Err(e) = template().save(&args.file) {
        return fail(&formatter, "Failed to write configuration", &e);
    }

    formatter.success(&format!("Configuration written to {}", args.file.display()));
    formatter.println(&format!(
        "Edit the credentials, then run: msync sync --config {}",
        args.file.display()
    ));
    ExitCode::Success
}
