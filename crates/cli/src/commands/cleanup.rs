//! cleanup command - Remove the state snapshot and optionally the log file

use std::path::{Path, PathBuf};

use clap::Args;
use ms_core::StateStore;
use ms_core::state::DEFAULT_STATE_FILE;
use serde::Serialize;

use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig};

/// Remove local files left by previous runs
#[derive(Args, Debug)]
pub struct CleanupArgs {
    /// Also remove the log file
    #[arg(long)]
    pub all: bool,

    /// State snapshot location
    #[arg(long, default_value = DEFAULT_STATE_FILE)]
    pub state_file: PathBuf,
}

#[derive(Debug, Default, Serialize)]
struct CleanupOutput {
    removed: Vec<String>,
    errors: Vec<String>,
}

/// Delete what exists; a missing file is not an error
fn remove_files(args: &CleanupArgs, log_file: &Path) -> CleanupOutput {
    let mut output = CleanupOutput::default();

    let store = StateStore::new(&args.state_file);
    if store.exists() {
        match store.delete() {
            Ok(()) => output.removed.push(args.state_file.display().to_string()),
            Err(e) => output.errors.push(format!("{}: {e}", args.state_file.display())),
        }
    }

    if args.all && log_file.exists() {
        match std::fs::remove_file(log_file) {
            Ok(()) => output.removed.push(log_file.display().to_string()),
            Err(e) => output.errors.push(format!("{}: {e}", log_file.display())),
        }
    }

    output
}

/// Execute the cleanup command
pub fn execute(args: CleanupArgs, output_config: OutputConfig, log_file: &Path) -> ExitCode {
    let formatter = Formatter::new(output_config);
    let output = remove_files(&args, log_file);

    if formatter.is_json() {
        formatter.json(&output);
    } else {
        for path in &output.removed {
            formatter.success(&format!("Removed: {path}"));
        }
        for error in &output.errors {
            formatter.error(&format!("Failed to remove {error}"));
        }
        if output.removed.is_empty() && output.errors.is_empty() {
            formatter.warning("No files to clean up");
        }
    }

    if output.errors.is_empty() {
        ExitCode::Success
    } else {
        ExitCode::GeneralError
    }
}
