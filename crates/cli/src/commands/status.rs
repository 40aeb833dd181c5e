//! status command - Inspect the state snapshot of an unfinished sync

use std::fmt;
use std::path::PathBuf;

use clap::Args;
use ms_core::state::DEFAULT_STATE_FILE;
use ms_core::{StateStore, SyncState};
use serde::Serialize;

use super::fail;
use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig};

/// Show the saved state of an unfinished sync
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// State snapshot location
    #[arg(long, default_value = DEFAULT_STATE_FILE)]
    pub state_file: PathBuf,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StatusOutput {
    active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    state: Option<SyncState>,
}

/// Human rendering of a snapshot
struct StatusView<'a> {
    formatter: &'a Formatter,
    state: &'a SyncState,
}

impl fmt::Display for StatusView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let out = self.formatter;
        let state = self.state;
        let stats = &state.stats;
        let row = |f: &mut fmt::Formatter<'_>, key: &str, value: String| {
            writeln!(f, "  {:<13} {value}", out.style_key(key))
        };

        writeln!(f, "Sync status")?;
        row(f, "Source:", out.style_name(&state.source_container))?;
        row(f, "Destination:", out.style_name(&state.dest_container))?;
        if !state.prefix.is_empty() {
            row(f, "Prefix:", state.prefix.clone())?;
        }
        row(
            f,
            "Objects:",
            format!(
                "{} of {} after filtering",
                state.filtered_object_list.len(),
                state.full_object_list.len()
            ),
        )?;
        row(f, "Synced:", out.style_size(&stats.synced_files.to_string()))?;
        row(f, "Skipped:", stats.skipped_files.to_string())?;
        row(f, "Failed:", stats.failed_files.to_string())?;
        if let Some(start) = stats.start_time {
            row(f, "Started:", out.style_date(&start.to_string()))?;
        }
        write!(
            f,
            "\nTo resume: msync sync --resume -s {} -d {}",
            state.source_container, state.dest_container
        )
    }
}

/// Execute the status command
pub fn execute(args: StatusArgs, output_config: OutputConfig) -> ExitCode {
    let formatter = Formatter::new(output_config);
    let store = StateStore::new(&args.state_file);

    let state = match store.read() {
        Ok(s) => s,
        Err(e) => return fail(&formatter, "Failed to read status", &e),
    };

    if formatter.is_json() {
        formatter.json(&StatusOutput {
            active: state.is_some(),
            state,
        });
        return ExitCode::Success;
    }

    match state {
        Some(state) => formatter.println(
            &StatusView {
                formatter: &formatter,
                state: &state,
            }
            .to_string(),
        ),
        None => formatter.warning("No active sync session found"),
    }
    ExitCode::Success
}
