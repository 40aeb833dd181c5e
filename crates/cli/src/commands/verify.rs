//! verify command - Checksum every source object against the destination

use std::fmt;

use clap::Args;
use ms_core::VerifyReport;
use serde::Serialize;

use super::{ConnectionArgs, connect, fail};
use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig};

/// Compare SHA-256 digests of source and destination objects
#[derive(Args, Debug)]
pub struct VerifyArgs {
    #[command(flatten)]
    pub connection: ConnectionArgs,

    /// Only verify keys starting with this prefix
    #[arg(short = 'p', long)]
    pub prefix: Option<String>,

    /// Objects verified concurrently per batch
    #[arg(long)]
    pub max_concurrency: Option<usize>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct VerifyOutput {
    source: String,
    destination: String,
    prefix: String,
    #[serde(flatten)]
    report: VerifyReport,
}

impl fmt::Display for VerifyOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Verification of {} -> {}", self.source, self.destination)?;
        writeln!(f, "  Verified:   {}", self.report.verified)?;
        writeln!(f, "  Mismatched: {}", self.report.mismatched)?;
        write!(f, "  Errors:     {}", self.report.errors)?;
        for key in &self.report.mismatched_keys {
            write!(f, "\n  ✗ {key}")?;
        }
        Ok(())
    }
}

/// Execute the verify command
pub async fn execute(args: VerifyArgs, output_config: OutputConfig) -> ExitCode {
    let formatter = Formatter::new(output_config);

    let mut config = match args.connection.load_config() {
        Ok(c) => c,
        Err(e) => return fail(&formatter, "Invalid configuration", &e),
    };
    if let Some(prefix) = &args.prefix {
        config.sync.prefix = prefix.clone();
    }
    if let Some(n) = args.max_concurrency {
        config.sync.max_concurrency = n;
    }
    if let Err(e) = config.validate() {
        return fail(&formatter, "Invalid configuration", &e);
    }

    let syncer = match connect(&config).await {
        Ok(s) => s,
        Err(e) => return fail(&formatter, "Failed to create client", &e),
    };

    let report = match syncer
        .verify_all(
            &config.source.bucket,
            &config.destination.bucket,
            &config.sync.prefix,
            config.sync.max_concurrency,
        )
        .await
    {
        Ok(r) => r,
        Err(e) => return fail(&formatter, "Verification failed", &e),
    };

    let clean = report.is_clean();
    formatter.output(&VerifyOutput {
        source: config.source.bucket,
        destination: config.destination.bucket,
        prefix: config.sync.prefix,
        report,
    });

    if clean {
        formatter.success("All objects verified");
        ExitCode::Success
    } else {
        ExitCode::GeneralError
    }
}
