//! test command - Probe both buckets

use std::fmt;

use clap::Args;
use serde::Serialize;

use super::{ConnectionArgs, connect, fail};
use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig};

/// Check that both buckets answer a listing
#[derive(Args, Debug)]
pub struct TestArgs {
    #[command(flatten)]
    pub connection: ConnectionArgs,
}

#[derive(Debug, Serialize)]
struct TestOutput {
    source: String,
    destination: String,
    mode: String,
    ok: bool,
}

impl fmt::Display for TestOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Source:      {}", self.source)?;
        writeln!(f, "Destination: {}", self.destination)?;
        write!(f, "Transfer:    {}", self.mode)
    }
}

/// Execute the test command
pub async fn execute(args: TestArgs, output_config: OutputConfig) -> ExitCode {
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

    let ok = syncer
        .test_connections(&config.source.bucket, &config.destination.bucket)
        .await;
    let output = TestOutput {
        source: format!("{} ({})", config.source.bucket, config.source.endpoint),
        destination: format!(
            "{} ({})",
            config.destination.bucket, config.destination.endpoint
        ),
        mode: syncer.mode().to_string(),
        ok,
    };

    formatter.output(&output);

    if ok {
        formatter.success("All connections successful");
        ExitCode::Success
    } else {
        formatter.error("Connection test failed");
        ExitCode::NetworkError
    }
}
