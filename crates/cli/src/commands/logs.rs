//! logs command - Show the tail of the log file

use std::io::SeekFrom;
use std::path::Path;
use std::time::Duration;

use anyhow::Context as _;
use clap::Args;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig};

/// Show recent log lines
#[derive(Args, Debug)]
pub struct LogsArgs {
    /// Number of lines to show
    #[arg(short = 'n', long, default_value_t = 50)]
    pub lines: usize,

    /// Keep printing new lines until Ctrl-C
    #[arg(short = 'f', long)]
    pub follow: bool,
}

/// Last `n` non-blank lines
fn tail(content: &str, n: usize) -> Vec<&str> {
    let lines: Vec<&str> = content.lines().filter(|l| !l.trim().is_empty()).collect();
    lines[lines.len().saturating_sub(n)..].to_vec()
}

/// Execute the logs command
pub async fn execute(args: LogsArgs, output_config: OutputConfig, log_file: &Path) -> ExitCode {
    let formatter = Formatter::new(output_config);

    let content = match tokio::fs::read_to_string(log_file).await {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            formatter.warning(&format!("No log file found at {}", log_file.display()));
            return ExitCode::Success;
        }
        Err(e) => {
            formatter.error(&format!("Failed to read {}: {e}", log_file.display()));
            return ExitCode::GeneralError;
        }
    };

    for line in tail(&content, args.lines) {
        formatter.println(&formatter.style_log_line(line));
    }

    if args.follow
        && let Err(e) = follow(log_file, content.len(), &formatter).await
    {
        formatter.error(&format!("{e:#}"));
        return ExitCode::GeneralError;
    }
    ExitCode::Success
}

/// Open handle on a growing log file that yields complete new lines
struct LogFollower {
    file: File,
    offset: u64,
    pending: Vec<u8>,
}

impl LogFollower {
    async fn open(path: &Path, offset: u64) -> std::io::Result<Self> {
        Ok(Self {
            file: File::open(path).await?,
            offset,
            pending: Vec::new(),
        })
    }

    /// Lines appended since the last call; a trailing partial line is held back
    async fn read_new(&mut self) -> std::io::Result<Vec<String>> {
        let len = self.file.metadata().await?.len();
        if len < self.offset {
            // truncated
            self.offset = 0;
            self.pending.clear();
        }
        if len == self.offset {
            return Ok(Vec::new());
        }

        self.file.seek(SeekFrom::Start(self.offset)).await?;
        let read = (&mut self.file)
            .take(len - self.offset)
            .read_to_end(&mut self.pending)
            .await?;
        self.offset += read as u64;

        let Some(end) = self.pending.iter().rposition(|b| *b == b'\n') else {
            return Ok(Vec::new());
        };
        let complete: Vec<u8> = self.pending.drain(..=end).collect();
        Ok(String::from_utf8_lossy(&complete)
            .lines()
            .filter(|l| !l.trim().is_empty())
            .map(str::to_string)
            .collect())
    }
}

/// Poll the file once a second and print complete new lines
async fn follow(path: &Path, offset: usize, formatter: &Formatter) -> anyhow::Result<()> {
    let mut follower = LogFollower::open(path, offset as u64)
        .await
        .with_context(|| format!("cannot open {}", path.display()))?;
    let mut ticker = tokio::time::interval(Duration::from_secs(1));
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => return Ok(()),
            _ = ticker.tick() => {
                let lines = follower
                    .read_new()
                    .await
                    .with_context(|| format!("cannot read {}", path.display()))?;
                for line in lines {
                    formatter.println(&formatter.style_log_line(&line));
                }
            }
        }
    }
}
