//! Log setup
//!
//! Two sinks share one registry: a console layer on stderr and an
//! append-only log file. File lines look like
//! `[2026-01-05T09:30:00.123Z] [INFO] Synced: photos/a.png key="photos/a.png" size=5`.

use std::fmt;
use std::fs::{File, OpenOptions};
use std::path::Path;
use std::sync::Mutex;

use anyhow::Context as _;
use jiff::Timestamp;
use tracing::{Event, Subscriber};
use tracing_subscriber::fmt::format::{DefaultFields, Writer};
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::prelude::*;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{EnvFilter, Layer};

/// What to log and where
#[derive(Debug, Clone)]
pub struct LogSettings<'a> {
    /// Level for the log file (`debug`, `info`, `warn`, `error`)
    pub level: &'a str,
    pub file: Option<&'a Path>,
    /// Echo file-level events on the console instead of warnings only
    pub verbose: bool,
}

/// `[timestamp] [LEVEL] message` event format for the log file
#[derive(Debug, Clone, Copy, Default)]
pub struct LineFormat;

impl<S, N> FormatEvent<S, N> for LineFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        write!(writer, "[{}] [{}] ", Timestamp::now(), event.metadata().level())?;
        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

/// File layer appending to `path`; the mutex keeps concurrent lines whole
pub fn file_layer<S>(
    path: &Path,
) -> std::io::Result<tracing_subscriber::fmt::Layer<S, DefaultFields, LineFormat, Mutex<File>>>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    Ok(tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .event_format(LineFormat)
        .with_writer(Mutex::new(file)))
}

/// Install the global subscriber
///
/// `RUST_LOG` overrides the console filter.
pub fn init(settings: &LogSettings<'_>) -> anyhow::Result<()> {
    let file_filter = EnvFilter::try_new(settings.level)
        .with_context(|| format!("invalid log level '{}'", settings.level))?;
    let console_default = if settings.verbose {
        settings.level
    } else {
        "warn"
    };
    let console_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(console_default))
        .context("invalid console log filter")?;

    let console = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(console_filter);

    let file = match settings.file {
        Some(path) => Some(
            file_layer(path)
                .with_context(|| format!("cannot open log file {}", path.display()))?
                .with_filter(file_filter),
        ),
        None => None,
    };

    tracing_subscriber::registry()
        .with(console)
        .with(file)
        .try_init()
        .context("logging already initialized")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_file_lines_are_tagged_and_appended() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("msync.log");
        std::fs::write(&path, "[earlier] [INFO] kept\n").unwrap();

        let subscriber = tracing_subscriber::registry().with(file_layer(&path).unwrap());
        tracing::subscriber::with_default(subscriber, || {
            tracing::info!("Synced: a.png");
            tracing::error!(key = "b.png", "Failed to sync b.png");
        });

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "[earlier] [INFO] kept");
        assert!(lines[1].starts_with('['));
        assert!(lines[1].ends_with("[INFO] Synced: a.png"));
        assert!(lines[2].contains("[ERROR] Failed to sync b.png key=\"b.png\""));

        let stamp = &lines[1][1..lines[1].find(']').unwrap()];
        assert!(stamp.parse::<Timestamp>().is_ok());
    }

    #[test]
    fn test_invalid_level_rejected() {
        let settings = LogSettings {
            level: "msync=verbose",
            file: None,
            verbose: false,
        };
        assert!(init(&settings).is_err());
    }
}
