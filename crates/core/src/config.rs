//! Configuration file support
//!
//! A TOML document describing both endpoints and the sync defaults:
//!
//! ```toml
//! [source]
//! bucket = "photos"
//! endpoint = "https://kr.object.ncloudstorage.com"
//! region = "kr-standard"
//! access_key = "..."
//! secret_key = "..."
//!
//! [destination]
//! bucket = "photos-backup"
//! endpoint = "https://s3.amazonaws.com"
//! region = "us-east-1"
//! access_key = "..."
//! secret_key = "..."
//!
//! [sync]
//! exclude = ["*.tmp", "*.log"]
//! max_concurrency = 5
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::endpoint::EndpointIdentity;
use crate::error::{Error, Result};
use crate::job::{DEFAULT_MAX_CONCURRENCY, SyncOptions};
use crate::retry::RetryPolicy;
use crate::state::DEFAULT_STATE_FILE;

/// Default log file name, relative to the working directory
pub const DEFAULT_LOG_FILE: &str = ".msync.log";

/// Connection settings for one side of the sync
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointConfig {
    pub bucket: String,
    pub endpoint: String,
    pub region: String,
    pub access_key: String,
    pub secret_key: String,
    pub force_path_style: bool,
}

impl EndpointConfig {
    /// Reject missing endpoint or credentials before any request is made
    pub fn validate(&self, side: &str) -> Result<EndpointIdentity> {
        if self.access_key.is_empty() || self.secret_key.is_empty() {
            return Err(Error::Configuration(format!(
                "{side} credentials are missing"
            )));
        }
        if self.region.is_empty() {
            return Err(Error::Configuration(format!("{side} region is missing")));
        }
        EndpointIdentity::parse(&self.endpoint)
            .map_err(|e| Error::Configuration(format!("{side}: {e}")))
    }
}

/// `[sync]` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncSettings {
    pub prefix: String,
    pub include: Vec<String>,
    pub exclude: Vec<String>,
    pub max_concurrency: usize,
    pub max_retries: u32,
    pub verify_checksum: bool,
    pub force: bool,
    pub dry_run: bool,
    pub state_file: PathBuf,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            prefix: String::new(),
            include: Vec::new(),
            exclude: Vec::new(),
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            max_retries: RetryPolicy::default().max_retries,
            verify_checksum: false,
            force: false,
            dry_run: false,
            state_file: PathBuf::from(DEFAULT_STATE_FILE),
        }
    }
}

impl SyncSettings {
    /// Engine options derived from this section
    pub fn to_options(&self) -> SyncOptions {
        SyncOptions {
            dry_run: self.dry_run,
            force: self.force,
            include: self.include.clone(),
            exclude: self.exclude.clone(),
            max_concurrency: self.max_concurrency,
            verify_checksum: self.verify_checksum,
            retry: RetryPolicy {
                max_retries: self.max_retries,
                ..RetryPolicy::default()
            },
            ..SyncOptions::default()
        }
    }
}

/// `[logging]` section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub file: PathBuf,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: PathBuf::from(DEFAULT_LOG_FILE),
        }
    }
}

/// Whole configuration document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub source: EndpointConfig,
    pub destination: EndpointConfig,
    pub sync: SyncSettings,
    pub logging: LoggingConfig,
}

impl Config {
    /// Load a configuration file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Configuration(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Configuration(format!("invalid config: {e}")))
    }

    /// Write the configuration as TOML
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::Configuration(format!("cannot serialize config: {e}")))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Check both endpoints and the sync options
    pub fn validate(&self) -> Result<()> {
        self.source.validate("source")?;
        self.destination.validate("destination")?;
        if self.source.bucket.is_empty() || self.destination.bucket.is_empty() {
            return Err(Error::Configuration(
                "source and destination buckets are required".into(),
            ));
        }
        self.sync.to_options().validate()
    }
}
