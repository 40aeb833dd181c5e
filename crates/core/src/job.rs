//! Job description and per-run options

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::listing::DEFAULT_PAGE_SIZE;
use crate::retry::RetryPolicy;

/// Default number of objects processed concurrently in one batch
pub const DEFAULT_MAX_CONCURRENCY: usize = 5;

/// Default number of batches between two checkpoints
pub const DEFAULT_CHECKPOINT_INTERVAL: usize = 2;

/// Options that shape one sync run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SyncOptions {
    /// Log what would be transferred without moving bytes
    pub dry_run: bool,

    /// Transfer even when entity tags match
    pub force: bool,

    pub include: Vec<String>,
    pub exclude: Vec<String>,

    /// Batch size for the scheduler
    pub max_concurrency: usize,

    /// Hash source and destination after each transfer
    pub verify_checksum: bool,

    /// Reuse a matching state snapshot instead of enumerating
    pub resume: bool,

    pub retry: RetryPolicy,

    /// Listing page size
    pub page_size: i32,

    /// Batches between two checkpoints
    pub checkpoint_interval: usize,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            force: false,
            include: Vec::new(),
            exclude: Vec::new(),
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            verify_checksum: false,
            resume: false,
            retry: RetryPolicy::default(),
            page_size: DEFAULT_PAGE_SIZE,
            checkpoint_interval: DEFAULT_CHECKPOINT_INTERVAL,
        }
    }
}

impl SyncOptions {
    pub fn validate(&self) -> Result<()> {
        if self.max_concurrency == 0 {
            return Err(Error::Configuration(
                "max_concurrency must be at least 1".into(),
            ));
        }
        if !(1..=1000).contains(&self.page_size) {
            return Err(Error::Configuration(
                "page_size must be between 1 and 1000".into(),
            ));
        }
        if self.checkpoint_interval == 0 {
            return Err(Error::Configuration(
                "checkpoint_interval must be at least 1".into(),
            ));
        }
        self.retry.validate()
    }
}

/// One invocation of the engine
#[derive(Debug, Clone, PartialEq)]
pub struct SyncJob {
    pub source_bucket: String,
    pub dest_bucket: String,
    pub prefix: String,
    pub options: SyncOptions,
}

impl SyncJob {
    pub fn new(source_bucket: impl Into<String>, dest_bucket: impl Into<String>) -> Self {
        Self {
            source_bucket: source_bucket.into(),
            dest_bucket: dest_bucket.into(),
            prefix: String::new(),
            options: SyncOptions::default(),
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn with_options(mut self, options: SyncOptions) -> Self {
        self.options = options;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.source_bucket.is_empty() || self.dest_bucket.is_empty() {
            return Err(Error::Configuration(
                "source and destination buckets are required".into(),
            ));
        }
        self.options.validate()
    }
}
