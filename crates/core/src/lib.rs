//! ms-core: Core sync engine for mirrorsync
//!
//! This crate mirrors objects from a source bucket to a destination bucket,
//! possibly on different S3-compatible endpoints. It provides:
//! - Paginated enumeration and include/exclude filtering
//! - Entity-tag change detection
//! - Server-side copy or download-then-upload transfers
//! - Bounded exponential backoff per object
//! - Optional post-transfer checksum verification
//! - Batch-parallel scheduling with resumable checkpoints
//!
//! The crate is independent of any specific S3 SDK; backends implement
//! [`ObjectStore`].

pub mod change;
pub mod checksum;
pub mod config;
pub mod endpoint;
pub mod engine;
pub mod error;
pub mod job;
pub mod listing;
pub mod pattern;
pub mod retry;
pub mod state;
pub mod stats;
pub mod traits;
pub mod transfer;

pub use config::{Config, EndpointConfig, LoggingConfig, SyncSettings};
pub use endpoint::EndpointIdentity;
pub use engine::{ProgressCallback, SyncOutcome, SyncProgress, Syncer, VerifyReport};
pub use error::{Error, Result};
pub use job::{SyncJob, SyncOptions};
pub use retry::{RetryBuilder, RetryPolicy, retry_with_backoff};
pub use state::{StateStore, SyncState};
pub use stats::{StatsCollector, SyncStats};
pub use traits::{ListOptions, ListResult, ObjectData, ObjectMetadata, ObjectRecord, ObjectStore};
pub use transfer::TransferMode;
