//! Storage abstraction consumed by the sync engine
//!
//! The engine never talks to an SDK directly. Backends implement
//! [`ObjectStore`] for one endpoint; the engine holds one store for the
//! source side and one for the destination side.

use std::collections::HashMap;

use async_trait::async_trait;
use bytes::Bytes;
use jiff::Timestamp;
use serde::{Deserialize, Serialize};

use crate::endpoint::EndpointIdentity;
use crate::error::Result;

/// One object as seen in a listing pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectRecord {
    /// Full object key
    pub key: String,

    /// Size in bytes
    pub size: u64,

    /// Last modification time reported by the endpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<Timestamp>,

    /// Entity tag with surrounding quotes stripped
    #[serde(default)]
    pub etag: String,
}

impl ObjectRecord {
    pub fn new(key: impl Into<String>, size: u64, etag: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            size,
            last_modified: None,
            etag: normalize_etag(&etag.into()),
        }
    }
}

/// Result of an existence/metadata probe
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectMetadata {
    pub size: u64,
    pub last_modified: Option<Timestamp>,
    pub etag: String,
    pub content_type: Option<String>,
    pub metadata: HashMap<String, String>,
}

/// Object body plus the headers that must survive a cross-endpoint transfer
#[derive(Debug, Clone, Default)]
pub struct ObjectData {
    pub body: Bytes,
    pub content_type: Option<String>,
    pub metadata: HashMap<String, String>,
}

/// Options for a single listing page
#[derive(Debug, Clone, Default)]
pub struct ListOptions {
    /// Key prefix filter
    pub prefix: Option<String>,

    /// Maximum keys to return in one page
    pub max_keys: Option<i32>,

    /// Continuation cursor from the previous page
    pub continuation_token: Option<String>,
}

/// One page of a listing
#[derive(Debug, Clone, Default)]
pub struct ListResult {
    pub items: Vec<ObjectRecord>,

    /// Whether more pages follow
    pub truncated: bool,

    /// Cursor for the next page
    pub continuation_token: Option<String>,
}

/// Strip the double quotes S3-compatible endpoints wrap entity tags in
pub fn normalize_etag(etag: &str) -> String {
    etag.trim_matches('"').to_string()
}

/// Operations the engine needs from an object-storage endpoint
///
/// `head_object` must return `Error::NotFound` for a missing key so callers
/// can tell absence apart from a failed probe.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Canonical identity of the endpoint this store talks to
    fn endpoint(&self) -> EndpointIdentity;

    /// List one page of objects in a bucket
    async fn list_objects(&self, bucket: &str, options: ListOptions) -> Result<ListResult>;

    /// Probe an object's existence and metadata
    async fn head_object(&self, bucket: &str, key: &str) -> Result<ObjectMetadata>;

    /// Read a whole object
    async fn get_object(&self, bucket: &str, key: &str) -> Result<ObjectData>;

    /// Write a whole object, returning the new entity tag
    async fn put_object(&self, bucket: &str, key: &str, data: ObjectData) -> Result<String>;

    /// Server-side copy within this endpoint, returning the new entity tag
    async fn copy_object(
        &self,
        src_bucket: &str,
        src_key: &str,
        dest_bucket: &str,
        dest_key: &str,
    ) -> Result<String>;
}
