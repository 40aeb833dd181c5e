//! In-memory object store for driving the engine end-to-end

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use ms_core::checksum::sha256_hex;
use ms_core::{
    EndpointIdentity, Error, ListOptions, ListResult, ObjectData, ObjectMetadata, ObjectRecord,
    ObjectStore, Result,
};
use tokio::time::Instant;

#[derive(Debug, Clone)]
pub struct StoredObject {
    pub body: Bytes,
    pub etag: String,
    pub content_type: Option<String>,
    pub metadata: HashMap<String, String>,
}

#[derive(Debug, Default)]
pub struct CallCounts {
    pub lists: AtomicUsize,
    pub heads: AtomicUsize,
    pub gets: AtomicUsize,
    pub puts: AtomicUsize,
    pub copies: AtomicUsize,
}

pub struct MemoryStore {
    endpoint: EndpointIdentity,
    buckets: Mutex<HashMap<String, BTreeMap<String, StoredObject>>>,
    pub calls: CallCounts,
    failing_keys: Mutex<HashSet<String>>,
    failing_lists: AtomicBool,
    corrupt_writes: AtomicBool,
    pub put_times: Mutex<Vec<Instant>>,
}

impl MemoryStore {
    pub fn new(endpoint: &str) -> Self {
        Self {
            endpoint: EndpointIdentity::parse(endpoint).unwrap(),
            buckets: Mutex::new(HashMap::new()),
            calls: CallCounts::default(),
            failing_keys: Mutex::new(HashSet::new()),
            failing_lists: AtomicBool::new(false),
            corrupt_writes: AtomicBool::new(false),
            put_times: Mutex::new(Vec::new()),
        }
    }

    pub fn create_bucket(&self, bucket: &str) {
        self.buckets
            .lock()
            .unwrap()
            .entry(bucket.to_string())
            .or_default();
    }

    pub fn insert(&self, bucket: &str, key: &str, body: &[u8]) {
        let object = StoredObject {
            body: Bytes::copy_from_slice(body),
            etag: etag_of(body),
            content_type: Some("application/octet-stream".into()),
            metadata: HashMap::from([("origin".to_string(), "test".to_string())]),
        };
        self.buckets
            .lock()
            .unwrap()
            .entry(bucket.to_string())
            .or_default()
            .insert(key.to_string(), object);
    }

    pub fn object(&self, bucket: &str, key: &str) -> Option<StoredObject> {
        self.buckets.lock().unwrap().get(bucket)?.get(key).cloned()
    }

    pub fn keys(&self, bucket: &str) -> Vec<String> {
        self.buckets
            .lock()
            .unwrap()
            .get(bucket)
            .map(|b| b.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Every write or copy of this key fails
    pub fn fail_writes_for(&self, key: &str) {
        self.failing_keys.lock().unwrap().insert(key.to_string());
    }

    pub fn fail_lists(&self) {
        self.failing_lists.store(true, Ordering::SeqCst);
    }

    /// Store written bodies with an extra byte
    pub fn corrupt_writes(&self) {
        self.corrupt_writes.store(true, Ordering::SeqCst);
    }

    pub fn count(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }

    fn store(&self, bucket: &str, key: &str, object: StoredObject) -> Result<String> {
        let mut buckets = self.buckets.lock().unwrap();
        let objects = buckets
            .get_mut(bucket)
            .ok_or_else(|| Error::NotFound(format!("bucket {bucket}")))?;
        let etag = object.etag.clone();
        objects.insert(key.to_string(), object);
        Ok(etag)
    }

    fn check_writable(&self, key: &str) -> Result<()> {
        if self.failing_keys.lock().unwrap().contains(key) {
            return Err(Error::Transfer(format!("503 Service Unavailable: {key}")));
        }
        Ok(())
    }

    fn maybe_corrupt(&self, body: Bytes) -> Bytes {
        if self.corrupt_writes.load(Ordering::SeqCst) {
            let mut bytes = body.to_vec();
            bytes.push(0xff);
            Bytes::from(bytes)
        } else {
            body
        }
    }
}

pub fn etag_of(body: &[u8]) -> String {
    sha256_hex(body)[..32].to_string()
}

#[async_trait]
impl ObjectStore for MemoryStore {
    fn endpoint(&self) -> EndpointIdentity {
        self.endpoint.clone()
    }

    async fn list_objects(&self, bucket: &str, options: ListOptions) -> Result<ListResult> {
        self.calls.lists.fetch_add(1, Ordering::SeqCst);
        if self.failing_lists.load(Ordering::SeqCst) {
            return Err(Error::Connection("connection refused".into()));
        }

        let buckets = self.buckets.lock().unwrap();
        let objects = buckets
            .get(bucket)
            .ok_or_else(|| Error::NotFound(format!("bucket {bucket}")))?;
        let prefix = options.prefix.unwrap_or_default();
        let max_keys = options.max_keys.unwrap_or(1000).max(1) as usize;

        let mut matching = objects.iter().filter(|(k, _)| k.starts_with(&prefix)).filter(
            |(k, _)| match &options.continuation_token {
                Some(after) => k.as_str() > after.as_str(),
                None => true,
            },
        );

        let items: Vec<ObjectRecord> = matching
            .by_ref()
            .take(max_keys)
            .map(|(k, o)| ObjectRecord::new(k.clone(), o.body.len() as u64, o.etag.clone()))
            .collect();
        let truncated = matching.next().is_some();

        Ok(ListResult {
            continuation_token: truncated.then(|| items.last().map(|o| o.key.clone())).flatten(),
            truncated,
            items,
        })
    }

    async fn head_object(&self, bucket: &str, key: &str) -> Result<ObjectMetadata> {
        self.calls.heads.fetch_add(1, Ordering::SeqCst);
        let object = self
            .object(bucket, key)
            .ok_or_else(|| Error::NotFound(format!("{bucket}/{key}")))?;
        Ok(ObjectMetadata {
            size: object.body.len() as u64,
            last_modified: None,
            etag: format!("\"{}\"", object.etag),
            content_type: object.content_type,
            metadata: object.metadata,
        })
    }

    async fn get_object(&self, bucket: &str, key: &str) -> Result<ObjectData> {
        self.calls.gets.fetch_add(1, Ordering::SeqCst);
        let object = self
            .object(bucket, key)
            .ok_or_else(|| Error::NotFound(format!("{bucket}/{key}")))?;
        Ok(ObjectData {
            body: object.body,
            content_type: object.content_type,
            metadata: object.metadata,
        })
    }

    async fn put_object(&self, bucket: &str, key: &str, data: ObjectData) -> Result<String> {
        self.calls.puts.fetch_add(1, Ordering::SeqCst);
        self.put_times.lock().unwrap().push(Instant::now());
        self.check_writable(key)?;

        let etag = etag_of(&data.body);
        let object = StoredObject {
            body: self.maybe_corrupt(data.body),
            etag,
            content_type: data.content_type,
            metadata: data.metadata,
        };
        self.store(bucket, key, object)
    }

    async fn copy_object(
        &self,
        src_bucket: &str,
        src_key: &str,
        dest_bucket: &str,
        dest_key: &str,
    ) -> Result<String> {
        self.calls.copies.fetch_add(1, Ordering::SeqCst);
        self.check_writable(dest_key)?;
        let mut object = self
            .object(src_bucket, src_key)
            .ok_or_else(|| Error::NotFound(format!("{src_bucket}/{src_key}")))?;
        object.body = self.maybe_corrupt(object.body);
        self.store(dest_bucket, dest_key, object)
    }
}
