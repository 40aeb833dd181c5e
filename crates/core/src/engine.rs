//! Sync engine: batch scheduling, per-object pipeline and checkpoints
//!
//! A job enumerates the source (or reuses a matching snapshot), filters the
//! keys, then walks the filtered list in consecutive batches of
//! `max_concurrency` objects. All objects of a batch run concurrently and the
//! next batch starts only once every object of the current one reached a
//! terminal outcome, retries included.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use jiff::Timestamp;
use serde::{Serialize, Serializer};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::change::{is_multipart_etag, needs_transfer};
use crate::checksum;
use crate::error::{Error, Result};
use crate::job::{SyncJob, SyncOptions};
use crate::listing::{DEFAULT_PAGE_SIZE, list_all_objects};
use crate::pattern;
use crate::retry::retry_with_backoff;
use crate::state::{StateStore, SyncState};
use crate::stats::{StatsCollector, SyncStats, format_duration};
use crate::traits::{ListOptions, ObjectRecord, ObjectStore, normalize_etag};
use crate::transfer::{TransferMode, Transferrer};

/// Progress snapshot handed to the callback after every batch
#[derive(Debug, Clone)]
pub struct SyncProgress {
    pub stats: SyncStats,
    /// Objects in the filtered list
    pub total: u64,
    /// Objects that reached a terminal outcome
    pub processed: u64,
    pub batch: usize,
    pub batches: usize,
    pub eta: Option<Duration>,
}

pub type ProgressCallback = Arc<dyn Fn(&SyncProgress) + Send + Sync>;

/// Terminal outcome of one object
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    Synced { bytes: u64 },
    Skipped,
    DryRun,
    Failed { error: String },
}

impl SyncOutcome {
    pub fn is_success(&self) -> bool {
        !matches!(self, SyncOutcome::Failed { .. })
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct OutcomeRepr<'a> {
    success: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    skipped: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    dry_run: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'a str>,
}

impl Serialize for SyncOutcome {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        OutcomeRepr {
            success: self.is_success(),
            skipped: matches!(self, SyncOutcome::Skipped),
            dry_run: matches!(self, SyncOutcome::DryRun),
            error: match self {
                SyncOutcome::Failed { error } => Some(error),
                _ => None,
            },
        }
        .serialize(serializer)
    }
}

/// What one successful attempt did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AttemptResult {
    Unchanged,
    WouldTransfer,
    Transferred,
}

/// Result of checksumming a prefix
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyReport {
    pub verified: u64,
    pub mismatched: u64,
    pub errors: u64,
    pub mismatched_keys: Vec<String>,
}

impl VerifyReport {
    pub fn is_clean(&self) -> bool {
        self.mismatched == 0 && self.errors == 0
    }
}

/// Per-job context shared by all object tasks
struct JobContext<'a> {
    source_bucket: &'a str,
    dest_bucket: &'a str,
    options: &'a SyncOptions,
    transferrer: Transferrer<'a>,
    stats: &'a StatsCollector,
}

/// Mirrors objects from a source store to a destination store
pub struct Syncer {
    source: Arc<dyn ObjectStore>,
    dest: Arc<dyn ObjectStore>,
    mode: TransferMode,
    state_store: Option<StateStore>,
    progress: Option<ProgressCallback>,
    cancel: CancellationToken,
}

impl Syncer {
    /// Create a syncer; the transfer mode is fixed from the endpoint identities
    pub fn new(source: Arc<dyn ObjectStore>, dest: Arc<dyn ObjectStore>) -> Self {
        let mode = TransferMode::select(&source.endpoint(), &dest.endpoint());
        Self {
            source,
            dest,
            mode,
            state_store: None,
            progress: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Persist checkpoints to this store
    pub fn with_state_store(mut self, store: StateStore) -> Self {
        self.state_store = Some(store);
        self
    }

    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.progress = Some(callback);
        self
    }

    /// Stop between batches once this token is cancelled
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn mode(&self) -> TransferMode {
        self.mode
    }

    pub fn state_store(&self) -> Option<&StateStore> {
        self.state_store.as_ref()
    }

    /// Check that both buckets answer a one-key listing
    pub async fn test_connections(&self, source_bucket: &str, dest_bucket: &str) -> bool {
        let probe = ListOptions {
            max_keys: Some(1),
            ..Default::default()
        };

        for (side, store, bucket) in [
            ("source", &self.source, source_bucket),
            ("destination", &self.dest, dest_bucket),
        ] {
            match store.list_objects(bucket, probe.clone()).await {
                Ok(_) => info!(side, bucket, endpoint = %store.endpoint(), "Bucket accessible"),
                Err(e) => {
                    error!(side, bucket, error = %e, "Bucket not accessible");
                    return false;
                }
            }
        }
        true
    }

    /// Probe a source object and build its record
    pub async fn head_source(&self, bucket: &str, key: &str) -> Result<ObjectRecord> {
        let meta = self.source.head_object(bucket, key).await?;
        Ok(ObjectRecord {
            key: key.to_string(),
            size: meta.size,
            last_modified: meta.last_modified,
            etag: normalize_etag(&meta.etag),
        })
    }

    /// Run a whole job
    ///
    /// Per-object failures never abort the job; they are counted in
    /// `failed_files`. Enumeration failures abort it. The snapshot is removed
    /// once the job finishes without failures and kept otherwise.
    pub async fn sync_all(&self, job: &SyncJob) -> Result<SyncStats> {
        job.validate()?;
        let options = &job.options;

        info!(
            source = %job.source_bucket,
            destination = %job.dest_bucket,
            prefix = %job.prefix,
            dry_run = options.dry_run,
            force = options.force,
            resume = options.resume,
            verify_checksum = options.verify_checksum,
            mode = %self.mode,
            "Starting sync: {} -> {}",
            job.source_bucket,
            job.dest_bucket
        );

        let resumed = if options.resume {
            self.state_store
                .as_ref()
                .and_then(|s| s.load_for(&job.source_bucket, &job.dest_bucket))
        } else {
            None
        };

        let (full, filtered, stats) = match resumed {
            Some(state) => {
                info!(
                    objects = state.filtered_object_list.len(),
                    previously_synced = state.stats.synced_files,
                    "Resuming from saved state"
                );
                // Every object is revisited, so outcome counters restart
                let seed = SyncStats {
                    total_files: state.stats.total_files,
                    total_size: state.stats.total_size,
                    start_time: state.stats.start_time,
                    ..Default::default()
                };
                (
                    state.full_object_list,
                    state.filtered_object_list,
                    StatsCollector::from_snapshot(&seed),
                )
            }
            None => {
                let full = list_all_objects(
                    self.source.as_ref(),
                    &job.source_bucket,
                    &job.prefix,
                    options.page_size,
                )
                .await
                .inspect_err(|e| error!(error = %e, "Sync failed: listing source"))?;

                let stats = StatsCollector::new();
                stats.set_totals(full.len() as u64, full.iter().map(|o| o.size).sum());
                let filtered = pattern::filter(&full, &options.include, &options.exclude);
                (full, filtered, stats)
            }
        };
        stats.mark_started();

        let snapshot = stats.snapshot();
        info!(
            "Found {} objects ({}), {} after filtering",
            snapshot.total_files,
            crate::stats::format_bytes(snapshot.total_size),
            filtered.len()
        );

        if full.is_empty() {
            warn!("No objects to sync");
            stats.mark_finished();
            self.discard_snapshot().await;
            return Ok(stats.snapshot());
        }

        self.checkpoint(job, &full, &filtered, &stats).await;

        let ctx = JobContext {
            source_bucket: &job.source_bucket,
            dest_bucket: &job.dest_bucket,
            options,
            transferrer: Transferrer::new(self.source.as_ref(), self.dest.as_ref(), self.mode),
            stats: &stats,
        };

        let batch_size = options.max_concurrency;
        let batches = filtered.len().div_ceil(batch_size);
        let total = filtered.len() as u64;

        for (index, batch) in filtered.chunks(batch_size).enumerate() {
            if self.cancel.is_cancelled() {
                return Err(self.interrupt(job, &full, &filtered, &stats).await);
            }

            join_all(batch.iter().map(|record| self.process_object(&ctx, record))).await;

            let current = stats.snapshot();
            let processed = current.processed().min(total);
            let elapsed = current.elapsed(Timestamp::now());
            let eta = current.eta(total - processed, elapsed);
            debug!(
                batch = index + 1,
                batches,
                processed,
                total,
                eta = %eta.map(format_duration).unwrap_or_else(|| "unknown".into()),
                "Batch complete"
            );

            if let Some(callback) = &self.progress {
                callback(&SyncProgress {
                    stats: current,
                    total,
                    processed,
                    batch: index + 1,
                    batches,
                    eta,
                });
            }

            if (index + 1) % options.checkpoint_interval == 0 {
                self.checkpoint(job, &full, &filtered, &stats).await;
            }
        }

        stats.mark_finished();
        let final_stats = stats.snapshot();

        if final_stats.failed_files == 0 {
            self.discard_snapshot().await;
        } else {
            self.checkpoint(job, &full, &filtered, &stats).await;
        }

        info!("Sync completed\n{}", final_stats.report());
        Ok(final_stats)
    }

    /// Sync a single object once, without retries
    pub async fn sync_object(
        &self,
        record: &ObjectRecord,
        source_bucket: &str,
        dest_bucket: &str,
        options: &SyncOptions,
    ) -> SyncOutcome {
        let mut single = options.clone();
        single.retry.max_retries = 1;
        let stats = StatsCollector::new();
        let ctx = JobContext {
            source_bucket,
            dest_bucket,
            options: &single,
            transferrer: Transferrer::new(self.source.as_ref(), self.dest.as_ref(), self.mode),
            stats: &stats,
        };
        self.process_object(&ctx, record).await
    }

    /// Compare content digests of a source and a destination object
    ///
    /// A read failure on either side counts as a mismatch.
    pub async fn verify_checksum(
        &self,
        source_bucket: &str,
        source_key: &str,
        dest_bucket: &str,
        dest_key: &str,
    ) -> bool {
        match checksum::compare_objects(
            self.source.as_ref(),
            source_bucket,
            source_key,
            self.dest.as_ref(),
            dest_bucket,
            dest_key,
        )
        .await
        {
            Ok(equal) => equal,
            Err(e) => {
                error!(key = source_key, error = %e, "Checksum verification failed");
                false
            }
        }
    }

    /// Checksum every source object under `prefix` against the destination
    pub async fn verify_all(
        &self,
        source_bucket: &str,
        dest_bucket: &str,
        prefix: &str,
        max_concurrency: usize,
    ) -> Result<VerifyReport> {
        if max_concurrency == 0 {
            return Err(Error::Configuration(
                "max_concurrency must be at least 1".into(),
            ));
        }

        let objects =
            list_all_objects(self.source.as_ref(), source_bucket, prefix, DEFAULT_PAGE_SIZE)
                .await?;
        info!(objects = objects.len(), "Verifying {source_bucket} -> {dest_bucket}");

        let mut report = VerifyReport::default();
        for batch in objects.chunks(max_concurrency) {
            let results = join_all(batch.iter().map(|o| {
                checksum::compare_objects(
                    self.source.as_ref(),
                    source_bucket,
                    &o.key,
                    self.dest.as_ref(),
                    dest_bucket,
                    &o.key,
                )
            }))
            .await;

            for (object, result) in batch.iter().zip(results) {
                match result {
                    Ok(true) => report.verified += 1,
                    Ok(false) => {
                        warn!(key = %object.key, "Checksum mismatch");
                        report.mismatched += 1;
                        report.mismatched_keys.push(object.key.clone());
                    }
                    Err(e) => {
                        warn!(key = %object.key, error = %e, "Verification error");
                        report.errors += 1;
                    }
                }
            }
        }

        Ok(report)
    }

    /// Retry coordinator and checksum verifier around one object
    async fn process_object(&self, ctx: &JobContext<'_>, record: &ObjectRecord) -> SyncOutcome {
        let key = record.key.as_str();
        let outcome = retry_with_backoff(
            &ctx.options.retry,
            |attempt| async move {
                if attempt > 1 {
                    debug!(key, attempt, "Retrying object");
                }
                self.attempt_object(ctx, record).await
            },
            Error::is_retryable,
        )
        .await;

        match outcome.result {
            Ok(AttemptResult::Unchanged) => {
                ctx.stats.record_skipped();
                debug!(key, "Skipped unchanged object");
                SyncOutcome::Skipped
            }
            Ok(AttemptResult::WouldTransfer) => {
                ctx.stats.record_synced(0);
                info!(key, "[DRY RUN] Would sync: {key}");
                SyncOutcome::DryRun
            }
            Ok(AttemptResult::Transferred) => {
                if outcome.attempts > 1 {
                    info!(key, attempt = outcome.attempts, "Retry successful for {key}");
                }
                if ctx.options.verify_checksum
                    && !self
                        .verify_checksum(ctx.source_bucket, key, ctx.dest_bucket, key)
                        .await
                {
                    ctx.stats.record_checksum_mismatch();
                    let err = Error::ChecksumMismatch {
                        key: key.to_string(),
                    };
                    error!(key, "{err}");
                    return SyncOutcome::Failed {
                        error: err.to_string(),
                    };
                }
                ctx.stats.record_synced(record.size);
                info!(key, size = record.size, "Synced: {key}");
                SyncOutcome::Synced { bytes: record.size }
            }
            Err(e) => {
                if outcome.attempts >= ctx.options.retry.max_retries {
                    ctx.stats.record_retries_exhausted();
                } else {
                    ctx.stats.record_failed();
                }
                error!(
                    key,
                    attempts = outcome.attempts,
                    "Failed to sync {key} after {} attempts: {e}",
                    outcome.attempts
                );
                SyncOutcome::Failed {
                    error: e.to_string(),
                }
            }
        }
    }

    /// Change detection followed by the transfer, once
    async fn attempt_object(
        &self,
        ctx: &JobContext<'_>,
        record: &ObjectRecord,
    ) -> Result<AttemptResult> {
        let key = record.key.as_str();

        let dest_meta = match self.dest.head_object(ctx.dest_bucket, key).await {
            Ok(meta) => Some(meta),
            Err(e) if e.is_not_found() => None,
            Err(e) => return Err(e),
        };

        let dest_etag = dest_meta.as_ref().map(|m| normalize_etag(&m.etag));
        let src_etag = if dest_meta.is_some() && !ctx.options.force && record.etag.is_empty() {
            normalize_etag(&self.source.head_object(ctx.source_bucket, key).await?.etag)
        } else {
            record.etag.clone()
        };

        if !needs_transfer(
            dest_meta.is_some(),
            &src_etag,
            dest_etag.as_deref(),
            ctx.options.force,
        ) {
            if is_multipart_etag(&src_etag) {
                debug!(key, etag = %src_etag, "Unchanged by multipart entity tag");
            }
            return Ok(AttemptResult::Unchanged);
        }

        if ctx.options.dry_run {
            return Ok(AttemptResult::WouldTransfer);
        }

        ctx.transferrer
            .transfer(key, ctx.source_bucket, ctx.dest_bucket)
            .await?;
        Ok(AttemptResult::Transferred)
    }

    async fn checkpoint(
        &self,
        job: &SyncJob,
        full: &[ObjectRecord],
        filtered: &[ObjectRecord],
        stats: &StatsCollector,
    ) {
        let Some(store) = &self.state_store else {
            return;
        };

        let state = SyncState {
            source_container: job.source_bucket.clone(),
            dest_container: job.dest_bucket.clone(),
            prefix: job.prefix.clone(),
            full_object_list: full.to_vec(),
            filtered_object_list: filtered.to_vec(),
            stats: stats.snapshot(),
            options: job.options.clone(),
        };

        let path = store.path().to_path_buf();
        let store = store.clone();
        match tokio::task::spawn_blocking(move || store.save(&state)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(error = %e, path = %path.display(), "Failed to save state"),
            Err(e) => warn!(error = %e, path = %path.display(), "State save task failed"),
        }
    }

    /// Remove the snapshot of a job that has nothing left to resume
    async fn discard_snapshot(&self) {
        let Some(store) = self.state_store.clone() else {
            return;
        };
        match tokio::task::spawn_blocking(move || store.delete()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(error = %e, "Failed to delete state snapshot"),
            Err(e) => warn!(error = %e, "State delete task failed"),
        }
    }

    /// Final checkpoint and summary for an interrupted job
    async fn interrupt(
        &self,
        job: &SyncJob,
        full: &[ObjectRecord],
        filtered: &[ObjectRecord],
        stats: &StatsCollector,
    ) -> Error {
        self.checkpoint(job, full, filtered, stats).await;
        warn!("Sync interrupted\n{}", stats.snapshot().report());
        Error::Interrupted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoint::EndpointIdentity;
    use crate::traits::{ListResult, MockObjectStore, ObjectMetadata};
    use std::sync::atomic::{AtomicU32, Ordering};

    fn endpoint(url: &str) -> EndpointIdentity {
        EndpointIdentity::parse(url).unwrap()
    }

    fn store_at(url: &'static str) -> MockObjectStore {
        let mut store = MockObjectStore::new();
        store.expect_endpoint().returning(move || endpoint(url));
        store
    }

    fn fast_options() -> SyncOptions {
        let mut options = SyncOptions::default();
        options.retry.base_delay_ms = 1;
        options.retry.max_delay_ms = 1;
        options
    }

    #[test]
    fn test_outcome_serialization() {
        let json = |o: &SyncOutcome| serde_json::to_string(o).unwrap();
        assert_eq!(json(&SyncOutcome::Synced { bytes: 3 }), r#"{"success":true}"#);
        assert_eq!(
            json(&SyncOutcome::Skipped),
            r#"{"success":true,"skipped":true}"#
        );
        assert_eq!(
            json(&SyncOutcome::DryRun),
            r#"{"success":true,"dryRun":true}"#
        );
        assert_eq!(
            json(&SyncOutcome::Failed {
                error: "boom".into()
            }),
            r#"{"success":false,"error":"boom"}"#
        );
    }

    #[test]
    fn test_mode_fixed_at_construction() {
        let same = Syncer::new(
            Arc::new(store_at("https://s3.example.com")),
            Arc::new(store_at("https://S3.example.com/")),
        );
        assert_eq!(same.mode(), TransferMode::ServerSideCopy);

        let cross = Syncer::new(
            Arc::new(store_at("https://a.example.com")),
            Arc::new(store_at("https://b.example.com")),
        );
        assert_eq!(cross.mode(), TransferMode::DownloadUpload);
    }

    #[tokio::test]
    async fn test_sync_object_skips_equal_tags() {
        let source = store_at("https://a.example.com");
        let mut dest = store_at("https://b.example.com");
        dest.expect_head_object().returning(|_, _| {
            Ok(ObjectMetadata {
                etag: "\"tagA\"".into(),
                ..Default::default()
            })
        });

        let syncer = Syncer::new(Arc::new(source), Arc::new(dest));
        let record = ObjectRecord::new("k1", 5, "tagA");
        let outcome = syncer
            .sync_object(&record, "src", "dst", &SyncOptions::default())
            .await;
        assert_eq!(outcome, SyncOutcome::Skipped);
    }

    #[tokio::test]
    async fn test_dry_run_never_transfers() {
        let source = store_at("https://a.example.com");
        let mut dest = store_at("https://b.example.com");
        dest.expect_head_object()
            .returning(|_, k| Err(Error::NotFound(k.to_string())));
        dest.expect_put_object().never();
        dest.expect_copy_object().never();

        let syncer = Syncer::new(Arc::new(source), Arc::new(dest));
        let options = SyncOptions {
            dry_run: true,
            ..Default::default()
        };
        let outcome = syncer
            .sync_object(&ObjectRecord::new("k1", 5, "t"), "src", "dst", &options)
            .await;
        assert_eq!(outcome, SyncOutcome::DryRun);
    }

    #[tokio::test]
    async fn test_missing_source_etag_is_probed() {
        let mut source = store_at("https://a.example.com");
        source.expect_head_object().times(1).returning(|_, _| {
            Ok(ObjectMetadata {
                etag: "same".into(),
                ..Default::default()
            })
        });
        let mut dest = store_at("https://b.example.com");
        dest.expect_head_object().returning(|_, _| {
            Ok(ObjectMetadata {
                etag: "same".into(),
                ..Default::default()
            })
        });

        let syncer = Syncer::new(Arc::new(source), Arc::new(dest));
        let outcome = syncer
            .sync_object(&ObjectRecord::new("k", 1, ""), "src", "dst", &SyncOptions::default())
            .await;
        assert_eq!(outcome, SyncOutcome::Skipped);
    }

    #[tokio::test]
    async fn test_probe_error_is_retried_then_fails() {
        let source = store_at("https://a.example.com");
        let mut dest = store_at("https://b.example.com");
        let probes = Arc::new(AtomicU32::new(0));
        let counter = probes.clone();
        dest.expect_head_object().returning(move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(Error::Connection("reset by peer".into()))
        });
        dest.expect_list_objects().never();

        let syncer = Syncer::new(Arc::new(source), Arc::new(dest));
        let stats = StatsCollector::new();
        let options = fast_options();
        let ctx = JobContext {
            source_bucket: "src",
            dest_bucket: "dst",
            options: &options,
            transferrer: Transferrer::new(
                syncer.source.as_ref(),
                syncer.dest.as_ref(),
                syncer.mode,
            ),
            stats: &stats,
        };

        let outcome = syncer
            .process_object(&ctx, &ObjectRecord::new("k", 1, "t"))
            .await;
        assert!(!outcome.is_success());
        assert_eq!(probes.load(Ordering::SeqCst), 3);

        let s = stats.snapshot();
        assert_eq!(s.failed_files, 1);
        assert_eq!(s.retry_count, 1);
    }

    #[tokio::test]
    async fn test_test_connections_reports_failure() {
        let mut source = store_at("https://a.example.com");
        source
            .expect_list_objects()
            .withf(|_, opts| opts.max_keys == Some(1))
            .returning(|_, _| Ok(ListResult::default()));
        let mut dest = store_at("https://b.example.com");
        dest.expect_list_objects()
            .returning(|b, _| Err(Error::NotFound(b.to_string())));

        let syncer = Syncer::new(Arc::new(source), Arc::new(dest));
        assert!(!syncer.test_connections("src", "missing").await);
    }
}
