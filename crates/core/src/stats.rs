//! Running counters, throughput and ETA
//!
//! [`StatsCollector`] is the single accumulator shared by every in-flight
//! object task. [`SyncStats`] is its plain snapshot, used for progress
//! callbacks, checkpoints and the final report.

use std::fmt;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use jiff::Timestamp;
use serde::{Deserialize, Serialize};

/// Snapshot of a job's counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SyncStats {
    pub total_files: u64,
    pub synced_files: u64,
    pub skipped_files: u64,
    pub failed_files: u64,
    pub total_size: u64,
    pub synced_size: u64,
    pub retry_count: u64,
    pub checksum_mismatches: u64,
    pub start_time: Option<Timestamp>,
    pub end_time: Option<Timestamp>,
}

impl SyncStats {
    /// Objects that reached a terminal outcome
    pub fn processed(&self) -> u64 {
        self.synced_files + self.skipped_files + self.failed_files
    }

    /// Time between start and end, or start and `now` while running
    pub fn elapsed(&self, now: Timestamp) -> Duration {
        let Some(start) = self.start_time else {
            return Duration::ZERO;
        };
        let end = self.end_time.unwrap_or(now);
        end.duration_since(start)
            .try_into()
            .unwrap_or(Duration::ZERO)
    }

    pub fn files_per_sec(&self, elapsed: Duration) -> f64 {
        per_second(self.synced_files, elapsed)
    }

    pub fn bytes_per_sec(&self, elapsed: Duration) -> f64 {
        per_second(self.synced_size, elapsed)
    }

    /// Estimated time left for `remaining` objects at the current processing rate
    pub fn eta(&self, remaining: u64, elapsed: Duration) -> Option<Duration> {
        if remaining == 0 {
            return Some(Duration::ZERO);
        }
        let rate = per_second(self.processed(), elapsed);
        if rate <= 0.0 {
            return None;
        }
        Some(Duration::from_secs_f64(remaining as f64 / rate))
    }

    /// Final summary, rendered at report time
    pub fn report(&self) -> SyncReport<'_> {
        SyncReport {
            stats: self,
            elapsed: self.elapsed(Timestamp::now()),
        }
    }
}

fn per_second(count: u64, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64();
    if secs > 0.0 { count as f64 / secs } else { 0.0 }
}

/// Human-readable job summary
pub struct SyncReport<'a> {
    stats: &'a SyncStats,
    elapsed: Duration,
}

impl fmt::Display for SyncReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = self.stats;
        writeln!(f, "Sync statistics:")?;
        writeln!(f, "  Synced:  {} files ({})", s.synced_files, format_bytes(s.synced_size))?;
        writeln!(f, "  Skipped: {} files", s.skipped_files)?;
        writeln!(f, "  Failed:  {} files", s.failed_files)?;
        write!(f, "  Total:   {} files ({})", s.total_files, format_bytes(s.total_size))?;
        if s.retry_count > 0 {
            write!(f, "\n  Retries exhausted: {} files", s.retry_count)?;
        }
        if s.checksum_mismatches > 0 {
            write!(f, "\n  Checksum mismatches: {} files", s.checksum_mismatches)?;
        }
        if !self.elapsed.is_zero() {
            write!(f, "\n  Duration: {}", format_duration(self.elapsed))?;
            write!(f, "\n  Rate: {:.2} files/sec", s.files_per_sec(self.elapsed))?;
            write!(
                f,
                "\n  Throughput: {}/sec",
                format_bytes(s.bytes_per_sec(self.elapsed) as u64)
            )?;
        }
        Ok(())
    }
}

/// Format bytes using binary units
pub fn format_bytes(bytes: u64) -> String {
    humansize::format_size(bytes, humansize::BINARY)
}

/// Compact duration: `42s`, `3m 5s`, `2h 14m`
pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{secs}s")
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m", secs / 3600, (secs % 3600) / 60)
    }
}

/// Thread-safe accumulator for a single job
#[derive(Debug, Default)]
pub struct StatsCollector {
    total_files: AtomicU64,
    synced_files: AtomicU64,
    skipped_files: AtomicU64,
    failed_files: AtomicU64,
    total_size: AtomicU64,
    synced_size: AtomicU64,
    retry_count: AtomicU64,
    checksum_mismatches: AtomicU64,
    times: Mutex<(Option<Timestamp>, Option<Timestamp>)>,
}

impl StatsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a collector from a checkpointed snapshot
    pub fn from_snapshot(stats: &SyncStats) -> Self {
        let collector = Self::new();
        collector.total_files.store(stats.total_files, Ordering::Relaxed);
        collector.synced_files.store(stats.synced_files, Ordering::Relaxed);
        collector.skipped_files.store(stats.skipped_files, Ordering::Relaxed);
        collector.failed_files.store(stats.failed_files, Ordering::Relaxed);
        collector.total_size.store(stats.total_size, Ordering::Relaxed);
        collector.synced_size.store(stats.synced_size, Ordering::Relaxed);
        collector.retry_count.store(stats.retry_count, Ordering::Relaxed);
        collector
            .checksum_mismatches
            .store(stats.checksum_mismatches, Ordering::Relaxed);
        *collector.lock_times() = (stats.start_time, stats.end_time);
        collector
    }

    fn lock_times(&self) -> std::sync::MutexGuard<'_, (Option<Timestamp>, Option<Timestamp>)> {
        self.times.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Stamp the start time unless a resumed snapshot already carries one
    pub fn mark_started(&self) {
        let mut times = self.lock_times();
        if times.0.is_none() {
            times.0 = Some(Timestamp::now());
        }
        times.1 = None;
    }

    pub fn mark_finished(&self) {
        self.lock_times().1 = Some(Timestamp::now());
    }

    pub fn set_totals(&self, files: u64, bytes: u64) {
        self.total_files.store(files, Ordering::Relaxed);
        self.total_size.store(bytes, Ordering::Relaxed);
    }

    pub fn record_synced(&self, bytes: u64) {
        self.synced_files.fetch_add(1, Ordering::Relaxed);
        self.synced_size.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn record_skipped(&self) {
        self.skipped_files.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failed(&self) {
        self.failed_files.fetch_add(1, Ordering::Relaxed);
    }

    /// An object used up every attempt
    pub fn record_retries_exhausted(&self) {
        self.retry_count.fetch_add(1, Ordering::Relaxed);
        self.failed_files.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_checksum_mismatch(&self) {
        self.checksum_mismatches.fetch_add(1, Ordering::Relaxed);
        self.failed_files.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> SyncStats {
        let (start_time, end_time) = *self.lock_times();
        SyncStats {
            total_files: self.total_files.load(Ordering::Relaxed),
            synced_files: self.synced_files.load(Ordering::Relaxed),
            skipped_files: self.skipped_files.load(Ordering::Relaxed),
            failed_files: self.failed_files.load(Ordering::Relaxed),
            total_size: self.total_size.load(Ordering::Relaxed),
            synced_size: self.synced_size.load(Ordering::Relaxed),
            retry_count: self.retry_count.load(Ordering::Relaxed),
            checksum_mismatches: self.checksum_mismatches.load(Ordering::Relaxed),
            start_time,
            end_time,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_secs(42)), "42s");
        assert_eq!(format_duration(Duration::from_secs(185)), "3m 5s");
        assert_eq!(format_duration(Duration::from_secs(8040)), "2h 14m");
    }

    #[test]
    fn test_rates() {
        let stats = SyncStats {
            synced_files: 10,
            synced_size: 2048,
            ..Default::default()
        };
        let elapsed = Duration::from_secs(4);
        assert_eq!(stats.files_per_sec(elapsed), 2.5);
        assert_eq!(stats.bytes_per_sec(elapsed), 512.0);
        assert_eq!(stats.files_per_sec(Duration::ZERO), 0.0);
    }

    #[test]
    fn test_eta() {
        let stats = SyncStats {
            synced_files: 8,
            skipped_files: 2,
            ..Default::default()
        };
        let elapsed = Duration::from_secs(5);
        assert_eq!(stats.eta(20, elapsed), Some(Duration::from_secs(10)));
        assert_eq!(stats.eta(0, elapsed), Some(Duration::ZERO));
        assert_eq!(SyncStats::default().eta(5, elapsed), None);
    }

    #[test]
    fn test_elapsed_uses_end_time() {
        let start = Timestamp::from_second(1_000).unwrap();
        let stats = SyncStats {
            start_time: Some(start),
            end_time: Some(Timestamp::from_second(1_090).unwrap()),
            ..Default::default()
        };
        let later = Timestamp::from_second(5_000).unwrap();
        assert_eq!(stats.elapsed(later), Duration::from_secs(90));
    }

    #[test]
    fn test_collector_outcomes() {
        let c = StatsCollector::new();
        c.set_totals(4, 300);
        c.record_synced(100);
        c.record_skipped();
        c.record_retries_exhausted();
        c.record_checksum_mismatch();

        let s = c.snapshot();
        assert_eq!(s.total_files, 4);
        assert_eq!(s.synced_files, 1);
        assert_eq!(s.synced_size, 100);
        assert_eq!(s.skipped_files, 1);
        assert_eq!(s.failed_files, 2);
        assert_eq!(s.retry_count, 1);
        assert_eq!(s.checksum_mismatches, 1);
        assert_eq!(s.processed(), 4);
    }

    #[test]
    fn test_concurrent_increments_are_not_lost() {
        let c = Arc::new(StatsCollector::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let c = c.clone();
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        c.record_synced(1);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        let s = c.snapshot();
        assert_eq!(s.synced_files, 8000);
        assert_eq!(s.synced_size, 8000);
    }

    #[test]
    fn test_snapshot_round_trip_through_collector() {
        let original = SyncStats {
            total_files: 3,
            synced_files: 1,
            start_time: Some(Timestamp::from_second(1_000).unwrap()),
            ..Default::default()
        };
        let restored = StatsCollector::from_snapshot(&original);
        restored.mark_started();
        assert_eq!(restored.snapshot(), original);
    }

    #[test]
    fn test_report_mentions_failures() {
        let stats = SyncStats {
            total_files: 2,
            synced_files: 1,
            failed_files: 1,
            checksum_mismatches: 1,
            ..Default::default()
        };
        let text = stats.report().to_string();
        assert!(text.contains("Failed:  1 files"));
        assert!(text.contains("Checksum mismatches: 1"));
        assert!(!text.contains("Duration"));
    }
}
