//! Usage ledger.
//!
//! Counters are kept per `(date, provider)` bucket. Each bucket is a set of
//! atomics behind an `Arc`, so recording for one provider never waits on
//! another: the map lock is held only long enough to look up (or, once per
//! bucket, insert) the `Arc`.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use chrono::NaiveDate;
use llmgate_core::{DateRange, UsageRecord, UsageSummary, UsageTotals};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, instrument, warn};

use crate::error::StoreError;
use crate::persistence::{load_json_or_default, save_json};

/// On-disk shape: date → provider → counters.
type UsageFile = BTreeMap<NaiveDate, BTreeMap<String, UsageTotals>>;

type BucketKey = (NaiveDate, String);

// ============================================================================
// Bucket
// ============================================================================

#[derive(Debug, Default)]
struct Bucket {
    requests: AtomicU64,
    tokens_in: AtomicU64,
    tokens_out: AtomicU64,
    errors: AtomicU64,
}

impl Bucket {
    fn from_totals(totals: &UsageTotals) -> Self {
        Self {
            requests: AtomicU64::new(totals.request_count),
            tokens_in: AtomicU64::new(totals.tokens_in),
            tokens_out: AtomicU64::new(totals.tokens_out),
            errors: AtomicU64::new(totals.error_count),
        }
    }

    fn totals(&self) -> UsageTotals {
        let tokens_in = self.tokens_in.load(Ordering::Relaxed);
        let tokens_out = self.tokens_out.load(Ordering::Relaxed);
        UsageTotals {
            request_count: self.requests.load(Ordering::Relaxed),
            token_count: tokens_in.saturating_add(tokens_out),
            tokens_in,
            tokens_out,
            error_count: self.errors.load(Ordering::Relaxed),
        }
    }
}

// ============================================================================
// Usage Ledger
// ============================================================================

/// Per-day, per-provider usage counters with periodic persistence.
///
/// Counters only ever grow. The ledger is the sole writer of its file.
pub struct UsageLedger {
    buckets: RwLock<HashMap<BucketKey, Arc<Bucket>>>,
    path: PathBuf,
    dirty: AtomicBool,
    flush_lock: Mutex<()>,
}

impl UsageLedger {
    /// Creates an empty ledger persisting to `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            buckets: RwLock::new(HashMap::new()),
            path: path.into(),
            dirty: AtomicBool::new(false),
            flush_lock: Mutex::new(()),
        }
    }

    /// Loads the ledger from `path`; a missing file gives an empty ledger.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub async fn load(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let file: UsageFile = load_json_or_default(&path).await?;

        let mut buckets = HashMap::new();
        for (date, providers) in file {
            for (provider, totals) in providers {
                buckets.insert((date, provider), Arc::new(Bucket::from_totals(&totals)));
            }
        }
        debug!(path = %path.display(), buckets = buckets.len(), "Usage ledger loaded");

        Ok(Self {
            buckets: RwLock::new(buckets),
            path,
            dirty: AtomicBool::new(false),
            flush_lock: Mutex::new(()),
        })
    }

    /// Returns the backing file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn bucket(&self, provider_id: &str, date: NaiveDate) -> Arc<Bucket> {
        let key = (date, provider_id.to_string());
        if let Some(bucket) = self.buckets.read().await.get(&key) {
            return bucket.clone();
        }
        self.buckets.write().await.entry(key).or_default().clone()
    }

    /// Records one successful request.
    pub async fn record(&self, provider_id: &str, date: NaiveDate, tokens_in: u64, tokens_out: u64) {
        let bucket = self.bucket(provider_id, date).await;
        bucket.requests.fetch_add(1, Ordering::Relaxed);
        bucket.tokens_in.fetch_add(tokens_in, Ordering::Relaxed);
        bucket.tokens_out.fetch_add(tokens_out, Ordering::Relaxed);
        self.dirty.store(true, Ordering::Release);
    }

    /// Records one failed request.
    pub async fn record_error(&self, provider_id: &str, date: NaiveDate) {
        let bucket = self.bucket(provider_id, date).await;
        bucket.requests.fetch_add(1, Ordering::Relaxed);
        bucket.errors.fetch_add(1, Ordering::Relaxed);
        self.dirty.store(true, Ordering::Release);
    }

    /// Returns every record, unordered.
    pub async fn records(&self) -> Vec<UsageRecord> {
        let buckets = self.buckets.read().await;
        buckets
            .iter()
            .map(|((date, provider), bucket)| {
                let t = bucket.totals();
                UsageRecord {
                    date: *date,
                    provider_id: provider.clone(),
                    request_count: t.request_count,
                    token_count: t.token_count,
                    tokens_in: t.tokens_in,
                    tokens_out: t.tokens_out,
                    error_count: t.error_count,
                }
            })
            .collect()
    }

    /// Aggregates counts over `range`, optionally for one provider.
    pub async fn query(&self, range: DateRange, provider_id: Option<&str>) -> UsageSummary {
        let records = self.records().await;
        UsageSummary::aggregate(range, provider_id, &records)
    }

    /// Returns true if there are changes not yet flushed.
    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Acquire)
    }

    /// Writes the ledger to disk if it changed since the last flush.
    ///
    /// Returns whether a write happened.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails; the ledger stays dirty.
    #[instrument(skip(self), fields(path = %self.path.display()))]
    pub async fn flush(&self) -> Result<bool, StoreError> {
        let _guard = self.flush_lock.lock().await;

        if !self.dirty.swap(false, Ordering::AcqRel) {
            return Ok(false);
        }

        let mut file = UsageFile::new();
        for record in self.records().await {
            file.entry(record.date)
                .or_default()
                .insert(record.provider_id.clone(), record.totals());
        }

        if let Err(e) = save_json(&self.path, &file).await {
            self.dirty.store(true, Ordering::Release);
            warn!(error = %e, "Usage flush failed");
            return Err(e);
        }

        info!(days = file.len(), "Usage ledger flushed");
        Ok(true)
    }
}

impl std::fmt::Debug for UsageLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UsageLedger")
            .field("path", &self.path)
            .field("dirty", &self.is_dirty())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, d).unwrap()
    }

    #[tokio::test]
    async fn test_record_and_query() {
        let dir = TempDir::new().unwrap();
        let ledger = UsageLedger::new(dir.path().join("usage.json"));

        ledger.record("openai", day(1), 10, 5).await;
        ledger.record("openai", day(1), 1, 1).await;
        ledger.record_error("groq", day(2)).await;

        let summary = ledger.query(DateRange::new(day(1), day(2)).unwrap(), None).await;
        assert_eq!(summary.totals.request_count, 3);
        assert_eq!(summary.totals.token_count, 17);
        assert_eq!(summary.totals.error_count, 1);
        assert_eq!(summary.providers["openai"].tokens_in, 11);

        let groq = ledger.query(DateRange::single(day(2)), Some("groq")).await;
        assert_eq!(groq.totals.request_count, 1);
        assert_eq!(groq.totals.token_count, 0);
    }

    #[tokio::test]
    async fn test_concurrent_records_are_not_lost() {
        let dir = TempDir::new().unwrap();
        let ledger = Arc::new(UsageLedger::new(dir.path().join("usage.json")));

        let tasks: Vec<_> = (0..200)
            .map(|i| {
                let ledger = ledger.clone();
                let provider = if i % 2 == 0 { "a" } else { "b" };
                tokio::spawn(async move { ledger.record(provider, day(3), 2, 3).await })
            })
            .collect();
        futures::future::join_all(tasks).await;

        let summary = ledger.query(DateRange::single(day(3)), None).await;
        assert_eq!(summary.totals.request_count, 200);
        assert_eq!(summary.providers["a"].request_count, 100);
        assert_eq!(summary.totals.token_count, 1_000);
    }

    #[tokio::test]
    async fn test_flush_and_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("usage.json");
        let ledger = UsageLedger::new(&path);

        assert!(!ledger.flush().await.unwrap(), "clean ledger should not write");

        ledger.record("openai", day(4), 7, 8).await;
        assert!(ledger.is_dirty());
        assert!(ledger.flush().await.unwrap());
        assert!(!ledger.is_dirty());

        let reloaded = UsageLedger::load(&path).await.unwrap();
        let summary = reloaded.query(DateRange::single(day(4)), Some("openai")).await;
        assert_eq!(summary.totals.request_count, 1);
        assert_eq!(summary.totals.tokens_out, 8);
    }

    #[tokio::test]
    async fn test_file_is_keyed_by_date_then_provider() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("usage.json");
        let ledger = UsageLedger::new(&path);
        ledger.record("openai", day(5), 1, 2).await;
        ledger.flush().await.unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&tokio::fs::read_to_string(&path).await.unwrap()).unwrap();
        assert_eq!(raw["2025-06-05"]["openai"]["requestCount"], 1);
        assert_eq!(raw["2025-06-05"]["openai"]["tokenCount"], 3);
    }
}
