//! Per-data-source query counting, scoped to a unit of work.
//!
//! A [`QueryCountRegistry`] tallies executed queries per logical data-source
//! name. It is not a lifetime-of-process accumulator: the caller scopes a
//! registry to a unit of work (one request, one job run) with
//! [`QueryCountRegistry::scope`], reads it with [`snapshots`] /
//! [`report`], and resets it with [`clear`] at the unit-of-work boundary.
//! Concurrent units of work scoped to distinct registries never observe each
//! other's counts.
//!
//! Wrappers find the active registry through a task-local key; with no scope
//! active, recording is a no-op. There is no implicit global registry.
//!
//! [`snapshots`]: QueryCountRegistry::snapshots
//! [`report`]: QueryCountRegistry::report
//! [`clear`]: QueryCountRegistry::clear

use crate::record::QueryRecord;
use crate::sql::StatementKind;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

tokio::task_local! {
    static CURRENT_REGISTRY: Arc<QueryCountRegistry>;
}

/// Atomic per-data-source counters.
#[derive(Debug, Default)]
pub struct QueryCount {
    select: AtomicU64,
    insert: AtomicU64,
    update: AtomicU64,
    delete: AtomicU64,
    other: AtomicU64,
    success: AtomicU64,
    failure: AtomicU64,
    total_time_nanos: AtomicU64,
}

impl QueryCount {
    fn increment_kind(&self, kind: StatementKind) {
        let counter = match kind {
            StatementKind::Select => &self.select,
            StatementKind::Insert => &self.insert,
            StatementKind::Update => &self.update,
            StatementKind::Delete => &self.delete,
            StatementKind::Other => &self.other,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn increment_outcome(&self, success: bool) {
        let counter = if success { &self.success } else { &self.failure };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn add_time(&self, elapsed: Duration) {
        let nanos = u64::try_from(elapsed.as_nanos()).unwrap_or(u64::MAX);
        let prev = self.total_time_nanos.fetch_add(nanos, Ordering::Relaxed);
        if prev.checked_add(nanos).is_none() {
            // Saturate instead of wrapping on overflow.
            self.total_time_nanos.store(u64::MAX, Ordering::Relaxed);
        }
    }

    /// Get a snapshot of the current counter values.
    pub fn snapshot(&self) -> QueryCountSnapshot {
        QueryCountSnapshot {
            select: self.select.load(Ordering::Relaxed),
            insert: self.insert.load(Ordering::Relaxed),
            update: self.update.load(Ordering::Relaxed),
            delete: self.delete.load(Ordering::Relaxed),
            other: self.other.load(Ordering::Relaxed),
            success: self.success.load(Ordering::Relaxed),
            failure: self.failure.load(Ordering::Relaxed),
            total_time: Duration::from_nanos(self.total_time_nanos.load(Ordering::Relaxed)),
        }
    }
}

/// Plain snapshot of one data source's counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryCountSnapshot {
    /// Number of SELECT queries.
    pub select: u64,
    /// Number of INSERT queries.
    pub insert: u64,
    /// Number of UPDATE queries.
    pub update: u64,
    /// Number of DELETE queries.
    pub delete: u64,
    /// Number of queries of any other kind.
    pub other: u64,
    /// Queries that completed successfully.
    pub success: u64,
    /// Queries whose call failed.
    pub failure: u64,
    /// Accumulated wall-clock time of the counted calls.
    pub total_time: Duration,
}

impl QueryCountSnapshot {
    /// Total number of counted queries.
    pub fn total(&self) -> u64 {
        self.select + self.insert + self.update + self.delete + self.other
    }

    /// One-line summary, used by [`QueryCountRegistry::report`].
    pub fn summary(&self, data_source: &str) -> String {
        format!(
            "datasource:{data_source} time:{}ms total:{} success:{} failure:{} \
             select:{} insert:{} update:{} delete:{} other:{}",
            self.total_time.as_millis(),
            self.total(),
            self.success,
            self.failure,
            self.select,
            self.insert,
            self.update,
            self.delete,
            self.other,
        )
    }

    /// JSON rendering with millisecond timing.
    pub fn to_json(&self, data_source: &str) -> serde_json::Value {
        serde_json::json!({
            "datasource": data_source,
            "time_ms": self.total_time.as_millis() as u64,
            "total": self.total(),
            "success": self.success,
            "failure": self.failure,
            "select": self.select,
            "insert": self.insert,
            "update": self.update,
            "delete": self.delete,
            "other": self.other,
        })
    }
}

/// Per-unit-of-work aggregator of query counts, keyed by data-source name.
///
/// Entries appear lazily: a data-source name shows up on its first counted
/// query, independent of how wrappers were configured.
#[derive(Debug, Default)]
pub struct QueryCountRegistry {
    counts: Mutex<HashMap<String, Arc<QueryCount>>>,
}

impl QueryCountRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `future` with `registry` installed as the current scope's
    /// registry. Nested scopes shadow outer ones for their duration.
    pub async fn scope<F>(registry: Arc<QueryCountRegistry>, future: F) -> F::Output
    where
        F: Future,
    {
        CURRENT_REGISTRY.scope(registry, future).await
    }

    /// Synchronous variant of [`QueryCountRegistry::scope`].
    pub fn sync_scope<T>(registry: Arc<QueryCountRegistry>, f: impl FnOnce() -> T) -> T {
        CURRENT_REGISTRY.sync_scope(registry, f)
    }

    /// The registry installed for the current task scope, if any.
    pub fn current() -> Option<Arc<QueryCountRegistry>> {
        CURRENT_REGISTRY.try_with(Arc::clone).ok()
    }

    /// Count the queries of one completed call against `data_source`.
    ///
    /// Each query increments its statement-kind counter and the
    /// success/failure counter once (a batch of N queries increments N
    /// times); elapsed time accumulates once per call. A call that executed
    /// no queries touches nothing.
    pub fn record(
        &self,
        data_source: &str,
        queries: &[QueryRecord],
        success: bool,
        elapsed: Duration,
    ) {
        if queries.is_empty() {
            return;
        }
        let count = self.entry(data_source);
        for query in queries {
            count.increment_kind(StatementKind::from_sql(&query.query));
            count.increment_outcome(success);
        }
        count.add_time(elapsed);
    }

    fn entry(&self, data_source: &str) -> Arc<QueryCount> {
        let mut counts = self.counts.lock().unwrap();
        counts
            .entry(data_source.to_string())
            .or_insert_with(|| Arc::new(QueryCount::default()))
            .clone()
    }

    /// Live counter handle for one data source, if it has been observed.
    pub fn count(&self, data_source: &str) -> Option<Arc<QueryCount>> {
        let counts = self.counts.lock().unwrap();
        counts.get(data_source).cloned()
    }

    /// Snapshot of one data source's counters, if it has been observed.
    pub fn snapshot(&self, data_source: &str) -> Option<QueryCountSnapshot> {
        self.count(data_source).map(|c| c.snapshot())
    }

    /// Snapshots of every observed data source, sorted by name.
    pub fn snapshots(&self) -> Vec<(String, QueryCountSnapshot)> {
        let counts = self.counts.lock().unwrap();
        let mut all: Vec<_> = counts
            .iter()
            .map(|(name, count)| (name.clone(), count.snapshot()))
            .collect();
        drop(counts);
        all.sort_by(|(a, _), (b, _)| a.cmp(b));
        all
    }

    /// Names of the data sources observed so far, sorted.
    pub fn data_source_names(&self) -> Vec<String> {
        let counts = self.counts.lock().unwrap();
        let mut names: Vec<_> = counts.keys().cloned().collect();
        drop(counts);
        names.sort();
        names
    }

    /// Reset all counts in this registry.
    pub fn clear(&self) {
        self.counts.lock().unwrap().clear();
    }

    /// Multi-line report, one summary line per data source, name-sorted.
    pub fn report(&self) -> String {
        self.snapshots()
            .iter()
            .map(|(name, snapshot)| snapshot.summary(name))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// JSON report, one object per data source, name-sorted.
    pub fn report_json(&self) -> serde_json::Value {
        serde_json::Value::Array(
            self.snapshots()
                .iter()
                .map(|(name, snapshot)| snapshot.to_json(name))
                .collect(),
        )
    }
}
