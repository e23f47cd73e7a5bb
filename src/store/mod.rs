//! Time-Series Store — bounded per-series point buffer with time-window
//! queries and percentile math (`spec.md` §4.2).
//!
//! Grounded on `other_examples/`'s DriftDB `monitoring.rs`
//! (`PercentileTracker` pairing a `VecDeque` ring with a lock), adapted to
//! the spec's "single-writer-per-series" reader/writer split: one
//! `parking_lot::RwLock<HashMap<_, _>>` guards the top-level map of
//! series (new-series inserts are rare — at most one per collector tick),
//! and each series' own `parking_lot::Mutex<SeriesData>` guards its ring
//! independently, so appends to series A never block reads of series B.

pub mod series;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};

use crate::error::{OptimizerError, Result};
use crate::telemetry::ResourceKind;

pub use series::{Percentiles, Point};
use series::SeriesData;

/// Identifies a series: a resource kind + optional namespace + name,
/// exactly the `{kind}/{name}` pairing in `spec.md` §3 (namespace is
/// carried alongside since pod/HPA names are only unique within a
/// namespace).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SeriesKey {
    pub kind: ResourceKind,
    pub namespace: Option<String>,
    pub name: String,
}

impl SeriesKey {
    pub fn new(kind: ResourceKind, namespace: Option<String>, name: impl Into<String>) -> Self {
        Self {
            kind,
            namespace,
            name: name.into(),
        }
    }
}

type SeriesId = (SeriesKey, String);

/// Bounded, concurrent, multi-series point store.
pub struct TimeSeriesStore {
    capacity_per_series: usize,
    series: RwLock<HashMap<SeriesId, Arc<Mutex<SeriesData>>>>,
    by_metric: RwLock<HashMap<String, HashSet<SeriesKey>>>,
}

impl TimeSeriesStore {
    pub fn new(capacity_per_series: usize) -> Self {
        Self {
            capacity_per_series: capacity_per_series.max(1),
            series: RwLock::new(HashMap::new()),
            by_metric: RwLock::new(HashMap::new()),
        }
    }

    fn series_handle(&self, key: &SeriesKey, metric: &str) -> Arc<Mutex<SeriesData>> {
        let id: SeriesId = (key.clone(), metric.to_string());
        if let Some(existing) = self.series.read().get(&id) {
            return existing.clone();
        }
        let mut write_guard = self.series.write();
        write_guard
            .entry(id)
            .or_insert_with(|| Arc::new(Mutex::new(SeriesData::new(self.capacity_per_series))))
            .clone()
    }

    /// Appends one point to the named series' metric. Rejects points
    /// older than the series' newest point (monotonicity). Evicts the
    /// oldest point before writing when the series is at capacity.
    pub fn append(&self, key: &SeriesKey, metric: &str, point: Point) -> Result<()> {
        let handle = self.series_handle(key, metric);
        let accepted = handle.lock().append(point);
        if accepted {
            self.by_metric
                .write()
                .entry(metric.to_string())
                .or_default()
                .insert(key.clone());
            Ok(())
        } else {
            Err(OptimizerError::internal(format!(
                "out-of-order point rejected for {:?}/{metric}",
                key
            )))
        }
    }

    /// Points in `[now_nanos - window, now_nanos]`, oldest first. Empty
    /// if the series doesn't exist or has no points in range.
    pub fn range(&self, key: &SeriesKey, metric: &str, window: Duration, now_nanos: i64) -> Vec<Point> {
        let id: SeriesId = (key.clone(), metric.to_string());
        let Some(handle) = self.series.read().get(&id).cloned() else {
            return Vec::new();
        };
        let since = now_nanos.saturating_sub(window.as_nanos() as i64);
        handle.lock().range(since, now_nanos)
    }

    /// P50/P95/P99 over the window via linear interpolation. Fails with
    /// `InsufficientData` when fewer than `minimum_data_points` values
    /// fall in the window.
    pub fn percentiles(
        &self,
        key: &SeriesKey,
        metric: &str,
        window: Duration,
        now_nanos: i64,
        minimum_data_points: usize,
    ) -> Result<Percentiles> {
        let points = self.range(key, metric, window, now_nanos);
        if points.len() < minimum_data_points {
            return Err(OptimizerError::InsufficientData(format!(
                "{:?}/{metric}: {} points, need {minimum_data_points}",
                key,
                points.len()
            )));
        }
        let values: Vec<f64> = points.iter().map(|p| p.value).collect();
        series::percentiles_of(values)
            .ok_or_else(|| OptimizerError::InsufficientData(format!("{:?}/{metric}: empty range", key)))
    }

    /// Drops points older than `cutoff_nanos` across every series. Safe
    /// to call concurrently with `append`/`range` (each series' own lock
    /// serializes against its own writers/readers).
    pub fn evict_older_than(&self, cutoff_nanos: i64) {
        let handles: Vec<Arc<Mutex<SeriesData>>> = self.series.read().values().cloned().collect();
        for handle in handles {
            handle.lock().evict_older_than(cutoff_nanos);
        }
    }

    /// Total point count across every series (observability).
    pub fn size(&self) -> usize {
        self.series.read().values().map(|h| h.lock().len()).sum()
    }

    /// All known series keys for a metric name (observability /
    /// enumeration; used by the analyzer to discover a deployment's pod
    /// series without re-deriving capacity bookkeeping).
    pub fn keys(&self, metric: &str) -> Vec<SeriesKey> {
        self.by_metric
            .read()
            .get(metric)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }
}
