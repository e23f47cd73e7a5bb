//! Per-series ring buffer and percentile math.
//!
//! Grounded on the `PercentileTracker` in `other_examples/`'s DriftDB
//! `monitoring.rs`: a `VecDeque`-backed buffer holding the most recent N
//! samples, percentiles computed by sorting a copy and indexing by
//! fraction. This module generalizes that single-quantile call into one
//! pass computing P50/P95/P99 together, and adds the timestamp dimension
//! (DriftDB's tracker is order-only; series here are time-ordered).

use std::collections::VecDeque;

/// One observation: a point in time paired with its value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub timestamp_nanos: i64,
    pub value: f64,
}

/// Three order statistics computed by linear interpolation, per
/// `spec.md` §4.2/GLOSSARY.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Percentiles {
    pub p50: f64,
    pub p95: f64,
    pub p99: f64,
}

/// Bounded, append-only, time-ordered buffer for a single series.
///
/// `append` rejects points whose timestamp is older than the newest
/// point already held (monotonicity, `spec.md` §3 invariant). When the
/// buffer is at capacity, the oldest point is evicted before the new one
/// is appended (backpressure, `spec.md` §5).
#[derive(Debug)]
pub struct SeriesData {
    points: VecDeque<Point>,
    capacity: usize,
}

impl SeriesData {
    pub fn new(capacity: usize) -> Self {
        Self {
            points: VecDeque::with_capacity(capacity.min(1024)),
            capacity: capacity.max(1),
        }
    }

    /// Returns `false` if `point` is older than the series' newest point
    /// (monotonicity violation) and was rejected.
    pub fn append(&mut self, point: Point) -> bool {
        if let Some(newest) = self.points.back() {
            if point.timestamp_nanos < newest.timestamp_nanos {
                return false;
            }
        }
        if self.points.len() >= self.capacity {
            self.points.pop_front();
        }
        self.points.push_back(point);
        true
    }

    /// Drops points older than `cutoff_nanos`. Idempotent.
    pub fn evict_older_than(&mut self, cutoff_nanos: i64) {
        while let Some(front) = self.points.front() {
            if front.timestamp_nanos < cutoff_nanos {
                self.points.pop_front();
            } else {
                break;
            }
        }
    }

    /// Points with `timestamp_nanos` in `[since_nanos, now_nanos]`, oldest first.
    pub fn range(&self, since_nanos: i64, now_nanos: i64) -> Vec<Point> {
        self.points
            .iter()
            .filter(|p| p.timestamp_nanos >= since_nanos && p.timestamp_nanos <= now_nanos)
            .copied()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Linear-interpolated order statistic at quantile `q` (0.0..=1.0) over
/// an already-sorted ascending slice. `sorted` must be non-empty.
pub fn interpolated_quantile(sorted: &[f64], q: f64) -> f64 {
    debug_assert!(!sorted.is_empty());
    if sorted.len() == 1 {
        return sorted[0];
    }
    let rank = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    if lower == upper {
        return sorted[lower];
    }
    let frac = rank - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * frac
}

/// Computes P50/P95/P99 in one pass over `values` (consumed, sorted in
/// place). Returns `None` if `values` is empty.
pub fn percentiles_of(mut values: Vec<f64>) -> Option<Percentiles> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    Some(Percentiles {
        p50: interpolated_quantile(&values, 0.50),
        p95: interpolated_quantile(&values, 0.95),
        p99: interpolated_quantile(&values, 0.99),
    })
}

/// Sample mean. `values` must be non-empty.
pub fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample variance (Bessel-corrected, n-1 denominator). Returns 0.0 for
/// fewer than 2 samples.
pub fn sample_variance(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let sum_sq: f64 = values.iter().map(|v| (v - m).powi(2)).sum();
    sum_sq / (values.len() - 1) as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_rejects_out_of_order() {
        let mut s = SeriesData::new(10);
        assert!(s.append(Point { timestamp_nanos: 100, value: 1.0 }));
        assert!(!s.append(Point { timestamp_nanos: 50, value: 2.0 }));
        assert_eq!(s.len(), 1);
    }

    #[test]
    fn append_allows_equal_timestamps() {
        let mut s = SeriesData::new(10);
        assert!(s.append(Point { timestamp_nanos: 100, value: 1.0 }));
        assert!(s.append(Point { timestamp_nanos: 100, value: 2.0 }));
        assert_eq!(s.len(), 2);
    }

    #[test]
    fn append_evicts_oldest_at_capacity() {
        let mut s = SeriesData::new(2);
        s.append(Point { timestamp_nanos: 1, value: 1.0 });
        s.append(Point { timestamp_nanos: 2, value: 2.0 });
        s.append(Point { timestamp_nanos: 3, value: 3.0 });
        assert_eq!(s.len(), 2);
        let pts = s.range(0, 10);
        assert_eq!(pts[0].timestamp_nanos, 2);
        assert_eq!(pts[1].timestamp_nanos, 3);
    }

    #[test]
    fn percentile_ordering_holds() {
        let values: Vec<f64> = (1..=100).map(|v| v as f64).collect();
        let p = percentiles_of(values).unwrap();
        assert!(p.p50 <= p.p95);
        assert!(p.p95 <= p.p99);
    }

    #[test]
    fn interpolated_quantile_matches_known_values() {
        let sorted = vec![1.0, 2.0, 3.0, 4.0];
        assert_eq!(interpolated_quantile(&sorted, 0.0), 1.0);
        assert_eq!(interpolated_quantile(&sorted, 1.0), 4.0);
        assert!((interpolated_quantile(&sorted, 0.5) - 2.5).abs() < 1e-9);
    }
}
