//! Resource Analyzer — aggregates a deployment's recent history into a
//! structured `Analysis` (`spec.md` §4.4).
//!
//! Both Open Questions in `spec.md` §9 are resolved as mandated:
//! aggregate-then-percentile (not per-pod-then-average), and carry-forward
//! alignment (not zero-fill) when combining per-pod series at a common
//! timestamp.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::OptimizerConfig;
use crate::error::{OptimizerError, Result};
use crate::store::{Point, SeriesKey, TimeSeriesStore};
use crate::telemetry::{ClusterTelemetryPort, DeploymentFacts, ResourceKind};

/// P50/P95/P99 + avg/max/variance for one resource, normalized per
/// replica, plus the requested/limit values it's compared against.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResourceStats {
    pub requested: i64,
    pub limit: i64,
    pub p50: f64,
    pub p95: f64,
    pub p99: f64,
    pub avg: f64,
    pub max: f64,
    pub variance: f64,
}

impl ResourceStats {
    /// P95 / requested, or `None` when requested is zero (undefined per
    /// `spec.md` §4.4 edge cases).
    pub fn utilization_vs_request(&self) -> Option<f64> {
        (self.requested > 0).then(|| self.p95 / self.requested as f64)
    }

    /// P95 / limit, or `None` when limit is zero.
    pub fn utilization_vs_limit(&self) -> Option<f64> {
        (self.limit > 0).then(|| self.p95 / self.limit as f64)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HpaStats {
    pub min_replicas: i32,
    pub max_replicas: i32,
    pub target_cpu_pct: f64,
    pub mean_current_cpu_pct: f64,
    pub events_per_day: f64,
    pub mean_amplitude: f64,
    pub min_idle_fraction: f64,
    pub ceiling_hit_fraction: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploymentMetrics {
    pub replica_count: i32,
    pub restart_count: u32,
    pub cpu: ResourceStats,
    pub memory: ResourceStats,
    pub hpa: Option<HpaStats>,
}

/// Derived flags, computed ratios, and raw metrics for one deployment.
/// Scores are attached separately by the `scoring` module — an
/// `Analysis` on its own is a pure function of the store snapshot and
/// config, matching the determinism property in `spec.md` §8.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Analysis {
    pub namespace: String,
    pub deployment: String,
    pub metrics: DeploymentMetrics,
    pub cpu_over: bool,
    pub cpu_under: bool,
    pub mem_over: bool,
    pub mem_under: bool,
    pub hpa_needs_tuning: bool,
    pub hpa_hit_ceiling: bool,
    pub computed_at_nanos: i64,
}

pub struct ResourceAnalyzer {
    config: OptimizerConfig,
    store: Arc<TimeSeriesStore>,
    port: Arc<dyn ClusterTelemetryPort>,
}

impl ResourceAnalyzer {
    pub fn new(config: OptimizerConfig, store: Arc<TimeSeriesStore>, port: Arc<dyn ClusterTelemetryPort>) -> Self {
        Self { config, store, port }
    }

    pub async fn analyze(&self, namespace: &str, deployment: &str, now_nanos: i64) -> Result<Analysis> {
        let facts = self.port.resolve_deployment(namespace, deployment).await?;

        let half_interval = self.config.collection_interval.as_nanos() as i64 / 2;
        let window = self.config.analysis_duration;

        let cpu_agg = self.aggregate_metric(&facts, "cpu", window, now_nanos, half_interval);
        let mem_agg = self.aggregate_metric(&facts, "memory", window, now_nanos, half_interval);

        let total_points = cpu_agg.len() + mem_agg.len();
        if total_points < self.config.minimum_data_points {
            return Err(OptimizerError::InsufficientData(format!(
                "{namespace}/{deployment}: {total_points} aggregate points across pods, need {}",
                self.config.minimum_data_points
            )));
        }

        let replicas = facts.replica_count.max(1) as f64;
        let (cpu_request, cpu_limit) = Self::per_replica_requirements(&facts, |r| (r.cpu_request_milli, r.cpu_limit_milli));
        let (mem_request, mem_limit) = Self::per_replica_requirements(&facts, |r| (r.mem_request_bytes, r.mem_limit_bytes));

        let cpu_stats = Self::resource_stats(&cpu_agg, replicas, cpu_request, cpu_limit);
        let mem_stats = Self::resource_stats(&mem_agg, replicas, mem_request, mem_limit);

        let restart_count: u32 = facts.pods.iter().map(|p| p.restart_count).sum();

        let cpu_over = cpu_stats
            .utilization_vs_request()
            .map(|u| u < self.config.cpu_over_provisioned_threshold)
            .unwrap_or(false);
        let cpu_under = cpu_stats
            .utilization_vs_limit()
            .map(|u| u > self.config.cpu_under_provisioned_threshold)
            .unwrap_or(false);
        let mem_over = mem_stats
            .utilization_vs_request()
            .map(|u| u < self.config.memory_over_provisioned_threshold)
            .unwrap_or(false);
        let mem_under = mem_stats
            .utilization_vs_limit()
            .map(|u| u > self.config.memory_under_provisioned_threshold)
            .unwrap_or(false);

        let hpa_stats = match &facts.hpa {
            Some(hpa) => Some(self.hpa_stats(namespace, deployment, hpa, window, now_nanos)),
            None => None,
        };

        let hpa_hit_ceiling = hpa_stats
            .map(|h| h.ceiling_hit_fraction > self.config.hpa_ceiling_hit_fraction_threshold)
            .unwrap_or(false);
        let hpa_needs_tuning = hpa_stats
            .map(|h| {
                h.min_idle_fraction > self.config.hpa_min_idle_fraction_threshold
                    || h.ceiling_hit_fraction > self.config.hpa_ceiling_hit_fraction_threshold
                    || (h.target_cpu_pct - h.mean_current_cpu_pct).abs() > self.config.hpa_target_drift_threshold * 100.0
            })
            .unwrap_or(false);

        Ok(Analysis {
            namespace: namespace.to_string(),
            deployment: deployment.to_string(),
            metrics: DeploymentMetrics {
                replica_count: facts.replica_count,
                restart_count,
                cpu: cpu_stats,
                memory: mem_stats,
                hpa: hpa_stats,
            },
            cpu_over,
            cpu_under,
            mem_over,
            mem_under,
            hpa_needs_tuning,
            hpa_hit_ceiling,
            computed_at_nanos: now_nanos,
        })
    }

    /// Sum across containers within a pod is already folded into
    /// `ResourceRequirements` by the telemetry port; all pods of one
    /// deployment share the same container spec, so the per-replica
    /// value is just the first pod's requirement. Pods missing from the
    /// store still contribute their declared request/limit here (this
    /// is config, not usage — usage absence is handled separately by
    /// "do not zero-fill").
    fn per_replica_requirements(
        facts: &DeploymentFacts,
        pick: impl Fn(&crate::telemetry::ResourceRequirements) -> (i64, i64),
    ) -> (i64, i64) {
        facts
            .pods
            .first()
            .map(|p| pick(&p.resources))
            .unwrap_or((0, 0))
    }

    /// Gathers each pod's window of points for `metric`, then aggregates
    /// them into one deployment-level series by summing per-pod values
    /// at aligned timestamps (carry-forward for pods without a point
    /// exactly at that timestamp). Pods absent from the store contribute
    /// nothing to any timestamp (no zero-fill).
    fn aggregate_metric(
        &self,
        facts: &DeploymentFacts,
        metric: &str,
        window: Duration,
        now_nanos: i64,
        half_interval_nanos: i64,
    ) -> Vec<Point> {
        let per_pod: Vec<Vec<Point>> = facts
            .pods
            .iter()
            .map(|pod| {
                let key = SeriesKey::new(ResourceKind::Pod, Some(pod.namespace.clone()), pod.name.clone());
                self.store.range(&key, metric, window, now_nanos)
            })
            .filter(|series| !series.is_empty())
            .collect();

        aggregate_aligned(&per_pod, half_interval_nanos)
    }

    fn resource_stats(agg: &[Point], replicas: f64, requested: i64, limit: i64) -> ResourceStats {
        if agg.is_empty() {
            return ResourceStats {
                requested,
                limit,
                p50: 0.0,
                p95: 0.0,
                p99: 0.0,
                avg: 0.0,
                max: 0.0,
                variance: 0.0,
            };
        }
        let normalized: Vec<f64> = agg.iter().map(|p| p.value / replicas).collect();
        let pct = crate::store::series::percentiles_of(normalized.clone()).expect("non-empty");
        let max = normalized.iter().cloned().fold(f64::MIN, f64::max);
        ResourceStats {
            requested,
            limit,
            p50: pct.p50,
            p95: pct.p95,
            p99: pct.p99,
            avg: crate::store::series::mean(&normalized),
            max,
            variance: crate::store::series::sample_variance(&normalized),
        }
    }

    fn hpa_stats(
        &self,
        namespace: &str,
        deployment: &str,
        hpa: &crate::telemetry::HpaFacts,
        window: Duration,
        now_nanos: i64,
    ) -> HpaStats {
        let key = SeriesKey::new(ResourceKind::Hpa, Some(namespace.to_string()), hpa.name.clone());
        let desired = self.store.range(&key, "desired_replicas", window, now_nanos);
        let current_replicas = self.store.range(&key, "current_replicas", window, now_nanos);
        let current_cpu = self.store.range(&key, "current_cpu", window, now_nanos);

        let mean_current_cpu_pct = if current_cpu.is_empty() {
            0.0
        } else {
            crate::store::series::mean(&current_cpu.iter().map(|p| p.value).collect::<Vec<_>>())
        };

        let window_secs = window.as_secs_f64().max(1.0);
        let days = (window_secs / 86_400.0).max(1.0 / 86_400.0);

        let mut events = 0usize;
        let mut amplitudes = Vec::new();
        for pair in desired.windows(2) {
            let delta = pair[1].value - pair[0].value;
            if delta.abs() > f64::EPSILON {
                events += 1;
                amplitudes.push(delta.abs());
            }
        }
        let events_per_day = events as f64 / days;
        let mean_amplitude = if amplitudes.is_empty() { 0.0 } else { crate::store::series::mean(&amplitudes) };

        let low_util_threshold = self.config.scale_down_utilization_threshold * 100.0;
        let at_min = current_replicas
            .iter()
            .zip(current_cpu.iter())
            .filter(|(r, c)| r.value as i32 <= hpa.min_replicas && c.value < low_util_threshold)
            .count();
        let at_max = current_replicas
            .iter()
            .filter(|r| r.value as i32 >= hpa.max_replicas)
            .count();

        let sample_count = current_replicas.len().max(1);
        HpaStats {
            min_replicas: hpa.min_replicas,
            max_replicas: hpa.max_replicas,
            target_cpu_pct: hpa.target_cpu_pct,
            mean_current_cpu_pct,
            events_per_day,
            mean_amplitude,
            min_idle_fraction: at_min as f64 / sample_count as f64,
            ceiling_hit_fraction: at_max as f64 / sample_count as f64,
        }
    }
}

/// Merges multiple per-pod point series into one deployment-level
/// series. Timestamps within `half_interval_nanos` of each other are
/// treated as the same aligned instant; a pod without a point in that
/// window uses its most recent prior point (carry-forward). A pod with
/// no prior point yet is skipped for that instant, never zero-filled.
fn aggregate_aligned(per_pod: &[Vec<Point>], half_interval_nanos: i64) -> Vec<Point> {
    if per_pod.is_empty() {
        return Vec::new();
    }

    let mut all_timestamps: Vec<i64> = per_pod.iter().flatten().map(|p| p.timestamp_nanos).collect();
    all_timestamps.sort_unstable();
    all_timestamps.dedup();

    let mut buckets: Vec<i64> = Vec::new();
    for ts in all_timestamps {
        match buckets.last() {
            Some(&last) if (ts - last).abs() <= half_interval_nanos => {}
            _ => buckets.push(ts),
        }
    }

    let mut cursors = vec![0usize; per_pod.len()];
    let mut out = Vec::with_capacity(buckets.len());
    for &bucket_ts in &buckets {
        let mut sum = 0.0;
        let mut any = false;
        for (i, series) in per_pod.iter().enumerate() {
            while cursors[i] + 1 < series.len() && series[cursors[i] + 1].timestamp_nanos <= bucket_ts + half_interval_nanos {
                cursors[i] += 1;
            }
            if let Some(p) = series.get(cursors[i]) {
                if p.timestamp_nanos <= bucket_ts + half_interval_nanos {
                    sum += p.value;
                    any = true;
                }
            }
        }
        if any {
            out.push(Point { timestamp_nanos: bucket_ts, value: sum });
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::fake::FakeTelemetryPort;
    use crate::telemetry::{DeploymentFacts, PodFacts, ResourceRequirements};

    fn facts_one_pod(cpu_request: i64, cpu_limit: i64) -> DeploymentFacts {
        DeploymentFacts {
            name: "d".into(),
            namespace: "default".into(),
            replica_count: 1,
            pods: vec![PodFacts {
                name: "p1".into(),
                namespace: "default".into(),
                resources: ResourceRequirements {
                    cpu_request_milli: cpu_request,
                    cpu_limit_milli: cpu_limit,
                    mem_request_bytes: 256 * 1024 * 1024,
                    mem_limit_bytes: 512 * 1024 * 1024,
                },
                restart_count: 0,
            }],
            hpa: None,
        }
    }

    fn key(name: &str) -> SeriesKey {
        SeriesKey::new(ResourceKind::Pod, Some("default".into()), name)
    }

    #[tokio::test]
    async fn insufficient_data_below_minimum() {
        let port = Arc::new(FakeTelemetryPort::new());
        port.set_deployment(facts_one_pod(1000, 2000));
        let config = OptimizerConfig::default();
        let store = Arc::new(TimeSeriesStore::new(config.max_points_per_series()));
        let analyzer = ResourceAnalyzer::new(config, store, port);
        let err = analyzer.analyze("default", "d", 1_000_000_000).await.unwrap_err();
        assert!(matches!(err, OptimizerError::InsufficientData(_)));
    }

    #[tokio::test]
    async fn over_provisioned_cpu_flagged() {
        let port = Arc::new(FakeTelemetryPort::new());
        port.set_deployment(facts_one_pod(1000, 2000));
        let mut config = OptimizerConfig::default();
        config.minimum_data_points = 10;
        let store = Arc::new(TimeSeriesStore::new(config.max_points_per_series()));

        let interval_nanos = config.collection_interval.as_nanos() as i64;
        for i in 0..240 {
            store
                .append(&key("p1"), "cpu", Point { timestamp_nanos: i * interval_nanos, value: 100.0 })
                .unwrap();
        }
        let now = 240 * interval_nanos;
        let analyzer = ResourceAnalyzer::new(config, store, port);
        let analysis = analyzer.analyze("default", "d", now).await.unwrap();
        assert!(analysis.cpu_over);
        assert!((analysis.metrics.cpu.p95 - 100.0).abs() < 1e-6);
    }

    #[test]
    fn carry_forward_sums_multi_pod_series() {
        let a = vec![Point { timestamp_nanos: 0, value: 10.0 }, Point { timestamp_nanos: 20, value: 12.0 }];
        let b = vec![Point { timestamp_nanos: 0, value: 5.0 }];
        let agg = aggregate_aligned(&[a, b], 5);
        assert_eq!(agg[0].value, 15.0);
        assert_eq!(agg[1].value, 17.0);
    }
}
