//! Construction-time configuration for the optimizer core.
//!
//! Every tunable named in `spec.md` §6 lives here as a typed field with the
//! documented default. Scoring and recommendation thresholds are read off
//! this struct everywhere, never hard-coded (`spec.md` §9).

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{OptimizerError, Result};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OptimizerConfig {
    /// Sampling period for the collector.
    pub collection_interval: Duration,
    /// Store horizon; points older than this are unreachable.
    pub retention_period: Duration,
    /// Eviction cadence.
    pub cleanup_interval: Duration,
    /// Namespaces to sample; empty means all.
    pub namespaces: Vec<String>,
    /// Minimum point count gating percentiles and analysis.
    pub minimum_data_points: usize,
    /// Analyzer lookback window.
    pub analysis_duration: Duration,

    pub cpu_over_provisioned_threshold: f64,
    pub cpu_under_provisioned_threshold: f64,
    pub memory_over_provisioned_threshold: f64,
    pub memory_under_provisioned_threshold: f64,

    /// Headroom multiplier when proposing a smaller request/limit.
    pub over_provisioned_buffer: f64,
    /// Headroom multiplier when proposing a larger request/limit.
    pub under_provisioned_buffer: f64,

    pub optimal_utilization_min: f64,
    pub optimal_utilization_max: f64,

    pub cpu_cost_per_vcpu_hour: f64,
    pub memory_cost_per_gb_hour: f64,

    /// Scoring weights for the efficiency score (must sum to 1.0).
    pub utilization_weight: f64,
    pub stability_weight: f64,
    pub cost_efficiency_weight: f64,

    /// HPA-scaling-frequency threshold (events/day) above which the
    /// stability score is penalized.
    pub hpa_scaling_frequency_threshold: f64,
    /// Fraction of the window at min replicas with low utilization that
    /// triggers a "reduce min" recommendation.
    pub hpa_min_idle_fraction_threshold: f64,
    /// Fraction of the window at max replicas that triggers an
    /// "increase max" recommendation.
    pub hpa_ceiling_hit_fraction_threshold: f64,
    /// Absolute gap between target and mean observed CPU utilization that
    /// triggers a "retarget" recommendation.
    pub hpa_target_drift_threshold: f64,

    /// Utilization above which a scaling-only (no-HPA) deployment should
    /// grow by one replica.
    pub scale_up_utilization_threshold: f64,
    /// Utilization below which a scaling-only deployment should shrink by
    /// one replica.
    pub scale_down_utilization_threshold: f64,

    /// Priority thresholds.
    pub high_priority_savings_usd: f64,
    pub medium_priority_savings_usd: f64,
    pub high_priority_health_floor: f64,
    pub medium_priority_health_floor: f64,

    /// TTL for the facade's per-(namespace,deployment) analysis cache.
    pub analysis_cache_ttl: Duration,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            collection_interval: Duration::from_secs(15),
            retention_period: Duration::from_secs(24 * 60 * 60),
            cleanup_interval: Duration::from_secs(60 * 60),
            namespaces: Vec::new(),
            minimum_data_points: 10,
            analysis_duration: Duration::from_secs(7 * 24 * 60 * 60),

            cpu_over_provisioned_threshold: 0.5,
            cpu_under_provisioned_threshold: 0.8,
            memory_over_provisioned_threshold: 0.5,
            memory_under_provisioned_threshold: 0.8,

            over_provisioned_buffer: 1.2,
            under_provisioned_buffer: 1.5,

            optimal_utilization_min: 0.7,
            optimal_utilization_max: 0.9,

            cpu_cost_per_vcpu_hour: 0.03,
            memory_cost_per_gb_hour: 0.004,

            utilization_weight: 0.5,
            stability_weight: 0.3,
            cost_efficiency_weight: 0.2,

            hpa_scaling_frequency_threshold: 10.0,
            hpa_min_idle_fraction_threshold: 0.8,
            hpa_ceiling_hit_fraction_threshold: 0.1,
            hpa_target_drift_threshold: 0.2,

            scale_up_utilization_threshold: 0.8,
            scale_down_utilization_threshold: 0.5,

            high_priority_savings_usd: 50.0,
            medium_priority_savings_usd: 20.0,
            high_priority_health_floor: 60.0,
            medium_priority_health_floor: 80.0,

            analysis_cache_ttl: Duration::from_secs(60),
        }
    }
}

impl OptimizerConfig {
    /// Validates all invariants a sane configuration must hold, matching
    /// the teacher's fail-fast-with-readable-message style. Called once at
    /// construction; never re-checked afterward.
    pub fn validate(&self) -> Result<()> {
        fn positive(name: &str, d: Duration) -> Result<()> {
            if d.is_zero() {
                return Err(OptimizerError::InvalidConfig(format!(
                    "{name} must be greater than zero"
                )));
            }
            Ok(())
        }
        positive("collection_interval", self.collection_interval)?;
        positive("retention_period", self.retention_period)?;
        positive("cleanup_interval", self.cleanup_interval)?;
        positive("analysis_duration", self.analysis_duration)?;

        if self.minimum_data_points == 0 {
            return Err(OptimizerError::InvalidConfig(
                "minimum_data_points must be greater than zero".into(),
            ));
        }

        fn unit_interval(name: &str, v: f64) -> Result<()> {
            if !(0.0..=1.0).contains(&v) {
                return Err(OptimizerError::InvalidConfig(format!(
                    "{name} must be within [0,1], got {v}"
                )));
            }
            Ok(())
        }
        unit_interval("cpu_over_provisioned_threshold", self.cpu_over_provisioned_threshold)?;
        unit_interval("cpu_under_provisioned_threshold", self.cpu_under_provisioned_threshold)?;
        unit_interval("memory_over_provisioned_threshold", self.memory_over_provisioned_threshold)?;
        unit_interval("memory_under_provisioned_threshold", self.memory_under_provisioned_threshold)?;
        unit_interval("optimal_utilization_min", self.optimal_utilization_min)?;
        unit_interval("hpa_min_idle_fraction_threshold", self.hpa_min_idle_fraction_threshold)?;
        unit_interval("hpa_ceiling_hit_fraction_threshold", self.hpa_ceiling_hit_fraction_threshold)?;
        unit_interval("scale_up_utilization_threshold", self.scale_up_utilization_threshold)?;
        unit_interval("scale_down_utilization_threshold", self.scale_down_utilization_threshold)?;

        if self.optimal_utilization_max <= self.optimal_utilization_min {
            return Err(OptimizerError::InvalidConfig(
                "optimal_utilization_max must be greater than optimal_utilization_min".into(),
            ));
        }
        if self.scale_down_utilization_threshold >= self.scale_up_utilization_threshold {
            return Err(OptimizerError::InvalidConfig(
                "scale_down_utilization_threshold must be less than scale_up_utilization_threshold".into(),
            ));
        }
        if self.over_provisioned_buffer <= 0.0 || self.under_provisioned_buffer <= 0.0 {
            return Err(OptimizerError::InvalidConfig(
                "buffers must be positive".into(),
            ));
        }
        if self.cpu_cost_per_vcpu_hour < 0.0 || self.memory_cost_per_gb_hour < 0.0 {
            return Err(OptimizerError::InvalidConfig(
                "cost-per-hour values must not be negative".into(),
            ));
        }

        let weight_sum =
            self.utilization_weight + self.stability_weight + self.cost_efficiency_weight;
        if (weight_sum - 1.0).abs() > 1e-6 {
            return Err(OptimizerError::InvalidConfig(format!(
                "scoring weights must sum to 1.0, got {weight_sum}"
            )));
        }

        Ok(())
    }

    /// Bounded per-series point capacity derived from the retention window
    /// and sampling period, with a floor so a wide `CollectionInterval`
    /// never starves a series down to zero capacity.
    pub fn max_points_per_series(&self) -> usize {
        let ratio =
            self.retention_period.as_secs_f64() / self.collection_interval.as_secs_f64();
        (ratio.ceil() as usize).max(self.minimum_data_points * 2)
    }
}
