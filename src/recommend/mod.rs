//! Recommendation Builder — emits resource/HPA/scaling recommendations
//! with target configs, cost deltas, and priorities (`spec.md` §4.6).

use serde::{Deserialize, Serialize};

use crate::analyzer::Analysis;
use crate::config::OptimizerConfig;
use crate::scoring::{Priority, Scorer};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecommendationKind {
    Resource,
    Hpa,
    Scaling,
}

/// Opaque, kind-specific current/recommended shape. Resource carries
/// millicores + bytes; HPA carries the min/max/target triple; scaling
/// carries a replica count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum RecommendationConfig {
    Resource { cpu_milli: i64, mem_bytes: i64 },
    Hpa { min_replicas: i32, max_replicas: i32, target_cpu_pct: f64 },
    Scaling { replicas: i32 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub id: String,
    pub kind: RecommendationKind,
    pub namespace: String,
    pub deployment: String,
    pub priority: Priority,
    pub current_config: RecommendationConfig,
    pub recommended_config: RecommendationConfig,
    pub estimated_monthly_savings: f64,
    pub risk: String,
    pub created_at_nanos: i64,
}

pub struct RecommendationBuilder {
    config: OptimizerConfig,
    scorer: Scorer,
}

impl RecommendationBuilder {
    pub fn new(config: OptimizerConfig) -> Self {
        let scorer = Scorer::new(config.clone());
        Self { config, scorer }
    }

    fn monthly_cost(&self, cpu_milli: i64, mem_bytes: i64) -> f64 {
        let cpu_vcpu = cpu_milli as f64 / 1000.0;
        let mem_gb = mem_bytes as f64 / (1024.0 * 1024.0 * 1024.0);
        let hourly = cpu_vcpu * self.config.cpu_cost_per_vcpu_hour + mem_gb * self.config.memory_cost_per_gb_hour;
        hourly * 24.0 * 30.0
    }

    /// Emits at most one recommendation per kind for `analysis`.
    pub fn build(&self, analysis: &Analysis, now_nanos: i64) -> Vec<Recommendation> {
        let health_score = self.scorer.health_score(analysis);
        let mut recs = Vec::new();

        if let Some(rec) = self.resource_recommendation(analysis, health_score, now_nanos) {
            recs.push(rec);
        }
        if let Some(hpa) = &analysis.metrics.hpa {
            if let Some(rec) = self.hpa_recommendation(analysis, hpa, health_score, now_nanos) {
                recs.push(rec);
            }
        } else if let Some(rec) = self.scaling_recommendation(analysis, health_score, now_nanos) {
            recs.push(rec);
        }

        recs
    }

    fn resource_recommendation(&self, analysis: &Analysis, health_score: f64, now_nanos: i64) -> Option<Recommendation> {
        if !(analysis.cpu_over || analysis.cpu_under || analysis.mem_over || analysis.mem_under) {
            return None;
        }

        let cpu = &analysis.metrics.cpu;
        let mem = &analysis.metrics.memory;
        let replicas = analysis.metrics.replica_count.max(1) as f64;

        let recommended_cpu = if analysis.cpu_over {
            (cpu.p95 * self.config.over_provisioned_buffer).ceil() as i64
        } else if analysis.cpu_under {
            (cpu.p95 * self.config.under_provisioned_buffer).ceil() as i64
        } else {
            cpu.requested
        };
        let recommended_mem = if analysis.mem_over {
            (mem.p95 * self.config.over_provisioned_buffer).ceil() as i64
        } else if analysis.mem_under {
            (mem.p95 * self.config.under_provisioned_buffer).ceil() as i64
        } else {
            mem.requested
        };

        // Savings are summed per-resource (not on the combined cost), so a
        // resource that got *more* expensive (an under-provisioning fix)
        // never offsets savings from a resource that got cheaper (scenario
        // 6 in `spec.md` §8: mixed CPU-over/memory-under savings are
        // computed on the CPU delta alone).
        let cpu_savings = (self.monthly_cost(cpu.requested, 0) - self.monthly_cost(recommended_cpu, 0)).max(0.0);
        let mem_savings = (self.monthly_cost(0, mem.requested) - self.monthly_cost(0, recommended_mem)).max(0.0);
        let savings = (cpu_savings + mem_savings) * replicas;

        let priority = self.scorer.priority(analysis, health_score, savings);
        let risk = if analysis.cpu_under || analysis.mem_under {
            "under-provisioned: risk of throttling/OOM at current settings".to_string()
        } else {
            "over-provisioned: safe to reclaim headroom".to_string()
        };

        Some(Recommendation {
            id: uuid::Uuid::new_v4().to_string(),
            kind: RecommendationKind::Resource,
            namespace: analysis.namespace.clone(),
            deployment: analysis.deployment.clone(),
            priority,
            current_config: RecommendationConfig::Resource { cpu_milli: cpu.requested, mem_bytes: mem.requested },
            recommended_config: RecommendationConfig::Resource { cpu_milli: recommended_cpu, mem_bytes: recommended_mem },
            estimated_monthly_savings: savings,
            risk,
            created_at_nanos: now_nanos,
        })
    }

    fn hpa_recommendation(
        &self,
        analysis: &Analysis,
        hpa: &crate::analyzer::HpaStats,
        health_score: f64,
        now_nanos: i64,
    ) -> Option<Recommendation> {
        let mut recommended_min = hpa.min_replicas;
        let mut recommended_max = hpa.max_replicas;
        let mut recommended_target = hpa.target_cpu_pct;
        let mut triggered = false;

        if hpa.min_idle_fraction > self.config.hpa_min_idle_fraction_threshold && hpa.min_replicas > 1 {
            recommended_min = hpa.min_replicas - 1;
            triggered = true;
        }
        if hpa.ceiling_hit_fraction > self.config.hpa_ceiling_hit_fraction_threshold {
            recommended_max = hpa.max_replicas + (hpa.max_replicas as f64 * 0.5).ceil() as i32;
            triggered = true;
        }
        let drift_fraction = (hpa.target_cpu_pct - hpa.mean_current_cpu_pct).abs() / 100.0;
        if drift_fraction > self.config.hpa_target_drift_threshold {
            recommended_target = hpa.mean_current_cpu_pct.round();
            triggered = true;
        }

        if !triggered {
            return None;
        }

        let cpu = &analysis.metrics.cpu;
        let mem = &analysis.metrics.memory;
        let replica_delta = (hpa.min_replicas - recommended_min) as f64;
        let per_replica_cost = self.monthly_cost(cpu.requested, mem.requested);
        let savings = (replica_delta * per_replica_cost).max(0.0);

        let priority = self.scorer.priority(analysis, health_score, savings);

        Some(Recommendation {
            id: uuid::Uuid::new_v4().to_string(),
            kind: RecommendationKind::Hpa,
            namespace: analysis.namespace.clone(),
            deployment: analysis.deployment.clone(),
            priority,
            current_config: RecommendationConfig::Hpa {
                min_replicas: hpa.min_replicas,
                max_replicas: hpa.max_replicas,
                target_cpu_pct: hpa.target_cpu_pct,
            },
            recommended_config: RecommendationConfig::Hpa {
                min_replicas: recommended_min,
                max_replicas: recommended_max,
                target_cpu_pct: recommended_target,
            },
            estimated_monthly_savings: savings,
            risk: "HPA tuning: adjust bounds/target to match observed scaling behavior".to_string(),
            created_at_nanos: now_nanos,
        })
    }

    fn scaling_recommendation(&self, analysis: &Analysis, health_score: f64, now_nanos: i64) -> Option<Recommendation> {
        let utilization = analysis.metrics.cpu.utilization_vs_request()?;
        let replicas = analysis.metrics.replica_count;

        let recommended_replicas = if utilization > self.config.scale_up_utilization_threshold {
            replicas + 1
        } else if utilization < self.config.scale_down_utilization_threshold && replicas > 1 {
            replicas - 1
        } else {
            return None;
        };

        let cpu = &analysis.metrics.cpu;
        let mem = &analysis.metrics.memory;
        let per_replica_cost = self.monthly_cost(cpu.requested, mem.requested);
        let delta = (replicas - recommended_replicas) as f64;
        let savings = (delta * per_replica_cost).max(0.0);

        let priority = self.scorer.priority(analysis, health_score, savings);
        let risk = if recommended_replicas > replicas {
            "high utilization without autoscaling: risk of saturation under load".to_string()
        } else {
            "low utilization without autoscaling: replicas can be reduced safely".to_string()
        };

        Some(Recommendation {
            id: uuid::Uuid::new_v4().to_string(),
            kind: RecommendationKind::Scaling,
            namespace: analysis.namespace.clone(),
            deployment: analysis.deployment.clone(),
            priority,
            current_config: RecommendationConfig::Scaling { replicas },
            recommended_config: RecommendationConfig::Scaling { replicas: recommended_replicas },
            estimated_monthly_savings: savings,
            risk,
            created_at_nanos: now_nanos,
        })
    }
}
