//! Scorer — derives the efficiency score, health score, and priority
//! input from an `Analysis` (`spec.md` §4.5).
//!
//! A pure, config-only struct in the same spirit as the teacher's
//! `ScoringEngine` (a zero-field or config-only struct with pure
//! methods) — but every constant named in §4.5 is read off
//! `OptimizerConfig` rather than hard-coded, per `spec.md` §9's "no
//! hidden constants in the scoring path" (the teacher's own
//! `get_inspection_weight`/`get_check_weight` tables *are* hard-coded;
//! this crate deliberately generalizes that one spot since the spec
//! requires configurable weights).

use serde::{Deserialize, Serialize};

use crate::analyzer::Analysis;
use crate::config::OptimizerConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Scores {
    pub utilization_score: f64,
    pub stability_score: f64,
    pub cost_efficiency_score: f64,
    pub efficiency_score: f64,
    pub health_score: f64,
}

pub struct Scorer {
    config: OptimizerConfig,
}

impl Scorer {
    pub fn new(config: OptimizerConfig) -> Self {
        Self { config }
    }

    /// Computes all four component/overall scores for `analysis`.
    pub fn score(&self, analysis: &Analysis) -> Scores {
        let utilization_score = self.utilization_score(analysis);
        let stability_score = self.stability_score(analysis);
        let cost_efficiency_score = self.cost_efficiency_score(analysis);
        let efficiency_score = (self.config.utilization_weight * utilization_score
            + self.config.stability_weight * stability_score
            + self.config.cost_efficiency_weight * cost_efficiency_score)
            .clamp(0.0, 100.0);
        let health_score = self.health_score(analysis);

        Scores {
            utilization_score,
            stability_score,
            cost_efficiency_score,
            efficiency_score,
            health_score,
        }
    }

    fn utilization_curve(&self, u: f64) -> f64 {
        let (lo, hi) = (self.config.optimal_utilization_min, self.config.optimal_utilization_max);
        if u >= lo && u <= hi {
            100.0
        } else if u < lo {
            (100.0 * u / lo).clamp(0.0, 100.0)
        } else {
            let span = 2.0 - hi;
            (100.0 * (2.0 - u) / span).clamp(0.0, 100.0)
        }
    }

    fn utilization_score(&self, analysis: &Analysis) -> f64 {
        let cpu_u = analysis.metrics.cpu.utilization_vs_request();
        let mem_u = analysis.metrics.memory.utilization_vs_request();
        let scores: Vec<f64> = [cpu_u, mem_u].into_iter().flatten().map(|u| self.utilization_curve(u)).collect();
        if scores.is_empty() {
            100.0
        } else {
            scores.iter().sum::<f64>() / scores.len() as f64
        }
    }

    fn stability_score(&self, analysis: &Analysis) -> f64 {
        let mut score = 100.0;
        score -= 5.0 * analysis.metrics.restart_count as f64;
        score -= (analysis.metrics.cpu.variance / 1000.0).min(10.0);
        score -= (analysis.metrics.memory.variance / 1e9).min(10.0);

        if let Some(hpa) = &analysis.metrics.hpa {
            if hpa.events_per_day > self.config.hpa_scaling_frequency_threshold {
                score -= (2.0 * (hpa.events_per_day - self.config.hpa_scaling_frequency_threshold)).min(20.0);
            }
            if hpa.mean_amplitude > 5.0 {
                score -= (hpa.mean_amplitude - 5.0).min(10.0);
            }
        }
        score.clamp(0.0, 100.0)
    }

    fn cost_efficiency_score(&self, analysis: &Analysis) -> f64 {
        let mut score = 100.0;
        if analysis.cpu_over {
            if let Some(u) = analysis.metrics.cpu.utilization_vs_request() {
                score -= 50.0 * (1.0 - u);
            }
        }
        if analysis.mem_over {
            if let Some(u) = analysis.metrics.memory.utilization_vs_request() {
                score -= 50.0 * (1.0 - u);
            }
        }
        score.clamp(0.0, 100.0)
    }

    pub fn health_score(&self, analysis: &Analysis) -> f64 {
        let mut score = 100.0;
        if analysis.cpu_under {
            score -= 20.0;
        }
        if analysis.mem_under {
            score -= 20.0;
        }
        score -= (3.0 * analysis.metrics.restart_count as f64).min(30.0);
        if analysis.hpa_hit_ceiling {
            score -= 15.0;
        }
        if analysis.hpa_needs_tuning {
            score -= 10.0;
        }
        if analysis.cpu_over {
            score -= 5.0;
        }
        if analysis.mem_over {
            score -= 5.0;
        }
        score.clamp(0.0, 100.0)
    }

    /// Priority is total over (analysis, savings) per `spec.md` §4.5:
    /// always resolves to exactly one of the three labels.
    pub fn priority(&self, analysis: &Analysis, health_score: f64, estimated_savings: f64) -> Priority {
        if analysis.cpu_under || analysis.mem_under || estimated_savings > self.config.high_priority_savings_usd || health_score < self.config.high_priority_health_floor {
            Priority::High
        } else if estimated_savings > self.config.medium_priority_savings_usd
            || analysis.hpa_needs_tuning
            || health_score < self.config.medium_priority_health_floor
        {
            Priority::Medium
        } else {
            Priority::Low
        }
    }
}
