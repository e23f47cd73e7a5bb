//! Optimizer Facade — orchestrates the analyzer, scorer, and
//! recommendation builder; caches results; enumerates deployments;
//! exposes stable ids (`spec.md` §4.7).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::RwLock;

use crate::analyzer::{Analysis, ResourceAnalyzer};
use crate::config::OptimizerConfig;
use crate::error::{OptimizerError, Result};
use crate::recommend::{Recommendation, RecommendationBuilder, RecommendationKind};
use crate::scoring::{Priority, Scorer};
use crate::store::TimeSeriesStore;
use crate::telemetry::ClusterTelemetryPort;

fn now_nanos() -> i64 {
    chrono::Utc::now().timestamp_nanos_opt().unwrap_or(0)
}

struct CachedAnalysis {
    analysis: Analysis,
    inserted_at: Instant,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Stats {
    pub count_high: usize,
    pub count_medium: usize,
    pub count_low: usize,
    pub total_savings: f64,
}

pub struct OptimizerFacade {
    config: OptimizerConfig,
    port: Arc<dyn ClusterTelemetryPort>,
    analyzer: ResourceAnalyzer,
    scorer: Scorer,
    builder: RecommendationBuilder,
    analyses: RwLock<HashMap<(String, String), CachedAnalysis>>,
    /// Recommendations keyed by their opaque id.
    recommendations: RwLock<HashMap<String, Recommendation>>,
    /// (namespace, deployment, kind) -> current id, so a later `recommend`
    /// call overwrites the prior recommendation for the same slot
    /// (`spec.md` §4.6).
    recommendation_slots: RwLock<HashMap<(String, String, RecommendationKind), String>>,
}

impl OptimizerFacade {
    pub fn new(config: OptimizerConfig, store: Arc<TimeSeriesStore>, port: Arc<dyn ClusterTelemetryPort>) -> Result<Self> {
        config.validate()?;
        let analyzer = ResourceAnalyzer::new(config.clone(), store, port.clone());
        let scorer = Scorer::new(config.clone());
        let builder = RecommendationBuilder::new(config.clone());
        Ok(Self {
            config,
            port,
            analyzer,
            scorer,
            builder,
            analyses: RwLock::new(HashMap::new()),
            recommendations: RwLock::new(HashMap::new()),
            recommendation_slots: RwLock::new(HashMap::new()),
        })
    }

    /// Analyzes one deployment, consulting the per-(namespace,deployment)
    /// cache (TTL `analysis_cache_ttl`) before recomputing.
    pub async fn analyze(&self, namespace: &str, name: &str) -> Result<Analysis> {
        let key = (namespace.to_string(), name.to_string());
        if let Some(cached) = self.analyses.read().get(&key) {
            if cached.inserted_at.elapsed() < self.config.analysis_cache_ttl {
                return Ok(cached.analysis.clone());
            }
        }
        let analysis = self.analyzer.analyze(namespace, name, now_nanos()).await?;
        self.analyses.write().insert(
            key,
            CachedAnalysis { analysis: analysis.clone(), inserted_at: Instant::now() },
        );
        Ok(analysis)
    }

    /// Builds and stores recommendations for `analysis`, overwriting any
    /// prior recommendation for the same (namespace, deployment, kind).
    pub fn recommend(&self, analysis: &Analysis) -> Vec<Recommendation> {
        let built = self.builder.build(analysis, now_nanos());

        let mut recommendations = self.recommendations.write();
        let mut slots = self.recommendation_slots.write();
        for rec in &built {
            let slot = (rec.namespace.clone(), rec.deployment.clone(), rec.kind);
            if let Some(old_id) = slots.insert(slot, rec.id.clone()) {
                recommendations.remove(&old_id);
            }
            recommendations.insert(rec.id.clone(), rec.clone());
        }
        built
    }

    pub async fn score(&self, namespace: &str, name: &str) -> Result<f64> {
        let analysis = self.analyze(namespace, name).await?;
        Ok(self.scorer.score(&analysis).efficiency_score)
    }

    pub fn estimate_savings(&self, recommendation: &Recommendation) -> f64 {
        recommendation.estimated_monthly_savings
    }

    pub async fn analyze_all(&self, namespaces: &[String]) -> HashMap<String, Analysis> {
        let deployments = self.port.list_deployments(namespaces).await.unwrap_or_default();
        let mut out = HashMap::new();
        for (ns, name) in deployments {
            if let Ok(analysis) = self.analyze(&ns, &name).await {
                out.insert(format!("{ns}/{name}"), analysis);
            }
        }
        out
    }

    pub async fn recommend_all(&self, namespaces: &[String]) -> Vec<Recommendation> {
        let analyses = self.analyze_all(namespaces).await;
        let mut out = Vec::new();
        for analysis in analyses.values() {
            out.extend(self.recommend(analysis));
        }
        out
    }

    pub fn recommendations_for(&self, namespace: &str, name: &str) -> Vec<Recommendation> {
        self.recommendations
            .read()
            .values()
            .filter(|r| r.namespace == namespace && r.deployment == name)
            .cloned()
            .collect()
    }

    pub fn recommendation_by_id(&self, id: &str) -> Option<Recommendation> {
        self.recommendations.read().get(id).cloned()
    }

    pub fn stats(&self) -> Stats {
        let mut stats = Stats::default();
        for rec in self.recommendations.read().values() {
            match rec.priority {
                Priority::High => stats.count_high += 1,
                Priority::Medium => stats.count_medium += 1,
                Priority::Low => stats.count_low += 1,
            }
            stats.total_savings += rec.estimated_monthly_savings;
        }
        stats
    }

    pub fn clear_recommendations(&self) {
        self.recommendations.write().clear();
        self.recommendation_slots.write().clear();
    }

    pub fn clear_cache(&self) {
        self.analyses.write().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{Point, SeriesKey};
    use crate::telemetry::fake::FakeTelemetryPort;
    use crate::telemetry::{DeploymentFacts, PodFacts, ResourceKind, ResourceRequirements};

    fn facts(replicas: i32) -> DeploymentFacts {
        DeploymentFacts {
            name: "d".into(),
            namespace: "default".into(),
            replica_count: replicas,
            pods: vec![PodFacts {
                name: "p1".into(),
                namespace: "default".into(),
                resources: ResourceRequirements {
                    cpu_request_milli: 1000,
                    cpu_limit_milli: 2000,
                    mem_request_bytes: 256_000_000,
                    mem_limit_bytes: 512_000_000,
                },
                restart_count: 0,
            }],
            hpa: None,
        }
    }

    async fn facade_with_data() -> OptimizerFacade {
        let port = Arc::new(FakeTelemetryPort::new());
        port.set_deployment(facts(1));
        port.set_namespaces(vec!["default".into()]);

        let config = OptimizerConfig::default();
        let store = Arc::new(TimeSeriesStore::new(config.max_points_per_series()));
        let interval_nanos = config.collection_interval.as_nanos() as i64;
        let key = SeriesKey::new(ResourceKind::Pod, Some("default".into()), "p1");
        for i in 0..240 {
            store.append(&key, "cpu", Point { timestamp_nanos: i * interval_nanos, value: 100.0 }).unwrap();
            store.append(&key, "memory", Point { timestamp_nanos: i * interval_nanos, value: 50_000_000.0 }).unwrap();
        }

        OptimizerFacade::new(config, store, port).unwrap()
    }

    #[tokio::test]
    async fn not_found_propagates() {
        let port = Arc::new(FakeTelemetryPort::new());
        let config = OptimizerConfig::default();
        let store = Arc::new(TimeSeriesStore::new(config.max_points_per_series()));
        let facade = OptimizerFacade::new(config, store, port).unwrap();
        let err = facade.analyze("default", "missing").await.unwrap_err();
        assert!(matches!(err, OptimizerError::NotFound(_)));
    }

    #[tokio::test]
    async fn recommend_overwrites_same_slot() {
        let facade = facade_with_data().await;
        let analysis = facade.analyze("default", "d").await.unwrap();

        let first = facade.recommend(&analysis);
        assert!(!first.is_empty());
        let first_id = first[0].id.clone();

        let second = facade.recommend(&analysis);
        let second_id = second[0].id.clone();

        assert_ne!(first_id, second_id);
        assert!(facade.recommendation_by_id(&first_id).is_none());
        assert!(facade.recommendation_by_id(&second_id).is_some());
    }

    #[tokio::test]
    async fn clear_cache_forces_recompute() {
        let facade = facade_with_data().await;
        let a1 = facade.analyze("default", "d").await.unwrap();
        facade.clear_cache();
        let a2 = facade.analyze("default", "d").await.unwrap();
        assert_eq!(a1.metrics.cpu.p95, a2.metrics.cpu.p95);
    }

    #[tokio::test]
    async fn stats_reflect_recommendations() {
        let facade = facade_with_data().await;
        let analysis = facade.analyze("default", "d").await.unwrap();
        facade.recommend(&analysis);
        let stats = facade.stats();
        assert_eq!(stats.count_high + stats.count_medium + stats.count_low, facade.recommendations.read().len());
        facade.clear_recommendations();
        assert_eq!(facade.stats().total_savings, 0.0);
    }
}
