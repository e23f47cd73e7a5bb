use std::sync::Arc;

use kubeowler_optimizer::analyzer::ResourceAnalyzer;
use kubeowler_optimizer::recommend::{RecommendationBuilder, RecommendationConfig, RecommendationKind};
use kubeowler_optimizer::store::{Point, SeriesKey, TimeSeriesStore};
use kubeowler_optimizer::telemetry::fake::FakeTelemetryPort;
use kubeowler_optimizer::telemetry::{DeploymentFacts, HpaFacts, PodFacts, ResourceKind, ResourceRequirements};
use kubeowler_optimizer::OptimizerConfig;

fn pod_key(name: &str) -> SeriesKey {
    SeriesKey::new(ResourceKind::Pod, Some("default".into()), name)
}

fn hpa_key(name: &str) -> SeriesKey {
    SeriesKey::new(ResourceKind::Hpa, Some("default".into()), name)
}

fn deployment(replicas: i32, hpa: Option<HpaFacts>) -> DeploymentFacts {
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
        hpa,
    }
}

#[tokio::test]
async fn hpa_stuck_at_ceiling_end_to_end() {
    let port = Arc::new(FakeTelemetryPort::new());
    port.set_deployment(deployment(5, Some(HpaFacts { name: "d-hpa".into(), min_replicas: 2, max_replicas: 5, target_cpu_pct: 60.0 })));

    let mut config = OptimizerConfig::default();
    config.minimum_data_points = 10;
    let store = Arc::new(TimeSeriesStore::new(config.max_points_per_series()));
    let interval = config.collection_interval.as_nanos() as i64;

    for i in 0..1000 {
        store.append(&pod_key("p1"), "cpu", Point { timestamp_nanos: i * interval, value: 700.0 }).unwrap();
        let replicas = if i % 5 == 0 { 5.0 } else { 3.0 };
        store.append(&hpa_key("d-hpa"), "current_replicas", Point { timestamp_nanos: i * interval, value: replicas }).unwrap();
        store.append(&hpa_key("d-hpa"), "desired_replicas", Point { timestamp_nanos: i * interval, value: replicas }).unwrap();
        store.append(&hpa_key("d-hpa"), "current_cpu", Point { timestamp_nanos: i * interval, value: 62.0 }).unwrap();
        store.append(&hpa_key("d-hpa"), "target_cpu", Point { timestamp_nanos: i * interval, value: 60.0 }).unwrap();
    }
    let now = 1000 * interval;

    let analyzer = ResourceAnalyzer::new(config.clone(), store, port);
    let analysis = analyzer.analyze("default", "d", now).await.unwrap();

    let builder = RecommendationBuilder::new(config);
    let recs = builder.build(&analysis, now);
    let hpa_rec = recs.iter().find(|r| r.kind == RecommendationKind::Hpa).expect("hpa recommendation");
    match &hpa_rec.recommended_config {
        RecommendationConfig::Hpa { max_replicas, target_cpu_pct, .. } => {
            assert_eq!(*max_replicas, 8);
            assert_eq!(*target_cpu_pct, 60.0);
        }
        _ => panic!("expected hpa config"),
    }
}

#[tokio::test]
async fn idle_hpa_end_to_end_reduces_min() {
    let port = Arc::new(FakeTelemetryPort::new());
    port.set_deployment(deployment(3, Some(HpaFacts { name: "d-hpa".into(), min_replicas: 3, max_replicas: 10, target_cpu_pct: 70.0 })));

    let mut config = OptimizerConfig::default();
    config.minimum_data_points = 10;
    let store = Arc::new(TimeSeriesStore::new(config.max_points_per_series()));
    let interval = config.collection_interval.as_nanos() as i64;

    for i in 0..1000 {
        store.append(&pod_key("p1"), "cpu", Point { timestamp_nanos: i * interval, value: 120.0 }).unwrap();
        store.append(&hpa_key("d-hpa"), "current_replicas", Point { timestamp_nanos: i * interval, value: 3.0 }).unwrap();
        store.append(&hpa_key("d-hpa"), "desired_replicas", Point { timestamp_nanos: i * interval, value: 3.0 }).unwrap();
        store.append(&hpa_key("d-hpa"), "current_cpu", Point { timestamp_nanos: i * interval, value: 12.0 }).unwrap();
        store.append(&hpa_key("d-hpa"), "target_cpu", Point { timestamp_nanos: i * interval, value: 70.0 }).unwrap();
    }
    let now = 1000 * interval;

    let analyzer = ResourceAnalyzer::new(config.clone(), store, port);
    let analysis = analyzer.analyze("default", "d", now).await.unwrap();

    let builder = RecommendationBuilder::new(config);
    let recs = builder.build(&analysis, now);
    let hpa_rec = recs.iter().find(|r| r.kind == RecommendationKind::Hpa).expect("hpa recommendation");
    match &hpa_rec.recommended_config {
        RecommendationConfig::Hpa { min_replicas, .. } => assert_eq!(*min_replicas, 2),
        _ => panic!("expected hpa config"),
    }
}
