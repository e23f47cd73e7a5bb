use std::sync::Arc;

use kubeowler_optimizer::store::{Point, SeriesKey, TimeSeriesStore};
use kubeowler_optimizer::telemetry::fake::FakeTelemetryPort;
use kubeowler_optimizer::telemetry::{DeploymentFacts, PodFacts, ResourceKind, ResourceRequirements};
use kubeowler_optimizer::{OptimizerConfig, OptimizerFacade};

fn facts(name: &str, replicas: i32) -> DeploymentFacts {
    DeploymentFacts {
        name: name.into(),
        namespace: "default".into(),
        replica_count: replicas,
        pods: vec![PodFacts {
            name: format!("{name}-p1"),
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

fn seed(store: &TimeSeriesStore, pod: &str, points: i64, interval_nanos: i64, cpu: f64, mem: f64) {
    let key = SeriesKey::new(ResourceKind::Pod, Some("default".into()), pod);
    for i in 0..points {
        store.append(&key, "cpu", Point { timestamp_nanos: i * interval_nanos, value: cpu }).unwrap();
        store.append(&key, "memory", Point { timestamp_nanos: i * interval_nanos, value: mem }).unwrap();
    }
}

#[tokio::test]
async fn insufficient_data_deployment_is_skipped_by_analyze_all_and_recommend_all() {
    let port = Arc::new(FakeTelemetryPort::new());
    port.set_deployment(facts("ready", 1));
    port.set_deployment(facts("sparse", 1));
    port.set_namespaces(vec!["default".into()]);

    let config = OptimizerConfig::default();
    let store = Arc::new(TimeSeriesStore::new(config.max_points_per_series()));
    let interval = config.collection_interval.as_nanos() as i64;

    seed(&store, "ready-p1", 240, interval, 100.0, 50_000_000.0);
    // Only two points: below minimum_data_points, analyze() returns InsufficientData for it.
    seed(&store, "sparse-p1", 2, interval, 100.0, 50_000_000.0);

    let facade = OptimizerFacade::new(config, store, port).unwrap();
    let namespaces = vec!["default".to_string()];

    let analyses = facade.analyze_all(&namespaces).await;
    assert!(analyses.contains_key("default/ready"));
    assert!(!analyses.contains_key("default/sparse"));

    let recs = facade.recommend_all(&namespaces).await;
    assert!(recs.iter().all(|r| r.deployment == "ready"));
}

#[tokio::test]
async fn repeated_analyze_without_mutation_is_deterministic() {
    let port = Arc::new(FakeTelemetryPort::new());
    port.set_deployment(facts("d", 1));

    let config = OptimizerConfig::default();
    let store = Arc::new(TimeSeriesStore::new(config.max_points_per_series()));
    let interval = config.collection_interval.as_nanos() as i64;
    seed(&store, "d-p1", 240, interval, 137.0, 61_000_000.0);

    let facade = OptimizerFacade::new(config, store, port).unwrap();

    let first = facade.analyze("default", "d").await.unwrap();
    facade.clear_cache();
    let second = facade.analyze("default", "d").await.unwrap();

    assert_eq!(first.metrics, second.metrics);
    assert_eq!(first.cpu_over, second.cpu_over);
    assert_eq!(first.cpu_under, second.cpu_under);
    assert_eq!(first.mem_over, second.mem_over);
    assert_eq!(first.mem_under, second.mem_under);
}

#[tokio::test]
async fn stop_then_stats_reflects_cleared_recommendations() {
    let port = Arc::new(FakeTelemetryPort::new());
    port.set_deployment(facts("d", 1));

    let config = OptimizerConfig::default();
    let store = Arc::new(TimeSeriesStore::new(config.max_points_per_series()));
    let interval = config.collection_interval.as_nanos() as i64;
    seed(&store, "d-p1", 240, interval, 100.0, 50_000_000.0);

    let facade = OptimizerFacade::new(config, store, port).unwrap();
    let analysis = facade.analyze("default", "d").await.unwrap();
    facade.recommend(&analysis);
    assert!(facade.stats().count_low + facade.stats().count_medium + facade.stats().count_high > 0);

    facade.clear_recommendations();
    let stats = facade.stats();
    assert_eq!(stats.count_high, 0);
    assert_eq!(stats.count_medium, 0);
    assert_eq!(stats.count_low, 0);
    assert_eq!(stats.total_savings, 0.0);
    assert!(facade.recommendations_for("default", "d").is_empty());
}
