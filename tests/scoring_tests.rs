use kubeowler_optimizer::analyzer::{Analysis, DeploymentMetrics, ResourceStats};
use kubeowler_optimizer::scoring::{Priority, Scorer};
use kubeowler_optimizer::OptimizerConfig;

fn stats(requested: i64, limit: i64, p95: f64) -> ResourceStats {
    ResourceStats { requested, limit, p50: p95 * 0.9, p95, p99: p95 * 1.05, avg: p95 * 0.95, max: p95 * 1.1, variance: 0.0 }
}

fn analysis_with_utilization(cpu_u: f64, mem_u: f64) -> Analysis {
    let cpu_requested = 1000;
    let mem_requested = 1_000_000_000;
    Analysis {
        namespace: "default".into(),
        deployment: "d".into(),
        metrics: DeploymentMetrics {
            replica_count: 1,
            restart_count: 0,
            cpu: stats(cpu_requested, cpu_requested * 2, cpu_u * cpu_requested as f64),
            memory: stats(mem_requested, mem_requested * 2, mem_u * mem_requested as f64),
            hpa: None,
        },
        cpu_over: cpu_u < 0.5,
        cpu_under: cpu_u > 1.6,
        mem_over: mem_u < 0.5,
        mem_under: mem_u > 1.6,
        hpa_needs_tuning: false,
        hpa_hit_ceiling: false,
        computed_at_nanos: 0,
    }
}

#[test]
fn component_and_overall_scores_stay_in_bounds_across_a_utilization_grid() {
    let scorer = Scorer::new(OptimizerConfig::default());
    let grid = [0.0, 0.1, 0.3, 0.5, 0.7, 0.8, 0.9, 1.0, 1.5, 2.0, 3.0];
    for &cpu_u in &grid {
        for &mem_u in &grid {
            let analysis = analysis_with_utilization(cpu_u, mem_u);
            let scores = scorer.score(&analysis);
            for v in [
                scores.utilization_score,
                scores.stability_score,
                scores.cost_efficiency_score,
                scores.efficiency_score,
                scores.health_score,
            ] {
                assert!((0.0..=100.0).contains(&v), "cpu_u={cpu_u} mem_u={mem_u} score={v} out of bounds");
            }
        }
    }
}

#[test]
fn priority_is_total_over_every_grid_point() {
    let scorer = Scorer::new(OptimizerConfig::default());
    let grid = [0.0, 0.3, 0.7, 1.0, 1.8];
    let savings_grid = [0.0, 10.0, 25.0, 60.0];
    for &cpu_u in &grid {
        for &mem_u in &grid {
            let analysis = analysis_with_utilization(cpu_u, mem_u);
            let health = scorer.health_score(&analysis);
            for &savings in &savings_grid {
                let p = scorer.priority(&analysis, health, savings);
                assert!(matches!(p, Priority::High | Priority::Medium | Priority::Low));
            }
        }
    }
}

#[test]
fn savings_above_high_threshold_forces_high_priority() {
    let scorer = Scorer::new(OptimizerConfig::default());
    let analysis = analysis_with_utilization(0.8, 0.8);
    assert_eq!(scorer.priority(&analysis, 95.0, 51.0), Priority::High);
}
