//! Ambient CLI output: renders the facade's recommendations as text or
//! JSON. Not part of the core analysis engine — the HTTP layer (out of
//! scope, `spec.md` §6) is the real consumer contract; this is a thin
//! demonstration surface for the `kubeowler-optimizer` binary, in the
//! same spirit as the teacher's `reporting` module but scoped to one
//! report kind instead of the teacher's multi-format inspection report.

use std::fmt::Write as _;

use crate::optimizer::Stats;
use crate::recommend::{Recommendation, RecommendationConfig, RecommendationKind};
use crate::scoring::Priority;

pub fn write_report(recommendations: &[Recommendation], stats: &Stats, format: &str) -> String {
    match format {
        "json" => write_json(recommendations, stats),
        _ => write_text(recommendations, stats),
    }
}

/// Renders and writes the report to `path`, creating/truncating the file.
/// Used by the `optimize` CLI command's `--output` flag.
pub fn write_report_to_file(
    recommendations: &[Recommendation],
    stats: &Stats,
    format: &str,
    path: &std::path::Path,
) -> std::io::Result<()> {
    std::fs::write(path, write_report(recommendations, stats, format))
}

fn priority_label(p: Priority) -> &'static str {
    match p {
        Priority::High => "HIGH",
        Priority::Medium => "MEDIUM",
        Priority::Low => "LOW",
    }
}

fn kind_label(k: RecommendationKind) -> &'static str {
    match k {
        RecommendationKind::Resource => "resource",
        RecommendationKind::Hpa => "hpa",
        RecommendationKind::Scaling => "scaling",
    }
}

fn config_summary(cfg: &RecommendationConfig) -> String {
    match cfg {
        RecommendationConfig::Resource { cpu_milli, mem_bytes } => {
            format!("cpu={cpu_milli}m mem={}Mi", mem_bytes / (1024 * 1024))
        }
        RecommendationConfig::Hpa { min_replicas, max_replicas, target_cpu_pct } => {
            format!("min={min_replicas} max={max_replicas} target_cpu={target_cpu_pct:.0}%")
        }
        RecommendationConfig::Scaling { replicas } => format!("replicas={replicas}"),
    }
}

fn write_text(recommendations: &[Recommendation], stats: &Stats) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "kubeowler-optimizer recommendation report");
    let _ = writeln!(
        out,
        "{} recommendations (high={}, medium={}, low={}), estimated monthly savings ${:.2}",
        recommendations.len(),
        stats.count_high,
        stats.count_medium,
        stats.count_low,
        stats.total_savings
    );
    let _ = writeln!(out);

    let mut sorted: Vec<&Recommendation> = recommendations.iter().collect();
    sorted.sort_by_key(|r| match r.priority {
        Priority::High => 0,
        Priority::Medium => 1,
        Priority::Low => 2,
    });

    for rec in sorted {
        let _ = writeln!(
            out,
            "[{}] {}/{} ({}) current={} -> recommended={} savings=${:.2}/mo",
            priority_label(rec.priority),
            rec.namespace,
            rec.deployment,
            kind_label(rec.kind),
            config_summary(&rec.current_config),
            config_summary(&rec.recommended_config),
            rec.estimated_monthly_savings
        );
        let _ = writeln!(out, "    {}", rec.risk);
    }
    out
}

fn write_json(recommendations: &[Recommendation], stats: &Stats) -> String {
    #[derive(serde::Serialize)]
    struct Report<'a> {
        count_high: usize,
        count_medium: usize,
        count_low: usize,
        total_savings: f64,
        recommendations: &'a [Recommendation],
    }
    let report = Report {
        count_high: stats.count_high,
        count_medium: stats.count_medium,
        count_low: stats.count_low,
        total_savings: stats.total_savings,
        recommendations,
    };
    serde_json::to_string_pretty(&report).unwrap_or_else(|_| "{}".to_string())
}
