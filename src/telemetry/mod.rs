//! Cluster Telemetry Port — the only place the core touches a cluster.
//!
//! See `spec.md` §4.1. This module defines the capability as a trait so
//! the collector, analyzer, and tests can all depend on an abstraction
//! instead of a live cluster. `kube_port` implements it against a real
//! Kubernetes API server; `fake` implements it for tests.

pub mod fake;
pub mod kube_port;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Resource kind a `Sample` describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Pod,
    Node,
    Hpa,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Pod => "pod",
            ResourceKind::Node => "node",
            ResourceKind::Hpa => "hpa",
        }
    }
}

/// Metric names permitted for a given `ResourceKind` (`spec.md` §3).
pub fn permitted_metrics(kind: ResourceKind) -> &'static [&'static str] {
    match kind {
        ResourceKind::Pod | ResourceKind::Node => &["cpu", "memory"],
        ResourceKind::Hpa => &["current_replicas", "desired_replicas", "target_cpu", "current_cpu"],
    }
}

/// One collector observation of a resource at an instant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub kind: ResourceKind,
    pub name: String,
    pub namespace: Option<String>,
    pub timestamp_nanos: i64,
    pub usage: SampleUsage,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SampleUsage {
    PodOrNode {
        cpu_milli: i64,
        mem_bytes: i64,
    },
    Hpa {
        current_replicas: i32,
        desired_replicas: i32,
        min_replicas: i32,
        max_replicas: i32,
        target_cpu_pct: f64,
        current_cpu_pct: f64,
    },
}

/// Per-container requested/limit resources, summed at the deployment pod
/// level by the analyzer (multi-container pods sum container requests).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceRequirements {
    pub cpu_request_milli: i64,
    pub cpu_limit_milli: i64,
    pub mem_request_bytes: i64,
    pub mem_limit_bytes: i64,
}

/// Facts about a single pod needed by the analyzer: its resource
/// configuration and restart count. Usage samples come from the store,
/// not from this struct.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PodFacts {
    pub name: String,
    pub namespace: String,
    pub resources: ResourceRequirements,
    pub restart_count: u32,
}

/// Resolved shape of a deployment: its pod selector's match, the pods it
/// currently selects, and whether an HPA targets it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploymentFacts {
    pub name: String,
    pub namespace: String,
    pub replica_count: i32,
    pub pods: Vec<PodFacts>,
    pub hpa: Option<HpaFacts>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HpaFacts {
    pub name: String,
    pub min_replicas: i32,
    pub max_replicas: i32,
    pub target_cpu_pct: f64,
}

/// Abstract source of pod/node/HPA/deployment facts. The core never
/// touches a cluster except through this trait.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ClusterTelemetryPort: Send + Sync {
    /// Lists the namespaces to sample. An empty `Vec` from the config
    /// means "all namespaces"; implementations resolve that here.
    async fn list_namespaces(&self) -> Result<Vec<String>>;

    /// Instantaneous pod usage samples in a namespace.
    async fn sample_pods(&self, namespace: &str) -> Result<Vec<Sample>>;

    /// Instantaneous node usage samples, cluster-scoped.
    async fn sample_nodes(&self) -> Result<Vec<Sample>>;

    /// Instantaneous HPA status samples in a namespace.
    async fn sample_hpas(&self, namespace: &str) -> Result<Vec<Sample>>;

    /// Resolves a deployment to its current pod set, their resource
    /// configuration and restart counts, and its HPA if any.
    async fn resolve_deployment(&self, namespace: &str, name: &str) -> Result<DeploymentFacts>;

    /// Lists (namespace, deployment name) pairs in scope.
    async fn list_deployments(&self, namespaces: &[String]) -> Result<Vec<(String, String)>>;
}
