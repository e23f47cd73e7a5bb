//! In-memory `ClusterTelemetryPort` for tests (`spec.md` §9: "enabling
//! fakes in tests that feed synthetic samples and deployment shapes").
//!
//! Scripted the way the teacher's test doubles are built: a plain struct
//! holding fixed/queued responses, behind `parking_lot::Mutex` so a single
//! `Arc<FakeTelemetryPort>` can be shared between a collector and the test
//! driving it.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::{OptimizerError, Result};
use crate::telemetry::{ClusterTelemetryPort, DeploymentFacts, Sample};

#[derive(Default)]
pub struct FakeTelemetryPort {
    inner: Mutex<FakeState>,
}

#[derive(Default)]
struct FakeState {
    namespaces: Vec<String>,
    pod_samples: HashMap<String, Vec<Sample>>,
    node_samples: Vec<Sample>,
    hpa_samples: HashMap<String, Vec<Sample>>,
    deployments: HashMap<(String, String), DeploymentFacts>,
    deployment_list: Vec<(String, String)>,
    fail_next_tick: bool,
}

impl FakeTelemetryPort {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_namespaces(&self, namespaces: Vec<String>) {
        self.inner.lock().namespaces = namespaces;
    }

    pub fn set_pod_samples(&self, namespace: &str, samples: Vec<Sample>) {
        self.inner
            .lock()
            .pod_samples
            .insert(namespace.to_string(), samples);
    }

    pub fn set_node_samples(&self, samples: Vec<Sample>) {
        self.inner.lock().node_samples = samples;
    }

    pub fn set_hpa_samples(&self, namespace: &str, samples: Vec<Sample>) {
        self.inner
            .lock()
            .hpa_samples
            .insert(namespace.to_string(), samples);
    }

    pub fn set_deployment(&self, facts: DeploymentFacts) {
        let key = (facts.namespace.clone(), facts.name.clone());
        let mut inner = self.inner.lock();
        if !inner.deployment_list.contains(&key) {
            inner.deployment_list.push(key.clone());
        }
        inner.deployments.insert(key, facts);
    }

    /// Makes the next telemetry call (any kind) return `Transient`, then
    /// reverts to normal — used to test the collector's swallow-and-
    /// continue behavior (`spec.md` §4.3, §7).
    pub fn fail_next_call(&self) {
        self.inner.lock().fail_next_tick = true;
    }

    fn take_failure(&self) -> bool {
        let mut inner = self.inner.lock();
        std::mem::replace(&mut inner.fail_next_tick, false)
    }
}

#[async_trait]
impl ClusterTelemetryPort for FakeTelemetryPort {
    async fn list_namespaces(&self) -> Result<Vec<String>> {
        if self.take_failure() {
            return Err(OptimizerError::Transient("fake: list_namespaces".into()));
        }
        Ok(self.inner.lock().namespaces.clone())
    }

    async fn sample_pods(&self, namespace: &str) -> Result<Vec<Sample>> {
        if self.take_failure() {
            return Err(OptimizerError::Transient("fake: sample_pods".into()));
        }
        Ok(self
            .inner
            .lock()
            .pod_samples
            .get(namespace)
            .cloned()
            .unwrap_or_default())
    }

    async fn sample_nodes(&self) -> Result<Vec<Sample>> {
        if self.take_failure() {
            return Err(OptimizerError::Transient("fake: sample_nodes".into()));
        }
        Ok(self.inner.lock().node_samples.clone())
    }

    async fn sample_hpas(&self, namespace: &str) -> Result<Vec<Sample>> {
        if self.take_failure() {
            return Err(OptimizerError::Transient("fake: sample_hpas".into()));
        }
        Ok(self
            .inner
            .lock()
            .hpa_samples
            .get(namespace)
            .cloned()
            .unwrap_or_default())
    }

    async fn resolve_deployment(&self, namespace: &str, name: &str) -> Result<DeploymentFacts> {
        if self.take_failure() {
            return Err(OptimizerError::Transient("fake: resolve_deployment".into()));
        }
        self.inner
            .lock()
            .deployments
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
            .ok_or_else(|| OptimizerError::NotFound(format!("deployment {namespace}/{name}")))
    }

    async fn list_deployments(&self, namespaces: &[String]) -> Result<Vec<(String, String)>> {
        if self.take_failure() {
            return Err(OptimizerError::Transient("fake: list_deployments".into()));
        }
        let inner = self.inner.lock();
        if namespaces.is_empty() {
            Ok(inner.deployment_list.clone())
        } else {
            Ok(inner
                .deployment_list
                .iter()
                .filter(|(ns, _)| namespaces.contains(ns))
                .cloned()
                .collect())
        }
    }
}
