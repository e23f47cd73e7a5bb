//! Collector — the sampling loop described in `spec.md` §4.3/§5.
//!
//! Cancellation uses `tokio_util::sync::CancellationToken`, grounded on
//! `open-telemetry-otel-arrow`'s admin-server/receiver shutdown pattern
//! (`cancel.cancelled().await` raced against periodic work via
//! `tokio::select!`) rather than a hand-rolled bool flag — the one
//! concurrency primitive the teacher repo itself never needed (a
//! one-shot CLI) but every long-running `otel-arrow` task reaches for.
//! The two lifecycle-method pre-checks (`start`/`stop` idempotency via an
//! explicit status check before acting) mirror
//! `node_inspection/collector.rs`'s `NodeInspectorStatus` guard style.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::stream::{FuturesUnordered, StreamExt};
use log::{debug, info, warn};
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::OptimizerConfig;
use crate::error::{OptimizerError, Result};
use crate::store::{Point, SeriesKey, TimeSeriesStore};
use crate::telemetry::{ClusterTelemetryPort, ResourceKind, Sample, SampleUsage};

fn now_nanos() -> i64 {
    chrono::Utc::now().timestamp_nanos_opt().unwrap_or(0)
}

/// Writes one point per applicable metric for `sample` into `store`.
fn write_sample(store: &TimeSeriesStore, sample: &Sample) {
    let key = SeriesKey::new(sample.kind, sample.namespace.clone(), sample.name.clone());
    let ts = sample.timestamp_nanos;
    match &sample.usage {
        SampleUsage::PodOrNode { cpu_milli, mem_bytes } => {
            let _ = store.append(&key, "cpu", Point { timestamp_nanos: ts, value: *cpu_milli as f64 });
            let _ = store.append(&key, "memory", Point { timestamp_nanos: ts, value: *mem_bytes as f64 });
        }
        SampleUsage::Hpa {
            current_replicas,
            desired_replicas,
            target_cpu_pct,
            current_cpu_pct,
            ..
        } => {
            let _ = store.append(&key, "current_replicas", Point { timestamp_nanos: ts, value: *current_replicas as f64 });
            let _ = store.append(&key, "desired_replicas", Point { timestamp_nanos: ts, value: *desired_replicas as f64 });
            let _ = store.append(&key, "target_cpu", Point { timestamp_nanos: ts, value: *target_cpu_pct });
            let _ = store.append(&key, "current_cpu", Point { timestamp_nanos: ts, value: *current_cpu_pct });
        }
    }
}

struct RunningLoops {
    cancel: CancellationToken,
    sampling: JoinHandle<()>,
    eviction: JoinHandle<()>,
}

/// Owns the scheduled sampling and eviction loops. The sole writer of
/// points into the store; external callers never inject samples.
pub struct Collector {
    config: OptimizerConfig,
    port: Arc<dyn ClusterTelemetryPort>,
    store: Arc<TimeSeriesStore>,
    running: AtomicBool,
    loops: AsyncMutex<Option<RunningLoops>>,
}

impl Collector {
    pub fn new(config: OptimizerConfig, port: Arc<dyn ClusterTelemetryPort>, store: Arc<TimeSeriesStore>) -> Self {
        Self {
            config,
            port,
            store,
            running: AtomicBool::new(false),
            loops: AsyncMutex::new(None),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Spawns the sampling loop and the eviction loop. Fails with
    /// `AlreadyRunning` if a prior `start()` hasn't been `stop()`ped yet.
    pub async fn start(self: &Arc<Self>) -> Result<()> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(OptimizerError::AlreadyRunning);
        }

        let cancel = CancellationToken::new();

        let sampling = {
            let this = self.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { this.sampling_loop(cancel).await })
        };
        let eviction = {
            let this = self.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { this.eviction_loop(cancel).await })
        };

        *self.loops.lock().await = Some(RunningLoops { cancel, sampling, eviction });
        info!("collector started: interval={:?}, namespaces={:?}", self.config.collection_interval, self.config.namespaces);
        Ok(())
    }

    /// Cancels both loops and waits for the in-flight tick to finish.
    /// Idempotent: a second call observes `is_running() == false` and
    /// returns immediately.
    pub async fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        let handles = self.loops.lock().await.take();
        if let Some(RunningLoops { cancel, sampling, eviction }) = handles {
            cancel.cancel();
            let _ = sampling.await;
            let _ = eviction.await;
        }
        info!("collector stopped");
    }

    async fn sampling_loop(&self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.config.collection_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    let deadline = self.config.collection_interval.mul_f64(0.9);
                    match tokio::time::timeout(deadline, self.run_tick()).await {
                        Ok(()) => {}
                        Err(_) => warn!("collector tick missed its deadline of {:?}, samples discarded", deadline),
                    }
                }
            }
        }
    }

    async fn eviction_loop(&self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.config.cleanup_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    let cutoff = now_nanos().saturating_sub(self.config.retention_period.as_nanos() as i64);
                    self.store.evict_older_than(cutoff);
                    debug!("evicted points older than cutoff={cutoff}");
                }
            }
        }
    }

    async fn namespaces_in_scope(&self) -> Result<Vec<String>> {
        if !self.config.namespaces.is_empty() {
            return Ok(self.config.namespaces.clone());
        }
        self.port.list_namespaces().await
    }

    /// One collection tick: enumerate pods (per namespace), nodes, HPAs;
    /// write one point per applicable metric. Errors are logged and
    /// never abort the tick.
    async fn run_tick(&self) {
        let namespaces = match self.namespaces_in_scope().await {
            Ok(ns) => ns,
            Err(e) if e.is_swallowable() => {
                warn!("tick: failed to list namespaces: {e}");
                return;
            }
            Err(e) => {
                warn!("tick: unexpected error listing namespaces: {e}");
                return;
            }
        };

        match self.port.sample_nodes().await {
            Ok(samples) => samples.iter().for_each(|s| write_sample(&self.store, s)),
            Err(e) => warn!("tick: node sampling failed: {e}"),
        }

        let mut workers = FuturesUnordered::new();
        for ns in namespaces {
            let port = self.port.clone();
            workers.push(async move {
                let pods = port.sample_pods(&ns).await;
                let hpas = port.sample_hpas(&ns).await;
                (ns, pods, hpas)
            });
        }

        while let Some((ns, pods, hpas)) = workers.next().await {
            match pods {
                Ok(samples) => samples.iter().for_each(|s| write_sample(&self.store, s)),
                Err(e) if e.is_swallowable() => debug!("tick: pod sampling for {ns} swallowed: {e}"),
                Err(e) => warn!("tick: pod sampling for {ns} failed: {e}"),
            }
            match hpas {
                Ok(samples) => samples.iter().for_each(|s| write_sample(&self.store, s)),
                Err(e) if e.is_swallowable() => debug!("tick: hpa sampling for {ns} swallowed: {e}"),
                Err(e) => warn!("tick: hpa sampling for {ns} failed: {e}"),
            }
        }
    }

    /// Synchronous convenience snapshot: consults the port directly, not
    /// the store. Must not suspend the sampling loop.
    pub async fn collect_pod_metrics(&self, namespace: &str) -> Result<Vec<Sample>> {
        self.port.sample_pods(namespace).await
    }

    pub async fn collect_node_metrics(&self) -> Result<Vec<Sample>> {
        self.port.sample_nodes().await
    }

    pub async fn collect_hpa_metrics(&self, namespace: &str) -> Result<Vec<Sample>> {
        self.port.sample_hpas(namespace).await
    }
}

#[allow(dead_code)]
fn permitted_for(kind: ResourceKind) -> &'static [&'static str] {
    crate::telemetry::permitted_metrics(kind)
}
