use crate::binder::Binder;
use crate::fit::FitEvaluator;
use crate::recorder::EventRecorder;
use crate::select::NodeSelector;
use crate::types::{Origin, ScheduleOutcome, SkipReason};
use crate::Result;
use nodefit_client::ControlPlane;
use nodefit_core::{is_claimed_by, is_unscheduled, Pod, ResourceMeta};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Configuration for the scheduling coordinator
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Name pods use to claim this scheduler; also the event source
    pub scheduler_name: String,
    /// Pause before a watch-discovered pod is scheduled
    pub settle_delay: Duration,
    /// How long a bound pod is remembered
    pub ledger_ttl: Duration,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            scheduler_name: "nodefit-scheduler".to_string(),
            settle_delay: Duration::from_secs(2),
            ledger_ttl: Duration::from_secs(600),
        }
    }
}

/// Pods this process has bound, keyed by uid (or namespace/name)
#[derive(Debug, Default)]
struct BindLedger {
    bound: HashMap<String, Instant>,
}

impl BindLedger {
    fn prune(&mut self, now: Instant, ttl: Duration) {
        self.bound.retain(|_, at| now.duration_since(*at) < ttl);
    }

    fn contains(&self, key: &str) -> bool {
        self.bound.contains_key(key)
    }

    fn record(&mut self, key: String, now: Instant) {
        self.bound.insert(key, now);
    }
}

fn ledger_key(pod: &Pod) -> String {
    match pod.uid() {
        Some(uid) => uid.to_string(),
        None => format!("{}/{}", pod.namespace_or_default(), pod.name_or_unknown()),
    }
}

/// Serializes scheduling attempts
///
/// Every submission, from either discovery path, runs the whole pipeline
/// (fit, select, bind) while holding a single gate, so two attempts never
/// observe the same free capacity.
pub struct Coordinator {
    fit: FitEvaluator,
    selector: Box<dyn NodeSelector>,
    binder: Binder,
    config: CoordinatorConfig,
    gate: Mutex<BindLedger>,
}

impl Coordinator {
    pub fn new(
        client: Arc<dyn ControlPlane>,
        selector: Box<dyn NodeSelector>,
        config: CoordinatorConfig,
    ) -> Self {
        let recorder = EventRecorder::new(client.clone(), config.scheduler_name.clone());

        Self {
            fit: FitEvaluator::new(client.clone(), recorder.clone()),
            selector,
            binder: Binder::new(client, recorder),
            config,
            gate: Mutex::new(BindLedger::default()),
        }
    }

    pub fn scheduler_name(&self) -> &str {
        &self.config.scheduler_name
    }

    /// Run one scheduling attempt for `pod`
    ///
    /// Waits for the gate, skips pods that are assigned, unclaimed or
    /// already bound by this process, then applies the settle delay on the
    /// watch path. Cancellation before the pipeline starts abandons the
    /// attempt.
    pub async fn submit(
        &self,
        pod: &Pod,
        origin: Origin,
        token: &CancellationToken,
    ) -> Result<ScheduleOutcome> {
        let mut ledger = tokio::select! {
            biased;
            _ = token.cancelled() => return Ok(ScheduleOutcome::Skipped(SkipReason::Cancelled)),
            ledger = self.gate.lock() => ledger,
        };

        if token.is_cancelled() {
            return Ok(ScheduleOutcome::Skipped(SkipReason::Cancelled));
        }
        if !is_unscheduled(pod) {
            return Ok(ScheduleOutcome::Skipped(SkipReason::AlreadyAssigned));
        }
        if !is_claimed_by(pod, &self.config.scheduler_name) {
            return Ok(ScheduleOutcome::Skipped(SkipReason::NotClaimed));
        }

        let key = ledger_key(pod);
        ledger.prune(Instant::now(), self.config.ledger_ttl);
        if ledger.contains(&key) {
            return Ok(ScheduleOutcome::Skipped(SkipReason::AlreadyBound));
        }

        // Skipped pods never pay the settle delay
        if origin == Origin::Watch && !self.config.settle_delay.is_zero() {
            tokio::select! {
                biased;
                _ = token.cancelled() => return Ok(ScheduleOutcome::Skipped(SkipReason::Cancelled)),
                _ = sleep(self.config.settle_delay) => {}
            }
        }

        let outcome = self.schedule_pod(pod).await?;
        if matches!(outcome, ScheduleOutcome::Scheduled { .. }) {
            ledger.record(key, Instant::now());
        }

        Ok(outcome)
    }

    /// Submit and log the result with pod context
    pub async fn submit_logged(&self, pod: &Pod, origin: Origin, token: &CancellationToken) {
        let pod_name = pod.name_or_unknown();
        let namespace = pod.namespace_or_default();

        match self.submit(pod, origin, token).await {
            Ok(ScheduleOutcome::Scheduled { node }) => {
                debug!(pod = %pod_name, namespace = %namespace, node = %node, %origin, "Scheduling attempt bound pod");
            }
            Ok(ScheduleOutcome::NoFit) => {
                info!(pod = %pod_name, namespace = %namespace, %origin, "No node fits pod");
            }
            Ok(ScheduleOutcome::Skipped(reason)) => {
                debug!(pod = %pod_name, namespace = %namespace, %origin, %reason, "Skipped pod");
            }
            Err(e) => {
                error!(pod = %pod_name, namespace = %namespace, %origin, error = %e, "Failed to schedule pod");
            }
        }
    }

    async fn schedule_pod(&self, pod: &Pod) -> Result<ScheduleOutcome> {
        let candidates = self.fit.fit(pod).await?;
        if candidates.is_empty() {
            return Ok(ScheduleOutcome::NoFit);
        }

        info!(
            pod = %pod.name_or_unknown(),
            candidates = candidates.len(),
            selector = self.selector.name(),
            "Pod has fitting nodes"
        );

        let node = self.selector.select(&candidates).inspect_err(|e| {
            warn!(pod = %pod.name_or_unknown(), error = %e, "Node selection failed");
        })?;

        self.binder.bind(pod, &node).await?;

        Ok(ScheduleOutcome::Scheduled {
            node: node.name_or_unknown().to_string(),
        })
    }
}
