use crate::accounting::{account_usage, node_allocatable_cpu, pod_cpu_demand};
use crate::recorder::{EventRecorder, EVENT_TYPE_WARNING, REASON_FAILED_SCHEDULING};
use crate::types::{FilterResult, FitReport, ResourceUsage};
use crate::Result;
use nodefit_client::ControlPlane;
use nodefit_core::{Node, Pod, ResourceMeta, ResourceQuantities};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Field selector for pods that still hold resources on their node
pub const ACTIVE_PODS_SELECTOR: &str = "status.phase!=Succeeded,status.phase!=Failed";

/// Check a pod's CPU demand against every node
///
/// A node is a candidate when its free CPU (allocatable minus committed)
/// covers the demand. Candidates keep the order of `nodes`.
pub fn evaluate_fit(
    pod: &Pod,
    nodes: &[Node],
    usage: &HashMap<String, ResourceUsage>,
) -> Result<FitReport> {
    let demand = pod_cpu_demand(pod)?;
    let mut report = FitReport {
        demand_millicores: demand,
        ..Default::default()
    };

    for node in nodes {
        let node_name = node.name_or_unknown().to_string();
        let allocatable = node_allocatable_cpu(node)?;
        let committed = usage
            .get(&node_name)
            .map(|u| u.cpu_millicores)
            .unwrap_or(0);
        let free = allocatable - committed;

        if free >= demand {
            debug!(
                pod = %pod.name_or_unknown(),
                node = %node_name,
                demand,
                free,
                "Node fits"
            );
            report.candidates.push(node.clone());
        } else {
            let reason = format!(
                "fit failure on node ({}): Insufficient CPU (requested {}, free {})",
                node_name,
                ResourceQuantities::format_cpu(demand),
                ResourceQuantities::format_cpu(free)
            );
            report.failures.push(FilterResult::fail(node_name, reason));
        }
    }

    Ok(report)
}

/// Fit evaluation against live cluster state
pub struct FitEvaluator {
    client: Arc<dyn ControlPlane>,
    recorder: EventRecorder,
}

impl FitEvaluator {
    pub fn new(client: Arc<dyn ControlPlane>, recorder: EventRecorder) -> Self {
        Self { client, recorder }
    }

    /// Nodes that can take `pod` right now
    ///
    /// Lists nodes and active pods, rebuilds committed usage and evaluates
    /// the fit. When nothing fits, one FailedScheduling event is posted and
    /// an empty list is returned.
    pub async fn fit(&self, pod: &Pod) -> Result<Vec<Node>> {
        let nodes = self.client.list_nodes().await?;
        let pods = self.client.list_pods(Some(ACTIVE_PODS_SELECTOR)).await?;
        let usage = account_usage(&nodes, &pods)?;

        let report = evaluate_fit(pod, &nodes, &usage)?;

        if !report.has_candidates() {
            let reasons = report.failure_reasons();
            for reason in &reasons {
                debug!(pod = %pod.name_or_unknown(), "{}", reason);
            }

            let message = format!(
                "pod ({}) failed to fit in any node\n{}",
                pod.name_or_unknown(),
                reasons.join("\n")
            );
            info!(
                pod = %pod.name_or_unknown(),
                demand = report.demand_millicores,
                nodes = nodes.len(),
                "Pod does not fit on any node"
            );
            self.recorder
                .record(pod, EVENT_TYPE_WARNING, REASON_FAILED_SCHEDULING, &message)
                .await;
        }

        Ok(report.candidates)
    }
}
