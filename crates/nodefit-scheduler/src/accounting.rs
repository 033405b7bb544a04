use crate::types::ResourceUsage;
use crate::Result;
use nodefit_core::{assigned_node, Node, Pod, ResourceMeta, ResourceQuantities};
use std::collections::HashMap;
use tracing::{debug, warn};

/// Total CPU requested by a pod's containers, in millicores
///
/// Containers without a CPU request contribute nothing. A malformed
/// request fails the whole pod.
pub fn pod_cpu_demand(pod: &Pod) -> Result<i64> {
    let Some(spec) = &pod.spec else {
        return Ok(0);
    };

    let mut total: i64 = 0;
    for container in &spec.containers {
        let requests = container
            .resources
            .as_ref()
            .and_then(|r| r.requests.as_ref());

        if let Some(requests) = requests {
            let cpu = ResourceQuantities::cpu_from_map(requests).inspect_err(|e| {
                warn!(
                    pod = %pod.name_or_unknown(),
                    container = %container.name,
                    error = %e,
                    "Malformed CPU request"
                );
            })?;
            total = total.saturating_add(cpu.unwrap_or(0));
        }
    }

    Ok(total)
}

/// Allocatable CPU of a node in millicores; a node without one counts as 0
pub fn node_allocatable_cpu(node: &Node) -> Result<i64> {
    let allocatable = node.status.as_ref().and_then(|s| s.allocatable.as_ref());

    match allocatable {
        Some(map) => {
            let cpu = ResourceQuantities::cpu_from_map(map).inspect_err(|e| {
                warn!(node = %node.name_or_unknown(), error = %e, "Malformed allocatable CPU");
            })?;
            Ok(cpu.unwrap_or(0))
        }
        None => Ok(0),
    }
}

/// Committed CPU per node
///
/// Every listed node starts at zero. Each pod assigned to a listed node adds
/// its container requests; pods on nodes missing from `nodes` are ignored.
pub fn account_usage(nodes: &[Node], pods: &[Pod]) -> Result<HashMap<String, ResourceUsage>> {
    let mut usage: HashMap<String, ResourceUsage> = nodes
        .iter()
        .filter_map(|n| n.metadata.name.clone())
        .map(|name| (name, ResourceUsage::default()))
        .collect();

    for pod in pods {
        let Some(node_name) = assigned_node(pod) else {
            continue;
        };

        let Some(entry) = usage.get_mut(node_name) else {
            debug!(
                pod = %pod.name_or_unknown(),
                node = %node_name,
                "Pod is bound to a node outside the node list, skipping"
            );
            continue;
        };

        entry.cpu_millicores = entry.cpu_millicores.saturating_add(pod_cpu_demand(pod)?);
    }

    Ok(usage)
}
