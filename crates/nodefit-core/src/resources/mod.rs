pub mod quantities;

pub use quantities::ResourceQuantities;

use k8s_openapi::api::core::v1::{Node, Pod};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

/// Annotation naming the scheduler responsible for a pod
pub const SCHEDULER_NAME_ANNOTATION: &str = "scheduler.alpha.kubernetes.io/name";

/// Namespace assumed when an object does not carry one
pub const DEFAULT_NAMESPACE: &str = "default";

/// Read-only metadata accessors for control-plane resources
pub trait ResourceMeta {
    /// Get the metadata of this resource
    fn metadata(&self) -> &ObjectMeta;

    /// Name, or "<unknown>" for display purposes
    fn name_or_unknown(&self) -> &str {
        self.metadata().name.as_deref().unwrap_or("<unknown>")
    }

    /// Namespace, falling back to "default"
    fn namespace_or_default(&self) -> &str {
        self.metadata()
            .namespace
            .as_deref()
            .unwrap_or(DEFAULT_NAMESPACE)
    }

    /// Get the UID
    fn uid(&self) -> Option<&str> {
        self.metadata().uid.as_deref()
    }

    /// Get an annotation value
    fn annotation(&self, key: &str) -> Option<&str> {
        self.metadata()
            .annotations
            .as_ref()
            .and_then(|a| a.get(key))
            .map(String::as_str)
    }

    /// Get a label value
    fn label(&self, key: &str) -> Option<&str> {
        self.metadata()
            .labels
            .as_ref()
            .and_then(|l| l.get(key))
            .map(String::as_str)
    }
}

impl ResourceMeta for Pod {
    fn metadata(&self) -> &ObjectMeta {
        &self.metadata
    }
}

impl ResourceMeta for Node {
    fn metadata(&self) -> &ObjectMeta {
        &self.metadata
    }
}

/// The node a pod is assigned to; an empty `spec.nodeName` counts as none
pub fn assigned_node(pod: &Pod) -> Option<&str> {
    pod.spec
        .as_ref()
        .and_then(|s| s.node_name.as_deref())
        .filter(|n| !n.is_empty())
}

/// Whether the pod still waits for a node assignment
pub fn is_unscheduled(pod: &Pod) -> bool {
    assigned_node(pod).is_none()
}

/// Whether the pod names `scheduler_name` as its scheduler, either through
/// the scheduler annotation or through `spec.schedulerName`
pub fn is_claimed_by(pod: &Pod, scheduler_name: &str) -> bool {
    if pod.annotation(SCHEDULER_NAME_ANNOTATION) == Some(scheduler_name) {
        return true;
    }

    pod.spec
        .as_ref()
        .and_then(|s| s.scheduler_name.as_deref())
        == Some(scheduler_name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::PodSpec;
    use std::collections::BTreeMap;

    fn pod_with(node_name: Option<&str>, annotation: Option<&str>) -> Pod {
        let mut pod = Pod::default();
        pod.metadata.name = Some("nginx".to_string());
        if let Some(a) = annotation {
            pod.metadata.annotations = Some(BTreeMap::from([(
                SCHEDULER_NAME_ANNOTATION.to_string(),
                a.to_string(),
            )]));
        }
        pod.spec = Some(PodSpec {
            node_name: node_name.map(str::to_string),
            ..Default::default()
        });
        pod
    }

    #[test]
    fn test_assigned_node() {
        assert_eq!(assigned_node(&pod_with(Some("node1"), None)), Some("node1"));
        assert_eq!(assigned_node(&pod_with(Some(""), None)), None);
        assert_eq!(assigned_node(&pod_with(None, None)), None);
        assert_eq!(assigned_node(&Pod::default()), None);
    }

    #[test]
    fn test_is_unscheduled() {
        assert!(is_unscheduled(&pod_with(None, None)));
        assert!(is_unscheduled(&pod_with(Some(""), None)));
        assert!(!is_unscheduled(&pod_with(Some("node1"), None)));
    }

    #[test]
    fn test_is_claimed_by_annotation() {
        let pod = pod_with(None, Some("nodefit-scheduler"));
        assert!(is_claimed_by(&pod, "nodefit-scheduler"));
        assert!(!is_claimed_by(&pod, "default-scheduler"));
        assert!(!is_claimed_by(&pod_with(None, None), "nodefit-scheduler"));
    }

    #[test]
    fn test_is_claimed_by_scheduler_name() {
        let mut pod = pod_with(None, None);
        pod.spec.as_mut().unwrap().scheduler_name = Some("nodefit-scheduler".to_string());
        assert!(is_claimed_by(&pod, "nodefit-scheduler"));
    }

    #[test]
    fn test_meta_fallbacks() {
        let pod = Pod::default();
        assert_eq!(pod.name_or_unknown(), "<unknown>");
        assert_eq!(pod.namespace_or_default(), "default");
        assert_eq!(pod.uid(), None);
        assert_eq!(pod.label("app"), None);
    }
}
