use crate::recorder::{EventRecorder, EVENT_TYPE_NORMAL, REASON_SCHEDULED};
use crate::Result;
use k8s_openapi::api::core::v1::ObjectReference;
use nodefit_client::ControlPlane;
use nodefit_core::{Binding, CoreError, Node, ObjectMeta, Pod, ResourceMeta};
use std::sync::Arc;
use tracing::info;

/// Build the binding that assigns `pod` to `node_name`
pub fn build_binding(pod: &Pod, node_name: &str) -> Result<Binding> {
    let pod_name = pod
        .metadata
        .name
        .as_ref()
        .ok_or_else(|| CoreError::missing_field("Pod", "metadata.name"))?;

    Ok(Binding {
        metadata: ObjectMeta {
            name: Some(pod_name.clone()),
            namespace: Some(pod.namespace_or_default().to_string()),
            ..Default::default()
        },
        target: ObjectReference {
            api_version: Some("v1".to_string()),
            kind: Some("Node".to_string()),
            name: Some(node_name.to_string()),
            ..Default::default()
        },
    })
}

/// Commits scheduling decisions to the control plane
pub struct Binder {
    client: Arc<dyn ControlPlane>,
    recorder: EventRecorder,
}

impl Binder {
    pub fn new(client: Arc<dyn ControlPlane>, recorder: EventRecorder) -> Self {
        Self { client, recorder }
    }

    /// Bind `pod` to `node` and announce it with a Scheduled event
    ///
    /// A rejected binding is returned as an error and not retried. The
    /// event is best effort.
    pub async fn bind(&self, pod: &Pod, node: &Node) -> Result<()> {
        let node_name = node
            .metadata
            .name
            .as_deref()
            .ok_or_else(|| CoreError::missing_field("Node", "metadata.name"))?;

        let binding = build_binding(pod, node_name)?;
        self.client.create_binding(&binding).await?;

        let message = format!(
            "Successfully assigned {} to {}",
            pod.name_or_unknown(),
            node_name
        );
        info!(pod = %pod.name_or_unknown(), node = %node_name, "{}", message);

        self.recorder
            .record(pod, EVENT_TYPE_NORMAL, REASON_SCHEDULED, &message)
            .await;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{create_test_node, create_test_pod};
    use crate::SchedulerError;
    use nodefit_client::{MockCall, MockControlPlane};

    fn binder_for(mock: &MockControlPlane) -> Binder {
        let client: Arc<dyn ControlPlane> = Arc::new(mock.clone());
        Binder::new(client.clone(), EventRecorder::new(client, "nodefit-scheduler"))
    }

    #[test]
    fn test_build_binding() {
        let mut pod = create_test_pod("web", &[Some("1")], None);
        pod.metadata.namespace = Some("shop".to_string());

        let binding = build_binding(&pod, "node1").unwrap();
        assert_eq!(binding.metadata.name.as_deref(), Some("web"));
        assert_eq!(binding.metadata.namespace.as_deref(), Some("shop"));
        assert_eq!(binding.target.kind.as_deref(), Some("Node"));
        assert_eq!(binding.target.api_version.as_deref(), Some("v1"));
        assert_eq!(binding.target.name.as_deref(), Some("node1"));

        assert!(matches!(
            build_binding(&Pod::default(), "node1"),
            Err(SchedulerError::CoreError(CoreError::MissingField { .. }))
        ));
    }

    #[tokio::test]
    async fn test_bind_then_event() {
        let mock = MockControlPlane::new();
        let pod = create_test_pod("web", &[Some("1")], None);
        mock.add_pod(pod.clone()).await;

        binder_for(&mock)
            .bind(&pod, &create_test_node("node1", "4"))
            .await
            .unwrap();

        assert_eq!(
            mock.calls().await,
            vec![
                MockCall::Binding {
                    pod: "web".to_string(),
                    node: "node1".to_string(),
                },
                MockCall::Event {
                    reason: "Scheduled".to_string(),
                    event_type: "Normal".to_string(),
                },
            ]
        );
        assert_eq!(
            mock.events().await[0].message.as_deref(),
            Some("Successfully assigned web to node1")
        );
    }

    #[tokio::test]
    async fn test_rejected_binding_posts_no_event() {
        let mock = MockControlPlane::new();
        mock.set_fail_bindings(true).await;
        let pod = create_test_pod("web", &[Some("1")], None);
        mock.add_pod(pod.clone()).await;

        let result = binder_for(&mock)
            .bind(&pod, &create_test_node("node1", "4"))
            .await;

        assert!(matches!(result, Err(SchedulerError::ClientError(_))));
        assert!(mock.calls().await.is_empty());
    }

    #[tokio::test]
    async fn test_event_failure_does_not_fail_bind() {
        let mock = MockControlPlane::new();
        mock.set_fail_events(true).await;
        let pod = create_test_pod("web", &[Some("1")], None);
        mock.add_pod(pod.clone()).await;

        binder_for(&mock)
            .bind(&pod, &create_test_node("node1", "4"))
            .await
            .unwrap();

        assert_eq!(mock.bindings().await.len(), 1);
        assert!(mock.events().await.is_empty());
    }
}
