use chrono::Utc;
use k8s_openapi::api::core::v1::{EventSource, ObjectReference};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use nodefit_client::ControlPlane;
use nodefit_core::{Event, ObjectMeta, Pod, ResourceMeta};
use std::sync::Arc;
use tracing::{debug, warn};

/// Event type for informational events
pub const EVENT_TYPE_NORMAL: &str = "Normal";
/// Event type for problems the user should look at
pub const EVENT_TYPE_WARNING: &str = "Warning";

pub const REASON_SCHEDULED: &str = "Scheduled";
pub const REASON_FAILED_SCHEDULING: &str = "FailedScheduling";

/// Posts pod events on behalf of the scheduler
///
/// Event delivery is best effort: a failed post is logged and swallowed so
/// that it never changes the outcome of a scheduling attempt.
#[derive(Clone)]
pub struct EventRecorder {
    client: Arc<dyn ControlPlane>,
    component: String,
}

impl EventRecorder {
    pub fn new(client: Arc<dyn ControlPlane>, component: impl Into<String>) -> Self {
        Self {
            client,
            component: component.into(),
        }
    }

    /// Build an event about `pod`
    pub fn build(&self, pod: &Pod, event_type: &str, reason: &str, message: &str) -> Event {
        let now = Time(Utc::now());
        let namespace = pod.namespace_or_default().to_string();

        Event {
            metadata: ObjectMeta {
                generate_name: Some(format!("{}-", pod.name_or_unknown())),
                namespace: Some(namespace.clone()),
                ..Default::default()
            },
            involved_object: ObjectReference {
                kind: Some("Pod".to_string()),
                name: pod.metadata.name.clone(),
                namespace: Some(namespace),
                uid: pod.metadata.uid.clone(),
                ..Default::default()
            },
            reason: Some(reason.to_string()),
            message: Some(message.to_string()),
            type_: Some(event_type.to_string()),
            count: Some(1),
            first_timestamp: Some(now.clone()),
            last_timestamp: Some(now),
            source: Some(EventSource {
                component: Some(self.component.clone()),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    /// Post an event about `pod`, logging instead of failing
    pub async fn record(&self, pod: &Pod, event_type: &str, reason: &str, message: &str) {
        let event = self.build(pod, event_type, reason, message);

        match self.client.create_event(&event).await {
            Ok(()) => debug!(pod = %pod.name_or_unknown(), reason, "Posted event"),
            Err(e) => warn!(
                pod = %pod.name_or_unknown(),
                namespace = %pod.namespace_or_default(),
                reason,
                error = %e,
                "Failed to post event"
            ),
        }
    }
}
