use crate::error::Result;
use async_trait::async_trait;
use futures_util::stream::BoxStream;
use k8s_openapi::api::core::v1::{Binding, Event, Node, Pod};
use nodefit_core::WatchEvent;

/// Stream of decoded pod watch events
///
/// Each item is one notification. An `Err` item means the stream is no
/// longer usable (decode failure, transport failure, server-side ERROR
/// event) and the caller should reconnect.
pub type PodWatchStream = BoxStream<'static, Result<WatchEvent<Pod>>>;

/// The subset of the cluster API the scheduler consumes
///
/// `ApiClient` talks to a real API server over HTTPS; `MockControlPlane`
/// keeps everything in memory for tests.
#[async_trait]
pub trait ControlPlane: Send + Sync {
    /// List all nodes
    async fn list_nodes(&self) -> Result<Vec<Node>>;

    /// List pods in all namespaces, optionally restricted by a field selector
    async fn list_pods(&self, field_selector: Option<&str>) -> Result<Vec<Pod>>;

    /// Open a watch on pods matching the field selector
    ///
    /// Fails when the connection cannot be established or the server
    /// answers with a non-success status.
    async fn watch_pods(&self, field_selector: &str) -> Result<PodWatchStream>;

    /// Create the binding sub-resource of a pod
    async fn create_binding(&self, binding: &Binding) -> Result<()>;

    /// Create an event
    async fn create_event(&self, event: &Event) -> Result<()>;
}
