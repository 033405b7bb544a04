use crate::error::{ClientError, Result};
use crate::traits::{ControlPlane, PodWatchStream};
use async_trait::async_trait;
use futures_util::StreamExt;
use k8s_openapi::api::core::v1::{Binding, Event, Node, Pod};
use nodefit_core::{assigned_node, ResourceMeta, WatchEvent};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::debug;

/// One write observed by the mock, in call order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockCall {
    Binding { pod: String, node: String },
    Event { reason: String, event_type: String },
}

/// One item delivered on a mock watch stream
#[derive(Debug, Clone)]
pub enum MockWatchItem {
    Event(WatchEvent<Pod>),
    DecodeError(String),
}

/// Scripted behavior of one watch connection attempt
#[derive(Debug, Clone)]
pub enum MockWatchSession {
    /// The connection attempt fails
    Refuse,
    /// The connection succeeds, delivers the items, then the stream ends
    Stream(Vec<MockWatchItem>),
}

#[derive(Default)]
struct MockState {
    nodes: Vec<Node>,
    pods: Vec<Pod>,
    calls: Vec<MockCall>,
    events: Vec<Event>,
    watch_sessions: VecDeque<MockWatchSession>,
    watch_connects: usize,
    watch_selectors: Vec<String>,
    fail_list_nodes: bool,
    fail_bindings: bool,
    fail_events: bool,
    binding_delay: Duration,
    bindings_in_flight: usize,
    max_bindings_in_flight: usize,
}

/// In-memory control plane for tests
///
/// Behaves like an API server for the calls the scheduler makes: bindings
/// set `spec.nodeName` on the stored pod and are rejected with 409 when the
/// pod is already assigned. Watch connections replay scripted sessions;
/// once the script runs out, further connections stay open without
/// delivering anything.
#[derive(Clone, Default)]
pub struct MockControlPlane {
    state: Arc<RwLock<MockState>>,
}

impl MockControlPlane {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_node(&self, node: Node) {
        self.state.write().await.nodes.push(node);
    }

    pub async fn add_pod(&self, pod: Pod) {
        self.state.write().await.pods.push(pod);
    }

    pub async fn push_watch_session(&self, session: MockWatchSession) {
        self.state.write().await.watch_sessions.push_back(session);
    }

    pub async fn set_fail_list_nodes(&self, fail: bool) {
        self.state.write().await.fail_list_nodes = fail;
    }

    pub async fn set_fail_bindings(&self, fail: bool) {
        self.state.write().await.fail_bindings = fail;
    }

    pub async fn set_fail_events(&self, fail: bool) {
        self.state.write().await.fail_events = fail;
    }

    /// Hold every binding call for `delay` before committing it
    pub async fn set_binding_delay(&self, delay: Duration) {
        self.state.write().await.binding_delay = delay;
    }

    /// All writes in the order they were accepted
    pub async fn calls(&self) -> Vec<MockCall> {
        self.state.read().await.calls.clone()
    }

    /// Accepted bindings as (pod, node) pairs
    pub async fn bindings(&self) -> Vec<(String, String)> {
        self.state
            .read()
            .await
            .calls
            .iter()
            .filter_map(|c| match c {
                MockCall::Binding { pod, node } => Some((pod.clone(), node.clone())),
                MockCall::Event { .. } => None,
            })
            .collect()
    }

    /// Accepted events
    pub async fn events(&self) -> Vec<Event> {
        self.state.read().await.events.clone()
    }

    pub async fn watch_connects(&self) -> usize {
        self.state.read().await.watch_connects
    }

    pub async fn watch_selectors(&self) -> Vec<String> {
        self.state.read().await.watch_selectors.clone()
    }

    /// Highest number of binding calls that were running at the same time
    pub async fn max_bindings_in_flight(&self) -> usize {
        self.state.read().await.max_bindings_in_flight
    }

    pub async fn pod(&self, namespace: &str, name: &str) -> Option<Pod> {
        self.state
            .read()
            .await
            .pods
            .iter()
            .find(|p| p.namespace_or_default() == namespace && p.name_or_unknown() == name)
            .cloned()
    }
}

/// Evaluate the field selectors the scheduler uses
///
/// Supports `spec.nodeName` and `status.phase` with `=` and `!=`; other
/// keys match everything.
fn matches_field_selector(pod: &Pod, selector: &str) -> bool {
    selector
        .split(',')
        .filter(|term| !term.is_empty())
        .all(|term| {
            let (key, value, negate) = match term.split_once("!=") {
                Some((k, v)) => (k, v, true),
                None => match term.split_once('=') {
                    Some((k, v)) => (k, v, false),
                    None => return true,
                },
            };

            let actual = match key {
                "spec.nodeName" => assigned_node(pod).unwrap_or("").to_string(),
                "status.phase" => pod
                    .status
                    .as_ref()
                    .and_then(|s| s.phase.clone())
                    .unwrap_or_default(),
                _ => return true,
            };

            (actual == value) != negate
        })
}

#[async_trait]
impl ControlPlane for MockControlPlane {
    async fn list_nodes(&self) -> Result<Vec<Node>> {
        let state = self.state.read().await;
        if state.fail_list_nodes {
            return Err(ClientError::transport("list nodes", "mock: connection refused"));
        }
        Ok(state.nodes.clone())
    }

    async fn list_pods(&self, field_selector: Option<&str>) -> Result<Vec<Pod>> {
        let state = self.state.read().await;
        Ok(state
            .pods
            .iter()
            .filter(|p| field_selector.is_none_or(|s| matches_field_selector(p, s)))
            .cloned()
            .collect())
    }

    async fn watch_pods(&self, field_selector: &str) -> Result<PodWatchStream> {
        let mut state = self.state.write().await;
        state.watch_connects += 1;
        state.watch_selectors.push(field_selector.to_string());

        match state.watch_sessions.pop_front() {
            Some(MockWatchSession::Refuse) => {
                debug!("Mock: refusing watch connection");
                Err(ClientError::transport("watch pods", "mock: connection refused"))
            }
            Some(MockWatchSession::Stream(items)) => {
                debug!("Mock: serving watch session with {} items", items.len());
                let items = items.into_iter().map(|item| match item {
                    MockWatchItem::Event(event) => Ok(event),
                    MockWatchItem::DecodeError(message) => {
                        Err(ClientError::decode("watch pods", message))
                    }
                });
                Ok(futures_util::stream::iter(items).boxed())
            }
            None => Ok(futures_util::stream::pending().boxed()),
        }
    }

    async fn create_binding(&self, binding: &Binding) -> Result<()> {
        let name = binding.metadata.name.clone().unwrap_or_default();
        let namespace = binding
            .metadata
            .namespace
            .clone()
            .unwrap_or_else(|| "default".to_string());
        let node = binding.target.name.clone().unwrap_or_default();

        let delay = {
            let mut state = self.state.write().await;
            state.bindings_in_flight += 1;
            state.max_bindings_in_flight = state
                .max_bindings_in_flight
                .max(state.bindings_in_flight);
            state.binding_delay
        };

        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state.write().await;
        state.bindings_in_flight -= 1;

        if state.fail_bindings {
            return Err(ClientError::unexpected_status(
                "create binding",
                500,
                "mock: injected failure",
            ));
        }

        let pod = state
            .pods
            .iter_mut()
            .find(|p| p.namespace_or_default() == namespace && p.name_or_unknown() == name)
            .ok_or_else(|| {
                ClientError::unexpected_status(
                    "create binding",
                    404,
                    format!("pods \"{}\" not found", name),
                )
            })?;

        if let Some(existing) = assigned_node(pod) {
            return Err(ClientError::unexpected_status(
                "create binding",
                409,
                format!("pod {} is already assigned to node \"{}\"", name, existing),
            ));
        }

        pod.spec.get_or_insert_with(Default::default).node_name = Some(node.clone());
        state.calls.push(MockCall::Binding { pod: name, node });
        Ok(())
    }

    async fn create_event(&self, event: &Event) -> Result<()> {
        let mut state = self.state.write().await;
        if state.fail_events {
            return Err(ClientError::unexpected_status(
                "create event",
                500,
                "mock: injected failure",
            ));
        }

        state.calls.push(MockCall::Event {
            reason: event.reason.clone().unwrap_or_default(),
            event_type: event.type_.clone().unwrap_or_default(),
        });
        state.events.push(event.clone());
        Ok(())
    }
}
