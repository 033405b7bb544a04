use crate::error::{ClientError, Result};
use crate::traits::{ControlPlane, PodWatchStream};
use async_trait::async_trait;
use futures_util::{StreamExt, TryStreamExt};
use k8s_openapi::api::core::v1::{Binding, Event, Node, Pod};
use k8s_openapi::{List, ListableResource};
use nodefit_core::{WatchEvent, WatchEventType};
use reqwest::{Certificate, Client, Identity, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tokio::io::AsyncBufReadExt;
use tokio_util::io::StreamReader;
use tracing::{debug, warn};

/// Connection settings for the API server
#[derive(Clone)]
pub struct ClientConfig {
    /// API server URL (e.g., "https://10.0.0.1:6443")
    pub server: String,
    /// PEM client certificate followed by its private key
    pub identity_pem: Option<Vec<u8>>,
    /// PEM CA certificate used to verify the API server
    pub ca_pem: Option<Vec<u8>>,
    /// Bearer token sent on every request
    pub bearer_token: Option<String>,
    /// Accept any server certificate
    pub insecure_skip_tls_verify: bool,
    /// TCP/TLS connect timeout
    pub connect_timeout: Duration,
}

impl ClientConfig {
    pub fn new(server: impl Into<String>) -> Self {
        Self {
            server: server.into(),
            identity_pem: None,
            ca_pem: None,
            bearer_token: None,
            insecure_skip_tls_verify: false,
            connect_timeout: Duration::from_secs(10),
        }
    }
}

/// HTTP client for the subset of the Kubernetes API used by the scheduler
pub struct ApiClient {
    base_url: String,
    client: Client,
    bearer_token: Option<String>,
}

impl ApiClient {
    /// Build the authenticated transport
    pub fn new(config: ClientConfig) -> Result<Self> {
        let mut builder = Client::builder()
            .use_rustls_tls()
            .connect_timeout(config.connect_timeout);

        if let Some(pem) = &config.identity_pem {
            let identity = Identity::from_pem(pem).map_err(|e| {
                ClientError::invalid_config(
                    format!("Invalid client certificate or key: {}", e),
                    "client-certificate-data and client-key-data must decode to PEM",
                )
            })?;
            builder = builder.identity(identity);
        }

        if let Some(ca) = &config.ca_pem {
            let cert = Certificate::from_pem(ca).map_err(|e| {
                ClientError::invalid_config(
                    format!("Invalid CA certificate: {}", e),
                    "certificate-authority-data must decode to a PEM certificate",
                )
            })?;
            builder = builder.add_root_certificate(cert);
        }

        if config.insecure_skip_tls_verify {
            warn!("API server certificate verification is disabled");
            builder = builder.danger_accept_invalid_certs(true);
        }

        let client = builder.build().map_err(|e| {
            ClientError::invalid_config(
                format!("Failed to build HTTP client: {}", e),
                "Check the TLS material in the kubeconfig",
            )
        })?;

        Ok(Self {
            base_url: config.server.trim_end_matches('/').to_string(),
            client,
            bearer_token: config.bearer_token,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Attach credentials, send, and require `expected` as the response status
    async fn send(
        &self,
        operation: &str,
        request: RequestBuilder,
        expected: StatusCode,
    ) -> Result<Response> {
        let request = match &self.bearer_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        };

        let resp = request
            .send()
            .await
            .map_err(|e| ClientError::transport(operation, e.to_string()))?;

        if resp.status() != expected {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(ClientError::unexpected_status(
                operation,
                status.as_u16(),
                body,
            ));
        }

        Ok(resp)
    }

    async fn list<T>(
        &self,
        operation: &str,
        path: &str,
        field_selector: Option<&str>,
    ) -> Result<Vec<T>>
    where
        T: ListableResource + DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);
        debug!("GET {} fieldSelector={:?}", url, field_selector);

        let mut request = self.client.get(&url);
        if let Some(selector) = field_selector {
            request = request.query(&[("fieldSelector", selector)]);
        }

        let resp = self.send(operation, request, StatusCode::OK).await?;
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| ClientError::transport(operation, e.to_string()))?;

        let list: List<T> = serde_json::from_slice(&bytes)
            .map_err(|e| ClientError::decode(operation, e.to_string()))?;

        Ok(list.items)
    }
}

#[async_trait]
impl ControlPlane for ApiClient {
    /// GET /api/v1/nodes
    async fn list_nodes(&self) -> Result<Vec<Node>> {
        self.list("list nodes", "/api/v1/nodes", None).await
    }

    /// GET /api/v1/pods
    async fn list_pods(&self, field_selector: Option<&str>) -> Result<Vec<Pod>> {
        self.list("list pods", "/api/v1/pods", field_selector).await
    }

    /// GET /api/v1/pods?watch=true
    async fn watch_pods(&self, field_selector: &str) -> Result<PodWatchStream> {
        let url = format!("{}/api/v1/pods", self.base_url);
        debug!("WATCH {} fieldSelector={}", url, field_selector);

        let request = self
            .client
            .get(&url)
            .query(&[("watch", "true"), ("fieldSelector", field_selector)]);
        let resp = self.send("watch pods", request, StatusCode::OK).await?;

        let bytes = Box::pin(resp.bytes_stream().map_err(std::io::Error::other));
        let lines = StreamReader::new(bytes).lines();

        let events = futures_util::stream::unfold(lines, |mut lines| async move {
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) if line.trim().is_empty() => continue,
                    Ok(Some(line)) => return Some((decode_watch_line(&line), lines)),
                    Ok(None) => return None,
                    Err(e) => {
                        return Some((
                            Err(ClientError::transport("watch pods", e.to_string())),
                            lines,
                        ))
                    }
                }
            }
        });

        Ok(events.boxed())
    }

    /// POST /api/v1/namespaces/{namespace}/pods/{name}/binding
    async fn create_binding(&self, binding: &Binding) -> Result<()> {
        let name = binding.metadata.name.as_deref().ok_or_else(|| {
            ClientError::invalid_config("Binding has no name", "Set metadata.name to the pod name")
        })?;
        let namespace = binding.metadata.namespace.as_deref().unwrap_or("default");

        let url = format!(
            "{}/api/v1/namespaces/{}/pods/{}/binding",
            self.base_url, namespace, name
        );
        debug!("POST {}", url);

        self.send(
            "create binding",
            self.client.post(&url).json(binding),
            StatusCode::CREATED,
        )
        .await?;
        Ok(())
    }

    /// POST /api/v1/namespaces/{namespace}/events
    async fn create_event(&self, event: &Event) -> Result<()> {
        let namespace = event
            .metadata
            .namespace
            .as_deref()
            .or(event.involved_object.namespace.as_deref())
            .unwrap_or("default");

        let url = format!("{}/api/v1/namespaces/{}/events", self.base_url, namespace);
        debug!("POST {}", url);

        self.send(
            "create event",
            self.client.post(&url).json(event),
            StatusCode::CREATED,
        )
        .await?;
        Ok(())
    }
}

/// Decode one newline-delimited watch notification
///
/// ERROR notifications carry a `Status` object and are surfaced as
/// `ClientError::WatchError`.
pub fn decode_watch_line(line: &str) -> Result<WatchEvent<Pod>> {
    let raw: WatchEvent<serde_json::Value> = serde_json::from_str(line)
        .map_err(|e| ClientError::decode("watch pods", e.to_string()))?;

    if raw.event_type == WatchEventType::Error {
        let message = raw
            .object
            .get("message")
            .and_then(|m| m.as_str())
            .unwrap_or("unknown error")
            .to_string();
        return Err(ClientError::watch_error(message));
    }

    let pod: Pod = serde_json::from_value(raw.object)
        .map_err(|e| ClientError::decode("watch pods", e.to_string()))?;

    Ok(WatchEvent {
        event_type: raw.event_type,
        object: pod,
    })
}
