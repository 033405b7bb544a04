use crate::api_client::ClientConfig;
use crate::error::{ClientError, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;

/// The parts of a kubeconfig file needed to reach the API server
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Kubeconfig {
    #[serde(default)]
    pub clusters: Vec<NamedCluster>,
    #[serde(default)]
    pub users: Vec<NamedUser>,
    #[serde(default)]
    pub contexts: Vec<NamedContext>,
    pub current_context: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NamedCluster {
    pub name: String,
    pub cluster: Cluster,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Cluster {
    pub server: String,
    pub certificate_authority_data: Option<String>,
    pub certificate_authority: Option<PathBuf>,
    #[serde(default)]
    pub insecure_skip_tls_verify: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NamedUser {
    pub name: String,
    pub user: User,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct User {
    pub client_certificate_data: Option<String>,
    pub client_key_data: Option<String>,
    pub client_certificate: Option<PathBuf>,
    pub client_key: Option<PathBuf>,
    pub token: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NamedContext {
    pub name: String,
    pub context: Context,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Context {
    pub cluster: String,
    pub user: String,
    pub namespace: Option<String>,
}

impl Kubeconfig {
    /// Read and parse a kubeconfig file
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)
            .map_err(|e| ClientError::credentials(path.display().to_string(), e.to_string()))?;
        let mut config = Self::parse(&data)
            .map_err(|e| ClientError::credentials(path.display().to_string(), e.to_string()))?;

        // Relative file references are resolved against the kubeconfig directory
        if let Some(dir) = path.parent() {
            config.rebase_paths(dir);
        }

        Ok(config)
    }

    /// Parse kubeconfig YAML
    pub fn parse(data: &str) -> std::result::Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(data)
    }

    fn rebase_paths(&mut self, dir: &Path) {
        for cluster in &mut self.clusters {
            if let Some(p) = cluster.cluster.certificate_authority.as_mut() {
                if p.is_relative() {
                    *p = dir.join(&*p);
                }
            }
        }
        for user in &mut self.users {
            for p in [
                user.user.client_certificate.as_mut(),
                user.user.client_key.as_mut(),
            ]
            .into_iter()
            .flatten()
            {
                if p.is_relative() {
                    *p = dir.join(&*p);
                }
            }
        }
    }

    /// Resolve the active context into client connection settings
    ///
    /// Uses `current-context`, or the first context when none is set.
    pub fn client_config(&self) -> Result<ClientConfig> {
        let context = match &self.current_context {
            Some(name) => self
                .contexts
                .iter()
                .find(|c| &c.name == name)
                .ok_or_else(|| missing(format!("context '{}' not found", name)))?,
            None => self
                .contexts
                .first()
                .ok_or_else(|| missing("no contexts defined"))?,
        };
        debug!("Using kubeconfig context '{}'", context.name);

        let cluster = self
            .clusters
            .iter()
            .find(|c| c.name == context.context.cluster)
            .ok_or_else(|| missing(format!("cluster '{}' not found", context.context.cluster)))?;
        let user = self
            .users
            .iter()
            .find(|u| u.name == context.context.user)
            .ok_or_else(|| missing(format!("user '{}' not found", context.context.user)))?;

        let mut config = ClientConfig::new(cluster.cluster.server.clone());
        config.insecure_skip_tls_verify = cluster.cluster.insecure_skip_tls_verify;
        config.ca_pem = load_material(
            "certificate-authority",
            cluster.cluster.certificate_authority_data.as_deref(),
            cluster.cluster.certificate_authority.as_deref(),
        )?;

        let cert = load_material(
            "client-certificate",
            user.user.client_certificate_data.as_deref(),
            user.user.client_certificate.as_deref(),
        )?;
        let key = load_material(
            "client-key",
            user.user.client_key_data.as_deref(),
            user.user.client_key.as_deref(),
        )?;

        config.identity_pem = match (cert, key) {
            (Some(mut cert), Some(key)) => {
                if !cert.ends_with(b"\n") {
                    cert.push(b'\n');
                }
                cert.extend_from_slice(&key);
                Some(cert)
            }
            (None, None) => None,
            _ => {
                return Err(missing(
                    "client certificate and client key must be given together",
                ))
            }
        };
        config.bearer_token = user.user.token.clone();

        Ok(config)
    }
}

fn missing(message: impl Into<String>) -> ClientError {
    ClientError::invalid_config(
        message,
        "Make sure the kubeconfig context references an existing cluster and user",
    )
}

/// Inline base64 data wins over a file reference
fn load_material(field: &str, data: Option<&str>, file: Option<&Path>) -> Result<Option<Vec<u8>>> {
    if let Some(encoded) = data {
        let decoded = STANDARD
            .decode(encoded.trim())
            .map_err(|e| ClientError::invalid_config(
                format!("{}-data is not valid base64: {}", field, e),
                "Regenerate the kubeconfig or reference the PEM file instead",
            ))?;
        return Ok(Some(decoded));
    }

    match file {
        Some(path) => std::fs::read(path)
            .map(Some)
            .map_err(|e| ClientError::credentials(path.display().to_string(), e.to_string())),
        None => Ok(None),
    }
}
