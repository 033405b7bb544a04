use miette::Diagnostic;
use thiserror::Error;

/// Error type for control-plane client operations
#[derive(Error, Debug, Diagnostic)]
pub enum ClientError {
    /// The request never produced a response
    #[error("{operation} failed: {message}")]
    #[diagnostic(
        code(nodefit::client::transport),
        help("Check that the API server is reachable and that the client certificate is accepted")
    )]
    Transport {
        #[allow(unused)]
        operation: String,
        #[allow(unused)]
        message: String,
    },

    /// The API server answered with a status other than the expected one
    #[error("{operation} failed with status {status}: {body}")]
    #[diagnostic(
        code(nodefit::client::unexpected_status),
        help("Inspect the response body; 401/403 usually mean the scheduler credentials lack RBAC permissions")
    )]
    UnexpectedStatus {
        #[allow(unused)]
        operation: String,
        #[allow(unused)]
        status: u16,
        #[allow(unused)]
        body: String,
    },

    /// The response body could not be decoded
    #[error("{operation} returned an undecodable payload: {message}")]
    #[diagnostic(
        code(nodefit::client::decode),
        help("The API server version may be incompatible with the compiled Kubernetes types")
    )]
    Decode {
        #[allow(unused)]
        operation: String,
        #[allow(unused)]
        message: String,
    },

    /// The server sent an ERROR event on a watch stream
    #[error("Watch stream reported an error: {message}")]
    #[diagnostic(
        code(nodefit::client::watch_error),
        help("The watch will be re-established; a 410 Gone status means the resource version expired")
    )]
    WatchError {
        #[allow(unused)]
        message: String,
    },

    /// Credentials could not be loaded
    #[error("Failed to load credentials from {path}: {message}")]
    #[diagnostic(
        code(nodefit::client::credentials),
        help("Verify the kubeconfig file exists, is readable and contains a cluster, a user and a context")
    )]
    Credentials {
        #[allow(unused)]
        path: String,
        #[allow(unused)]
        message: String,
    },

    /// Invalid configuration
    #[error("Invalid configuration: {message}")]
    #[diagnostic(code(nodefit::client::invalid_config), help("{suggestion}"))]
    InvalidConfig {
        #[allow(unused)]
        message: String,
        #[allow(unused)]
        suggestion: String,
    },
}

/// Result type alias for client operations
pub type Result<T> = std::result::Result<T, ClientError>;

impl ClientError {
    pub fn transport(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transport {
            operation: operation.into(),
            message: message.into(),
        }
    }

    pub fn unexpected_status(
        operation: impl Into<String>,
        status: u16,
        body: impl Into<String>,
    ) -> Self {
        Self::UnexpectedStatus {
            operation: operation.into(),
            status,
            body: body.into(),
        }
    }

    pub fn decode(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            operation: operation.into(),
            message: message.into(),
        }
    }

    pub fn watch_error(message: impl Into<String>) -> Self {
        Self::WatchError {
            message: message.into(),
        }
    }

    pub fn credentials(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Credentials {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn invalid_config(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    /// HTTP status carried by the error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::UnexpectedStatus { status, .. } => Some(*status),
            _ => None,
        }
    }
}
