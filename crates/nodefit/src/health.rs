use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;
use axum_server::tls_rustls::RustlsConfig;
use miette::{Context, IntoDiagnostic};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// PEM files for serving the health endpoint over TLS
#[derive(Debug, Clone)]
pub struct TlsFiles {
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
}

/// Liveness endpoint
pub struct HealthServer {
    listener: TcpListener,
    tls: Option<RustlsConfig>,
}

fn router() -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/", get(healthz))
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}

impl HealthServer {
    /// Bind the listener and load TLS material up front so that both fail at startup
    pub async fn bind(addr: SocketAddr, tls: Option<&TlsFiles>) -> miette::Result<Self> {
        let tls = match tls {
            Some(files) => Some(
                RustlsConfig::from_pem_file(&files.cert_path, &files.key_path)
                    .await
                    .into_diagnostic()
                    .wrap_err_with(|| {
                        format!(
                            "failed to load health TLS material from {} and {}",
                            files.cert_path.display(),
                            files.key_path.display()
                        )
                    })?,
            ),
            None => None,
        };

        let listener = TcpListener::bind(addr)
            .await
            .into_diagnostic()
            .wrap_err_with(|| format!("failed to bind health endpoint on {}", addr))?;

        Ok(Self { listener, tls })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Serve until `token` is cancelled
    pub async fn run(self, token: CancellationToken) -> std::io::Result<()> {
        let addr = self.listener.local_addr()?;
        let app = router();

        match self.tls {
            Some(config) => {
                info!("Starting health endpoint on https://{}", addr);
                let handle = axum_server::Handle::new();
                tokio::spawn({
                    let handle = handle.clone();
                    async move {
                        token.cancelled().await;
                        handle.graceful_shutdown(Some(Duration::from_secs(1)));
                    }
                });

                axum_server::from_tcp_rustls(self.listener.into_std()?, config)
                    .handle(handle)
                    .serve(app.into_make_service())
                    .await
            }
            None => {
                info!("Starting health endpoint on http://{}", addr);
                axum::serve(self.listener, app)
                    .with_graceful_shutdown(token.cancelled_owned())
                    .await
            }
        }
    }
}
