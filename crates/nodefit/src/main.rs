mod health;

use clap::{Parser, ValueEnum};
use health::{HealthServer, TlsFiles};
use miette::Context;
use nodefit_client::{ApiClient, ControlPlane, Kubeconfig};
use nodefit_scheduler::{
    CoordinatorConfig, FirstFit, LowestPrice, NodeSelector, PriceTable, ReconcileConfig,
    Scheduler, SchedulerConfig, WatchConfig,
};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinError;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[derive(Parser)]
#[command(
    name = "nodefit",
    about = "Kubernetes scheduler that places pods by CPU fit and node price"
)]
struct Cli {
    /// Kubeconfig with the scheduler's credentials
    #[arg(long, env = "NODEFIT_KUBECONFIG", default_value = "/etc/kubernetes/scheduler.conf")]
    kubeconfig: PathBuf,

    /// Override the API server URL from the kubeconfig
    #[arg(long, env = "NODEFIT_API_SERVER")]
    api_server: Option<String>,

    /// Skip verification of the API server certificate
    #[arg(long, env = "NODEFIT_INSECURE")]
    insecure_skip_tls_verify: bool,

    /// Name pods use to select this scheduler
    #[arg(long, env = "NODEFIT_SCHEDULER_NAME", default_value = "nodefit-scheduler")]
    scheduler_name: String,

    /// Seconds between reconciliation sweeps
    #[arg(long, env = "NODEFIT_RECONCILE_INTERVAL", default_value_t = 30)]
    reconcile_interval: u64,

    /// Milliseconds to wait before scheduling a pod seen on the watch
    #[arg(long, env = "NODEFIT_WATCH_SETTLE_DELAY_MS", default_value_t = 2000)]
    watch_settle_delay: u64,

    /// Seconds to wait before re-opening a lost watch
    #[arg(long, env = "NODEFIT_WATCH_BACKOFF", default_value_t = 5)]
    watch_backoff: u64,

    /// Node selection policy
    #[arg(long, env = "NODEFIT_SELECTOR", value_enum, default_value_t = SelectorKind::LowestPrice)]
    selector: SelectorKind,

    /// YAML file mapping instance type to hourly price
    #[arg(long, env = "NODEFIT_PRICE_TABLE")]
    price_table: Option<PathBuf>,

    /// Address of the liveness endpoint
    #[arg(long, env = "NODEFIT_HEALTH_BIND", default_value = "127.0.0.1:10259")]
    health_bind: SocketAddr,

    /// Serve the liveness endpoint over TLS with this certificate
    #[arg(long, requires = "health_tls_key")]
    health_tls_cert: Option<PathBuf>,

    /// Private key for --health-tls-cert
    #[arg(long, requires = "health_tls_cert")]
    health_tls_key: Option<PathBuf>,

    /// Log output format
    #[arg(long, env = "NODEFIT_LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum SelectorKind {
    LowestPrice,
    FirstFit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

impl Cli {
    fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            coordinator: CoordinatorConfig {
                scheduler_name: self.scheduler_name.clone(),
                settle_delay: Duration::from_millis(self.watch_settle_delay),
                ..Default::default()
            },
            watch: WatchConfig {
                backoff: Duration::from_secs(self.watch_backoff),
                ..Default::default()
            },
            reconcile: ReconcileConfig {
                interval: Duration::from_secs(self.reconcile_interval),
            },
        }
    }

    fn health_tls(&self) -> Option<TlsFiles> {
        match (&self.health_tls_cert, &self.health_tls_key) {
            (Some(cert), Some(key)) => Some(TlsFiles {
                cert_path: cert.clone(),
                key_path: key.clone(),
            }),
            _ => None,
        }
    }
}

fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    match format {
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init(),
    }
}

#[tokio::main]
async fn main() -> miette::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    // reqwest and axum-server each pull in a rustls provider
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();

    run(cli).await
}

fn build_selector(
    kind: SelectorKind,
    price_table: Option<&Path>,
) -> miette::Result<Box<dyn NodeSelector>> {
    match kind {
        SelectorKind::FirstFit => Ok(Box::new(FirstFit)),
        SelectorKind::LowestPrice => {
            let table = match price_table {
                Some(path) => {
                    let table = PriceTable::load(path)?;
                    info!("Loaded {} prices from {}", table.len(), path.display());
                    table
                }
                None => PriceTable::new(),
            };
            Ok(Box::new(LowestPrice::new(table)))
        }
    }
}

fn build_client(cli: &Cli) -> miette::Result<Arc<dyn ControlPlane>> {
    let kubeconfig = Kubeconfig::load(&cli.kubeconfig)?;
    let mut config = kubeconfig
        .client_config()
        .wrap_err_with(|| format!("invalid kubeconfig {}", cli.kubeconfig.display()))?;

    if let Some(server) = &cli.api_server {
        config.server = server.clone();
    }
    if cli.insecure_skip_tls_verify {
        config.insecure_skip_tls_verify = true;
    }

    let client = ApiClient::new(config)?;
    info!("Using API server {}", client.base_url());
    Ok(Arc::new(client))
}

async fn run(cli: Cli) -> miette::Result<()> {
    info!("Starting nodefit scheduler '{}'", cli.scheduler_name);

    let client = build_client(&cli)?;
    let selector = build_selector(cli.selector, cli.price_table.as_deref())?;
    let health = HealthServer::bind(cli.health_bind, cli.health_tls().as_ref()).await?;

    let token = CancellationToken::new();

    let health_handle = tokio::spawn({
        let token = token.clone();
        async move {
            if let Err(e) = health.run(token).await {
                error!("Health endpoint error: {}", e);
            }
        }
    });

    let scheduler = Scheduler::new(client, selector, cli.scheduler_config());
    let scheduler_handle = tokio::spawn({
        let token = token.clone();
        async move {
            if let Err(e) = scheduler.run(token).await {
                error!("Scheduler error: {}", e);
            }
        }
    });

    wait_for_signal().await?;

    info!("Shutting down gracefully...");
    token.cancel();

    let (scheduler_result, health_result) = tokio::join!(scheduler_handle, health_handle);
    report_task_results([
        ("scheduler", scheduler_result),
        ("health endpoint", health_result),
    ]);

    info!("Shutdown complete");
    Ok(())
}

/// Log every task that panicked or was aborted; returns how many did
fn report_task_results<const N: usize>(results: [(&str, Result<(), JoinError>); N]) -> usize {
    let mut failed = 0;
    for (task, result) in results {
        if let Err(e) = result {
            error!(task, error = %e, "Task did not shut down cleanly");
            failed += 1;
        }
    }
    failed
}

#[cfg(unix)]
async fn wait_for_signal() -> miette::Result<()> {
    use miette::IntoDiagnostic;
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate())
        .into_diagnostic()
        .wrap_err("failed to install SIGTERM handler")?;

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result.into_diagnostic().wrap_err("failed to listen for ctrl-c")?;
            info!("Received SIGINT");
        }
        _ = sigterm.recv() => info!("Received SIGTERM"),
    }
    Ok(())
}

#[cfg(not(unix))]
async fn wait_for_signal() -> miette::Result<()> {
    use miette::IntoDiagnostic;

    tokio::signal::ctrl_c()
        .await
        .into_diagnostic()
        .wrap_err("failed to listen for ctrl-c")
}
