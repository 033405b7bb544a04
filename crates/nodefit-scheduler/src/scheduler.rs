use crate::coordinator::{Coordinator, CoordinatorConfig};
use crate::reconcile::{ReconcileConfig, Reconciler};
use crate::select::NodeSelector;
use crate::watch::{dispatch_watched_pods, WatchConfig, WatchIngestor};
use crate::{Result, SchedulerError};
use nodefit_client::ControlPlane;
use std::sync::Arc;
use tokio::sync::mpsc::unbounded_channel;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Configuration for the scheduler
#[derive(Debug, Clone, Default)]
pub struct SchedulerConfig {
    pub coordinator: CoordinatorConfig,
    pub watch: WatchConfig,
    pub reconcile: ReconcileConfig,
}

/// Pod scheduler
///
/// Runs the watch ingestion, watch dispatch and reconciliation loops
/// against one shared coordinator.
pub struct Scheduler {
    client: Arc<dyn ControlPlane>,
    coordinator: Arc<Coordinator>,
    config: SchedulerConfig,
}

impl Scheduler {
    /// Create a new scheduler
    pub fn new(
        client: Arc<dyn ControlPlane>,
        selector: Box<dyn NodeSelector>,
        config: SchedulerConfig,
    ) -> Self {
        let coordinator = Arc::new(Coordinator::new(
            client.clone(),
            selector,
            config.coordinator.clone(),
        ));

        Self {
            client,
            coordinator,
            config,
        }
    }

    /// Run until `token` is cancelled
    ///
    /// Returns once every loop has finished its current step and exited.
    pub async fn run(&self, token: CancellationToken) -> Result<()> {
        info!(
            scheduler = %self.config.coordinator.scheduler_name,
            "Starting scheduler"
        );

        let (tx, rx) = unbounded_channel();

        let ingestor = WatchIngestor::new(self.client.clone(), self.config.watch.clone());
        let watch_handle = tokio::spawn({
            let token = token.clone();
            async move { ingestor.run(token, tx).await }
        });

        let dispatch_handle = tokio::spawn(dispatch_watched_pods(
            self.coordinator.clone(),
            rx,
            token.clone(),
        ));

        let reconciler = Reconciler::new(
            self.client.clone(),
            self.coordinator.clone(),
            self.config.reconcile.clone(),
        );
        let reconcile_handle = tokio::spawn({
            let token = token.clone();
            async move { reconciler.run(token).await }
        });

        let (watch, dispatch, reconcile) =
            tokio::join!(watch_handle, dispatch_handle, reconcile_handle);

        let mut failed = Vec::new();
        for (task, result) in [
            ("watch ingestion", watch),
            ("watch dispatch", dispatch),
            ("reconciliation", reconcile),
        ] {
            if let Err(e) = result {
                error!(task, error = %e, "Scheduler task ended abnormally");
                failed.push(task);
            }
        }

        if !failed.is_empty() {
            return Err(SchedulerError::internal_error(format!(
                "scheduler tasks failed: {}",
                failed.join(", ")
            )));
        }

        info!("Scheduler stopped");
        Ok(())
    }
}
