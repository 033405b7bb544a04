use crate::coordinator::Coordinator;
use crate::types::Origin;
use crate::watch::UNSCHEDULED_PODS_SELECTOR;
use crate::Result;
use nodefit_client::ControlPlane;
use nodefit_core::{is_claimed_by, is_unscheduled, Pod};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Configuration for the reconciliation loop
#[derive(Debug, Clone)]
pub struct ReconcileConfig {
    /// Time between sweeps
    pub interval: Duration,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
        }
    }
}

/// Periodically resubmits pods the watch missed or failed to place
pub struct Reconciler {
    client: Arc<dyn ControlPlane>,
    coordinator: Arc<Coordinator>,
    config: ReconcileConfig,
}

impl Reconciler {
    pub fn new(
        client: Arc<dyn ControlPlane>,
        coordinator: Arc<Coordinator>,
        config: ReconcileConfig,
    ) -> Self {
        Self {
            client,
            coordinator,
            config,
        }
    }

    pub async fn run(&self, token: CancellationToken) {
        info!(interval = ?self.config.interval, "Starting reconciliation loop");

        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = sleep(self.config.interval) => {}
            }

            if let Err(e) = self.sweep(&token).await {
                error!(error = %e, "Reconciliation sweep failed");
            }
        }

        info!("Stopped reconciliation loop");
    }

    /// Submit every pending pod once; returns how many were submitted
    pub async fn sweep(&self, token: &CancellationToken) -> Result<usize> {
        let pods = self.pending_pods().await?;
        if pods.is_empty() {
            debug!("No unscheduled pods");
            return Ok(0);
        }

        info!("Found {} unscheduled pods", pods.len());

        let mut submitted = 0;
        for pod in &pods {
            if token.is_cancelled() {
                break;
            }
            self.coordinator
                .submit_logged(pod, Origin::Reconcile, token)
                .await;
            submitted += 1;
        }

        Ok(submitted)
    }

    /// Unscheduled pods that name this scheduler
    async fn pending_pods(&self) -> Result<Vec<Pod>> {
        let scheduler_name = self.coordinator.scheduler_name();
        let pods = self
            .client
            .list_pods(Some(UNSCHEDULED_PODS_SELECTOR))
            .await?;

        Ok(pods
            .into_iter()
            .filter(|p| is_unscheduled(p) && is_claimed_by(p, scheduler_name))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinator::CoordinatorConfig;
    use crate::select::FirstFit;
    use crate::test_support::{claimed_pod, create_test_node, create_test_pod};
    use nodefit_client::MockControlPlane;
    use nodefit_core::assigned_node;

    fn reconciler(mock: &MockControlPlane, interval: Duration) -> Reconciler {
        let client: Arc<dyn ControlPlane> = Arc::new(mock.clone());
        let coordinator = Arc::new(Coordinator::new(
            client.clone(),
            Box::new(FirstFit),
            CoordinatorConfig::default(),
        ));
        Reconciler::new(client, coordinator, ReconcileConfig { interval })
    }

    #[tokio::test]
    async fn test_sweep_submits_only_claimed_pods() {
        let mock = MockControlPlane::new();
        mock.add_node(create_test_node("node1", "8")).await;
        mock.add_pod(claimed_pod("mine-1", "1")).await;
        mock.add_pod(claimed_pod("mine-2", "1")).await;
        mock.add_pod(create_test_pod("theirs", &[Some("1")], None)).await;

        let reconciler = reconciler(&mock, Duration::from_secs(30));
        let submitted = reconciler.sweep(&CancellationToken::new()).await.unwrap();

        assert_eq!(submitted, 2);
        let bound: Vec<_> = mock.bindings().await.into_iter().map(|(p, _)| p).collect();
        assert_eq!(bound, vec!["mine-1", "mine-2"]);
        let theirs = mock.pod("default", "theirs").await.unwrap();
        assert!(assigned_node(&theirs).is_none());
    }

    #[tokio::test]
    async fn test_sweep_after_cancel_submits_nothing() {
        let mock = MockControlPlane::new();
        mock.add_node(create_test_node("node1", "8")).await;
        mock.add_pod(claimed_pod("mine", "1")).await;

        let token = CancellationToken::new();
        token.cancel();
        let submitted = reconciler(&mock, Duration::from_secs(30))
            .sweep(&token)
            .await
            .unwrap();

        assert_eq!(submitted, 0);
        assert!(mock.calls().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_binds_on_interval_and_stops() {
        let mock = MockControlPlane::new();
        mock.add_node(create_test_node("node1", "8")).await;
        mock.add_pod(claimed_pod("late", "1")).await;

        let reconciler = reconciler(&mock, Duration::from_secs(30));
        let token = CancellationToken::new();
        let handle = tokio::spawn({
            let token = token.clone();
            async move { reconciler.run(token).await }
        });

        sleep(Duration::from_secs(10)).await;
        assert!(mock.bindings().await.is_empty());

        sleep(Duration::from_secs(25)).await;
        assert_eq!(mock.bindings().await.len(), 1);

        token.cancel();
        handle.await.unwrap();
    }
}
