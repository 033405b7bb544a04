use crate::coordinator::Coordinator;
use crate::types::Origin;
use futures_util::StreamExt;
use nodefit_client::{ControlPlane, PodWatchStream};
use nodefit_core::{Pod, ResourceMeta, WatchEventType};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Field selector matching pods without a node
pub const UNSCHEDULED_PODS_SELECTOR: &str = "spec.nodeName=";

/// Configuration for the watch ingestion loop
#[derive(Debug, Clone)]
pub struct WatchConfig {
    pub field_selector: String,
    /// Wait between a lost watch and the next connection attempt
    pub backoff: Duration,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            field_selector: UNSCHEDULED_PODS_SELECTOR.to_string(),
            backoff: Duration::from_secs(5),
        }
    }
}

enum WatchState {
    Connecting,
    Streaming(PodWatchStream),
    Disconnected,
}

/// Turns the pod watch into a stream of newly added pods
///
/// Reconnects after every failure with a fixed backoff and never gives up
/// on its own; only cancellation or a dropped receiver stops it.
pub struct WatchIngestor {
    client: Arc<dyn ControlPlane>,
    config: WatchConfig,
}

impl WatchIngestor {
    pub fn new(client: Arc<dyn ControlPlane>, config: WatchConfig) -> Self {
        Self { client, config }
    }

    pub async fn run(&self, token: CancellationToken, tx: UnboundedSender<Pod>) {
        info!(selector = %self.config.field_selector, "Starting pod watch");
        let mut state = WatchState::Connecting;

        loop {
            state = match state {
                WatchState::Connecting => {
                    let result = tokio::select! {
                        _ = token.cancelled() => break,
                        result = self.client.watch_pods(&self.config.field_selector) => result,
                    };

                    match result {
                        Ok(stream) => {
                            info!("Pod watch established");
                            WatchState::Streaming(stream)
                        }
                        Err(e) => {
                            warn!(error = %e, "Failed to open pod watch");
                            WatchState::Disconnected
                        }
                    }
                }

                WatchState::Streaming(mut stream) => {
                    let next = tokio::select! {
                        _ = token.cancelled() => break,
                        next = stream.next() => next,
                    };

                    match next {
                        Some(Ok(event)) => {
                            if event.event_type == WatchEventType::Added {
                                debug!(pod = %event.object.name_or_unknown(), "Pod added");
                                if tx.send(event.object).is_err() {
                                    info!("Pod receiver closed");
                                    break;
                                }
                            } else {
                                debug!(
                                    event_type = ?event.event_type,
                                    pod = %event.object.name_or_unknown(),
                                    "Ignoring watch event"
                                );
                            }
                            WatchState::Streaming(stream)
                        }
                        Some(Err(e)) => {
                            warn!(error = %e, "Pod watch failed");
                            WatchState::Disconnected
                        }
                        None => {
                            info!("Pod watch closed by server");
                            WatchState::Disconnected
                        }
                    }
                }

                WatchState::Disconnected => {
                    debug!(backoff = ?self.config.backoff, "Waiting before reconnecting pod watch");
                    tokio::select! {
                        _ = token.cancelled() => break,
                        _ = sleep(self.config.backoff) => WatchState::Connecting,
                    }
                }
            };
        }

        info!("Stopped pod watch");
    }
}

/// Feed watched pods to the coordinator one at a time
pub async fn dispatch_watched_pods(
    coordinator: Arc<Coordinator>,
    mut rx: UnboundedReceiver<Pod>,
    token: CancellationToken,
) {
    loop {
        let pod = tokio::select! {
            _ = token.cancelled() => break,
            pod = rx.recv() => match pod {
                Some(pod) => pod,
                None => break,
            },
        };

        coordinator.submit_logged(&pod, Origin::Watch, &token).await;
    }

    info!("Stopped watch dispatch");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::create_test_pod;
    use nodefit_client::{MockControlPlane, MockWatchItem, MockWatchSession};
    use nodefit_core::WatchEvent;
    use tokio::sync::mpsc::unbounded_channel;
    use tokio::time::Instant;

    fn added(name: &str) -> MockWatchItem {
        MockWatchItem::Event(WatchEvent::added(create_test_pod(name, &[Some("1")], None)))
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconnects_after_decode_failure() {
        let mock = MockControlPlane::new();
        mock.push_watch_session(MockWatchSession::Stream(vec![
            added("a"),
            MockWatchItem::DecodeError("unexpected EOF".to_string()),
        ]))
        .await;
        mock.push_watch_session(MockWatchSession::Refuse).await;
        mock.push_watch_session(MockWatchSession::Stream(vec![
            MockWatchItem::Event(WatchEvent::modified(create_test_pod("a", &[Some("1")], None))),
            added("b"),
        ]))
        .await;

        let ingestor = WatchIngestor::new(Arc::new(mock.clone()), WatchConfig::default());
        let token = CancellationToken::new();
        let (tx, mut rx) = unbounded_channel();

        let start = Instant::now();
        let handle = tokio::spawn({
            let token = token.clone();
            async move { ingestor.run(token, tx).await }
        });

        assert_eq!(rx.recv().await.unwrap().name_or_unknown(), "a");
        assert_eq!(rx.recv().await.unwrap().name_or_unknown(), "b");
        // one backoff after the decode failure, one after the refused connect
        assert!(start.elapsed() >= Duration::from_secs(10));

        token.cancel();
        handle.await.unwrap();

        assert!(mock.watch_connects().await >= 3);
        assert!(mock
            .watch_selectors()
            .await
            .iter()
            .all(|s| s == "spec.nodeName="));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_aborts_idle_stream() {
        let mock = MockControlPlane::new();
        let ingestor = WatchIngestor::new(Arc::new(mock.clone()), WatchConfig::default());
        let token = CancellationToken::new();
        let (tx, _rx) = unbounded_channel();

        let handle = tokio::spawn({
            let token = token.clone();
            async move { ingestor.run(token, tx).await }
        });

        sleep(Duration::from_secs(60)).await;
        token.cancel();
        handle.await.unwrap();

        assert_eq!(mock.watch_connects().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stops_when_receiver_dropped() {
        let mock = MockControlPlane::new();
        mock.push_watch_session(MockWatchSession::Stream(vec![added("a")])).await;
        let ingestor = WatchIngestor::new(Arc::new(mock), WatchConfig::default());
        let (tx, rx) = unbounded_channel();
        drop(rx);

        ingestor.run(CancellationToken::new(), tx).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_dispatch_exits_on_closed_channel() {
        let mock = MockControlPlane::new();
        let coordinator = Arc::new(Coordinator::new(
            Arc::new(mock.clone()),
            Box::new(crate::select::FirstFit),
            Default::default(),
        ));
        let (tx, rx) = unbounded_channel();
        tx.send(create_test_pod("unclaimed", &[Some("1")], None)).unwrap();
        drop(tx);

        dispatch_watched_pods(coordinator, rx, CancellationToken::new()).await;
        assert!(mock.calls().await.is_empty());
    }
}
