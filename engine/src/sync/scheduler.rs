//! Background reconciliation scheduler
//!
//! One long-lived tokio task runs the continuous pass on a fixed cadence.
//! The loop is sequential (a tick waits for the previous pass to finish)
//! and cancellable through a watch channel, so tests and graceful shutdown
//! can stop it instead of killing a detached thread.

use super::Reconciler;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Handle to a running scheduler
///
/// Dropping the handle without calling [`SchedulerHandle::shutdown`] leaves
/// the loop running for process lifetime, which is the serve-mode behavior.
pub struct SchedulerHandle {
    shutdown_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Stop the loop and wait for the in-flight pass, if any, to finish
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        if let Err(e) = self.handle.await {
            warn!("Background sync task ended abnormally: {}", e);
        }
    }
}

/// Spawn the continuous reconciliation loop
///
/// The first pass runs immediately; subsequent passes run every
/// `interval`. Pass failures are logged inside `reconcile_all` and never
/// stop the loop.
pub fn spawn(
    reconciler: Arc<Reconciler>,
    course_ids: Vec<String>,
    interval: Duration,
) -> SchedulerHandle {
    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

    let handle = tokio::spawn(async move {
        info!(
            "Background sync started for {} course(s), every {}s",
            course_ids.len(),
            interval.as_secs()
        );

        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let report = reconciler.reconcile_all(&course_ids).await;
                    debug!(
                        "Sync tick: +{} -{} ({} refreshed)",
                        report.added, report.removed, report.refreshed
                    );
                }
                _ = shutdown_rx.changed() => {
                    info!("Background sync stopped");
                    break;
                }
            }
        }
    });

    SchedulerHandle {
        shutdown_tx,
        handle,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::sync::testutil::{assignment, FakeProvider};
    use tempfile::TempDir;
    use tokio::time::{sleep, timeout};

    const TICK: Duration = Duration::from_millis(20);

    async fn wait_until<F, Fut>(mut condition: F)
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = bool>,
    {
        timeout(Duration::from_secs(5), async {
            while !condition().await {
                sleep(TICK).await;
            }
        })
        .await
        .expect("condition not reached in time");
    }

    #[tokio::test]
    async fn test_scheduler_syncs_and_stops_cleanly() {
        let dir = TempDir::new().unwrap();
        let db = Database::new(&dir.path().join("test.db")).await.unwrap();
        let store = db.tasks();

        let provider = Arc::new(FakeProvider::new());
        provider.set_course("c-1", "Historia", vec![assignment("1", "Essay")]);

        let reconciler = Arc::new(Reconciler::new(provider.clone(), store.clone()));
        let handle = spawn(reconciler, vec!["c-1".to_string()], TICK);

        let probe = store.clone();
        wait_until(|| {
            let store = probe.clone();
            async move { store.get("1").await.unwrap().is_some() }
        })
        .await;

        handle.shutdown().await;

        // After shutdown, provider changes no longer reach the mirror
        provider.set_course("c-1", "Historia", vec![]);
        sleep(TICK * 4).await;
        assert!(store.get("1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_scheduler_keeps_ticking_through_provider_outage() {
        let dir = TempDir::new().unwrap();
        let db = Database::new(&dir.path().join("test.db")).await.unwrap();
        let store = db.tasks();

        let provider = Arc::new(FakeProvider::new());
        provider.set_course("c-1", "Historia", vec![assignment("1", "Essay")]);
        provider.set_available(false);

        let reconciler = Arc::new(Reconciler::new(provider.clone(), store.clone()));
        let handle = spawn(reconciler, vec!["c-1".to_string()], TICK);

        // Several failing ticks mutate nothing
        sleep(TICK * 4).await;
        assert_eq!(store.count().await.unwrap(), 0);

        // Once the provider recovers, a later tick converges the mirror
        provider.set_available(true);
        let probe = store.clone();
        wait_until(|| {
            let store = probe.clone();
            async move { store.get("1").await.unwrap().is_some() }
        })
        .await;

        handle.shutdown().await;
    }
}
