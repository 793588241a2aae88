use crate::{ServiceRegistry, Store};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info};

#[derive(Debug, Clone, Copy)]
pub struct ReaperSettings {
    /// Pause between cleanup passes.
    pub interval: Duration,
    /// Records without a heartbeat for longer than this are removed.
    pub stale_after: Duration,
}

/// Periodically remove services that stopped heartbeating.
///
/// Runs until `shutdown` turns true or its sender is dropped. A failed pass
/// is logged and the loop carries on. Returns the total number reaped.
pub async fn run_reaper<S: Store>(
    registry: Arc<ServiceRegistry<S>>,
    settings: ReaperSettings,
    mut shutdown: watch::Receiver<bool>,
) -> usize {
    info!(
        "Reaper started: every {:?}, stale after {:?}",
        settings.interval, settings.stale_after
    );

    let mut total = 0;
    loop {
        if *shutdown.borrow() {
            break;
        }

        tokio::select! {
            _ = tokio::time::sleep(settings.interval) => {}
            changed = shutdown.changed() => {
                if changed.is_err() {
                    break;
                }
                continue;
            }
        }

        match registry.cleanup_stale(settings.stale_after).await {
            Ok(removed) => {
                debug!("Reaper pass removed {} service(s)", removed);
                total += removed;
            }
            Err(e) => error!("Reaper pass failed: {}", e),
        }
    }

    info!("Reaper stopped after removing {} service(s)", total);
    total
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{KeySpace, ManualClock, MemoryStore, ServiceRecord};

    #[tokio::test]
    async fn test_reaper_removes_stale_and_stops_on_shutdown() {
        let clock = Arc::new(ManualClock::new(1_000.0));
        let registry = Arc::new(
            ServiceRegistry::with_store(MemoryStore::new(), KeySpace::new("test:"))
                .with_clock(clock.clone()),
        );
        registry
            .register(&ServiceRecord::new("old", "10.0.0.1", 8000, "worker"))
            .await
            .unwrap();
        clock.advance(120.0);
        registry
            .register(&ServiceRecord::new("fresh", "10.0.0.2", 8000, "worker"))
            .await
            .unwrap();

        let (tx, rx) = watch::channel(false);
        let reaper = tokio::spawn(run_reaper(
            registry.clone(),
            ReaperSettings {
                interval: Duration::from_millis(10),
                stale_after: Duration::from_secs(60),
            },
            rx,
        ));

        tokio::time::sleep(Duration::from_millis(100)).await;
        tx.send(true).unwrap();
        let total = reaper.await.unwrap();

        assert_eq!(total, 1);
        assert!(registry.get("old").await.unwrap_err().is_not_found());
        assert!(registry.get("fresh").await.is_ok());
    }

    #[tokio::test]
    async fn test_reaper_exits_when_sender_dropped() {
        let registry = Arc::new(ServiceRegistry::with_store(
            MemoryStore::new(),
            KeySpace::default(),
        ));
        let (tx, rx) = watch::channel(false);
        drop(tx);

        let total = run_reaper(
            registry,
            ReaperSettings {
                interval: Duration::from_secs(3600),
                stale_after: Duration::from_secs(60),
            },
            rx,
        )
        .await;
        assert_eq!(total, 0);
    }
}
