use crate::services::assets::{AssetStore, key_from_public};
use crate::services::catalog::ASSET_OWNERS;
use crate::services::cleanup::AssetCleaner;
use sea_orm::DatabaseConnection;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::SystemTime;
use tokio::sync::watch;
use tokio::time::{Duration, sleep};

/// Periodically retires asset files that no record references anymore.
///
/// Files younger than the grace period are left alone so an upload whose
/// database write is still in flight is never swept.
pub struct BackgroundWorker {
    db: DatabaseConnection,
    store: Arc<dyn AssetStore>,
    cleaner: AssetCleaner,
    grace: Duration,
    interval: Duration,
    shutdown: watch::Receiver<bool>,
}

impl BackgroundWorker {
    pub fn new(
        db: DatabaseConnection,
        store: Arc<dyn AssetStore>,
        cleaner: AssetCleaner,
        grace: Duration,
        interval: Duration,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            db,
            store,
            cleaner,
            grace,
            interval,
            shutdown,
        }
    }

    pub async fn run(mut self) {
        tracing::info!("🚀 Background worker started");

        loop {
            tokio::select! {
                _ = self.shutdown.changed() => {
                    tracing::info!("🛑 Background worker shutting down");
                    break;
                }
                _ = sleep(self.interval) => {
                    match self.sweep_orphans().await {
                        Ok(0) => tracing::debug!("Orphan sweep found nothing to retire"),
                        Ok(n) => tracing::info!("🧹 Orphan sweep retired {} file(s)", n),
                        Err(e) => tracing::error!("Orphan sweep failed: {}", e),
                    }
                }
            }
        }
    }

    /// Schedules every unreferenced file older than the grace period for
    /// deletion and returns how many were scheduled.
    pub async fn sweep_orphans(&self) -> anyhow::Result<usize> {
        let mut referenced = HashSet::new();
        for owner in ASSET_OWNERS {
            for path in owner.referenced(&self.db).await? {
                if let Some(key) = key_from_public(&path) {
                    referenced.insert(key.to_string());
                }
            }
        }

        let now = SystemTime::now();
        let mut retired = 0;

        for owner in ASSET_OWNERS {
            for asset in self.store.list(owner.spec.asset_dir).await? {
                if referenced.contains(&asset.key) {
                    continue;
                }
                let age = now.duration_since(asset.modified).unwrap_or_default();
                if age < self.grace {
                    continue;
                }
                tracing::info!("Retiring orphaned asset {}", asset.key);
                self.cleaner.schedule(asset.key);
                retired += 1;
            }
        }

        Ok(retired)
    }
}
