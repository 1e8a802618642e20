use crate::config::SiteConfig;
use crate::services::assets::{AssetStore, LocalAssetStore};
use std::sync::Arc;
use tracing::info;

pub async fn setup_storage(config: &SiteConfig) -> anyhow::Result<Arc<LocalAssetStore>> {
    let store = LocalAssetStore::new(&config.upload_dir);
    info!("🗂️  Asset store: {}", store.root().display());

    store.check_writable().await.map_err(|e| {
        anyhow::anyhow!(
            "Asset directory '{}' is not writable: {}",
            store.root().display(),
            e
        )
    })?;

    info!("✅ Asset store is ready");
    Ok(Arc::new(store))
}
