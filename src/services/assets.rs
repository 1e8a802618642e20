use anyhow::{Result, anyhow};
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use std::time::SystemTime;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

/// URL prefix under which stored assets are served back
pub const PUBLIC_PREFIX: &str = "/Uploads";

/// Attempts at finding a free file name before giving up
const NAME_ATTEMPTS: u32 = 16;

pub struct StoredAsset {
    pub key: String,
    pub modified: SystemTime,
}

/// Storage for uploaded images, addressed by `{dir}/{file}` keys.
#[async_trait]
pub trait AssetStore: Send + Sync {
    /// Writes `data` under `dir` with a fresh `{epoch-millis}-{file_name}` name
    /// and returns the key. Never overwrites an existing file.
    async fn store(&self, dir: &str, file_name: &str, data: &[u8]) -> Result<String>;
    /// Removes a file. A missing file counts as removed.
    async fn delete(&self, key: &str) -> Result<()>;
    async fn exists(&self, key: &str) -> Result<bool>;
    async fn list(&self, dir: &str) -> Result<Vec<StoredAsset>>;
    async fn check_writable(&self) -> Result<()>;
}

/// Path string persisted in a record for a store key.
pub fn public_path(key: &str) -> String {
    format!("{}/{}", PUBLIC_PREFIX, key)
}

/// Store key for a persisted path, if the path points into the asset store.
///
/// Absolute URLs and paths outside `/Uploads/` yield `None`; such values are
/// never deleted.
pub fn key_from_public(path: &str) -> Option<&str> {
    let key = path.strip_prefix(PUBLIC_PREFIX)?.strip_prefix('/')?;
    is_safe_key(key).then_some(key)
}

fn is_safe_key(key: &str) -> bool {
    !key.is_empty()
        && Path::new(key)
            .components()
            .all(|c| matches!(c, Component::Normal(_)))
}

/// Local filesystem store, one subdirectory per resource.
pub struct LocalAssetStore {
    root: PathBuf,
}

impl LocalAssetStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn full_path(&self, key: &str) -> Result<PathBuf> {
        if !is_safe_key(key) {
            return Err(anyhow!("Refusing unsafe asset key: {}", key));
        }
        Ok(self.root.join(key))
    }

    fn candidate_name(millis: i64, attempt: u32, file_name: &str) -> String {
        if attempt == 0 {
            format!("{}-{}", millis, file_name)
        } else {
            format!("{}-{}-{}", millis, attempt, file_name)
        }
    }
}

#[async_trait]
impl AssetStore for LocalAssetStore {
    async fn store(&self, dir: &str, file_name: &str, data: &[u8]) -> Result<String> {
        let dir_path = self.full_path(dir)?;
        fs::create_dir_all(&dir_path).await?;

        let millis = chrono::Utc::now().timestamp_millis();

        for attempt in 0..NAME_ATTEMPTS {
            let name = Self::candidate_name(millis, attempt, file_name);
            let path = dir_path.join(&name);

            let mut file = match fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(file) => file,
                Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(e.into()),
            };

            let written = async {
                file.write_all(data).await?;
                file.sync_all().await
            }
            .await;

            if let Err(e) = written {
                warn!(
                    path = %path.display(),
                    error = %e,
                    "asset write failed, removing partial file"
                );
                drop(file);
                let _ = fs::remove_file(&path).await;
                return Err(e.into());
            }

            let key = format!("{}/{}", dir, name);
            debug!(key = %key, size = data.len(), "asset stored");
            return Ok(key);
        }

        Err(anyhow!(
            "No free file name for '{}' in '{}' after {} attempts",
            file_name,
            dir,
            NAME_ATTEMPTS
        ))
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let path = self.full_path(key)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let path = self.full_path(key)?;
        Ok(fs::try_exists(&path).await?)
    }

    async fn list(&self, dir: &str) -> Result<Vec<StoredAsset>> {
        let dir_path = self.full_path(dir)?;
        let mut entries = match fs::read_dir(&dir_path).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut assets = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let metadata = entry.metadata().await?;
            if !metadata.is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                assets.push(StoredAsset {
                    key: format!("{}/{}", dir, name),
                    modified: metadata.modified()?,
                });
            }
        }

        Ok(assets)
    }

    async fn check_writable(&self) -> Result<()> {
        fs::create_dir_all(&self.root).await?;
        let marker = self.root.join(".health-check");
        fs::write(&marker, b"ok").await?;
        fs::remove_file(&marker).await?;
        Ok(())
    }
}
