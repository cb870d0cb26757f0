//! Subscription persistence.
//!
//! Stores only provide whole-snapshot load and save. Serializing concurrent
//! read-modify-write cycles is the job of
//! [`SubscriptionService`](super::SubscriptionService).

use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::{debug, info};

use super::model::Subscriptions;
use crate::{Error, Result};

#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    /// Load a full snapshot.
    async fn load(&self) -> Result<Subscriptions>;

    /// Replace the persisted snapshot.
    async fn save(&self, subscriptions: &Subscriptions) -> Result<()>;
}

/// JSON file store compatible with the `data.json` layout.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl SubscriptionStore for JsonFileStore {
    async fn load(&self) -> Result<Subscriptions> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "Subscription file not found, starting empty");
                return Ok(Subscriptions::new());
            }
            Err(e) => return Err(e.into()),
        };

        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Subscriptions::new());
        }

        let subscriptions: Subscriptions = serde_json::from_slice(&bytes)?;
        Ok(subscriptions.normalize())
    }

    async fn save(&self, subscriptions: &Subscriptions) -> Result<()> {
        let json = serde_json::to_vec_pretty(subscriptions)?;
        let path = self.path.clone();

        tokio::task::spawn_blocking(move || write_atomic(&path, &json))
            .await
            .map_err(|e| Error::Other(format!("Subscription save task failed: {}", e)))??;

        debug!(path = %self.path.display(), "Subscriptions saved");
        Ok(())
    }
}

/// Write to a sibling temp file and rename it over `path`.
fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };

    if !dir.exists() {
        std::fs::create_dir_all(&dir)?;
        info!(dir = %dir.display(), "Created subscription data directory");
    }

    let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
    tmp.write_all(contents)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path)
        .map_err(|e| Error::storage(format!("Failed to replace {}: {}", path.display(), e)))?;
    Ok(())
}

/// In-memory store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<Subscriptions>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SubscriptionStore for MemoryStore {
    async fn load(&self) -> Result<Subscriptions> {
        Ok(self.inner.read().clone())
    }

    async fn save(&self, subscriptions: &Subscriptions) -> Result<()> {
        *self.inner.write() = subscriptions.clone();
        Ok(())
    }
}
