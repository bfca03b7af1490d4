//! # Durable Queue Store
//!
//! Persistence for the pending-submission list. The whole queue is stored
//! as one serialized JSON document under a well-known path, written
//! atomically so a crash mid-save never leaves a partial file visible.
//!
//! A corrupted or unreadable store loads as an empty queue instead of
//! failing. Losing the queue is bad; crash-looping on every startup until
//! someone deletes the file by hand is worse. The tradeoff is deliberate
//! and covered by tests.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::error::SyncError;
use crate::model::QueuedReading;

/// Persistence port for the sync engine's queue.
///
/// Both operations must be atomic from the caller's perspective: a `load`
/// never observes a partially written list.
#[async_trait]
pub trait QueueStore: Send + Sync {
    /// Load the persisted queue. Corruption yields an empty list.
    async fn load(&self) -> Vec<QueuedReading>;

    /// Persist the full queue, replacing any previous contents.
    async fn save(&self, items: &[QueuedReading]) -> Result<(), SyncError>;
}

/// File-backed store holding the queue as a single JSON document.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at the platform data directory (`<data_dir>/fieldmeter/queue.json`)
    pub fn at_default_location() -> Result<Self, SyncError> {
        let base = dirs::data_dir()
            .ok_or_else(|| SyncError::store("no platform data directory available"))?;
        Ok(Self::new(base.join("fieldmeter").join("queue.json")))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl QueueStore for JsonFileStore {
    async fn load(&self) -> Vec<QueuedReading> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Vec::new(),
            Err(err) => {
                tracing::warn!(path = %self.path.display(), error = %err,
                    "queue store unreadable, starting with empty queue");
                return Vec::new();
            }
        };

        match serde_json::from_slice(&bytes) {
            Ok(items) => items,
            Err(err) => {
                tracing::warn!(path = %self.path.display(), error = %err,
                    "queue store corrupted, starting with empty queue");
                Vec::new()
            }
        }
    }

    async fn save(&self, items: &[QueuedReading]) -> Result<(), SyncError> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let json = serde_json::to_vec_pretty(items)?;

        // Write-then-rename keeps the previous document intact until the
        // new one is fully on disk.
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &json).await?;
        tokio::fs::rename(&tmp, &self.path).await?;

        tracing::debug!(path = %self.path.display(), entries = items.len(), "queue persisted");
        Ok(())
    }
}

/// In-memory store for tests and ephemeral sessions.
#[derive(Debug, Default)]
pub struct MemoryStore {
    items: tokio::sync::RwLock<Vec<QueuedReading>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with existing entries
    pub fn with_items(items: Vec<QueuedReading>) -> Self {
        Self {
            items: tokio::sync::RwLock::new(items),
        }
    }
}

#[async_trait]
impl QueueStore for MemoryStore {
    async fn load(&self) -> Vec<QueuedReading> {
        self.items.read().await.clone()
    }

    async fn save(&self, items: &[QueuedReading]) -> Result<(), SyncError> {
        *self.items.write().await = items.to_vec();
        Ok(())
    }
}
