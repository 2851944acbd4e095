//! The Glyph Store port and its filesystem/in-memory adapters.

use crate::error::Result;
use crate::types::AssetId;
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Shared, request-spanning storage for uploaded glyph assets.
///
/// The store is the only resource shared across concurrent requests:
/// written by intake, read by validation and orchestration, and cleared
/// wholesale by bulk cleanup. It supports write-once-per-identifier,
/// read-by-identifier, and full clear; per-identifier deletion is
/// intentionally absent from the pipeline's normal path.
#[async_trait]
pub trait GlyphStore: Send + Sync {
    /// Persists `content` under `id`.
    ///
    /// Identifiers are minted fresh per upload and never reused, so a
    /// second write to the same id indicates a caller bug.
    async fn put(&self, id: AssetId, content: Bytes) -> Result<()>;

    /// Returns the stored content for `id`, or `None` when absent.
    async fn get(&self, id: AssetId) -> Result<Option<Bytes>>;

    /// Reports whether `id` resolves to a stored asset.
    async fn contains(&self, id: AssetId) -> Result<bool>;

    /// Removes every stored asset, best effort.
    ///
    /// A failure to remove one asset does not abort the sweep; the outcome
    /// reports the aggregate. Idempotent: clearing an empty store succeeds
    /// trivially.
    ///
    /// Clearing while another request still needs to read an asset is an
    /// accepted race: the reader fails with a not-found error and releases
    /// its scope. Callers are expected not to trigger a purge during
    /// active synthesis.
    async fn clear(&self) -> Result<PurgeOutcome>;
}

/// Aggregate result of a best-effort store purge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PurgeOutcome {
    /// Assets removed.
    pub removed: usize,
    /// Assets that could not be removed.
    pub failed: usize,
}

impl PurgeOutcome {
    /// True when nothing was left behind.
    pub const fn is_complete(&self) -> bool {
        self.failed == 0
    }
}

/// Filesystem-backed store: one flat `<id>.svg` file per asset under a
/// configured root directory.
#[derive(Debug, Clone)]
pub struct FsGlyphStore {
    root: PathBuf,
}

impl FsGlyphStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Creates the backing directory if it does not exist yet.
    pub async fn ensure(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.root).await?;
        Ok(())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, id: AssetId) -> PathBuf {
        self.root.join(id.storage_name())
    }
}

#[async_trait]
impl GlyphStore for FsGlyphStore {
    async fn put(&self, id: AssetId, content: Bytes) -> Result<()> {
        tokio::fs::write(self.path_for(id), &content).await?;
        Ok(())
    }

    async fn get(&self, id: AssetId) -> Result<Option<Bytes>> {
        match tokio::fs::read(self.path_for(id)).await {
            Ok(bytes) => Ok(Some(bytes.into())),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    async fn contains(&self, id: AssetId) -> Result<bool> {
        Ok(tokio::fs::try_exists(self.path_for(id)).await?)
    }

    async fn clear(&self) -> Result<PurgeOutcome> {
        let mut outcome = PurgeOutcome::default();
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            // Nothing has ever been stored.
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(outcome),
            Err(err) => return Err(err.into()),
        };
        while let Some(entry) = entries.next_entry().await? {
            let is_file = entry
                .file_type()
                .await
                .map(|kind| kind.is_file())
                .unwrap_or(false);
            if !is_file {
                continue;
            }
            let path = entry.path();
            match tokio::fs::remove_file(&path).await {
                Ok(()) => outcome.removed += 1,
                Err(err) => {
                    outcome.failed += 1;
                    tracing::warn!("failed to remove asset {}: {err}", path.display());
                }
            }
        }
        Ok(outcome)
    }
}

/// In-memory store used by tests and embedded setups.
#[derive(Debug, Default, Clone)]
pub struct MemoryGlyphStore {
    assets: Arc<parking_lot::RwLock<HashMap<AssetId, Bytes>>>,
}

impl MemoryGlyphStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.assets.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.read().is_empty()
    }
}

#[async_trait]
impl GlyphStore for MemoryGlyphStore {
    async fn put(&self, id: AssetId, content: Bytes) -> Result<()> {
        self.assets.write().insert(id, content);
        Ok(())
    }

    async fn get(&self, id: AssetId) -> Result<Option<Bytes>> {
        Ok(self.assets.read().get(&id).cloned())
    }

    async fn contains(&self, id: AssetId) -> Result<bool> {
        Ok(self.assets.read().contains_key(&id))
    }

    async fn clear(&self) -> Result<PurgeOutcome> {
        let removed = {
            let mut assets = self.assets.write();
            let removed = assets.len();
            assets.clear();
            removed
        };
        Ok(PurgeOutcome { removed, failed: 0 })
    }
}
