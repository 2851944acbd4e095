//! Per-request working scopes.
//!
//! Every synthesis request owns exactly one [`WorkingScope`]: a directory
//! named by a fresh [`ScopeId`] under the shared [`WorkArea`], plus the slot
//! for its packaged archive blob (`<id>.zip`, a sibling of the directory).
//! Identifier uniqueness is what isolates concurrent requests; no
//! cross-request locking exists anywhere in the pipeline.
//!
//! Cleanup runs on every path. Error paths release the scope explicitly via
//! [`WorkingScope::release`]; a `Drop` backstop covers abandoned scopes,
//! most importantly a response body dropped mid-stream by a disconnecting
//! client. Cleanup failures are logged and never propagated - by the time
//! they can occur, the response has already been sent or has already failed
//! independently.

use crate::error::Result;
use crate::types::ScopeId;
use std::path::{Path, PathBuf};

/// Root directory under which per-request scopes are created.
#[derive(Debug, Clone)]
pub struct WorkArea {
    root: PathBuf,
}

impl WorkArea {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Creates the root directory if it does not exist yet.
    pub async fn ensure(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.root).await?;
        Ok(())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Creates a fresh, exclusively-owned scope.
    ///
    /// The directory is created with `create_dir`, not `create_dir_all`, so
    /// a colliding identifier fails loudly instead of silently sharing
    /// state with another request.
    pub async fn open_scope(&self) -> Result<WorkingScope> {
        let id = ScopeId::generate();
        let dir = self.root.join(id.dir_name());
        let archive = self.root.join(id.archive_name());
        tokio::fs::create_dir_all(&self.root).await?;
        tokio::fs::create_dir(&dir).await?;
        Ok(WorkingScope {
            id,
            dir,
            archive,
            armed: true,
        })
    }
}

/// An isolated, request-exclusive directory for in-progress synthesis
/// output, plus the slot for its packaged archive blob.
#[derive(Debug)]
pub struct WorkingScope {
    id: ScopeId,
    dir: PathBuf,
    archive: PathBuf,
    armed: bool,
}

impl WorkingScope {
    pub fn id(&self) -> ScopeId {
        self.id
    }

    /// The scope directory the synthesizer output is written into.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Where the packaged archive blob for this scope lives.
    pub fn archive_path(&self) -> &Path {
        &self.archive
    }

    /// Flat listing of the regular files currently inside the scope, in
    /// name order.
    pub async fn files(&self) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_file() {
                files.push(entry.path());
            }
        }
        files.sort();
        Ok(files)
    }

    /// Removes the scope directory and archive blob now.
    ///
    /// Failures are logged, not returned: release runs after the request's
    /// outcome is already decided.
    pub async fn release(mut self) {
        self.armed = false;
        remove_scope(self.id, &self.dir, &self.archive).await;
    }
}

impl Drop for WorkingScope {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        // Backstop for scopes nobody released explicitly, e.g. a delivery
        // body dropped when the client disconnected mid-stream. Removal is
        // blocking filesystem work, so it is handed to the runtime's
        // blocking pool when one is available.
        let id = self.id;
        let dir = std::mem::take(&mut self.dir);
        let archive = std::mem::take(&mut self.archive);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn_blocking(move || remove_scope_blocking(id, &dir, &archive));
            }
            Err(_) => remove_scope_blocking(id, &dir, &archive),
        }
    }
}

async fn remove_scope(id: ScopeId, dir: &Path, archive: &Path) {
    if let Err(err) = tokio::fs::remove_dir_all(dir).await {
        if err.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!("failed to remove working scope {id}: {err}");
        }
    }
    if let Err(err) = tokio::fs::remove_file(archive).await {
        if err.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!("failed to remove archive blob for scope {id}: {err}");
        }
    }
}

fn remove_scope_blocking(id: ScopeId, dir: &Path, archive: &Path) {
    if let Err(err) = std::fs::remove_dir_all(dir) {
        if err.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!("failed to remove working scope {id}: {err}");
        }
    }
    if let Err(err) = std::fs::remove_file(archive) {
        if err.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!("failed to remove archive blob for scope {id}: {err}");
        }
    }
}
