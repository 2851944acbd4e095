//! Upload intake and the synthesis orchestration pipeline.
//!
//! [`IconIntake`] owns the upload side: batch bounds, media-type/extension
//! checks, identifier assignment, and the per-file descriptors echoed back
//! to the caller.
//!
//! [`FontPipeline`] runs one synthesis request end to end. Within a request
//! the stages are strictly sequential - validate, open an isolated scope,
//! synthesize, package - and no stage starts before the prior one fully
//! succeeded. Across requests nothing is ordered or shared except the glyph
//! store; scope isolation comes from identifier uniqueness alone. Any
//! failure after the scope exists releases it before the error propagates;
//! the success path hands the scope to a [`FontBundle`], whose drop
//! releases it once delivery is over.

use crate::archive::{ArchiveEntry, ArchiveWriter};
use crate::error::{Error, Result};
use crate::filename::normalize_filename;
use crate::scope::{WorkArea, WorkingScope};
use crate::store::GlyphStore;
use crate::synth::{FontSynthesizer, GlyphSource};
use crate::types::{AssetId, FontFormat, ScopeId, SynthesisRequest, UploadedIcon};
use bytes::Bytes;
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

/// Upper bound on files per upload batch when the caller configures none.
pub const DEFAULT_MAX_BATCH_FILES: usize = 50;

/// One candidate file of an upload batch, as received from the transport.
#[derive(Debug, Clone)]
pub struct IncomingFile {
    /// File name as supplied by the client, possibly in a non-UTF-8 byte
    /// interpretation.
    pub filename: String,
    /// Declared media type, when the transport carried one.
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

/// Accepts vector-image upload batches into the glyph store.
pub struct IconIntake {
    store: Arc<dyn GlyphStore>,
    max_batch_files: usize,
}

impl IconIntake {
    pub fn new(store: Arc<dyn GlyphStore>) -> Self {
        Self {
            store,
            max_batch_files: DEFAULT_MAX_BATCH_FILES,
        }
    }

    pub fn with_max_batch_files(mut self, limit: usize) -> Self {
        self.max_batch_files = limit;
        self
    }

    /// Validates and stores a batch, returning one descriptor per file.
    ///
    /// Files are processed in order and independently: a rejected file
    /// fails the batch with an error naming it, while files accepted
    /// before it remain stored.
    pub async fn accept_batch(&self, files: Vec<IncomingFile>) -> Result<Vec<UploadedIcon>> {
        if files.is_empty() {
            return Err(Error::EmptyBatch);
        }
        if files.len() > self.max_batch_files {
            return Err(Error::BatchTooLarge {
                count: files.len(),
                limit: self.max_batch_files,
            });
        }

        let mut accepted = Vec::with_capacity(files.len());
        for file in files {
            let original_name = normalize_filename(&file.filename);
            if !is_vector_image(&file) {
                return Err(Error::UnsupportedFile {
                    filename: original_name,
                });
            }
            let id = AssetId::generate();
            self.store.put(id, file.bytes).await?;
            accepted.push(UploadedIcon {
                id,
                original_name,
                filename: id.storage_name(),
            });
        }
        Ok(accepted)
    }
}

/// Either signal may accept the file; both must miss for a rejection.
fn is_vector_image(file: &IncomingFile) -> bool {
    let media_says_svg = file
        .content_type
        .as_deref()
        .map(|ct| ct.to_ascii_lowercase().contains("svg"))
        .unwrap_or(false);
    let extension_says_svg = Path::new(&file.filename)
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("svg"))
        .unwrap_or(false);
    media_says_svg || extension_says_svg
}

/// A packaged synthesis result ready for delivery.
///
/// Holds the working scope alive. Dropping the bundle - after streaming
/// completed, failed, or the client went away - releases the scope
/// directory and the archive blob; [`FontBundle::discard`] does the same
/// deterministically.
#[derive(Debug)]
pub struct FontBundle {
    file_stem: String,
    scope: WorkingScope,
}

impl FontBundle {
    /// Where the packaged archive blob lives.
    pub fn archive_path(&self) -> &Path {
        self.scope.archive_path()
    }

    /// Delivery filename, derived from the requested font name.
    pub fn archive_filename(&self) -> String {
        format!("{}.zip", self.file_stem)
    }

    pub fn scope_id(&self) -> ScopeId {
        self.scope.id()
    }

    /// Releases the scope and blob now instead of waiting for drop.
    pub async fn discard(self) {
        self.scope.release().await;
    }
}

/// Orchestrates one synthesis request: fail-fast validation, an isolated
/// working scope, synthesis, and packaging into a deliverable bundle.
pub struct FontPipeline {
    store: Arc<dyn GlyphStore>,
    synthesizer: Arc<dyn FontSynthesizer>,
    archiver: Arc<dyn ArchiveWriter>,
    work: WorkArea,
}

impl FontPipeline {
    pub fn new(
        store: Arc<dyn GlyphStore>,
        synthesizer: Arc<dyn FontSynthesizer>,
        archiver: Arc<dyn ArchiveWriter>,
        work: WorkArea,
    ) -> Self {
        Self {
            store,
            synthesizer,
            archiver,
            work,
        }
    }

    /// Fail-fast checks, run before any scope is created or any synthesis
    /// work begins.
    ///
    /// Rejects an empty mapping list, two mappings targeting the same
    /// character, and any identifier the store does not hold - the error
    /// names the first missing one.
    pub async fn validate(&self, request: &SynthesisRequest) -> Result<()> {
        if request.mappings().is_empty() {
            return Err(Error::NoMappings);
        }
        let mut targets = HashSet::new();
        for mapping in request.mappings() {
            if !targets.insert(mapping.character) {
                return Err(Error::DuplicateTarget {
                    character: mapping.character,
                });
            }
        }
        for mapping in request.mappings() {
            if !self.store.contains(mapping.asset).await? {
                return Err(Error::AssetNotFound {
                    id: mapping.asset.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Runs the full orchestrator-to-packager sequence for one request.
    ///
    /// On any failure after the scope exists, the scope is released before
    /// the error propagates; no path leaves scope state behind.
    pub async fn build_bundle(&self, request: SynthesisRequest) -> Result<FontBundle> {
        self.validate(&request).await?;

        let scope = self.work.open_scope().await?;
        match self.synthesize_into(&request, &scope).await {
            Ok(()) => Ok(FontBundle {
                file_stem: request.file_stem(),
                scope,
            }),
            Err(err) => {
                scope.release().await;
                Err(err)
            }
        }
    }

    async fn synthesize_into(
        &self,
        request: &SynthesisRequest,
        scope: &WorkingScope,
    ) -> Result<()> {
        let stem = request.file_stem();

        let mut glyphs = Vec::with_capacity(request.mappings().len());
        for mapping in request.mappings() {
            // Validation already resolved every id, but the store may have
            // been purged since; treat that race as a plain miss.
            let svg = self
                .store
                .get(mapping.asset)
                .await?
                .ok_or_else(|| Error::AssetNotFound {
                    id: mapping.asset.to_string(),
                })?;
            glyphs.push(GlyphSource {
                character: mapping.character,
                svg,
            });
        }

        let rendered = self
            .synthesizer
            .synthesize(&stem, &glyphs, &FontFormat::ALL)
            .await?;
        for font in &rendered {
            let name = format!("{stem}.{}", font.format.extension());
            tokio::fs::write(scope.dir().join(name), &font.bytes).await?;
        }

        // Deterministic membership: exactly what sits in the scope now.
        let mut entries = Vec::new();
        for path in scope.files().await? {
            let name = path
                .file_name()
                .and_then(|name| name.to_str())
                .map(str::to_owned)
                .ok_or_else(|| Error::Archive {
                    reason: format!("unrepresentable file name in scope {}", scope.id()),
                })?;
            let bytes = tokio::fs::read(&path).await?;
            entries.push(ArchiveEntry { name, bytes });
        }
        let blob = self.archiver.bundle(&entries)?;
        tokio::fs::write(scope.archive_path(), blob).await?;
        Ok(())
    }
}
