//! Error types for the synthesis pipeline.
//!
//! This module defines the central `Error` enum, which captures all
//! recoverable and reportable error cases within the pipeline. The HTTP
//! surface maps each case to a status code; cleanup failures are never
//! represented here because they are logged and swallowed by design.
//!
//! ## Error Cases
//!
//! - Validation: `EmptyBatch`, `BatchTooLarge`, `UnsupportedFile`,
//!   `NoMappings`, `DuplicateTarget`, `InvalidCodepoint` - the caller's
//!   input was rejected before any synthesis work began.
//! - `AssetNotFound`: a mapping referenced an identifier the glyph store
//!   does not hold.
//! - `Synthesis`: the font synthesizer collaborator failed.
//! - `Archive`: archive construction failed.
//! - `Store` / `Io`: storage-backend failures.

pub type Result<T, E = Error> = core::result::Result<T, E>;

/// Unified error type for the synthesis pipeline.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An upload batch arrived with no files in it.
    #[error("no files supplied")]
    EmptyBatch,

    /// An upload batch exceeded the configured file-count bound.
    #[error("batch of {count} files exceeds the limit of {limit}")]
    BatchTooLarge { count: usize, limit: usize },

    /// Neither the declared media type nor the extension identified the
    /// file as an SVG image.
    #[error("file {filename:?} is not an SVG image")]
    UnsupportedFile { filename: String },

    /// A synthesis request arrived with an empty mapping list.
    #[error("no mappings provided")]
    NoMappings,

    /// Two mappings in one request targeted the same character.
    #[error("multiple mappings target the character {character:?}")]
    DuplicateTarget { character: char },

    /// A mapping's character field did not hold exactly one character.
    #[error("invalid glyph character {raw:?}: expected exactly one character")]
    InvalidCodepoint { raw: String },

    /// A mapping referenced an identifier the glyph store does not hold.
    #[error("file {id} not found")]
    AssetNotFound { id: String },

    /// The font synthesizer collaborator rejected the request.
    #[error("font synthesis failed: {reason}")]
    Synthesis { reason: String },

    /// Archive construction failed.
    #[error("archive packaging failed: {reason}")]
    Archive { reason: String },

    /// The glyph store backend failed.
    #[error("glyph store error: {context}")]
    Store { context: String },

    /// Filesystem failure outside the collaborators.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
