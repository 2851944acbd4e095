//! # Core Pipeline Types
//!
//! This module defines the shared identifiers and value objects used across
//! the synthesis pipeline. It ensures that the intake, validation, and
//! orchestration stages adhere to one consistent contract for naming stored
//! assets and working scopes.
//!
//! ## Overview
//!
//! - [`AssetId`] / [`ScopeId`] - ULID-backed identifiers. ULIDs are unique
//!   without coordination, which is what guarantees that concurrently active
//!   requests can never share a working scope or archive blob.
//! - [`FontFormat`] - the fixed set of output formats every synthesis
//!   request produces.
//! - [`GlyphMapping`] / [`SynthesisRequest`] - the validated input of one
//!   synthesis run.
//! - [`UploadedIcon`] - the per-file descriptor returned by intake.
//!
//! The two identifier kinds are distinct newtypes: an asset identifier can
//! never be passed where a scope identifier is expected.

use crate::error::{Error, Result};
use core::fmt;
use core::str::FromStr;
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Font name applied when a request does not supply one.
pub const DEFAULT_FONT_NAME: &str = "iconfont";

/// Identifier of a stored glyph asset.
///
/// Assigned at intake, echoed back to the caller, and later referenced by
/// [`GlyphMapping`]s. Globally unique across the store's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetId(Ulid);

impl AssetId {
    /// Mints a fresh, globally unique identifier.
    pub fn generate() -> Self {
        Self(Ulid::new())
    }

    /// The flat file name the asset is stored under.
    pub fn storage_name(&self) -> String {
        format!("{}.svg", self.0)
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for AssetId {
    type Err = ulid::DecodeError;

    fn from_str(s: &str) -> core::result::Result<Self, Self::Err> {
        Ulid::from_string(s).map(Self)
    }
}

/// Identifier of one request's working scope and its archive blob.
///
/// No two in-flight requests may share one; this is what isolates concurrent
/// synthesis runs without any cross-request locking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScopeId(Ulid);

impl ScopeId {
    /// Mints a fresh, globally unique identifier.
    pub fn generate() -> Self {
        Self(Ulid::new())
    }

    /// Directory name of the scope under the work area.
    pub fn dir_name(&self) -> String {
        self.0.to_string()
    }

    /// File name of the scope's packaged archive blob.
    pub fn archive_name(&self) -> String {
        format!("{}.zip", self.0)
    }
}

impl fmt::Display for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The output formats produced for every synthesis request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FontFormat {
    /// TrueType (`.ttf`).
    Ttf,
    /// Web Open Font Format (`.woff`).
    Woff,
    /// Web Open Font Format 2 (`.woff2`).
    Woff2,
    /// Embedded OpenType (`.eot`).
    Eot,
    /// SVG font (`.svg`).
    Svg,
}

impl FontFormat {
    /// Every format a synthesis request produces, in delivery order.
    pub const ALL: [FontFormat; 5] = [
        FontFormat::Ttf,
        FontFormat::Woff,
        FontFormat::Woff2,
        FontFormat::Eot,
        FontFormat::Svg,
    ];

    /// File extension (without dot) for this format.
    pub const fn extension(self) -> &'static str {
        match self {
            FontFormat::Ttf => "ttf",
            FontFormat::Woff => "woff",
            FontFormat::Woff2 => "woff2",
            FontFormat::Eot => "eot",
            FontFormat::Svg => "svg",
        }
    }
}

impl fmt::Display for FontFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Binds one stored asset to the character it becomes in the output font.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GlyphMapping {
    /// The stored asset supplying the glyph outline.
    pub asset: AssetId,
    /// The codepoint the glyph is bound to.
    pub character: char,
}

/// The validated input of one synthesis run: a font name and the ordered
/// glyph mappings. Transient; lives for one pipeline invocation.
#[derive(Debug, Clone)]
pub struct SynthesisRequest {
    font_name: String,
    mappings: Vec<GlyphMapping>,
}

impl SynthesisRequest {
    /// Builds a request, falling back to [`DEFAULT_FONT_NAME`] when the
    /// caller supplies no name (or only whitespace).
    pub fn new(font_name: Option<String>, mappings: Vec<GlyphMapping>) -> Self {
        let font_name = font_name
            .map(|name| name.trim().to_owned())
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| DEFAULT_FONT_NAME.to_owned());
        Self { font_name, mappings }
    }

    /// The requested font name, as supplied (or defaulted).
    pub fn font_name(&self) -> &str {
        &self.font_name
    }

    /// The glyph mappings, in request order.
    pub fn mappings(&self) -> &[GlyphMapping] {
        &self.mappings
    }

    /// Filesystem- and header-safe rendering of the font name, used for
    /// output file names and the delivery filename.
    ///
    /// Anything outside `[A-Za-z0-9_-]` is replaced with an underscore; a
    /// name with no representable characters falls back to
    /// [`DEFAULT_FONT_NAME`].
    pub fn file_stem(&self) -> String {
        let stem: String = self
            .font_name
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '-' | '_') {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        if stem.chars().all(|c| c == '_') {
            DEFAULT_FONT_NAME.to_owned()
        } else {
            stem
        }
    }
}

/// Per-file descriptor returned for every accepted upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedIcon {
    /// Identifier the asset was stored under.
    pub id: AssetId,
    /// Caller-supplied file name, re-decoded to canonical UTF-8.
    pub original_name: String,
    /// Storage name (`<id>.svg`), also the asset's static-exposure path.
    pub filename: String,
}

/// Parses the wire form of a glyph target: exactly one character.
pub fn parse_character(raw: &str) -> Result<char> {
    let mut chars = raw.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Ok(c),
        _ => Err(Error::InvalidCodepoint {
            raw: raw.to_owned(),
        }),
    }
}
