//! The Font Synthesizer port and its external-command adapter.
//!
//! The actual glyph-outline parsing and font-table encoding is a black box
//! behind [`FontSynthesizer`]; the pipeline only supplies inputs and
//! collects one binary per requested format.

use crate::error::{Error, Result};
use crate::types::FontFormat;
use async_trait::async_trait;
use bytes::Bytes;
use serde::Serialize;
use std::process::Stdio;
use tokio::process::Command;

/// One glyph handed to the synthesizer: target codepoint plus SVG source.
#[derive(Debug, Clone)]
pub struct GlyphSource {
    pub character: char,
    pub svg: Bytes,
}

/// One synthesized font file.
#[derive(Debug, Clone)]
pub struct RenderedFont {
    pub format: FontFormat,
    pub bytes: Bytes,
}

/// Produces binary font representations from vector glyph sources.
#[async_trait]
pub trait FontSynthesizer: Send + Sync {
    /// Synthesizes one font from `glyphs`, returning one [`RenderedFont`]
    /// per requested format.
    ///
    /// `font_name` is already filesystem-safe when it reaches this trait.
    async fn synthesize(
        &self,
        font_name: &str,
        glyphs: &[GlyphSource],
        formats: &[FontFormat],
    ) -> Result<Vec<RenderedFont>>;
}

/// Drives an external font toolchain binary.
///
/// The configured command is invoked once per request as
///
/// ```text
/// <program> [args..] --manifest <dir>/manifest.json --out <dir>
/// ```
///
/// against a private temporary directory holding one `uXXXX.svg` per glyph
/// and a JSON manifest naming the font, the requested formats, and the
/// glyph files. The command is expected to leave `<font-name>.<ext>` in the
/// out directory for every requested format. The staging directory is
/// dropped with the call; nothing it produces outlives the request.
#[derive(Debug, Clone)]
pub struct CommandFontSynthesizer {
    program: String,
    args: Vec<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Manifest<'a> {
    name: &'a str,
    formats: Vec<&'static str>,
    glyphs: Vec<ManifestGlyph>,
}

#[derive(Serialize)]
struct ManifestGlyph {
    codepoint: u32,
    file: String,
}

impl CommandFontSynthesizer {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Extra arguments placed before the pipeline-provided ones.
    pub fn with_args(mut self, args: impl IntoIterator<Item = String>) -> Self {
        self.args.extend(args);
        self
    }
}

#[async_trait]
impl FontSynthesizer for CommandFontSynthesizer {
    async fn synthesize(
        &self,
        font_name: &str,
        glyphs: &[GlyphSource],
        formats: &[FontFormat],
    ) -> Result<Vec<RenderedFont>> {
        let staging = tempfile::tempdir()?;
        let dir = staging.path();

        let mut manifest_glyphs = Vec::with_capacity(glyphs.len());
        for glyph in glyphs {
            let file = format!("u{:04X}.svg", glyph.character as u32);
            tokio::fs::write(dir.join(&file), &glyph.svg).await?;
            manifest_glyphs.push(ManifestGlyph {
                codepoint: glyph.character as u32,
                file,
            });
        }

        let manifest = Manifest {
            name: font_name,
            formats: formats.iter().map(|format| format.extension()).collect(),
            glyphs: manifest_glyphs,
        };
        let manifest_path = dir.join("manifest.json");
        let manifest_json = serde_json::to_vec_pretty(&manifest).map_err(|err| Error::Synthesis {
            reason: format!("failed to encode manifest: {err}"),
        })?;
        tokio::fs::write(&manifest_path, manifest_json).await?;

        let output = Command::new(&self.program)
            .args(&self.args)
            .arg("--manifest")
            .arg(&manifest_path)
            .arg("--out")
            .arg(dir)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|err| Error::Synthesis {
                reason: format!("failed to launch {}: {err}", self.program),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::Synthesis {
                reason: format!(
                    "{} exited with {}: {}",
                    self.program,
                    output.status,
                    stderr.trim()
                ),
            });
        }

        let mut rendered = Vec::with_capacity(formats.len());
        for &format in formats {
            let path = dir.join(format!("{font_name}.{}", format.extension()));
            let bytes = tokio::fs::read(&path).await.map_err(|_| Error::Synthesis {
                reason: format!(
                    "{} produced no {} output",
                    self.program,
                    format.extension()
                ),
            })?;
            rendered.push(RenderedFont {
                format,
                bytes: bytes.into(),
            });
        }
        Ok(rendered)
    }
}
