//! The Archive Writer port and its zip adapter.

use crate::error::{Error, Result};
use std::io::{Cursor, Write};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// A named blob destined for the delivery archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    /// Flat entry name, no path prefixes.
    pub name: String,
    pub bytes: Vec<u8>,
}

/// Bundles named blobs into a single compressed archive byte stream.
///
/// Membership is the caller's responsibility: the writer adds exactly the
/// entries handed in, names and content unmodified.
pub trait ArchiveWriter: Send + Sync {
    fn bundle(&self, entries: &[ArchiveEntry]) -> Result<Vec<u8>>;
}

/// Zip (deflate) implementation of [`ArchiveWriter`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ZipArchiveWriter;

impl ArchiveWriter for ZipArchiveWriter {
    fn bundle(&self, entries: &[ArchiveEntry]) -> Result<Vec<u8>> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options =
            SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        for entry in entries {
            writer
                .start_file(entry.name.as_str(), options)
                .map_err(archive_err)?;
            writer.write_all(&entry.bytes)?;
        }
        let cursor = writer.finish().map_err(archive_err)?;
        Ok(cursor.into_inner())
    }
}

fn archive_err(err: zip::result::ZipError) -> Error {
    Error::Archive {
        reason: err.to_string(),
    }
}
