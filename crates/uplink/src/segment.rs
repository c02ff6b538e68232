// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Segment files and rotation naming

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::Result;
use crate::frame;
use crate::record::MeasurementRecord;

/// Generates successive segment names `{stem}-{n}{ext}` for a base filename.
///
/// The counter starts at 0 and advances on every call, including for
/// segments that end up empty or never qualify for upload, so a name is
/// never reused within one coordinator.
#[derive(Debug)]
pub struct SegmentNamer {
    stem: String,
    ext: String,
    next: u64,
}

impl SegmentNamer {
    pub fn new(base: &str) -> Self {
        let (stem, ext) = split_extension(base);
        Self {
            stem: stem.to_string(),
            ext: ext.to_string(),
            next: 0,
        }
    }

    /// Produce the next segment name, advancing the counter.
    pub fn next_name(&mut self) -> String {
        let name = format!("{}-{}{}", self.stem, self.next, self.ext);
        self.next += 1;
        name
    }

    /// How many names have been handed out so far.
    pub fn issued(&self) -> u64 {
        self.next
    }
}

/// Split a path at its extension, keeping the dot with the extension.
///
/// The dot must fall inside the final path component and must not lead it,
/// so `.hidden` has no extension and `archive.tar.gz` splits as
/// (`archive.tar`, `.gz`).
fn split_extension(base: &str) -> (&str, &str) {
    let name_start = base.rfind('/').map_or(0, |i| i + 1);
    let name = &base[name_start..];
    match name.rfind('.') {
        Some(i) if i > 0 => base.split_at(name_start + i),
        _ => (base, ""),
    }
}

/// One open segment file: a framed header followed by payload bytes.
///
/// Exclusively owned by the upload coordinator. Replaced, never shared, on
/// rotation.
#[derive(Debug)]
pub struct Segment {
    path: PathBuf,
    file: File,
}

impl Segment {
    /// Create the segment file and frame `record` as its header.
    pub fn create(path: impl Into<PathBuf>, record: &MeasurementRecord) -> Result<Self> {
        let path = path.into();
        let mut file = File::create(&path)?;
        file.write_all(&frame::encode_header(record)?)?;
        Ok(Self { path, file })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append raw payload bytes at the current offset.
    pub fn append(&mut self, bytes: &[u8]) -> Result<()> {
        self.file.write_all(bytes)?;
        Ok(())
    }

    /// Hand the open file to an appender for framed or raw writes.
    pub fn with_file<F, T>(&mut self, appender: F) -> T
    where
        F: FnOnce(&mut File) -> T,
    {
        appender(&mut self.file)
    }

    /// Close the file, returning its on-disk path for upload.
    pub fn close(self) -> PathBuf {
        let Segment { path, file } = self;
        drop(file);
        path
    }
}
