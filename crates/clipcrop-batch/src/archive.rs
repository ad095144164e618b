//! Zip archive packaging for batch output.
//!
//! Entry names follow `{prefix}-{label}-{size}-{run}.{ext}`, where `run`
//! is a per-run timestamp so files from different runs never share a
//! name. The size segment is omitted for natural-size exports, and a
//! numeric discriminator is appended when two tasks in the same run
//! would otherwise collide. Labels are sanitized so an arbitrary image
//! name cannot break out of the archive root.

use std::collections::HashSet;
use std::io::{Cursor, Write};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Errors that can occur while packaging the archive.
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// The batch produced nothing to archive
    #[error("No entries to archive")]
    Empty,

    /// Zip container write failed
    #[error("Archive write failed: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// Underlying buffer write failed
    #[error("Archive write failed: {0}")]
    Io(#[from] std::io::Error),
}

/// One file destined for the archive.
#[derive(Debug, Clone)]
pub struct ArchiveEntry {
    pub name: String,
    pub bytes: Vec<u8>,
}

/// Builds collision-free archive entry names.
///
/// Every name carries the namer's run id, so two batches exporting the
/// same images produce distinct file sets.
#[derive(Debug)]
pub struct EntryNamer {
    run_id: u64,
    used: HashSet<String>,
}

impl Default for EntryNamer {
    fn default() -> Self {
        Self::new()
    }
}

impl EntryNamer {
    /// A namer stamped with the current time in unix milliseconds.
    pub fn new() -> Self {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        Self::with_run_id(millis)
    }

    /// A namer with an explicit run id, for reproducible output.
    pub fn with_run_id(run_id: u64) -> Self {
        Self {
            run_id,
            used: HashSet::new(),
        }
    }

    /// Produce the next name for an export of `label` at `size`.
    pub fn name(&mut self, prefix: &str, label: &str, size: Option<u32>, ext: &str) -> String {
        let mut stem = format!("{}-{}", sanitize(prefix), sanitize(label));
        if let Some(size) = size {
            stem.push_str(&format!("-{size}"));
        }
        stem.push_str(&format!("-{}", self.run_id));

        let mut candidate = format!("{stem}.{ext}");
        let mut discriminator = 2;
        while self.used.contains(&candidate) {
            candidate = format!("{stem}-{discriminator}.{ext}");
            discriminator += 1;
        }
        self.used.insert(candidate.clone());
        candidate
    }
}

/// Replace path separators and other non-filename characters with dashes.
///
/// Collapses runs so `a//b` becomes `a-b`, and falls back to `export`
/// for labels with no usable characters at all.
fn sanitize(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut last_dash = true;
    for c in input.chars() {
        if c.is_ascii_alphanumeric() || c == '_' {
            out.push(c);
            last_dash = false;
        } else if !last_dash {
            out.push('-');
            last_dash = true;
        }
    }
    let trimmed = out.trim_end_matches('-');
    if trimmed.is_empty() {
        "export".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Write all entries into a deflate-compressed zip archive in memory.
pub fn pack(entries: &[ArchiveEntry]) -> Result<Vec<u8>, ArchiveError> {
    if entries.is_empty() {
        return Err(ArchiveError::Empty);
    }

    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for entry in entries {
        writer.start_file(&entry.name, options)?;
        writer.write_all(&entry.bytes)?;
    }

    Ok(writer.finish()?.into_inner())
}


// ============================================================================
// Property-Based Tests
// ============================================================================
