//! Delivering a run's PDFs: copying them out of the working area and bundling them

use anyhow::{Context, Result};
use chrono::{DateTime, TimeZone};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::workspace::{sanitize_filename, unique_destination};

/// `{BASE}_SEC_Filings_{YYYYmmdd_HHMM}.zip`
pub fn bundle_name<Tz: TimeZone>(base: &str, now: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    sanitize_filename(&format!(
        "{}_SEC_Filings_{}.zip",
        base.trim().to_uppercase(),
        now.format("%Y%m%d_%H%M")
    ))
}

/// Writes a deflate-compressed archive of `outputs` to `dest`.
///
/// Entries are named by file name only. Missing files are skipped. Returns the
/// number of entries written.
pub fn write_zip(outputs: &[PathBuf], dest: &Path) -> Result<usize> {
    let file = File::create(dest)
        .with_context(|| format!("Failed to create ZIP file: {}", dest.display()))?;
    let mut writer = ZipWriter::new(file);
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

    let mut written = 0;
    for path in outputs {
        let Some(name) = path.file_name().map(|n| n.to_string_lossy().into_owned()) else {
            continue;
        };
        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("Skipping {} in bundle: {}", path.display(), e);
                continue;
            }
        };
        writer
            .start_file(name.as_str(), options)
            .with_context(|| format!("Failed to add {} to ZIP", name))?;
        writer.write_all(&bytes)?;
        written += 1;
    }

    writer
        .finish()
        .with_context(|| format!("Failed to finalize ZIP file: {}", dest.display()))?;
    debug!("Wrote {} entries to {}", written, dest.display());
    Ok(written)
}

/// Copies every PDF into `dir`, creating it if needed. Existing files are never
/// overwritten; clashing names get a numeric suffix.
pub fn export(outputs: &[PathBuf], dir: &Path) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create output directory: {}", dir.display()))?;

    let mut exported = Vec::with_capacity(outputs.len());
    for path in outputs {
        let Some(name) = path.file_name().map(|n| n.to_string_lossy().into_owned()) else {
            continue;
        };
        let destination = unique_destination(dir, &name);
        std::fs::copy(path, &destination).with_context(|| {
            format!("Failed to copy {} to {}", path.display(), destination.display())
        })?;
        exported.push(destination);
    }
    Ok(exported)
}
