//! Scratch directories for a run and for each filing

use std::io;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::debug;

/// Maximum length of a sanitized file name
pub const MAX_FILENAME_LEN: usize = 100;

/// Temporary directory removed when dropped unless persisted.
#[derive(Debug)]
pub struct WorkingArea {
    dir: TempDir,
}

impl WorkingArea {
    pub fn create(prefix: &str) -> io::Result<Self> {
        let dir = tempfile::Builder::new().prefix(prefix).tempdir()?;
        debug!("Created working area {}", dir.path().display());
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Stops tracking the directory so it survives for inspection.
    pub fn persist(self) -> PathBuf {
        self.dir.keep()
    }

    /// Removes the directory now, surfacing any error instead of ignoring it on drop.
    pub fn release(self) -> io::Result<()> {
        let path = self.dir.path().to_path_buf();
        self.dir.close()?;
        debug!("Released working area {}", path.display());
        Ok(())
    }
}

/// Keeps ASCII alphanumerics and `-_.`, truncated to [`MAX_FILENAME_LEN`].
pub fn sanitize_filename(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        .take(MAX_FILENAME_LEN)
        .collect()
}

/// First free path for `file_name` in `dir`, appending `_1`, `_2`, ... before the extension.
pub fn unique_destination(dir: &Path, file_name: &str) -> PathBuf {
    let candidate = dir.join(file_name);
    if !candidate.exists() {
        return candidate;
    }

    let as_path = Path::new(file_name);
    let stem = as_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| file_name.to_string());
    let extension = as_path.extension().map(|e| e.to_string_lossy().into_owned());

    let mut counter = 1usize;
    loop {
        let name = match &extension {
            Some(ext) => format!("{}_{}.{}", stem, counter, ext),
            None => format!("{}_{}", stem, counter),
        };
        let candidate = dir.join(name);
        if !candidate.exists() {
            return candidate;
        }
        counter += 1;
    }
}

/// Moves `source` into `dir` under a collision-free name and returns the new path.
pub fn move_into(source: &Path, dir: &Path) -> io::Result<PathBuf> {
    let file_name = source
        .file_name()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "source has no file name"))?
        .to_string_lossy()
        .into_owned();
    let destination = unique_destination(dir, &file_name);

    if std::fs::rename(source, &destination).is_err() {
        // rename fails across filesystems
        std::fs::copy(source, &destination)?;
        std::fs::remove_file(source)?;
    }
    Ok(destination)
}
