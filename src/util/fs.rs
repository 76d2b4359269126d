//! Atomic file output
//!
//! Generated files are written to a temp file beside the destination,
//! synced, then renamed over it, so a failed build never leaves a partial
//! output behind.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// Write data atomically to a file, creating parent directories first.
///
/// Creates a temporary file, writes the data, syncs, then renames.
pub fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    let parent = parent_dir(path);
    fs::create_dir_all(&parent)
        .with_context(|| format!("Failed to create directory: {:?}", parent))?;

    let temp_path = temp_path(path);
    let result = write_and_rename(&temp_path, path, data);
    if result.is_err() {
        let _ = fs::remove_file(&temp_path);
    }
    result?;

    // Sync parent directory
    let dir = OpenOptions::new()
        .read(true)
        .open(&parent)
        .with_context(|| format!("Failed to open directory: {:?}", parent))?;
    dir.sync_all().context("Failed to sync directory")?;

    tracing::debug!(path = %path.display(), bytes = data.len(), "wrote file");
    Ok(())
}

/// Read a file to a string.
pub fn read_to_string(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("Failed to read file: {:?}", path))
}

fn write_and_rename(temp_path: &Path, path: &Path, data: &[u8]) -> Result<()> {
    let mut file = File::create(temp_path)
        .with_context(|| format!("Failed to create temp file: {:?}", temp_path))?;
    file.write_all(data).context("Failed to write data")?;
    file.sync_all().context("Failed to sync file")?;
    drop(file);

    fs::rename(temp_path, path)
        .with_context(|| format!("Failed to rename {:?} to {:?}", temp_path, path))
}

fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// `dir/.name.tmp` for `dir/name`.
fn temp_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    parent_dir(path).join(format!(".{name}.tmp"))
}
