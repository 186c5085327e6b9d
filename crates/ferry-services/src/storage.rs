//! Storage — persists reassembled files.
//!
//! Every write is a full overwrite of the target path. Writes are atomic:
//! write to a temp file next to the target, sync, then rename, so a crash
//! mid-write never leaves a half-written output in place.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};

/// Where finished (or interrupted) transfers go.
pub trait Storage: Send + Sync {
    /// Replace the contents of `path` with `bytes`.
    fn write_file(&self, path: &Path, bytes: &[u8]) -> Result<()>;
}

/// Local filesystem storage.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileStorage;

impl Storage for FileStorage {
    fn write_file(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create output dir: {}", parent.display()))?;
        }

        let tmp_path = tmp_path_for(path);
        let written = (|| -> Result<()> {
            let mut file = fs::File::create(&tmp_path)
                .with_context(|| format!("failed to create temp file: {}", tmp_path.display()))?;
            file.write_all(bytes).context("failed to write file data")?;
            file.sync_all().context("failed to sync file to disk")?;
            fs::rename(&tmp_path, path).with_context(|| {
                format!(
                    "failed to rename {} to {}",
                    tmp_path.display(),
                    path.display()
                )
            })
        })();

        if written.is_err() {
            let _ = fs::remove_file(&tmp_path);
        }
        written?;

        tracing::trace!(path = %path.display(), bytes = bytes.len(), "file written");
        Ok(())
    }
}

/// `received.jpg` → `received.jpg.tmp`, in the same directory so the
/// rename stays on one filesystem.
fn tmp_path_for(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

/// In-memory storage. Records every write in order.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    writes: Arc<Mutex<Vec<(PathBuf, Vec<u8>)>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// All writes so far, oldest first.
    pub fn writes(&self) -> Vec<(PathBuf, Vec<u8>)> {
        self.writes
            .lock()
            .map(|w| w.clone())
            .unwrap_or_default()
    }
}

impl Storage for MemoryStorage {
    fn write_file(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        self.writes
            .lock()
            .map_err(|_| anyhow::anyhow!("memory storage lock poisoned"))?
            .push((path.to_path_buf(), bytes.to_vec()));
        Ok(())
    }
}
