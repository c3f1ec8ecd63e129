// restoretool/src/restore/scratch.rs
use std::path::{Path, PathBuf};
use tempfile::{Builder as TempFileBuilder, TempDir};

use crate::errors::{RestoreError, Result};

const SCRATCH_PREFIX: &str = "restore_";

/// Temporary directory owned by exactly one restore attempt.
///
/// The directory is removed by `release()` or, at the latest, when the value
/// is dropped.
#[derive(Debug)]
pub struct ScratchSpace {
    root: PathBuf,
    dir: Option<TempDir>,
}

impl ScratchSpace {
    /// Creates a fresh directory under the system temp dir.
    pub fn acquire() -> Result<Self> {
        Self::build(TempFileBuilder::new().prefix(SCRATCH_PREFIX).tempdir())
    }

    /// Creates a fresh directory under `parent`.
    pub fn acquire_in(parent: &Path) -> Result<Self> {
        Self::build(TempFileBuilder::new().prefix(SCRATCH_PREFIX).tempdir_in(parent))
    }

    fn build(dir: std::io::Result<TempDir>) -> Result<Self> {
        let dir = dir.map_err(RestoreError::Resource)?;
        let root = dir.path().to_path_buf();
        tracing::debug!("Acquired scratch space at {}", root.display());
        Ok(ScratchSpace {
            root,
            dir: Some(dir),
        })
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    pub fn join(&self, relative: impl AsRef<Path>) -> PathBuf {
        self.root.join(relative)
    }

    #[cfg(test)]
    pub fn is_released(&self) -> bool {
        self.dir.is_none()
    }

    /// Deletes the directory and everything below it. Calling it again is a no-op.
    pub fn release(&mut self) {
        let Some(dir) = self.dir.take() else {
            return;
        };
        if let Err(e) = dir.close() {
            tracing::warn!("Failed to remove scratch space {}: {}", self.root.display(), e);
        } else {
            tracing::debug!("Released scratch space {}", self.root.display());
        }
    }
}
