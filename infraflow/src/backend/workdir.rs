//! Task-private working directories.

use crate::errors::BackendError;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A fresh directory for one backend call, removed on drop.
#[derive(Debug)]
pub struct TaskWorkdir {
    dir: TempDir,
}

impl TaskWorkdir {
    /// Creates `<root>/<task>-<random>`, creating `root` first if needed.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::Workdir`] if the directory cannot be created.
    pub fn create(root: impl AsRef<Path>, task: &str) -> Result<Self, BackendError> {
        let root = root.as_ref();
        let workdir_error =
            |e: std::io::Error| BackendError::Workdir(format!("{}: {e}", root.display()));

        std::fs::create_dir_all(root).map_err(workdir_error)?;
        let dir = tempfile::Builder::new()
            .prefix(&format!("{task}-"))
            .tempdir_in(root)
            .map_err(workdir_error)?;
        tracing::debug!(task, path = %dir.path().display(), "Created task workdir");
        Ok(Self { dir })
    }

    /// Returns the directory path.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Returns a path inside the directory.
    #[must_use]
    pub fn join(&self, name: impl AsRef<Path>) -> PathBuf {
        self.dir.path().join(name)
    }

    /// Removes the directory now, reporting any failure.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::Workdir`] if removal fails.
    pub fn close(self) -> Result<(), BackendError> {
        let path = self.dir.path().to_path_buf();
        self.dir
            .close()
            .map_err(|e| BackendError::Workdir(format!("{}: {e}", path.display())))
    }
}
