//! Utility functions for writing the generated site

use crate::error::{Error, Result};
use std::path::Path;

/// Create `path` and any missing parents
///
/// # Errors
///
/// Returns [`Error::Write`] carrying `path` if the directory cannot be created.
pub async fn create_dir_all(path: &Path) -> Result<()> {
    tokio::fs::create_dir_all(path)
        .await
        .map_err(|source| Error::Write {
            path: path.to_path_buf(),
            source,
        })
}

/// Write `contents` to `path`, creating the parent directory first
///
/// An existing file is overwritten, so re-running a migration is idempotent.
///
/// # Errors
///
/// Returns [`Error::Write`] carrying the path that failed.
pub async fn write_file(path: &Path, contents: impl AsRef<[u8]>) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        create_dir_all(parent).await?;
    }
    tokio::fs::write(path, contents)
        .await
        .map_err(|source| Error::Write {
            path: path.to_path_buf(),
            source,
        })
}
