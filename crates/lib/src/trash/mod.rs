//! Deferred deletion.
//!
//! Paths are never deleted in place: they are renamed into `{root}/.trash`
//! with a numeric suffix, and the whole trash directory is purged once a run
//! has finished. A crash part way through leaves the old content in the
//! trash, where the next purge picks it up.

mod purge;

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info};

use purge::PurgeSession;

#[derive(Debug, Error)]
pub enum TrashError {
  #[error("failed to create trash directory {path}: {source}")]
  CreateDir {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("cannot trash {0}: path has no file name")]
  NoFileName(PathBuf),

  #[error("failed to move {from} to {to}: {source}")]
  Rename {
    from: PathBuf,
    to: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to purge {path}: {source}")]
  Purge {
    path: PathBuf,
    #[source]
    source: io::Error,
  },
}

/// A per-install trash directory.
#[derive(Debug, Clone)]
pub struct TrashCan {
  root: PathBuf,
}

impl TrashCan {
  pub fn new(root: impl Into<PathBuf>) -> Self {
    Self { root: root.into() }
  }

  pub fn root(&self) -> &Path {
    &self.root
  }

  /// Move `path` into the trash as `<basename>.<N>`, using the smallest free `N`.
  ///
  /// Returns where the path ended up.
  pub fn trash(&self, path: &Path) -> Result<PathBuf, TrashError> {
    debug!(path = ?path, "trashing");
    std::fs::create_dir_all(&self.root).map_err(|source| TrashError::CreateDir {
      path: self.root.clone(),
      source,
    })?;

    let name = path
      .file_name()
      .ok_or_else(|| TrashError::NoFileName(path.to_path_buf()))?
      .to_string_lossy()
      .into_owned();

    let target = (0u64..)
      .map(|n| self.root.join(format!("{}.{}", name, n)))
      .find(|candidate| std::fs::symlink_metadata(candidate).is_err())
      .ok_or_else(|| TrashError::NoFileName(path.to_path_buf()))?;

    std::fs::rename(path, &target).map_err(|source| TrashError::Rename {
      from: path.to_path_buf(),
      to: target.clone(),
      source,
    })?;
    Ok(target)
  }

  /// Move `path` into the trash if anything (including a dangling symlink) is there.
  pub fn trash_if_exists(&self, path: &Path) -> Result<Option<PathBuf>, TrashError> {
    if std::fs::symlink_metadata(path).is_err() {
      return Ok(None);
    }
    self.trash(path).map(Some)
  }

  /// Recursively delete the trash directory.
  pub async fn purge(&self) -> Result<(), TrashError> {
    if std::fs::symlink_metadata(&self.root).is_err() {
      return Ok(());
    }

    PurgeSession::new()
      .remove(self.root.clone())
      .await
      .map_err(|source| TrashError::Purge {
        path: self.root.clone(),
        source,
      })?;

    info!(path = ?self.root, "trash purged");
    Ok(())
  }
}
