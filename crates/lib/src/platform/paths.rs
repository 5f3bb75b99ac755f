//! On-disk layout of an installation.
//!
//! ```text
//! {root}/
//! ├── .lock                   # advisory lock held while reconciling
//! ├── .trash/                 # paths waiting to be purged
//! ├── bin/                    # usual home of links and wrapper scripts
//! ├── data/<name>-<id>/       # one directory per component version
//! └── share/
//!     ├── manifest.json       # active manifest
//!     └── manifest.new.json   # staged manifest (only while an update is pending)
//! ```

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use crate::consts::ROOT_ENV;
use crate::util::path::normalize;

const SHARE_DIR: &str = "share";
const DATA_DIR: &str = "data";
const BIN_DIR: &str = "bin";
const TRASH_DIR: &str = ".trash";
const LOCK_FILENAME: &str = ".lock";
const ACTIVE_MANIFEST: &str = "manifest.json";
const STAGED_MANIFEST: &str = "manifest.new.json";

/// Paths derived from an install root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallLayout {
  root: PathBuf,
}

impl InstallLayout {
  /// Create a layout rooted at `root`. Relative roots are resolved against
  /// the current directory so that every derived path is absolute.
  pub fn new(root: impl Into<PathBuf>) -> Self {
    let root = root.into();
    let root = if root.is_absolute() {
      root
    } else {
      std::env::current_dir().map(|cwd| cwd.join(&root)).unwrap_or(root)
    };
    Self { root: normalize(&root) }
  }

  pub fn root(&self) -> &Path {
    &self.root
  }

  pub fn share_dir(&self) -> PathBuf {
    self.root.join(SHARE_DIR)
  }

  pub fn active_manifest(&self) -> PathBuf {
    self.share_dir().join(ACTIVE_MANIFEST)
  }

  pub fn staged_manifest(&self) -> PathBuf {
    self.share_dir().join(STAGED_MANIFEST)
  }

  pub fn data_dir(&self) -> PathBuf {
    self.root.join(DATA_DIR)
  }

  pub fn bin_dir(&self) -> PathBuf {
    self.root.join(BIN_DIR)
  }

  pub fn trash_dir(&self) -> PathBuf {
    self.root.join(TRASH_DIR)
  }

  pub fn lock_path(&self) -> PathBuf {
    self.root.join(LOCK_FILENAME)
  }

  /// Directory holding one version of a component: `data/<name>-<id>`.
  pub fn component_dir(&self, name: &str, id: &str) -> PathBuf {
    self.data_dir().join(format!("{}-{}", name, id))
  }

  /// Resolve a link destination as written in a manifest.
  ///
  /// A trailing separator means "inside this directory", using the basename
  /// of `src`. Relative destinations are taken from the install root.
  pub fn link_dest(&self, dest: &str, src: &str) -> PathBuf {
    let mut dest = PathBuf::from(dest);
    if ends_with_separator(dest.as_os_str())
      && let Some(name) = Path::new(src).file_name()
    {
      dest.push(name);
    }
    normalize(&self.root.join(dest))
  }
}

fn ends_with_separator(path: &std::ffi::OsStr) -> bool {
  let s = path.to_string_lossy();
  s.ends_with('/') || (cfg!(windows) && s.ends_with('\\'))
}

/// Append `suffix` to the final component of a path (`data/x-1` -> `data/x-1.tmp`).
pub fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
  let mut s: OsString = path.as_os_str().to_owned();
  s.push(suffix);
  PathBuf::from(s)
}

/// Returns the install root.
///
/// `HOIST_ROOT` wins; otherwise the root is the parent of the directory
/// containing the running executable (`{root}/bin/hoist` or `{root}/share/hoist`).
pub fn root_dir() -> PathBuf {
  if let Ok(root) = std::env::var(ROOT_ENV)
    && !root.is_empty()
  {
    return PathBuf::from(root);
  }

  std::env::current_exe()
    .ok()
    .and_then(|exe| exe.parent().and_then(Path::parent).map(Path::to_path_buf))
    .unwrap_or_else(|| PathBuf::from("."))
}
