use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;

use crate::archive::ExtractionError;
use crate::fetch::DownloadError;
use crate::install_lock::LockError;
use crate::manifest::{ComponentSpec, Manifest, ManifestError};
use crate::platform::PlatformError;
use crate::trash::TrashError;

/// Steps of a reconcile run, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
  LoadingManifest,
  FetchingComponents,
  ResolvingLinks,
  InstallingLinks,
  PruningStaleLinks,
  CommittingManifest,
  PurgingTrash,
  Done,
}

impl fmt::Display for Phase {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self {
      Phase::LoadingManifest => "loading manifest",
      Phase::FetchingComponents => "fetching components",
      Phase::ResolvingLinks => "resolving links",
      Phase::InstallingLinks => "installing links",
      Phase::PruningStaleLinks => "pruning stale links",
      Phase::CommittingManifest => "committing manifest",
      Phase::PurgingTrash => "purging trash",
      Phase::Done => "done",
    };
    f.write_str(name)
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconcileMode {
  /// Apply the active manifest (first install, or repair).
  FreshInstall,
  /// Apply the staged manifest, if there is one.
  Update,
}

impl ReconcileMode {
  /// Name recorded in the install lock.
  pub fn command(self) -> &'static str {
    match self {
      ReconcileMode::FreshInstall => "install",
      ReconcileMode::Update => "update",
    }
  }
}

/// A component of the target manifest, placed on disk.
#[derive(Debug, Clone)]
pub struct Component {
  pub name: String,
  /// `data/<name>-<id>`
  pub root: PathBuf,
  pub spec: ComponentSpec,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LinkKind {
  Symlink,
  /// A script rendered from the named runner's template.
  Wrapper { runner: String, script: String },
}

/// A resolved link: every path absolute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Link {
  pub src: PathBuf,
  pub dest: PathBuf,
  pub kind: LinkKind,
}

/// What a completed run did.
#[derive(Debug, Clone, Serialize)]
pub struct ReconcileReport {
  pub mode: ReconcileMode,
  /// The manifest that is now active.
  pub manifest: Manifest,
  /// Components downloaded during this run.
  pub downloaded: Vec<String>,
  pub links: Vec<Link>,
  /// Old link destinations moved to the trash.
  pub stale_removed: Vec<PathBuf>,
  /// False when the trash could not be emptied (see the logged warning).
  pub trash_purged: bool,
}

impl ReconcileReport {
  /// Link destinations placed directly in `dir`.
  pub fn links_in<'a>(&'a self, dir: &'a Path) -> impl Iterator<Item = &'a Link> + 'a {
    self.links.iter().filter(move |link| link.dest.parent() == Some(dir))
  }
}

#[derive(Debug)]
pub enum ReconcileOutcome {
  Completed(Box<ReconcileReport>),
  /// An update run found no staged manifest.
  NoUpdatePending,
}

/// Broad failure categories used for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
  Configuration,
  Download,
  Extraction,
  Filesystem,
}

#[derive(Debug, Error)]
pub enum ReconcileError {
  #[error(transparent)]
  Locked(#[from] LockError),

  #[error("installed manifest {0} cannot be used by this installer")]
  ActiveUnusable(PathBuf),

  #[error("staged manifest {0} cannot be used by this installer")]
  StagedUnusable(PathBuf),

  #[error("Unable to load new manifest: {0}")]
  StagedCorrupt(#[source] ManifestError),

  #[error(transparent)]
  Manifest(#[from] ManifestError),

  #[error("component {component}: {source}")]
  Platform {
    component: String,
    #[source]
    source: PlatformError,
  },

  #[error("Malformed manifest: {0}")]
  Malformed(String),

  #[error("no links in current version")]
  NoLinks,

  #[error("No such file: {0}")]
  MissingLinkSource(PathBuf),

  #[error(
    "Download failed for component {component}. The server may be experiencing trouble, please try again later.\n({source})"
  )]
  Fetch {
    component: String,
    #[source]
    source: DownloadError,
  },

  #[error("failed to extract component {component}: {source}")]
  Extract {
    component: String,
    #[source]
    source: ExtractionError,
  },

  #[error(transparent)]
  Trash(#[from] TrashError),

  #[error("{path}: {source}")]
  Filesystem {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  /// Failure after links started changing. The install may be half-applied.
  #[error("installation interrupted while {phase}: {source}\nRe-run the installer to repair the installation.")]
  Interrupted {
    phase: Phase,
    #[source]
    source: Box<ReconcileError>,
  },
}

impl ReconcileError {
  pub fn class(&self) -> ErrorClass {
    match self {
      ReconcileError::Fetch { .. } => ErrorClass::Download,
      ReconcileError::Extract { .. } => ErrorClass::Extraction,
      ReconcileError::Trash(_) | ReconcileError::Filesystem { .. } | ReconcileError::Interrupted { .. } => {
        ErrorClass::Filesystem
      }
      _ => ErrorClass::Configuration,
    }
  }

  pub(crate) fn fs(path: impl Into<PathBuf>, source: io::Error) -> Self {
    ReconcileError::Filesystem {
      path: path.into(),
      source,
    }
  }
}
