use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::fetch::DownloadError;
use crate::platform::{Conditional, MergeAll};

#[derive(Debug, Error)]
pub enum ManifestError {
  #[error("failed to read manifest {path}: {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to parse manifest {path}: {source}")]
  Parse {
    path: PathBuf,
    #[source]
    source: serde_json::Error,
  },

  #[error("manifest {0} has no format attribute")]
  MissingFormat(PathBuf),

  #[error("manifest {0} uses a format this installer does not understand")]
  Unsupported(PathBuf),

  #[error("manifest has no usable integer version")]
  InvalidVersion,

  #[error("installed manifest has no manifest_url")]
  NoUpdateUrl,

  #[error("failed to fetch latest manifest: {0}")]
  Download(#[from] DownloadError),

  #[error("failed to write manifest {path}: {source}")]
  Write {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
}

/// A release description: what to download and how to expose it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
  pub format: u32,

  /// Release number. Higher is newer.
  pub version: u64,

  /// Where the next release's manifest is published.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub manifest_url: Option<String>,

  /// Shown to users whose installer does not understand `format`.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub version_error: Option<String>,

  /// Runner name to wrapper script template.
  #[serde(default)]
  pub wrappers: BTreeMap<String, Conditional<Wrapper>>,

  /// Component name to component description.
  #[serde(default)]
  pub data: BTreeMap<String, ComponentSpec>,
}

/// Template for a generated launcher script.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Wrapper {
  /// Script body; the first `__REL_PATH__` becomes the link source's path
  /// relative to the install root.
  pub template: String,
}

impl MergeAll for Wrapper {}

/// One downloadable component.
///
/// Fields are optional at parse time so that a malformed entry is reported
/// by name instead of failing the whole document.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ComponentSpec {
  /// Version string; the component lives in `data/<name>-<id>`.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub id: Option<String>,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub href: Option<Conditional<Href>>,

  /// Number of leading path components to strip when extracting.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub extract: Option<Conditional<u32>>,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub links: Option<Conditional<Vec<LinkSpec>>>,

  /// Left out of the version report.
  #[serde(default)]
  pub internal: bool,
}

/// A download location, or `false` when the component does not apply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Href {
  Url(String),
  Flag(bool),
}

impl MergeAll for Href {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkSpec {
  /// Path inside the component directory.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub src: Option<String>,

  /// Install-root relative or absolute. A trailing `/` means "inside this directory".
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub dest: Option<String>,

  /// Wrapper template to render instead of symlinking.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub runner: Option<String>,
}

/// Entry of the version report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComponentVersion {
  pub name: String,
  pub id: String,
}

/// Result of looking for a staged manifest.
#[derive(Debug)]
pub enum StagedManifest {
  /// No update is pending.
  Absent,
  /// Parsed, but uses an unsupported format.
  Unusable,
  /// Could not be read or parsed.
  Corrupt(ManifestError),
  Ready(Manifest),
}

/// Outcome of an update check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateStatus {
  /// A newer manifest was staged.
  Available { installed: u64, latest: u64 },
  UpToDate { installed: u64 },
}

impl UpdateStatus {
  pub fn is_available(&self) -> bool {
    matches!(self, UpdateStatus::Available { .. })
  }
}

impl Manifest {
  /// Components that appear in the version report, sorted by name.
  pub fn component_versions(&self) -> Vec<ComponentVersion> {
    self
      .data
      .iter()
      .filter(|(_, spec)| !spec.internal)
      .map(|(name, spec)| ComponentVersion {
        name: name.clone(),
        id: spec.id.clone().unwrap_or_default(),
      })
      .collect()
  }
}
