//! Reading, staging and promoting manifests on disk.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, error, info};

use super::types::{Manifest, ManifestError, StagedManifest, UpdateStatus};
use crate::consts::SUPPORTED_FORMATS;
use crate::fetch::Fetcher;
use crate::platform::InstallLayout;
use crate::platform::paths::with_suffix;

/// The active and staged manifest files of one installation.
#[derive(Debug, Clone)]
pub struct ManifestStore {
  active: PathBuf,
  staged: PathBuf,
}

/// Parse manifest text.
///
/// Returns `Ok(None)` when the document declares a format this installer does
/// not understand; the mismatch (and the manifest's own hint, if any) is logged.
pub fn parse_manifest(text: &str, path: &Path) -> Result<Option<Manifest>, ManifestError> {
  let parse_err = |source| ManifestError::Parse {
    path: path.to_path_buf(),
    source,
  };

  let value: serde_json::Value = serde_json::from_str(text).map_err(parse_err)?;
  let format = value
    .get("format")
    .filter(|f| !f.is_null())
    .ok_or_else(|| ManifestError::MissingFormat(path.to_path_buf()))?;

  let understood = format
    .as_u64()
    .is_some_and(|f| SUPPORTED_FORMATS.iter().any(|s| u64::from(*s) == f));
  if !understood {
    let supported = SUPPORTED_FORMATS
      .iter()
      .map(u32::to_string)
      .collect::<Vec<_>>()
      .join(",");
    error!(path = ?path, found = %format, "Manifest format version: {}", format);
    error!("This installation understands versions: {}", supported);
    if let Some(hint) = value.get("version_error").and_then(|v| v.as_str()) {
      error!("{}", hint);
    }
    return Ok(None);
  }

  serde_json::from_value(value).map(Some).map_err(parse_err)
}

/// Print the version report to stderr.
pub fn dump_versions(manifest: &Manifest) {
  eprintln!("\nComponent versions:");
  for component in manifest.component_versions() {
    eprintln!(" - {}: {}", component.name, component.id);
  }
}

impl ManifestStore {
  pub fn new(layout: &InstallLayout) -> Self {
    Self {
      active: layout.active_manifest(),
      staged: layout.staged_manifest(),
    }
  }

  pub fn active_path(&self) -> &Path {
    &self.active
  }

  pub fn staged_path(&self) -> &Path {
    &self.staged
  }

  /// Load a manifest file. `Ok(None)` means the file's format is unsupported.
  pub fn load(path: &Path) -> Result<Option<Manifest>, ManifestError> {
    let text = fs::read_to_string(path).map_err(|source| ManifestError::Read {
      path: path.to_path_buf(),
      source,
    })?;
    parse_manifest(&text, path)
  }

  pub fn load_active(&self) -> Result<Option<Manifest>, ManifestError> {
    Self::load(&self.active)
  }

  pub fn has_staged(&self) -> bool {
    self.staged.exists()
  }

  pub fn load_staged(&self) -> StagedManifest {
    if !self.has_staged() {
      return StagedManifest::Absent;
    }
    match Self::load(&self.staged) {
      Ok(Some(manifest)) => StagedManifest::Ready(manifest),
      Ok(None) => StagedManifest::Unusable,
      Err(e) => StagedManifest::Corrupt(e),
    }
  }

  /// Write `raw` as the staged manifest. The active manifest is never touched.
  pub fn stage(&self, raw: &str) -> Result<(), ManifestError> {
    let write_err = |source| ManifestError::Write {
      path: self.staged.clone(),
      source,
    };

    if let Some(dir) = self.staged.parent() {
      fs::create_dir_all(dir).map_err(write_err)?;
    }

    let temp_path = with_suffix(&self.staged, ".tmp");
    let mut file = fs::File::create(&temp_path).map_err(write_err)?;
    file.write_all(raw.as_bytes()).map_err(write_err)?;
    file.sync_all().map_err(write_err)?;
    drop(file);
    fs::rename(&temp_path, &self.staged).map_err(write_err)?;

    debug!(path = ?self.staged, "staged new manifest");
    Ok(())
  }

  /// Promote the staged manifest to active.
  pub fn commit(&self) -> Result<(), ManifestError> {
    fs::rename(&self.staged, &self.active).map_err(|source| ManifestError::Write {
      path: self.active.clone(),
      source,
    })?;
    info!(path = ?self.active, "manifest committed");
    Ok(())
  }

  /// Remove the staged manifest, if any.
  pub fn discard_staged(&self) -> Result<(), ManifestError> {
    match fs::remove_file(&self.staged) {
      Ok(()) => Ok(()),
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
      Err(source) => Err(ManifestError::Write {
        path: self.staged.clone(),
        source,
      }),
    }
  }

  /// Fetch the latest manifest and stage it when its version is newer.
  ///
  /// The fetched text is staged as-is, even if its format is unsupported, so
  /// that the update run can show the release's `version_error` hint.
  pub async fn check_for_updates(&self, fetcher: &Fetcher) -> Result<UpdateStatus, ManifestError> {
    let installed = self
      .load_active()?
      .ok_or_else(|| ManifestError::Unsupported(self.active.clone()))?;
    let url = installed.manifest_url.as_deref().ok_or(ManifestError::NoUpdateUrl)?;

    let raw = fetcher.fetch_text(url).await?;
    let latest: serde_json::Value = serde_json::from_str(&raw).map_err(|source| ManifestError::Parse {
      path: PathBuf::from(url),
      source,
    })?;
    let latest = latest
      .get("version")
      .and_then(|v| v.as_u64())
      .ok_or(ManifestError::InvalidVersion)?;

    debug!(latest, installed = installed.version, "loaded latest manifest");
    if latest > installed.version {
      self.stage(&raw)?;
      info!(latest, installed = installed.version, "update available");
      Ok(UpdateStatus::Available {
        installed: installed.version,
        latest,
      })
    } else {
      Ok(UpdateStatus::UpToDate {
        installed: installed.version,
      })
    }
  }
}
