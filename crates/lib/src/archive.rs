//! Unpacking downloaded artifacts.
//!
//! The format is chosen from the artifact's original file name:
//! - `.exe` is copied as-is under its original name
//! - `.gz`, `.tgz` or no extension is a gzip-compressed tarball
//! - `.zip` is a zip archive (no leading components can be stripped)

use std::fs::{self, File};
use std::io::{self, BufReader};
use std::path::{Component, Path, PathBuf};

use flate2::read::GzDecoder;
use tar::{Archive, EntryType};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::fetch::Artifact;
use crate::trash::TrashCan;

#[derive(Debug, Error)]
pub enum ExtractionError {
  #[error("Unknown archive type: {0}")]
  UnknownType(String),

  #[error("Can't extract components from a zip")]
  ZipStrip,

  #[error("failed to read archive {path}: {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to read zip archive {path}: {source}")]
  Zip {
    path: PathBuf,
    #[source]
    source: zip::result::ZipError,
  },

  #[error("archive entry escapes the destination: {0}")]
  UnsafeEntry(PathBuf),

  #[error("failed to write {path}: {source}")]
  Write {
    path: PathBuf,
    #[source]
    source: io::Error,
  },
}

/// Supported artifact formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveKind {
  Executable,
  TarGz,
  Zip,
}

impl ArchiveKind {
  /// Pick the format from a file name, ignoring case.
  pub fn from_name(name: &str) -> Result<Self, ExtractionError> {
    let ext = match name.rfind('.') {
      Some(idx) => name[idx..].to_lowercase(),
      None => return Ok(Self::TarGz),
    };

    match ext.as_str() {
      ".exe" => Ok(Self::Executable),
      ".gz" | ".tgz" => Ok(Self::TarGz),
      ".zip" => Ok(Self::Zip),
      _ => Err(ExtractionError::UnknownType(ext)),
    }
  }
}

/// Unpack `artifact` into `dest`, dropping `strip` leading path components.
///
/// `dest` is created if needed. On failure whatever was written to `dest`
/// is moved to the trash before the error is returned.
pub fn extract(
  artifact: &Artifact,
  dest: &Path,
  strip: Option<u32>,
  trash: &TrashCan,
) -> Result<(), ExtractionError> {
  let kind = ArchiveKind::from_name(&artifact.original_name)?;
  if kind == ArchiveKind::Zip && strip.is_some() {
    return Err(ExtractionError::ZipStrip);
  }

  info!(archive = ?artifact.path, dest = ?dest, kind = ?kind, "extracting");

  let result = fs::create_dir_all(dest)
    .map_err(|source| ExtractionError::Write {
      path: dest.to_path_buf(),
      source,
    })
    .and_then(|()| match kind {
      ArchiveKind::Executable => copy_executable(artifact, dest),
      ArchiveKind::TarGz => unpack_tar_gz(&artifact.path, dest, strip.unwrap_or(0)),
      ArchiveKind::Zip => unpack_zip(&artifact.path, dest),
    });

  if result.is_err() {
    match trash.trash_if_exists(dest) {
      Ok(Some(moved)) => debug!(dest = ?dest, trashed = ?moved, "trashed partial extraction"),
      Ok(None) => {}
      Err(e) => warn!(dest = ?dest, error = %e, "failed to trash partial extraction"),
    }
  }
  result
}

fn copy_executable(artifact: &Artifact, dest: &Path) -> Result<(), ExtractionError> {
  let target = dest.join(&artifact.original_name);
  fs::copy(&artifact.path, &target).map_err(|source| ExtractionError::Write { path: target, source })?;
  Ok(())
}

/// Drop `strip` leading components, rejecting anything that could land outside `dest`.
fn strip_components(path: &Path, strip: u32) -> Result<Option<PathBuf>, ExtractionError> {
  let mut out = PathBuf::new();
  for component in path.components().skip(strip as usize) {
    match component {
      Component::Normal(part) => out.push(part),
      Component::CurDir => {}
      _ => return Err(ExtractionError::UnsafeEntry(path.to_path_buf())),
    }
  }
  Ok((!out.as_os_str().is_empty()).then_some(out))
}

fn unpack_tar_gz(archive_path: &Path, dest: &Path, strip: u32) -> Result<(), ExtractionError> {
  let read_err = |source| ExtractionError::Read {
    path: archive_path.to_path_buf(),
    source,
  };

  let file = File::open(archive_path).map_err(read_err)?;
  let mut archive = Archive::new(GzDecoder::new(BufReader::new(file)));

  for entry in archive.entries().map_err(read_err)? {
    let mut entry = entry.map_err(read_err)?;
    let path = entry.path().map_err(read_err)?.into_owned();

    let Some(relative) = strip_components(&path, strip)? else {
      continue;
    };
    let dest_path = dest.join(&relative);

    if let Some(parent) = dest_path.parent() {
      fs::create_dir_all(parent).map_err(|source| ExtractionError::Write {
        path: parent.to_path_buf(),
        source,
      })?;
    }

    // Hard link names are archive paths, so they get the same stripping.
    if entry.header().entry_type() == EntryType::Link {
      let target = entry
        .link_name()
        .map_err(read_err)?
        .ok_or_else(|| ExtractionError::UnsafeEntry(path.clone()))?
        .into_owned();
      let stripped = strip_components(&target, strip)?.ok_or(ExtractionError::UnsafeEntry(target))?;
      fs::hard_link(dest.join(stripped), &dest_path).map_err(|source| ExtractionError::Write {
        path: dest_path.clone(),
        source,
      })?;
      continue;
    }

    entry.unpack(&dest_path).map_err(|source| ExtractionError::Write {
      path: dest_path.clone(),
      source,
    })?;
  }

  Ok(())
}

fn unpack_zip(archive_path: &Path, dest: &Path) -> Result<(), ExtractionError> {
  let zip_err = |source| ExtractionError::Zip {
    path: archive_path.to_path_buf(),
    source,
  };

  let file = File::open(archive_path).map_err(|source| ExtractionError::Read {
    path: archive_path.to_path_buf(),
    source,
  })?;
  let mut archive = zip::ZipArchive::new(BufReader::new(file)).map_err(zip_err)?;

  for i in 0..archive.len() {
    let mut file = archive.by_index(i).map_err(zip_err)?;
    let relative = file
      .enclosed_name()
      .ok_or_else(|| ExtractionError::UnsafeEntry(PathBuf::from(file.name())))?;
    let dest_path = dest.join(relative);

    let write_err = |source| ExtractionError::Write {
      path: dest_path.clone(),
      source,
    };

    if file.is_dir() {
      fs::create_dir_all(&dest_path).map_err(write_err)?;
      continue;
    }

    if let Some(parent) = dest_path.parent() {
      fs::create_dir_all(parent).map_err(write_err)?;
    }
    let mut outfile = File::create(&dest_path).map_err(write_err)?;
    io::copy(&mut file, &mut outfile).map_err(write_err)?;

    #[cfg(unix)]
    {
      use std::os::unix::fs::PermissionsExt;
      if let Some(mode) = file.unix_mode() {
        fs::set_permissions(&dest_path, fs::Permissions::from_mode(mode)).map_err(write_err)?;
      }
    }
  }

  Ok(())
}
