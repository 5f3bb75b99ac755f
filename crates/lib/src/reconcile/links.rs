//! Resolving and placing links.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use super::types::{Component, Link, LinkKind, ReconcileError};
use crate::consts::WRAPPER_PLACEHOLDER;
use crate::manifest::{LinkSpec, Manifest};
use crate::platform::{InstallLayout, PlatformInfo, resolve_opt};
use crate::trash::TrashCan;
use crate::util::path::{relative_path, to_posix};

/// Resolve every link of every component and check that each source exists.
///
/// Nothing on disk is changed; wrapper scripts are rendered here so that an
/// unknown runner is caught before any link is replaced.
pub fn resolve_links(
  components: &[Component],
  manifest: &Manifest,
  layout: &InstallLayout,
  platform: &dyn PlatformInfo,
) -> Result<Vec<Link>, ReconcileError> {
  let mut links = Vec::new();

  for component in components {
    let specs = resolve_opt(component.spec.links.as_ref(), platform).map_err(|source| ReconcileError::Platform {
      component: component.name.clone(),
      source,
    })?;

    for spec in specs.unwrap_or_default() {
      let (src_rel, dest_rel) = src_and_dest(&spec)?;
      let src = component.root.join(src_rel);
      if !src.exists() {
        return Err(ReconcileError::MissingLinkSource(src));
      }

      let kind = match &spec.runner {
        Some(runner) => LinkKind::Wrapper {
          runner: runner.clone(),
          script: render_wrapper(manifest, runner, layout.root(), &src, platform)?,
        },
        None => LinkKind::Symlink,
      };

      links.push(Link {
        src,
        dest: layout.link_dest(dest_rel, src_rel),
        kind,
      });
    }
  }

  debug!(count = links.len(), "resolved links");
  Ok(links)
}

/// Destinations of the old manifest's links that the new link set does not reuse.
///
/// Entries that cannot be resolved any more are skipped with a warning: they
/// could not have been installed on this platform.
pub fn stale_link_dests(
  old: &Manifest,
  keep: &HashSet<PathBuf>,
  layout: &InstallLayout,
  platform: &dyn PlatformInfo,
) -> Vec<PathBuf> {
  let mut stale = Vec::new();

  for (name, spec) in &old.data {
    let specs = match resolve_opt(spec.links.as_ref(), platform) {
      Ok(specs) => specs.unwrap_or_default(),
      Err(e) => {
        warn!(component = %name, error = %e, "skipping links of old component");
        continue;
      }
    };

    for link in specs {
      let Ok((src, dest)) = src_and_dest(&link) else {
        continue;
      };
      let dest = layout.link_dest(dest, src);
      if !keep.contains(&dest) && !stale.contains(&dest) {
        stale.push(dest);
      }
    }
  }

  stale
}

fn src_and_dest(spec: &LinkSpec) -> Result<(&str, &str), ReconcileError> {
  let src = spec
    .src
    .as_deref()
    .filter(|s| !s.is_empty())
    .ok_or_else(|| ReconcileError::Malformed("link has no src".to_string()))?;
  let dest = spec
    .dest
    .as_deref()
    .filter(|s| !s.is_empty())
    .ok_or_else(|| ReconcileError::Malformed("link has no destination".to_string()))?;
  Ok((src, dest))
}

fn render_wrapper(
  manifest: &Manifest,
  runner: &str,
  root: &Path,
  src: &Path,
  platform: &dyn PlatformInfo,
) -> Result<String, ReconcileError> {
  let wrapper = manifest
    .wrappers
    .get(runner)
    .ok_or_else(|| ReconcileError::Malformed(format!("unknown runner '{}'", runner)))?
    .resolve(platform)
    .map_err(|source| ReconcileError::Platform {
      component: format!("wrapper {}", runner),
      source,
    })?;

  let rel = to_posix(&relative_path(root, src));
  Ok(wrapper.template.replacen(WRAPPER_PLACEHOLDER, &rel, 1))
}

/// Replace whatever is at `link.dest` with the link.
pub fn install_link(link: &Link, trash: &TrashCan) -> Result<(), ReconcileError> {
  debug!(src = ?link.src, dest = ?link.dest, "installing link");
  trash.trash_if_exists(&link.dest)?;

  if let Some(parent) = link.dest.parent() {
    fs::create_dir_all(parent).map_err(|e| ReconcileError::fs(parent, e))?;
  }

  match &link.kind {
    LinkKind::Wrapper { script, .. } => write_wrapper(&link.dest, script),
    LinkKind::Symlink => symlink(&link.src, &link.dest),
  }
}

fn write_wrapper(dest: &Path, script: &str) -> Result<(), ReconcileError> {
  fs::write(dest, script).map_err(|e| ReconcileError::fs(dest, e))?;

  #[cfg(unix)]
  {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(dest, fs::Permissions::from_mode(0o755)).map_err(|e| ReconcileError::fs(dest, e))?;
  }
  Ok(())
}

/// Relative symlink from `dest`'s directory, so the install root can be moved.
#[cfg(unix)]
fn symlink(src: &Path, dest: &Path) -> Result<(), ReconcileError> {
  let target = relative_path(dest.parent().unwrap_or(Path::new("/")), src);
  std::os::unix::fs::symlink(&target, dest).map_err(|e| ReconcileError::fs(dest, e))
}

/// Directories are copied rather than linked on Windows.
#[cfg(windows)]
fn symlink(src: &Path, dest: &Path) -> Result<(), ReconcileError> {
  if src.is_dir() {
    return copy_dir(src, dest);
  }
  let target = relative_path(dest.parent().unwrap_or(Path::new("\\")), src);
  std::os::windows::fs::symlink_file(&target, dest).map_err(|e| ReconcileError::fs(dest, e))
}

#[cfg(windows)]
fn copy_dir(src: &Path, dest: &Path) -> Result<(), ReconcileError> {
  for entry in walkdir::WalkDir::new(src) {
    let entry = entry.map_err(|e| ReconcileError::fs(src, e.into()))?;
    let relative = entry.path().strip_prefix(src).unwrap_or(entry.path());
    let target = dest.join(relative);
    if entry.file_type().is_dir() {
      fs::create_dir_all(&target).map_err(|e| ReconcileError::fs(&target, e))?;
    } else {
      fs::copy(entry.path(), &target).map_err(|e| ReconcileError::fs(&target, e))?;
    }
  }
  Ok(())
}
