//! Lexical path helpers.
//!
//! Nothing here touches the filesystem: link targets are computed before the
//! paths they refer to are guaranteed to exist.

use std::path::{Component, Path, PathBuf};

/// Collapse `.` and `..` components without resolving symlinks.
pub fn normalize(path: &Path) -> PathBuf {
  let mut out = PathBuf::new();
  for component in path.components() {
    match component {
      Component::CurDir => {}
      Component::ParentDir => {
        let popped = matches!(out.components().next_back(), Some(Component::Normal(_))) && out.pop();
        if !popped && !out.has_root() {
          out.push("..");
        }
      }
      other => out.push(other.as_os_str()),
    }
  }
  out
}

/// Path that leads from directory `base` to `target`.
///
/// Both paths should be absolute. When they share no prefix (different
/// drives on Windows) the target is returned unchanged.
pub fn relative_path(base: &Path, target: &Path) -> PathBuf {
  let base = normalize(base);
  let target = normalize(target);

  let base_parts: Vec<Component> = base.components().collect();
  let target_parts: Vec<Component> = target.components().collect();

  let common = base_parts
    .iter()
    .zip(target_parts.iter())
    .take_while(|(a, b)| a == b)
    .count();

  if common == 0 {
    return target;
  }

  let mut rel = PathBuf::new();
  for _ in common..base_parts.len() {
    rel.push("..");
  }
  for part in &target_parts[common..] {
    rel.push(part.as_os_str());
  }
  if rel.as_os_str().is_empty() {
    rel.push(".");
  }
  rel
}

/// Render a relative path with `/` separators regardless of host.
pub fn to_posix(path: &Path) -> String {
  path
    .components()
    .map(|c| c.as_os_str().to_string_lossy().into_owned())
    .collect::<Vec<_>>()
    .join("/")
}
