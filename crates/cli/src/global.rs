//! Global shortcuts for installed commands.
//!
//! After an install, every link placed directly in `{root}/bin` can be
//! exposed as `{prefix}/bin/<name>`. When the prefix is not writable the
//! links are retried through `sudo`.

use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::{debug, warn};

use hoist_lib::platform::InstallLayout;
use hoist_lib::reconcile::ReconcileReport;

use crate::output::print_warning;
use crate::prompts::confirm_default_yes;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GlobalOutcome {
  Installed,
  Failed,
  Declined,
}

/// A shortcut to create: `dest` points at `src`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shortcut {
  pub src: PathBuf,
  pub dest: PathBuf,
}

/// Shortcuts for every link the report placed in the install's `bin` directory.
pub fn shortcuts(prefix: &Path, layout: &InstallLayout, report: &ReconcileReport) -> Vec<Shortcut> {
  let bin_dir = layout.bin_dir();
  let global_bin = prefix.join("bin");
  report
    .links_in(&bin_dir)
    .filter_map(|link| {
      link.dest.file_name().map(|name| Shortcut {
        src: link.dest.clone(),
        dest: global_bin.join(name),
      })
    })
    .collect()
}

/// Ask whether to install global shortcuts and create them.
///
/// A `None` prefix, an empty shortcut list or a non-interactive session
/// counts as declined.
pub fn offer(prefix: Option<&Path>, layout: &InstallLayout, report: &ReconcileReport) -> GlobalOutcome {
  let Some(prefix) = prefix else {
    return GlobalOutcome::Declined;
  };
  let shortcuts = shortcuts(prefix, layout, report);
  if shortcuts.is_empty() {
    return GlobalOutcome::Declined;
  }

  debug!(shortcuts = ?names(&shortcuts), "offering global shortcuts");
  let question = format!("Do you want to install scripts globally into {}?", prefix.join("bin").display());
  match confirm_default_yes(&question) {
    Ok(Some(true)) => {}
    Ok(_) => return GlobalOutcome::Declined,
    Err(e) => {
      warn!(error = %e, "failed to read answer");
      return GlobalOutcome::Declined;
    }
  }

  match install(&shortcuts) {
    Ok(()) => GlobalOutcome::Installed,
    Err(e) => {
      print_warning(&format!("Failed to install global shortcuts: {}", e));
      GlobalOutcome::Failed
    }
  }
}

fn names(shortcuts: &[Shortcut]) -> Vec<String> {
  shortcuts
    .iter()
    .filter_map(|s| s.dest.file_name())
    .map(|name| name.to_string_lossy().into_owned())
    .collect()
}

/// Create every shortcut, falling back to `sudo` on the first permission error.
pub fn install(shortcuts: &[Shortcut]) -> io::Result<()> {
  for (i, shortcut) in shortcuts.iter().enumerate() {
    match link(shortcut) {
      Ok(()) => debug!(dest = ?shortcut.dest, src = ?shortcut.src, "global shortcut created"),
      Err(e) if e.kind() == io::ErrorKind::PermissionDenied => {
        print_warning("Installing global shortcuts requires elevated permissions. You may be prompted for your password.");
        return shortcuts[i..].iter().try_for_each(sudo_link);
      }
      Err(e) => return Err(e),
    }
  }
  Ok(())
}

#[cfg(unix)]
fn link(shortcut: &Shortcut) -> io::Result<()> {
  if let Some(parent) = shortcut.dest.parent() {
    std::fs::create_dir_all(parent)?;
  }
  if std::fs::symlink_metadata(&shortcut.dest).is_ok() {
    std::fs::remove_file(&shortcut.dest)?;
  }
  std::os::unix::fs::symlink(&shortcut.src, &shortcut.dest)
}

#[cfg(not(unix))]
fn link(_shortcut: &Shortcut) -> io::Result<()> {
  Err(io::Error::new(
    io::ErrorKind::Unsupported,
    "global shortcuts are not supported on this platform",
  ))
}

fn sudo_link(shortcut: &Shortcut) -> io::Result<()> {
  if let Some(parent) = shortcut.dest.parent() {
    run_sudo(&[Path::new("mkdir"), Path::new("-p"), parent])?;
  }
  run_sudo(&[Path::new("ln"), Path::new("-sfn"), &shortcut.src, &shortcut.dest])
}

fn run_sudo(args: &[&Path]) -> io::Result<()> {
  let status = Command::new("sudo").args(args).status()?;
  if status.success() {
    Ok(())
  } else {
    Err(io::Error::other(format!("sudo {:?} exited with {}", args, status)))
  }
}

/// The message shown after the global step, if any.
pub fn completion_message(outcome: GlobalOutcome, layout: &InstallLayout, report: &ReconcileReport) -> Option<String> {
  let bin_dir = layout.bin_dir();
  let first = report.links_in(&bin_dir).next()?;
  let name = first.dest.file_name()?.to_string_lossy().into_owned();

  let (note, rerun) = match outcome {
    GlobalOutcome::Installed => return Some(format!("Everything installed! Run `{}` to get started.", name)),
    GlobalOutcome::Failed => ("Global shortcuts could not be installed.", "to try again"),
    GlobalOutcome::Declined => ("Skipped installing global shortcuts.", "if you change your mind"),
  };

  let installer = std::env::current_exe()
    .map(|exe| exe.display().to_string())
    .unwrap_or_else(|_| "hoist".to_string());

  Some(format!(
    "{note} You can:\n  - re-run `{installer} install` {rerun}\n  - add {bin} to your PATH\n  - run commands by their full path, e.g. {path}",
    bin = bin_dir.display(),
    path = first.dest.display(),
  ))
}
