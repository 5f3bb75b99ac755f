//! Implementation of the `hoist update` command.
//!
//! Applies a staged manifest left behind by `hoist check`. Nothing happens
//! when no update is pending.

use anyhow::{Context, Result};

use hoist_lib::config::InstallerConfig;
use hoist_lib::manifest::dump_versions;
use hoist_lib::reconcile::{ReconcileMode, ReconcileOutcome};

use crate::output::{print_info, print_success, print_warning};

pub fn cmd_update(config: &InstallerConfig) -> Result<()> {
  let reconciler = super::reconciler(config)?;
  let rt = super::runtime()?;

  let outcome = rt
    .block_on(reconciler.reconcile(ReconcileMode::Update))
    .context("Update failed")?;

  match outcome {
    ReconcileOutcome::NoUpdatePending => print_info("No updates available"),
    ReconcileOutcome::Completed(report) => {
      if !report.trash_purged {
        print_warning(&format!(
          "Error cleaning up old files. Please delete {} manually.",
          reconciler.layout().trash_dir().display()
        ));
      }
      dump_versions(&report.manifest);
      print_success("Updated. Restart for the new version to take effect.");
    }
  }
  Ok(())
}
