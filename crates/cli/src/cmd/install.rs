//! Implementation of the `hoist install` command.
//!
//! Applies the active manifest, then offers to put shortcuts for the
//! installed commands on the global `PATH`.

use anyhow::{Context, Result};

use hoist_lib::config::InstallerConfig;
use hoist_lib::consts::APP_NAME;
use hoist_lib::manifest::dump_versions;
use hoist_lib::reconcile::{ReconcileMode, ReconcileOutcome};

use crate::global::{self, GlobalOutcome};
use crate::output::{print_info, print_success, print_warning};

pub fn cmd_install(config: &InstallerConfig, no_global: bool) -> Result<()> {
  let reconciler = super::reconciler(config)?;
  let rt = super::runtime()?;

  let outcome = rt
    .block_on(reconciler.reconcile(ReconcileMode::FreshInstall))
    .context("Installation failed")?;
  let ReconcileOutcome::Completed(report) = outcome else {
    return Ok(());
  };

  if !report.trash_purged {
    print_warning(&format!(
      "Error cleaning up old files. Please delete {} manually.",
      reconciler.layout().trash_dir().display()
    ));
  }

  dump_versions(&report.manifest);
  print_success(&format!(
    "{} has been installed in {}",
    APP_NAME,
    reconciler.layout().root().display()
  ));

  let prefix = if no_global { None } else { config.global_prefix.as_deref() };
  let layout = reconciler.layout();
  let outcome = global::offer(prefix, layout, &report);
  if let Some(message) = global::completion_message(outcome, layout, &report) {
    match outcome {
      GlobalOutcome::Installed => print_success(&message),
      GlobalOutcome::Failed => print_warning(&message),
      GlobalOutcome::Declined => print_info(&message),
    }
  }
  Ok(())
}
