//! Implementation of the `hoist check` command.
//!
//! Fetches the manifest published at the installed manifest's `manifest_url`
//! and stages it when its version is newer. A failed check is reported but
//! never fails the command.

use anyhow::{Context, Result};
use serde::Serialize;

use hoist_lib::config::InstallerConfig;
use hoist_lib::fetch::Fetcher;
use hoist_lib::install_lock::InstallLock;
use hoist_lib::manifest::{ManifestStore, UpdateStatus};
use hoist_lib::platform::InstallLayout;

use crate::output::{OutputFormat, print_info, print_json, print_success, print_warning};

#[derive(Debug, Serialize)]
struct CheckReport {
  available: bool,
  installed: Option<u64>,
  latest: Option<u64>,
  error: Option<String>,
}

pub fn cmd_check(config: &InstallerConfig, output: OutputFormat) -> Result<()> {
  let layout = InstallLayout::new(&config.root);
  let _lock = InstallLock::acquire(&layout, "check")?;
  let store = ManifestStore::new(&layout);
  let fetcher = Fetcher::new(&config.proxy).context("Failed to set up downloads")?;

  let rt = super::runtime()?;
  let report = match rt.block_on(store.check_for_updates(&fetcher)) {
    Ok(UpdateStatus::Available { installed, latest }) => CheckReport {
      available: true,
      installed: Some(installed),
      latest: Some(latest),
      error: None,
    },
    Ok(UpdateStatus::UpToDate { installed }) => CheckReport {
      available: false,
      installed: Some(installed),
      latest: None,
      error: None,
    },
    Err(e) => {
      tracing::warn!(error = %e, "update check failed");
      CheckReport {
        available: false,
        installed: None,
        latest: None,
        error: Some(e.to_string()),
      }
    }
  };

  if output.is_json() {
    return print_json(&report);
  }

  match (&report.error, report.latest) {
    (Some(error), _) => print_warning(&format!("Update check failed: {}", error)),
    (None, Some(latest)) => print_success(&format!(
      "Version {} is available (installed: {}). Run `hoist update` to apply it.",
      latest,
      report.installed.unwrap_or_default()
    )),
    (None, None) => print_info("No updates available"),
  }
  Ok(())
}
