mod check;
mod install;
mod update;
mod versions;

use std::sync::Arc;

use anyhow::{Context, Result};

use hoist_lib::config::InstallerConfig;
use hoist_lib::fetch::Fetcher;
use hoist_lib::install_lock::LockError;
use hoist_lib::platform::{InstallLayout, Platform};
use hoist_lib::reconcile::{ReconcileError, Reconciler};

use crate::output::ConsoleProgress;

pub use check::cmd_check;
pub use install::cmd_install;
pub use update::cmd_update;
pub use versions::cmd_versions;

/// Build a reconciler for the configured root, reporting progress on the console.
fn reconciler(config: &InstallerConfig) -> Result<Reconciler> {
  let platform = Platform::detect().context("Failed to detect the host platform")?;
  let fetcher = Fetcher::new(&config.proxy).context("Failed to set up downloads")?;
  Ok(Reconciler::new(InstallLayout::new(&config.root), Arc::new(platform), fetcher).with_progress(Arc::new(ConsoleProgress)))
}

fn runtime() -> Result<tokio::runtime::Runtime> {
  tokio::runtime::Runtime::new().context("Failed to create async runtime")
}

/// Map a failure to the process exit code.
///
/// | code | meaning                                      |
/// |------|----------------------------------------------|
/// | 1    | failed before the installation was touched   |
/// | 2    | interrupted, re-run to repair                |
/// | 3    | staged manifest unusable or corrupt          |
/// | 4    | installed manifest unusable                  |
/// | 5    | another run holds the install lock           |
pub fn exit_code(err: &anyhow::Error) -> u8 {
  err
    .chain()
    .find_map(|cause| {
      if let Some(e) = cause.downcast_ref::<ReconcileError>() {
        return Some(match e {
          ReconcileError::Interrupted { .. } => 2,
          ReconcileError::StagedUnusable(_) | ReconcileError::StagedCorrupt(_) => 3,
          ReconcileError::ActiveUnusable(_) => 4,
          ReconcileError::Locked(_) => 5,
          _ => 1,
        });
      }
      cause.downcast_ref::<LockError>().map(|_| 5)
    })
    .unwrap_or(1)
}
