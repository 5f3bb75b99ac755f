use anyhow::Result;

use hoist_lib::config::InstallerConfig;
use hoist_lib::manifest::ManifestStore;
use hoist_lib::platform::InstallLayout;
use hoist_lib::reconcile::ReconcileError;

use crate::output::{OutputFormat, print_json};

/// Print the id of every non-internal component in the active manifest.
pub fn cmd_versions(config: &InstallerConfig, output: OutputFormat) -> Result<()> {
  let layout = InstallLayout::new(&config.root);
  let path = layout.active_manifest();
  let manifest = ManifestStore::load(&path)?.ok_or(ReconcileError::ActiveUnusable(path))?;
  let versions = manifest.component_versions();

  if output.is_json() {
    return print_json(&versions);
  }

  println!("Component versions:");
  for version in &versions {
    println!(" - {}: {}", version.name, version.id);
  }
  Ok(())
}
