//! Shared fixtures for integration tests.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use flate2::Compression;
use flate2::write::GzEncoder;
use hoist_lib::config::ProxySettings;
use hoist_lib::fetch::Fetcher;
use hoist_lib::platform::{InstallLayout, Platform};
use hoist_lib::reconcile::{ReconcileError, ReconcileMode, ReconcileOutcome, ReconcileReport, Reconciler};
use mockito::{Mock, ServerGuard};
use serde_json::{Value, json};
use tempfile::TempDir;

/// A temporary install root plus a server for its downloads.
pub struct TestInstall {
  pub temp: TempDir,
  pub layout: InstallLayout,
  pub server: ServerGuard,
}

impl TestInstall {
  pub async fn new() -> Self {
    let temp = TempDir::new().unwrap();
    let layout = InstallLayout::new(temp.path().join("root"));
    std::fs::create_dir_all(layout.share_dir()).unwrap();
    std::fs::create_dir_all(temp.path().join("downloads")).unwrap();
    Self {
      temp,
      layout,
      server: mockito::Server::new_async().await,
    }
  }

  pub fn url(&self, path: &str) -> String {
    format!("{}{}", self.server.url(), path)
  }

  pub fn reconciler(&self) -> Reconciler {
    let fetcher = Fetcher::new(&ProxySettings::default())
      .unwrap()
      .with_temp_dir(self.temp.path().join("downloads"));
    Reconciler::new(self.layout.clone(), Arc::new(Platform::detect().unwrap()), fetcher)
  }

  pub async fn run(&self, mode: ReconcileMode) -> Result<ReconcileOutcome, ReconcileError> {
    self.reconciler().reconcile(mode).await
  }

  /// Run and expect a completed reconcile.
  pub async fn run_ok(&self, mode: ReconcileMode) -> ReconcileReport {
    match self.run(mode).await.unwrap() {
      ReconcileOutcome::Completed(report) => *report,
      ReconcileOutcome::NoUpdatePending => panic!("expected a completed run"),
    }
  }

  pub fn write_active(&self, manifest: &Value) {
    std::fs::write(self.layout.active_manifest(), manifest.to_string()).unwrap();
  }

  pub fn write_staged(&self, manifest: &Value) {
    std::fs::write(self.layout.staged_manifest(), manifest.to_string()).unwrap();
  }

  pub fn active_version(&self) -> u64 {
    let text = std::fs::read_to_string(self.layout.active_manifest()).unwrap();
    serde_json::from_str::<Value>(&text).unwrap()["version"].as_u64().unwrap()
  }

  /// Serve a tarball rooted at `pkg/` with the given files.
  pub async fn serve_archive(&mut self, path: &str, files: &[(&str, &str)]) -> Mock {
    let entries: Vec<(String, &str)> = files.iter().map(|(p, c)| (format!("pkg/{}", p), *c)).collect();
    self
      .server
      .mock("GET", path)
      .with_status(200)
      .with_body(tar_gz(&entries))
      .create_async()
      .await
  }

  pub fn bin(&self, name: &str) -> PathBuf {
    self.layout.bin_dir().join(name)
  }
}

/// A format-1 manifest.
pub fn manifest(version: u64, data: Value) -> Value {
  json!({
    "format": 1,
    "version": version,
    "wrappers": {
      "sh": {"template": "#!/bin/sh\nexec \"$(dirname \"$0\")/../__REL_PATH__\" \"$@\"\n"}
    },
    "data": data,
  })
}

/// A component stripped of its `pkg/` root, linking `bin/<name>` into `bin/`.
pub fn component(id: &str, href: &str, links: Value) -> Value {
  json!({"id": id, "href": href, "extract": 1, "links": links})
}

pub fn tar_gz(entries: &[(String, &str)]) -> Vec<u8> {
  let encoder = GzEncoder::new(Vec::new(), Compression::default());
  let mut builder = tar::Builder::new(encoder);
  for (path, contents) in entries {
    let mut header = tar::Header::new_gnu();
    header.set_size(contents.len() as u64);
    header.set_mode(0o755);
    header.set_cksum();
    builder.append_data(&mut header, path, contents.as_bytes()).unwrap();
  }
  let mut encoder = builder.into_inner().unwrap();
  encoder.flush().unwrap();
  encoder.finish().unwrap()
}

/// Every path below `root`, relative, sorted. Used to compare trees.
pub fn tree(root: &Path) -> Vec<PathBuf> {
  let mut paths: Vec<PathBuf> = walkdir::WalkDir::new(root)
    .into_iter()
    .filter_map(|e| e.ok())
    .map(|e| e.path().strip_prefix(root).unwrap().to_path_buf())
    .collect();
  paths.sort();
  paths
}
