//! Shared test helpers for CLI integration tests.

use std::io::Write;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use flate2::Compression;
use flate2::write::GzEncoder;
use mockito::{Server, ServerGuard};
use serde_json::{Value, json};
use tempfile::TempDir;

/// Isolated install root plus an HTTP server to download components from.
pub struct TestEnv {
  pub temp: TempDir,
  pub server: ServerGuard,
}

impl TestEnv {
  pub fn new() -> Self {
    Self {
      temp: TempDir::new().unwrap(),
      server: Server::new(),
    }
  }

  /// Install root (isolated per test).
  pub fn root_path(&self) -> PathBuf {
    let p = self.temp.path().join("root");
    std::fs::create_dir_all(&p).unwrap();
    dunce::canonicalize(&p).unwrap_or(p)
  }

  /// Write a file relative to the install root.
  pub fn write_file(&self, relative_path: &str, content: &str) {
    let path = self.root_path().join(relative_path);
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, content).unwrap();
  }

  pub fn write_active(&self, manifest: &Value) {
    self.write_file("share/manifest.json", &manifest.to_string());
  }

  pub fn url(&self, path: &str) -> String {
    format!("{}{}", self.server.url(), path)
  }

  /// Serve a `.tgz` whose entries sit under a single `pkg/` directory.
  pub fn serve_archive(&mut self, path: &str, files: &[(&str, &str)]) -> mockito::Mock {
    self
      .server
      .mock("GET", path)
      .with_status(200)
      .with_body(tar_gz(files))
      .create()
  }

  /// A `hoist` command for this root with global shortcuts disabled.
  pub fn hoist_cmd(&self) -> Command {
    let mut cmd = cargo_bin_cmd!("hoist");
    cmd
      .env("HOIST_ROOT", self.root_path())
      .env("HOIST_PREFIX", "")
      .env_remove("http_proxy")
      .env_remove("HTTP_PROXY")
      .env_remove("RUST_LOG");
    cmd
  }

  pub fn path(&self, relative: &str) -> PathBuf {
    self.root_path().join(relative)
  }

  pub fn active_version(&self) -> u64 {
    let text = std::fs::read_to_string(self.path("share/manifest.json")).unwrap();
    serde_json::from_str::<Value>(&text).unwrap()["version"].as_u64().unwrap()
  }
}

pub fn manifest(version: u64, manifest_url: Option<&str>, data: Value) -> Value {
  let mut manifest = json!({
    "format": 1,
    "version": version,
    "data": data,
  });
  if let Some(url) = manifest_url {
    manifest["manifest_url"] = json!(url);
  }
  manifest
}

pub fn component(id: &str, href: &str, links: Value) -> Value {
  json!({ "id": id, "href": href, "extract": 1, "links": links })
}

pub fn tar_gz(files: &[(&str, &str)]) -> Vec<u8> {
  let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
  for (name, content) in files {
    let mut header = tar::Header::new_gnu();
    header.set_size(content.len() as u64);
    header.set_mode(0o755);
    header.set_cksum();
    builder
      .append_data(&mut header, format!("pkg/{}", name), content.as_bytes())
      .unwrap();
  }
  let mut gz = builder.into_inner().unwrap();
  gz.flush().unwrap();
  gz.finish().unwrap()
}

pub fn is_link_to(link: &Path, target_suffix: &str) -> bool {
  std::fs::read_link(link)
    .map(|target| target.to_string_lossy().ends_with(target_suffix))
    .unwrap_or(false)
}
