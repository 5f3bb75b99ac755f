//! End-to-end reconcile runs.

use std::path::PathBuf;

use hoist_lib::fetch::DownloadError;
use hoist_lib::reconcile::{ErrorClass, LinkKind, ReconcileError, ReconcileMode, ReconcileOutcome};
use serde_json::json;

use super::common::{TestInstall, component, manifest, tree};

#[cfg(unix)]
fn link_target(path: &std::path::Path) -> PathBuf {
  std::fs::read_link(path).unwrap()
}

async fn installed_v1(install: &mut TestInstall) {
  install.serve_archive("/x-1.0.tgz", &[("bin/x", "v1")]).await;
  let url = install.url("/x-1.0.tgz");
  install.write_active(&manifest(1, json!({"x": component("1.0", &url, json!([{"src": "bin/x", "dest": "bin/"}]))})));
  install.run_ok(ReconcileMode::FreshInstall).await;
}

#[tokio::test]
async fn fresh_install_downloads_and_links() {
  let mut install = TestInstall::new().await;
  let mock = install.serve_archive("/x-1.0.tgz", &[("bin/x", "v1"), ("lib/run.sh", "echo")]).await;
  let url = install.url("/x-1.0.tgz");
  install.write_active(&manifest(
    1,
    json!({
      "x": component("1.0", &url, json!([
        {"src": "bin/x", "dest": "bin/"},
        {"src": "lib/run.sh", "dest": "bin/x-run", "runner": "sh"}
      ])),
      "optional": {"id": "1", "href": false}
    }),
  ));

  let report = install.run_ok(ReconcileMode::FreshInstall).await;

  mock.assert_async().await;
  assert_eq!(report.downloaded, vec!["x"]);
  assert!(report.trash_purged);
  assert!(install.layout.component_dir("x", "1.0").join("bin").join("x").exists());
  assert!(!install.layout.component_dir("optional", "1").exists());
  assert_eq!(std::fs::read_to_string(install.bin("x")).unwrap(), "v1");

  let wrapper = std::fs::read_to_string(install.bin("x-run")).unwrap();
  assert!(wrapper.contains("/../data/x-1.0/lib/run.sh"));
  assert!(matches!(report.links[1].kind, LinkKind::Wrapper { .. }));
  assert!(!install.layout.trash_dir().exists());
}

#[cfg(unix)]
#[tokio::test]
async fn links_are_relative() {
  let mut install = TestInstall::new().await;
  installed_v1(&mut install).await;
  assert_eq!(link_target(&install.bin("x")), PathBuf::from("../data/x-1.0/bin/x"));
}

#[tokio::test]
async fn second_run_changes_nothing() {
  let mut install = TestInstall::new().await;
  let mock = install
    .server
    .mock("GET", "/x-1.0.tgz")
    .with_status(200)
    .with_body(super::common::tar_gz(&[("pkg/bin/x".to_string(), "v1")]))
    .expect(1)
    .create_async()
    .await;
  let url = install.url("/x-1.0.tgz");
  install.write_active(&manifest(1, json!({"x": component("1.0", &url, json!([{"src": "bin/x", "dest": "bin/"}]))})));

  install.run_ok(ReconcileMode::FreshInstall).await;
  let before = tree(install.layout.root());

  let report = install.run_ok(ReconcileMode::FreshInstall).await;

  mock.assert_async().await;
  assert!(report.downloaded.is_empty());
  assert!(report.stale_removed.is_empty());
  assert_eq!(tree(install.layout.root()), before);
  assert_eq!(std::fs::read_to_string(install.bin("x")).unwrap(), "v1");
}

#[tokio::test]
async fn update_moves_links_to_new_version() {
  let mut install = TestInstall::new().await;
  installed_v1(&mut install).await;

  install.serve_archive("/x-2.0.tgz", &[("bin/x", "v2")]).await;
  let url = install.url("/x-2.0.tgz");
  install.write_staged(&manifest(2, json!({"x": component("2.0", &url, json!([{"src": "bin/x", "dest": "bin/"}]))})));

  let report = install.run_ok(ReconcileMode::Update).await;

  assert_eq!(report.downloaded, vec!["x"]);
  assert!(install.layout.component_dir("x", "2.0").exists());
  assert!(install.layout.component_dir("x", "1.0").join("bin").join("x").exists());
  assert_eq!(std::fs::read_to_string(install.bin("x")).unwrap(), "v2");
  assert_eq!(install.active_version(), 2);
  assert!(!install.layout.staged_manifest().exists());

  #[cfg(unix)]
  assert_eq!(link_target(&install.bin("x")), PathBuf::from("../data/x-2.0/bin/x"));
}

#[tokio::test]
async fn update_without_staged_manifest_is_a_no_op() {
  let mut install = TestInstall::new().await;
  installed_v1(&mut install).await;

  let outcome = install.run(ReconcileMode::Update).await.unwrap();
  assert!(matches!(outcome, ReconcileOutcome::NoUpdatePending));
  assert_eq!(install.active_version(), 1);
}

#[tokio::test]
async fn stale_links_are_removed() {
  let mut install = TestInstall::new().await;
  install.serve_archive("/x-1.0.tgz", &[("bin/x", "v1"), ("bin/x-legacy", "old")]).await;
  let url = install.url("/x-1.0.tgz");
  install.write_active(&manifest(
    1,
    json!({"x": component("1.0", &url, json!([
      {"src": "bin/x", "dest": "bin/"},
      {"src": "bin/x-legacy", "dest": "bin/"}
    ]))}),
  ));
  install.run_ok(ReconcileMode::FreshInstall).await;
  assert!(install.bin("x-legacy").exists());

  install.serve_archive("/x-2.0.tgz", &[("bin/x", "v2")]).await;
  let url = install.url("/x-2.0.tgz");
  install.write_staged(&manifest(2, json!({"x": component("2.0", &url, json!([{"src": "bin/x", "dest": "bin/"}]))})));

  let report = install.run_ok(ReconcileMode::Update).await;

  assert_eq!(report.stale_removed, vec![install.bin("x-legacy")]);
  assert!(std::fs::symlink_metadata(install.bin("x-legacy")).is_err());
  assert!(install.bin("x").exists());
}

#[tokio::test]
async fn missing_link_source_aborts_before_any_link_changes() {
  let mut install = TestInstall::new().await;
  installed_v1(&mut install).await;
  let before = std::fs::read_to_string(install.bin("x")).unwrap();

  install.serve_archive("/x-2.0.tgz", &[("bin/x", "v2")]).await;
  let url = install.url("/x-2.0.tgz");
  install.write_staged(&manifest(
    2,
    json!({"x": component("2.0", &url, json!([
      {"src": "bin/x", "dest": "bin/"},
      {"src": "bin/not-shipped", "dest": "bin/"}
    ]))}),
  ));

  let err = install.run(ReconcileMode::Update).await.unwrap_err();

  assert!(matches!(err, ReconcileError::MissingLinkSource(_)));
  assert_eq!(err.class(), ErrorClass::Configuration);
  assert_eq!(std::fs::read_to_string(install.bin("x")).unwrap(), before);
  assert!(!install.bin("not-shipped").exists());
  assert_eq!(install.active_version(), 1);
  assert!(install.layout.staged_manifest().exists());
}

#[tokio::test]
async fn short_download_promotes_nothing() {
  use tokio::io::{AsyncReadExt, AsyncWriteExt};

  let install = TestInstall::new().await;
  let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
  let addr = listener.local_addr().unwrap();
  tokio::spawn(async move {
    let (mut socket, _) = listener.accept().await.unwrap();
    let mut buf = [0u8; 1024];
    let _ = socket.read(&mut buf).await;
    socket
      .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 1000\r\nConnection: close\r\n\r\n")
      .await
      .unwrap();
    socket.write_all(&[0u8; 900]).await.unwrap();
    socket.shutdown().await.unwrap();
  });

  let url = format!("http://{}/x-1.0.tgz", addr);
  install.write_active(&manifest(1, json!({"x": component("1.0", &url, json!([{"src": "bin/x", "dest": "bin/"}]))})));

  let err = install.run(ReconcileMode::FreshInstall).await.unwrap_err();

  assert_eq!(err.class(), ErrorClass::Download);
  assert!(
    matches!(
      err,
      ReconcileError::Fetch {
        source: DownloadError::LengthMismatch {
          expected: 1000,
          actual: 900
        },
        ..
      }
    ),
    "{:?}",
    err
  );
  assert!(!install.layout.component_dir("x", "1.0").exists());
  assert!(!install.layout.data_dir().join("x-1.0.tmp").exists());
  assert!(!install.bin("x").exists());
}

#[tokio::test]
async fn corrupt_staged_manifest_is_removed() {
  let mut install = TestInstall::new().await;
  installed_v1(&mut install).await;
  std::fs::write(install.layout.staged_manifest(), "{ truncated").unwrap();

  let err = install.run(ReconcileMode::Update).await.unwrap_err();

  assert!(matches!(err, ReconcileError::StagedCorrupt(_)));
  assert!(!install.layout.staged_manifest().exists());
  assert_eq!(install.active_version(), 1);
}

#[tokio::test]
async fn unsupported_staged_format_is_kept_and_reported() {
  let mut install = TestInstall::new().await;
  installed_v1(&mut install).await;
  install.write_staged(&json!({"format": 2, "version": 3, "version_error": "reinstall please"}));

  let err = install.run(ReconcileMode::Update).await.unwrap_err();
  assert!(matches!(err, ReconcileError::StagedUnusable(_)));
  assert_eq!(install.active_version(), 1);
}

#[tokio::test]
async fn manifest_without_links_is_rejected() {
  let mut install = TestInstall::new().await;
  install.serve_archive("/x-1.0.tgz", &[("bin/x", "v1")]).await;
  let url = install.url("/x-1.0.tgz");
  install.write_active(&manifest(1, json!({"x": {"id": "1.0", "href": url}})));

  let err = install.run(ReconcileMode::FreshInstall).await.unwrap_err();
  assert!(matches!(err, ReconcileError::NoLinks));
}

#[tokio::test]
async fn component_without_href_is_malformed() {
  let install = TestInstall::new().await;
  install.write_active(&manifest(1, json!({"x": {"id": "1.0", "links": []}})));

  let err = install.run(ReconcileMode::FreshInstall).await.unwrap_err();
  assert_eq!(err.to_string(), "Malformed manifest: no href for component x");
}

#[tokio::test]
async fn concurrent_run_is_locked_out() {
  let mut install = TestInstall::new().await;
  installed_v1(&mut install).await;

  let _held = hoist_lib::install_lock::InstallLock::acquire(&install.layout, "test").unwrap();
  let err = install.run(ReconcileMode::FreshInstall).await.unwrap_err();
  assert!(matches!(err, ReconcileError::Locked(_)));
}
