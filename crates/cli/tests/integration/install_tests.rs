//! End-to-end `hoist install` runs.

use predicates::prelude::*;
use serde_json::json;

use crate::common::{TestEnv, component, is_link_to, manifest};

#[test]
fn install_downloads_components_and_links_them() {
  let mut env = TestEnv::new();
  let mock = env.serve_archive("/tool-1.0.tgz", &[("bin/tool", "#!/bin/sh\necho tool\n")]);
  env.write_active(&manifest(
    1,
    None,
    json!({ "tool": component("1.0", &env.url("/tool-1.0.tgz"), json!([{ "src": "bin/tool", "dest": "bin/" }])) }),
  ));

  env
    .hoist_cmd()
    .arg("install")
    .assert()
    .success()
    .stderr(predicate::str::contains("Downloading component: tool"))
    .stderr(predicate::str::contains("Installing components ..."))
    .stderr(predicate::str::contains(" - tool: 1.0"))
    .stdout(predicate::str::contains("has been installed in"));

  mock.assert();
  assert!(env.path("data/tool-1.0/bin/tool").is_file());
  #[cfg(unix)]
  assert!(is_link_to(&env.path("bin/tool"), "data/tool-1.0/bin/tool"));
  assert!(!env.path(".trash").exists() || std::fs::read_dir(env.path(".trash")).unwrap().next().is_none());
}

#[test]
fn second_install_downloads_nothing() {
  let mut env = TestEnv::new();
  let mock = env.serve_archive("/tool-1.0.tgz", &[("bin/tool", "#!/bin/sh\n")]);
  env.write_active(&manifest(
    1,
    None,
    json!({ "tool": component("1.0", &env.url("/tool-1.0.tgz"), json!([{ "src": "bin/tool", "dest": "bin/" }])) }),
  ));

  env.hoist_cmd().arg("install").assert().success();
  env
    .hoist_cmd()
    .arg("install")
    .assert()
    .success()
    .stderr(predicate::str::contains("Downloading component").not());

  // exactly one hit across both runs
  mock.assert();
}

#[test]
fn failed_download_leaves_install_untouched() {
  let mut env = TestEnv::new();
  let _missing = env.server.mock("GET", "/tool-1.0.tgz").with_status(404).create();
  env.write_active(&manifest(
    1,
    None,
    json!({ "tool": component("1.0", &env.url("/tool-1.0.tgz"), json!([{ "src": "bin/tool", "dest": "bin/" }])) }),
  ));

  env
    .hoist_cmd()
    .arg("install")
    .assert()
    .code(1)
    .stderr(predicate::str::contains("Download failed for component tool"));

  assert!(!env.path("data/tool-1.0").exists());
  assert!(!env.path("bin/tool").exists());
}
