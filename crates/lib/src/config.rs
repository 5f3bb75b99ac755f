//! Installer configuration read from the process environment.

use std::path::PathBuf;

use crate::consts::{DEBUG_ENV, FORCE_HTTP_ENV, PREFIX_ENV};
use crate::platform::paths::root_dir;

const DEFAULT_PREFIX: &str = "/usr";

/// How downloads reach the network.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProxySettings {
  /// Value of `http_proxy` / `HTTP_PROXY`, if set and non-empty.
  pub url: Option<String>,
  /// Route every scheme through the proxy, not just plain HTTP.
  pub force: bool,
}

impl ProxySettings {
  pub fn from_env() -> Self {
    let url = ["http_proxy", "HTTP_PROXY"]
      .iter()
      .filter_map(|name| std::env::var(name).ok())
      .find(|value| !value.is_empty());

    Self {
      url,
      force: flag(FORCE_HTTP_ENV),
    }
  }
}

/// Everything the installer takes from its environment.
#[derive(Debug, Clone)]
pub struct InstallerConfig {
  pub root: PathBuf,
  pub verbose: bool,
  pub proxy: ProxySettings,
  /// Where global shortcuts go. `None` when disabled with an empty `HOIST_PREFIX`.
  pub global_prefix: Option<PathBuf>,
}

impl InstallerConfig {
  pub fn from_env() -> Self {
    let global_prefix = match std::env::var(PREFIX_ENV) {
      Ok(prefix) if prefix.is_empty() => None,
      Ok(prefix) => Some(PathBuf::from(prefix)),
      Err(_) => Some(PathBuf::from(DEFAULT_PREFIX)),
    };

    Self {
      root: root_dir(),
      verbose: flag(DEBUG_ENV),
      proxy: ProxySettings::from_env(),
      global_prefix,
    }
  }

  /// Replace the root, e.g. from a command-line flag.
  pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
    self.root = root.into();
    self
  }
}

fn flag(name: &str) -> bool {
  std::env::var(name).is_ok_and(|value| value == "1")
}
