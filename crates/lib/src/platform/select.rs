//! Resolution of platform-conditional manifest values.
//!
//! Any manifest value may be written either plainly or as a table keyed by the
//! host platform:
//!
//! ```json
//! {
//!   "platform_key": ["platform", "arch"],
//!   "linux_x86_64": "https://example.com/tool-linux.tgz",
//!   "darwin_aarch64": "https://example.com/tool-mac.tgz",
//!   "default": false
//! }
//! ```
//!
//! The key is built by reading each named attribute from [`PlatformInfo`],
//! lower-casing it and joining with `_`. A missing key falls back to
//! `default`. List values may also carry an `all` list that is appended to
//! whichever entry was selected.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{PlatformAttr, PlatformError, PlatformInfo};

/// Name of the fallback entry in a platform table.
const DEFAULT_KEY: &str = "default";

/// A value that is either the same everywhere or selected per platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Conditional<T> {
  /// A table with a `platform_key`. Listed first so tables win over `Plain`
  /// when `T` is itself an object.
  Table(PlatformTable<T>),
  Plain(T),
}

/// The object form of a [`Conditional`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct PlatformTable<T> {
  /// Attribute names combined into the lookup key.
  pub platform_key: Vec<String>,

  /// Merged into the selected value regardless of platform (lists only).
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub all: Option<T>,

  /// Resolved key (or `default`) to value.
  #[serde(flatten)]
  pub entries: BTreeMap<String, T>,
}

/// How a table's `all` entry combines with the selected value.
///
/// Lists concatenate; scalar values ignore `all`.
pub trait MergeAll: Sized {
  fn merge_all(self, _all: &Self) -> Self {
    self
  }
}

impl<U: Clone> MergeAll for Vec<U> {
  fn merge_all(mut self, all: &Self) -> Self {
    self.extend(all.iter().cloned());
    self
  }
}

impl MergeAll for String {}
impl MergeAll for u32 {}
impl MergeAll for bool {}

/// Compute the lookup key for a list of attribute names.
pub fn platform_key(attributes: &[String], info: &dyn PlatformInfo) -> Result<String, PlatformError> {
  let parts = attributes
    .iter()
    .map(|name| PlatformAttr::from_name(name).map(|attr| attr.read(info).to_lowercase()))
    .collect::<Result<Vec<_>, _>>()?;
  Ok(parts.join("_"))
}

impl<T: Clone + MergeAll> Conditional<T> {
  /// Select the value for the given platform.
  pub fn resolve(&self, info: &dyn PlatformInfo) -> Result<T, PlatformError> {
    match self {
      Conditional::Plain(value) => Ok(value.clone()),
      Conditional::Table(table) => table.resolve(info),
    }
  }
}

impl<T: Clone + MergeAll> PlatformTable<T> {
  fn resolve(&self, info: &dyn PlatformInfo) -> Result<T, PlatformError> {
    let key = platform_key(&self.platform_key, info)?;
    debug!(key = %key, "resolving platform-specific value");

    let selected = self
      .entries
      .get(&key)
      .or_else(|| self.entries.get(DEFAULT_KEY))
      .ok_or_else(|| PlatformError::UnsupportedPlatform(key.clone()))?
      .clone();

    Ok(match &self.all {
      Some(all) => selected.merge_all(all),
      None => selected,
    })
  }
}

/// Resolve an optional conditional; absent values stay absent.
pub fn resolve_opt<T: Clone + MergeAll>(
  value: Option<&Conditional<T>>,
  info: &dyn PlatformInfo,
) -> Result<Option<T>, PlatformError> {
  value.map(|v| v.resolve(info)).transpose()
}
