//! Release manifests.
//!
//! The active manifest describes what is installed; a staged manifest is a
//! newer release waiting to be applied. Only the reconciler promotes the
//! staged file to active.

mod store;
mod types;

pub use store::{ManifestStore, dump_versions, parse_manifest};
pub use types::*;
