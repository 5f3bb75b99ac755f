//! hoist-lib: Core types and logic for hoist
//!
//! This crate implements a manifest-driven component installer that can update
//! itself in place:
//! - `manifest`: manifest documents, format checks and update staging
//! - `platform`: host detection, install layout and platform-conditional values
//! - `fetch`: HTTP downloads with redirect, proxy and length verification
//! - `archive`: extraction of downloaded artifacts into component directories
//! - `trash`: deferred deletion and the recursive purge of the trash area
//! - `reconcile`: the install/update state machine tying everything together

pub mod archive;
pub mod config;
pub mod consts;
pub mod fetch;
pub mod install_lock;
pub mod manifest;
pub mod platform;
pub mod reconcile;
pub mod trash;
pub mod util;
