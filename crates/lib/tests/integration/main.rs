//! Integration tests for hoist-lib.
//!
//! Each test builds a throwaway install root, serves component archives
//! from a local HTTP server and drives the reconciler against it.

mod common;
mod fetch_tests;
mod reconcile_tests;
