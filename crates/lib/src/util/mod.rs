//! Shared utilities.
//!
//! Path arithmetic used when laying out links, plus test helpers.

pub mod path;
