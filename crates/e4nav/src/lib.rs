#![forbid(unsafe_code)]
//! e4nav public API facade.
//!
//! Re-exports the navigation engine from `e4nav-core` through a stable
//! external interface. Downstream consumers (the CLI included) depend on
//! this crate.

pub use e4nav_core::*;
