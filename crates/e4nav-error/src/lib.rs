#![forbid(unsafe_code)]
//! Error types for e4nav.
//!
//! # Error Taxonomy
//!
//! e4nav uses a two-layer error model:
//!
//! | Layer | Type | Crate | Purpose |
//! |-------|------|-------|---------|
//! | Parsing | `ParseError` | `e4nav-types` | On-disk format violations detected during byte parsing |
//! | Runtime | `NavError` | `e4nav-error` (this crate) | User-facing errors for CLI and API consumers |
//!
//! `e4nav-error` is intentionally independent of `e4nav-types` to avoid
//! cyclic dependencies; the conversion from `ParseError` to `NavError`
//! happens in `e4nav-core`, which depends on both.
//!
//! ## Propagation policy
//!
//! Per-block and per-inode failures are local: the directory walker and the
//! file renderer log the failure and skip the affected block or inode, so a
//! partially damaged image still yields partial output. Only failure to read
//! the superblock or the group descriptor is fatal, since every other
//! operation depends on them.

use thiserror::Error;

/// Unified error type for all e4nav operations.
#[derive(Debug, Error)]
pub enum NavError {
    /// Operating system I/O error (wraps `std::io::Error`).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Structurally invalid request against the image (out-of-range block,
    /// bad geometry, read range past end of device).
    #[error("invalid on-disk format: {0}")]
    Format(String),

    /// Parse-layer error surfaced to the user.
    ///
    /// Carries the string representation of a `ParseError` from
    /// `e4nav-types` so that diagnostic detail is not lost at the
    /// crate boundary.
    #[error("parse error: {0}")]
    Parse(String),

    /// The image uses a feature outside this tool's scope
    /// (e.g., extent-tree internal nodes).
    #[error("unsupported feature: {0}")]
    Unsupported(String),

    /// File, directory, or path component not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// A non-terminal path component resolved to something that is not
    /// a directory.
    #[error("not a directory: {0}")]
    NotDirectory(String),

    /// A file operation was asked to act on something that is not a
    /// regular file.
    #[error("not a regular file: {0}")]
    NotRegularFile(String),
}

/// Result alias using `NavError`.
pub type Result<T> = std::result::Result<T, NavError>;
