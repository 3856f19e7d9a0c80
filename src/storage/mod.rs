//! Filesystem storage module.
//!
//! Create-exclusive output files with rollback, and the per-authority serial
//! tracking file.

pub mod files;
pub mod serial;
