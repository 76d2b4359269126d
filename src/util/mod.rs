//! Filesystem helpers.

/// Atomic writes and file reads.
pub mod fs;

pub use fs::{read_to_string, write_atomic};
