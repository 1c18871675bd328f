//! Shared test utilities for the NARR archive workspace.
//!
//! This crate provides common testing infrastructure including:
//! - Remote directory listing and ESPA metadata fixtures
//! - Synthetic wgrib inventories
//! - Temporary archive and working directories
//!
//! # Usage
//!
//! Add to your crate's `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! test-utils = { path = "../test-utils" }
//! ```
//!
//! Then import in your tests:
//!
//! ```ignore
//! use test_utils::{listing_html, TestArchive};
//! ```

pub mod fixtures;
pub mod generators;
pub mod paths;

// Re-export commonly used items at the crate root
pub use fixtures::*;
pub use generators::*;
pub use paths::*;

/// Macro asserting that a path exists, naming it on failure.
///
/// # Usage
///
/// ```ignore
/// use test_utils::assert_exists;
///
/// assert_exists!(archive.root().join("2015/01/15"));
/// ```
#[macro_export]
macro_rules! assert_exists {
    ($path:expr) => {{
        let path_value = $path;
        let path: &std::path::Path = path_value.as_ref();
        if !path.exists() {
            panic!("assertion failed: `{}` does not exist", path.display());
        }
    }};
}
