//! Local archive of NARR reanalysis data.
//!
//! This crate keeps a local archive of per-variable GRIB extracts in step
//! with the NCEP NARR archive:
//! - Listing the remote archive and comparing modification times
//! - Fetching stale files over HTTP with retry
//! - Extracting HGT, TMP and SPFH with `wgrib`
//! - Moving the extracts into a date-keyed directory tree
//!
//! It also reads the archive back for a satellite scene, dumping each
//! pressure level of the two bracketing slices as text.

pub mod archive;
pub mod catalog;
pub mod config;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod locator;
pub mod pipeline;
pub mod scene;
pub mod slice;
pub mod sync;
pub mod template;

pub use catalog::{parse_listing, Catalog, RemoteEntry, RemoteSource};
pub use config::{SyncConfig, TemplateConfig};
pub use error::{ArchiveError, Result};
pub use extract::{ProcessRunner, ToolOutput, ToolRequest, ToolRunner, Wgrib};
pub use fetch::{FetchConfig, HttpSource, RetryPolicy};
pub use locator::{ArchiveLocator, Extension};
pub use pipeline::{SliceJob, SliceStatus, SyncContext, UpdateOutcome};
pub use scene::{SceneExtractor, SceneTime};
pub use slice::TimeSlice;
pub use sync::{SyncSummary, Synchronizer};
