//! Synchronization driver and freshness report.

use chrono::{NaiveDate, NaiveDateTime};
use tracing::{error, info, warn};

use crate::error::Result;
use crate::pipeline::{SyncContext, UpdateOutcome};
use crate::slice::{Slices, TimeSlice};

/// Header line of [`Synchronizer::report`].
pub const REPORT_HEADER: &str = "Measured, UpdatedLocally, UpdatedOnline";

const REPORT_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// What a synchronization run did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncSummary {
    /// Slices enumerated in the requested range.
    pub considered: usize,
    /// Slices found stale and attempted.
    pub stale: usize,
    pub updated: usize,
    /// Stale slices the remote refused (404/403).
    pub unavailable: Vec<TimeSlice>,
    /// Slices that failed, with the error message.
    pub failed: Vec<(TimeSlice, String)>,
}

impl SyncSummary {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }

    fn log(&self) {
        info!(
            considered = self.considered,
            stale = self.stale,
            updated = self.updated,
            unavailable = self.unavailable.len(),
            failed = self.failed.len(),
            "Synchronization finished"
        );
        for (slice, reason) in &self.failed {
            warn!(slice = %slice, error = %reason, "Slice not updated");
        }
    }
}

/// Drives a [`SyncContext`] over a date range.
pub struct Synchronizer {
    ctx: SyncContext,
}

impl Synchronizer {
    pub fn new(ctx: SyncContext) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &SyncContext {
        &self.ctx
    }

    fn slices(&self, start: NaiveDate, end: NaiveDate) -> Result<Slices> {
        TimeSlice::range(start, end, self.ctx.config().interval)
    }

    /// Bring every stale slice between `start` and `end` (inclusive days)
    /// up to date.
    ///
    /// Failing to list the remote archive aborts the run. Failures of an
    /// individual slice are logged and recorded in the summary.
    pub async fn synchronize(&self, start: NaiveDate, end: NaiveDate) -> Result<SyncSummary> {
        let slices = self.slices(start, end)?;
        info!(start = %start, end = %end, "Synchronizing NARR archive");

        self.ctx.catalog().entries().await?;

        let mut summary = SyncSummary::default();
        for slice in slices {
            summary.considered += 1;
            let job = self.ctx.job(slice);

            match job.needs_update().await {
                Ok(true) => summary.stale += 1,
                Ok(false) => continue,
                Err(e) => {
                    error!(slice = %slice, error = %e, "Failed to check slice");
                    summary.failed.push((slice, e.to_string()));
                    continue;
                }
            }

            match job.update().await {
                Ok(UpdateOutcome::Updated) => summary.updated += 1,
                Ok(UpdateOutcome::Unavailable) => summary.unavailable.push(slice),
                Err(e) => {
                    error!(slice = %slice, error = %e, "Failed to update slice");
                    summary.failed.push((slice, e.to_string()));
                }
            }
        }

        summary.log();
        Ok(summary)
    }

    /// One line per slice with its measured time, the archive header's
    /// modification time and the remote file's, `-` where absent.
    pub async fn report(&self, start: NaiveDate, end: NaiveDate) -> Result<String> {
        let mut lines = vec![REPORT_HEADER.to_string()];
        for slice in self.slices(start, end)? {
            let job = self.ctx.job(slice);
            let local = job.internal_last_modified().await?;
            let remote = job.external_last_modified().await?;
            lines.push(format!(
                "{}, {}, {}",
                slice,
                format_time(local),
                format_time(remote)
            ));
        }
        Ok(lines.join("\n"))
    }
}

fn format_time(time: Option<NaiveDateTime>) -> String {
    time.map(|t| t.format(REPORT_TIME_FORMAT).to_string())
        .unwrap_or_else(|| "-".to_string())
}
