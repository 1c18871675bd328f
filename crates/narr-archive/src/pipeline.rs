//! Per-slice staleness check and update.
//!
//! A slice is updated in three phases: fetch the remote file into the
//! working area, extract each variable next to it, then move every
//! extracted pair into the archive. The fetched source never outlives the
//! update, whatever the outcome.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use tokio::fs;
use tracing::{debug, info, instrument, warn};

use crate::archive::move_file;
use crate::catalog::{Catalog, RemoteSource};
use crate::config::{validate_interval, SyncConfig};
use crate::error::{ArchiveError, Result};
use crate::extract::{ProcessRunner, ToolRunner, Wgrib};
use crate::fetch::{partial_path, HttpSource};
use crate::locator::{ArchiveLocator, Extension};
use crate::slice::TimeSlice;

/// State shared by every slice of one run: configuration, name resolution,
/// the cached remote catalog and the extraction tool.
pub struct SyncContext {
    config: SyncConfig,
    locator: ArchiveLocator,
    catalog: Catalog,
    wgrib: Wgrib,
}

impl SyncContext {
    /// Build a context over explicit remote and tool implementations.
    pub fn new(
        config: SyncConfig,
        source: Arc<dyn RemoteSource>,
        runner: Arc<dyn ToolRunner>,
    ) -> Result<Self> {
        validate_interval(config.interval)?;
        if config.variables.is_empty() {
            return Err(ArchiveError::Config("no variables to extract".to_string()));
        }
        let locator = ArchiveLocator::new(&config.archive_root, &config.templates)?;
        std::fs::create_dir_all(&config.work_dir).map_err(|e| {
            ArchiveError::Config(format!(
                "cannot create working directory {}: {}",
                config.work_dir.display(),
                e
            ))
        })?;

        let wgrib = Wgrib::new(config.wgrib.clone(), runner);
        Ok(Self {
            config,
            locator,
            catalog: Catalog::new(source),
            wgrib,
        })
    }

    /// Build a context talking HTTP to the configured remote and running
    /// the real `wgrib`.
    pub fn connect(config: SyncConfig) -> Result<Self> {
        let source = HttpSource::new(config.fetch.clone(), &config.templates.remote_url_format)?;
        Self::new(config, Arc::new(source), Arc::new(ProcessRunner))
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn locator(&self) -> &ArchiveLocator {
        &self.locator
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn wgrib(&self) -> &Wgrib {
        &self.wgrib
    }

    /// Path of `name` inside the working area.
    pub fn work_path(&self, name: &str) -> PathBuf {
        self.config.work_dir.join(name)
    }

    pub fn job(&self, slice: TimeSlice) -> SliceJob<'_> {
        SliceJob { ctx: self, slice }
    }
}

/// Freshness of one slice relative to the remote archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SliceStatus {
    /// The archive copy is at least as new as the remote file.
    UpToDate,
    /// The archive copy is missing or older than the remote file.
    Stale,
    /// The remote archive does not publish this slice.
    RemoteMissing,
}

/// Result of a successful [`SliceJob::update`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    Updated,
    /// The remote answered 404 or 403; nothing was archived.
    Unavailable,
}

/// Work on a single slice within a [`SyncContext`].
pub struct SliceJob<'a> {
    ctx: &'a SyncContext,
    slice: TimeSlice,
}

impl<'a> SliceJob<'a> {
    pub fn slice(&self) -> TimeSlice {
        self.slice
    }

    pub fn external_filename(&self) -> String {
        self.ctx.locator.slice_external_filename(&self.slice)
    }

    fn proxy_variable(&self) -> &str {
        &self.ctx.config.variables[0]
    }

    /// Archived header of the first variable, which stands in for the
    /// freshness of the whole slice.
    pub fn header_path(&self) -> PathBuf {
        self.ctx
            .locator
            .slice_path(&self.slice, self.proxy_variable(), Extension::Header)
    }

    /// Modification time of the archived header in host-local time, if it
    /// exists. The remote listing carries naive local wall-clock times.
    pub async fn internal_last_modified(&self) -> Result<Option<NaiveDateTime>> {
        let metadata = match fs::metadata(self.header_path()).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(wall_clock(metadata.modified()?, &Local)))
    }

    /// Modification time of the remote file, if it is published.
    pub async fn external_last_modified(&self) -> Result<Option<NaiveDateTime>> {
        self.ctx
            .catalog
            .last_modified(&self.external_filename())
            .await
    }

    pub async fn status(&self) -> Result<SliceStatus> {
        let Some(remote) = self.external_last_modified().await? else {
            return Ok(SliceStatus::RemoteMissing);
        };
        Ok(match self.internal_last_modified().await? {
            None => SliceStatus::Stale,
            Some(local) if local < remote => SliceStatus::Stale,
            Some(_) => SliceStatus::UpToDate,
        })
    }

    /// Whether the remote holds a newer copy of this slice than the
    /// archive.
    pub async fn needs_update(&self) -> Result<bool> {
        let status = self.status().await?;
        match status {
            SliceStatus::RemoteMissing => info!(
                slice = %self.slice,
                name = %self.external_filename(),
                "Not available in remote archive, skipping"
            ),
            SliceStatus::Stale => info!(slice = %self.slice, "Archive copy is stale"),
            SliceStatus::UpToDate => debug!(slice = %self.slice, "Archive copy is up to date"),
        }
        Ok(status == SliceStatus::Stale)
    }

    /// Files to move into the archive, in order. The proxy header comes
    /// last so a partially archived slice still reads as stale.
    fn archive_order(&self) -> Vec<(&str, Extension)> {
        let proxy = self.proxy_variable();
        let variables = self.ctx.config.variables.iter().map(String::as_str);

        let mut order: Vec<_> = variables.clone().map(|v| (v, Extension::Grib)).collect();
        order.extend(
            variables
                .filter(|v| *v != proxy)
                .map(|v| (v, Extension::Header)),
        );
        order.push((proxy, Extension::Header));
        order
    }

    fn working_path(&self, variable: &str, extension: Extension) -> PathBuf {
        self.ctx.work_path(
            &self
                .ctx
                .locator
                .slice_filename(&self.slice, variable, extension),
        )
    }

    /// Fetch, extract and archive this slice.
    #[instrument(skip(self), fields(slice = %self.slice))]
    pub async fn update(&self) -> Result<UpdateOutcome> {
        let name = self.external_filename();
        let source = self.ctx.work_path(&name);
        let _source_guard = WorkingFile::new(source.clone());

        if fs::try_exists(&source).await? {
            info!(path = %source.display(), "Source file already in working area");
        } else {
            match self.ctx.catalog.fetch(&name, &source).await {
                Ok(_) => {}
                Err(e) if e.is_unavailable() => {
                    warn!(error = %e, "Remote file unavailable");
                    return Ok(UpdateOutcome::Unavailable);
                }
                Err(e) => return Err(e),
            }
        }

        for variable in &self.ctx.config.variables {
            let hdr = self.working_path(variable, Extension::Header);
            let grb = self.working_path(variable, Extension::Grib);

            if fs::try_exists(&hdr).await? && fs::try_exists(&grb).await? {
                info!(variable = %variable, "Already extracted, skipping");
                continue;
            }

            if let Err(e) = self
                .ctx
                .wgrib
                .extract_variable(&source, variable, &hdr, &grb)
                .await
            {
                remove_quietly(&hdr).await;
                remove_quietly(&grb).await;
                return Err(e);
            }
        }

        let directory = self.ctx.locator.slice_directory(&self.slice);
        fs::create_dir_all(&directory).await?;

        for (variable, extension) in self.archive_order() {
            let from = self.working_path(variable, extension);
            let to = self
                .ctx
                .locator
                .slice_path(&self.slice, variable, extension);
            move_file(&from, &to).await?;
        }

        info!(directory = %directory.display(), "Slice archived");
        Ok(UpdateOutcome::Updated)
    }
}

/// Wall-clock reading of `time` in `tz`.
fn wall_clock<Tz: TimeZone>(time: SystemTime, tz: &Tz) -> NaiveDateTime {
    DateTime::<Utc>::from(time).with_timezone(tz).naive_local()
}

async fn remove_quietly(path: &Path) {
    if let Err(e) = fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!(path = %path.display(), error = %e, "Failed to remove working file");
        }
    }
}

/// Removes a working-area download (and its partial) when dropped.
struct WorkingFile {
    path: PathBuf,
}

impl WorkingFile {
    fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl Drop for WorkingFile {
    // Drop cannot await, so this unlinks synchronously on the runtime
    // thread. It is at most two small metadata operations per slice.
    fn drop(&mut self) {
        for path in [self.path.clone(), partial_path(&self.path)] {
            match std::fs::remove_file(&path) {
                Ok(()) => debug!(path = %path.display(), "Removed working file"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove working file"),
            }
        }
    }
}
