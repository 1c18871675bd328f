//! Configuration for a synchronization run.
//!
//! The four naming templates have built-in defaults and may be overridden by
//! a JSON settings file (lines starting with `#` are comments). The archive
//! root comes from the environment or the command line.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, info};

use crate::error::{ArchiveError, Result};
use crate::fetch::{FetchConfig, RetryPolicy};

/// Settings file read from the working directory when none is given.
pub const DEFAULT_CONFIG_FILE: &str = "lst_auxillary.config";

/// Environment variable holding the archive root directory.
pub const AUX_DIR_ENV: &str = "LST_AUX_DIR";

/// Variables extracted from every NARR file. The first one's header is the
/// freshness proxy for the whole slice.
pub const DEFAULT_VARIABLES: [&str; 3] = ["HGT", "TMP", "SPFH"];

/// Hours between NARR analysis times.
pub const SLICE_HOURS: u32 = 3;

/// Naming templates for remote and archived files.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TemplateConfig {
    /// URL of a remote file; `{name}` is the remote filename (empty for
    /// the directory listing).
    pub remote_url_format: String,
    /// Remote filename for a slice.
    pub remote_name_format: String,
    /// Archive directory for a day.
    pub archive_directory_format: String,
    /// Archive filename for one variable of a slice.
    pub archive_name_format: String,
}

impl Default for TemplateConfig {
    fn default() -> Self {
        Self {
            remote_url_format: "https://ftp.cpc.ncep.noaa.gov/wd51we/NARR_archive/{name}"
                .to_string(),
            remote_name_format: "rcdas.{year:04}{month:02}{day:02}{hour:02}.awip32.merged"
                .to_string(),
            archive_directory_format: "{root}/{year:04}/{month:02}/{day:02}".to_string(),
            archive_name_format:
                "NARR_3D.{variable}.{year:04}{month:02}{day:02}.{hhmm:04}.{ext}".to_string(),
        }
    }
}

impl TemplateConfig {
    /// Parse settings text, skipping `#` comment lines.
    ///
    /// Keys missing from the document keep their defaults; unknown keys are
    /// ignored.
    pub fn from_json(content: &str) -> Result<Self> {
        let json = content
            .lines()
            .filter(|line| !line.trim_start().starts_with('#'))
            .collect::<Vec<_>>()
            .join("\n");

        serde_json::from_str(&json)
            .map_err(|e| ArchiveError::Config(format!("failed to parse settings: {}", e)))
    }

    /// Load settings from `path`, falling back to defaults when the file
    /// does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %path.display(), "No settings file, using default templates");
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(ArchiveError::Config(format!(
                    "failed to read settings file {}: {}",
                    path.display(),
                    e
                )))
            }
        };

        let config = Self::from_json(&content).map_err(|e| {
            ArchiveError::Config(format!("{} ({})", e, path.display()))
        })?;

        let defaults = Self::default();
        for (key, value, default) in [
            ("remote_url_format", &config.remote_url_format, &defaults.remote_url_format),
            ("remote_name_format", &config.remote_name_format, &defaults.remote_name_format),
            (
                "archive_directory_format",
                &config.archive_directory_format,
                &defaults.archive_directory_format,
            ),
            ("archive_name_format", &config.archive_name_format, &defaults.archive_name_format),
        ] {
            if value == default {
                debug!(key, value = %value, "Using default template");
            } else {
                info!(key, value = %value, "Using template from settings file");
            }
        }

        Ok(config)
    }
}

/// Everything a synchronization run needs to know.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Root of the local archive; must exist.
    pub archive_root: PathBuf,
    /// Where remote files are fetched and variables extracted before
    /// archival.
    pub work_dir: PathBuf,
    pub templates: TemplateConfig,
    /// Variables to extract, in processing order.
    pub variables: Vec<String>,
    /// Spacing of enumerated slices; a positive multiple of three hours.
    pub interval: chrono::Duration,
    pub fetch: FetchConfig,
    /// Path or name of the `wgrib` executable.
    pub wgrib: PathBuf,
}

impl SyncConfig {
    /// Default settings rooted at `archive_root`, working in the current
    /// directory.
    pub fn new(archive_root: impl Into<PathBuf>) -> Self {
        Self {
            archive_root: archive_root.into(),
            work_dir: PathBuf::from("."),
            templates: TemplateConfig::default(),
            variables: DEFAULT_VARIABLES.iter().map(|v| v.to_string()).collect(),
            interval: chrono::Duration::hours(SLICE_HOURS as i64),
            fetch: FetchConfig::default(),
            wgrib: PathBuf::from("wgrib"),
        }
    }

    pub fn with_work_dir(mut self, work_dir: impl Into<PathBuf>) -> Self {
        self.work_dir = work_dir.into();
        self
    }

    pub fn with_templates(mut self, templates: TemplateConfig) -> Self {
        self.templates = templates;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.fetch.retry = retry;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.fetch.request_timeout = timeout;
        self
    }

    pub fn with_wgrib(mut self, wgrib: impl Into<PathBuf>) -> Self {
        self.wgrib = wgrib.into();
        self
    }
}

/// Check that `root` names an existing directory.
pub fn validate_archive_root(root: &Path) -> Result<()> {
    if root.as_os_str().is_empty() {
        return Err(ArchiveError::Config("archive directory is not set".to_string()));
    }
    if !root.is_dir() {
        return Err(ArchiveError::Config(format!(
            "archive directory {} does not exist",
            root.display()
        )));
    }
    Ok(())
}

/// Check that `interval` keeps enumerated slices on the 3-hour grid.
pub fn validate_interval(interval: chrono::Duration) -> Result<()> {
    let step = i64::from(SLICE_HOURS) * 3600;
    let secs = interval.num_seconds();
    if secs <= 0 || secs % step != 0 || interval != chrono::Duration::seconds(secs) {
        return Err(ArchiveError::Config(format!(
            "slice interval must be a positive multiple of {} hours, got {}",
            SLICE_HOURS, interval
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_when_file_missing() {
        let dir = tempfile::tempdir().unwrap();
        let config = TemplateConfig::load(&dir.path().join("nope.config")).unwrap();
        assert_eq!(config, TemplateConfig::default());
    }

    #[test]
    fn test_override_with_comments() {
        let text = r#"
# Local mirror of the NCEP archive
{
    # only the URL changes
    "remote_url_format": "http://mirror.example/narr/{name}"
}
"#;
        let config = TemplateConfig::from_json(text).unwrap();
        assert_eq!(config.remote_url_format, "http://mirror.example/narr/{name}");
        assert_eq!(
            config.archive_name_format,
            TemplateConfig::default().archive_name_format
        );
    }

    #[test]
    fn test_malformed_settings_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.config");
        std::fs::write(&path, "{ \"remote_url_format\": ").unwrap();
        let err = TemplateConfig::load(&path).unwrap_err();
        assert!(matches!(err, ArchiveError::Config(_)));
    }

    #[test]
    fn test_validate_archive_root() {
        let dir = tempfile::tempdir().unwrap();
        assert!(validate_archive_root(dir.path()).is_ok());
        assert!(validate_archive_root(&dir.path().join("missing")).is_err());
        assert!(validate_archive_root(Path::new("")).is_err());
    }

    #[test]
    fn test_validate_interval() {
        assert!(validate_interval(chrono::Duration::hours(3)).is_ok());
        assert!(validate_interval(chrono::Duration::hours(6)).is_ok());
        assert!(validate_interval(chrono::Duration::hours(2)).is_err());
        assert!(validate_interval(chrono::Duration::zero()).is_err());
        assert!(validate_interval(chrono::Duration::hours(-3)).is_err());
    }
}
