//! Temporary archive layouts and file-time helpers.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{Local, NaiveDateTime, TimeZone};
use tempfile::TempDir;
use walkdir::WalkDir;

/// A temporary archive root and working directory, removed on drop.
pub struct TestArchive {
    _dir: TempDir,
    root: PathBuf,
    work: PathBuf,
}

impl TestArchive {
    /// Creates `archive/` and `work/` inside a fresh temporary directory.
    pub fn new() -> io::Result<Self> {
        let dir = tempfile::tempdir()?;
        let root = dir.path().join("archive");
        let work = dir.path().join("work");
        fs::create_dir_all(&root)?;
        fs::create_dir_all(&work)?;
        Ok(Self {
            _dir: dir,
            root,
            work,
        })
    }

    /// Archive root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Working directory.
    pub fn work(&self) -> &Path {
        &self.work
    }
}

/// Writes `contents` to `path`, creating parent directories.
pub fn write_file(path: &Path, contents: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, contents)
}

/// Sets the modification time of `path` to `at`, read as host-local time.
pub fn set_mtime(path: &Path, at: NaiveDateTime) -> io::Result<()> {
    let local = Local.from_local_datetime(&at).earliest().ok_or_else(|| {
        io::Error::new(io::ErrorKind::InvalidInput, format!("no local time {}", at))
    })?;
    set_mtime_at(path, local.into())
}

/// Sets the modification time of `path` to the instant `time`.
pub fn set_mtime_at(path: &Path, time: SystemTime) -> io::Result<()> {
    File::options().write(true).open(path)?.set_modified(time)
}

/// Returns every file below `dir`, sorted, as paths relative to `dir`.
///
/// A missing directory yields an empty list.
pub fn files_under(dir: &Path) -> io::Result<Vec<PathBuf>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry.map_err(io::Error::from)?;
        if entry.file_type().is_file() {
            if let Ok(relative) = entry.path().strip_prefix(dir) {
                files.push(relative.to_path_buf());
            }
        }
    }
    files.sort();
    Ok(files)
}
