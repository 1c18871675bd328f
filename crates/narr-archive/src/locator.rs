//! Mapping from slices and variables to remote and archive names.
//!
//! Everything here is pure: no file system or network access after
//! construction.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::config::{validate_archive_root, TemplateConfig};
use crate::error::Result;
use crate::slice::TimeSlice;
use crate::template::{Template, Value};

const REMOTE_NAME_KEYS: &[&str] = &["year", "month", "day", "hour"];
const DIRECTORY_KEYS: &[&str] = &["root", "year", "month", "day"];
const ARCHIVE_NAME_KEYS: &[&str] = &["variable", "year", "month", "day", "hour", "hhmm", "ext"];

/// The two files archived per variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Extension {
    /// wgrib inventory of the records in the data file.
    Header,
    /// GRIB records for one variable.
    Grib,
}

impl Extension {
    pub const ALL: [Extension; 2] = [Extension::Header, Extension::Grib];

    pub fn as_str(&self) -> &'static str {
        match self {
            Extension::Header => "hdr",
            Extension::Grib => "grb",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "hdr" => Some(Extension::Header),
            "grb" => Some(Extension::Grib),
            _ => None,
        }
    }
}

impl fmt::Display for Extension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Components recovered from an archive filename.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveName {
    pub variable: String,
    pub slice: TimeSlice,
    pub extension: Extension,
}

/// Resolves canonical archive paths under a root directory.
#[derive(Debug, Clone)]
pub struct ArchiveLocator {
    root: PathBuf,
    remote_name: Template,
    directory: Template,
    filename: Template,
}

impl ArchiveLocator {
    /// Validate the root directory and templates.
    pub fn new(root: &Path, templates: &TemplateConfig) -> Result<Self> {
        validate_archive_root(root)?;
        Ok(Self {
            root: root.to_path_buf(),
            remote_name: Template::parse(&templates.remote_name_format, REMOTE_NAME_KEYS)?,
            directory: Template::parse(&templates.archive_directory_format, DIRECTORY_KEYS)?,
            filename: Template::parse(&templates.archive_name_format, ARCHIVE_NAME_KEYS)?,
        })
    }

    pub fn archive_directory(&self, year: i32, month: u32, day: u32) -> PathBuf {
        let root = self.root.to_string_lossy();
        PathBuf::from(self.directory.render(&[
            ("root", Value::Text(&root)),
            ("year", Value::Number(year.into())),
            ("month", Value::Number(month.into())),
            ("day", Value::Number(day.into())),
        ]))
    }

    pub fn archive_filename(
        &self,
        variable: &str,
        year: i32,
        month: u32,
        day: u32,
        hour: u32,
        extension: Extension,
    ) -> String {
        self.filename.render(&[
            ("variable", Value::Text(variable)),
            ("year", Value::Number(year.into())),
            ("month", Value::Number(month.into())),
            ("day", Value::Number(day.into())),
            ("hour", Value::Number(hour.into())),
            ("hhmm", Value::Number(i64::from(hour) * 100)),
            ("ext", Value::Text(extension.as_str())),
        ])
    }

    /// Name of the file as published by the remote archive.
    pub fn external_filename(&self, year: i32, month: u32, day: u32, hour: u32) -> String {
        self.remote_name.render(&[
            ("year", Value::Number(year.into())),
            ("month", Value::Number(month.into())),
            ("day", Value::Number(day.into())),
            ("hour", Value::Number(hour.into())),
        ])
    }

    pub fn slice_directory(&self, slice: &TimeSlice) -> PathBuf {
        self.archive_directory(slice.year(), slice.month(), slice.day())
    }

    pub fn slice_filename(&self, slice: &TimeSlice, variable: &str, extension: Extension) -> String {
        self.archive_filename(
            variable,
            slice.year(),
            slice.month(),
            slice.day(),
            slice.hour(),
            extension,
        )
    }

    /// Full archive path of one variable's file for `slice`.
    pub fn slice_path(&self, slice: &TimeSlice, variable: &str, extension: Extension) -> PathBuf {
        self.slice_directory(slice)
            .join(self.slice_filename(slice, variable, extension))
    }

    pub fn slice_external_filename(&self, slice: &TimeSlice) -> String {
        self.external_filename(slice.year(), slice.month(), slice.day(), slice.hour())
    }

    /// Recover the slice from a remote filename. The embedded timestamp is
    /// the only source of identity.
    pub fn parse_external_filename(&self, name: &str) -> Option<TimeSlice> {
        let fields = self.remote_name.extract(name)?;
        TimeSlice::new(
            fields.get("year")?.parse().ok()?,
            fields.get("month")?.parse().ok()?,
            fields.get("day")?.parse().ok()?,
            fields.get("hour")?.parse().ok()?,
        )
        .ok()
    }

    /// Recover variable, slice and extension from an archive filename.
    pub fn parse_archive_filename(&self, name: &str) -> Option<ArchiveName> {
        let fields = self.filename.extract(name)?;
        let hour = match (fields.get("hhmm"), fields.get("hour")) {
            (Some(hhmm), _) => hhmm.parse::<u32>().ok()? / 100,
            (None, Some(hour)) => hour.parse().ok()?,
            (None, None) => return None,
        };
        let slice = TimeSlice::new(
            fields.get("year")?.parse().ok()?,
            fields.get("month")?.parse().ok()?,
            fields.get("day")?.parse().ok()?,
            hour,
        )
        .ok()?;

        Some(ArchiveName {
            variable: fields.get("variable")?.clone(),
            slice,
            extension: Extension::parse(fields.get("ext")?)?,
        })
    }
}
