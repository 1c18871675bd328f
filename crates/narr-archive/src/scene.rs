//! Per-level text extraction of archived NARR data for one satellite scene.
//!
//! A scene is bracketed by the slice containing its center time and the
//! slice three hours later. For every variable and both slices, each record
//! of the archived GRIB file is dumped as text into
//! `<output>/<VAR>_<k>/<level>.txt`.

use std::path::{Path, PathBuf};

use chrono::{Duration, NaiveDate, NaiveTime};
use quick_xml::events::Event;
use quick_xml::Reader;
use tokio::fs;
use tracing::{debug, info};

use crate::config::SLICE_HOURS;
use crate::error::{ArchiveError, Result};
use crate::extract::Wgrib;
use crate::locator::{ArchiveLocator, Extension};
use crate::slice::TimeSlice;

/// Variables extracted for a scene, in processing order.
pub const SCENE_VARIABLES: [&str; 3] = ["HGT", "SPFH", "TMP"];

/// Acquisition time of a scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SceneTime {
    pub date: NaiveDate,
    pub center: NaiveTime,
}

impl SceneTime {
    /// Read the acquisition date and scene center time from the global
    /// metadata of an ESPA XML document.
    pub fn from_metadata_xml(xml: &str) -> Result<Self> {
        let mut reader = Reader::from_str(xml);
        reader.trim_text(true);

        let mut in_global = false;
        let mut field: Option<&'static str> = None;
        let mut acquisition_date = None;
        let mut scene_center_time = None;

        loop {
            match reader.read_event() {
                Ok(Event::Start(e)) => match e.local_name().as_ref() {
                    b"global_metadata" => in_global = true,
                    b"acquisition_date" if in_global => field = Some("acquisition_date"),
                    b"scene_center_time" if in_global => field = Some("scene_center_time"),
                    _ => {}
                },
                Ok(Event::Text(t)) => {
                    let text = t
                        .unescape()
                        .map_err(|e| ArchiveError::Metadata(format!("bad text: {}", e)))?
                        .trim()
                        .to_string();
                    match field {
                        Some("acquisition_date") => acquisition_date = Some(text),
                        Some("scene_center_time") => scene_center_time = Some(text),
                        _ => {}
                    }
                }
                Ok(Event::End(e)) => match e.local_name().as_ref() {
                    b"global_metadata" => in_global = false,
                    _ => field = None,
                },
                Ok(Event::Eof) => break,
                Err(e) => {
                    return Err(ArchiveError::Metadata(format!(
                        "XML parsing error at position {}: {}",
                        reader.buffer_position(),
                        e
                    )))
                }
                _ => {}
            }
        }

        let date = acquisition_date
            .ok_or_else(|| ArchiveError::Metadata("missing acquisition_date".to_string()))?;
        let time = scene_center_time
            .ok_or_else(|| ArchiveError::Metadata("missing scene_center_time".to_string()))?;

        Self::parse(&date, &time)
    }

    /// Parse `YYYY-MM-DD` and `HH:MM:SS[.fraction][Z]`.
    pub fn parse(date: &str, time: &str) -> Result<Self> {
        let date = NaiveDate::parse_from_str(date, "%Y-%m-%d").map_err(|e| {
            ArchiveError::Metadata(format!("bad acquisition_date '{}': {}", date, e))
        })?;
        let center = time
            .get(..8)
            .and_then(|hms| NaiveTime::parse_from_str(hms, "%H:%M:%S").ok())
            .ok_or_else(|| ArchiveError::Metadata(format!("bad scene_center_time '{}'", time)))?;
        Ok(Self { date, center })
    }

    /// The slice containing the scene and the one after it, which may fall
    /// on the next day.
    pub fn bracketing_slices(&self) -> (TimeSlice, TimeSlice) {
        let first = TimeSlice::containing(self.date.and_time(self.center));
        (first, first.next(Duration::hours(SLICE_HOURS.into())))
    }
}

/// One line of an archived header: a record number and its pressure level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LevelRecord {
    pub record: String,
    pub level: String,
}

/// Parse a wgrib inventory line, taking the level from its `kpds7=` field.
pub fn parse_header_line(line: &str) -> Result<LevelRecord> {
    let mut parts = line.trim().split(':');
    let record = parts
        .next()
        .filter(|r| !r.is_empty())
        .ok_or_else(|| ArchiveError::Metadata(format!("empty header line '{}'", line)))?;
    let level = parts
        .find_map(|part| part.strip_prefix("kpds7="))
        .filter(|l| !l.is_empty())
        .ok_or_else(|| ArchiveError::Metadata(format!("no kpds7 level in '{}'", line)))?;

    Ok(LevelRecord {
        record: record.to_string(),
        level: level.to_string(),
    })
}

/// Dumps the archived data bracketing a scene as per-level text files.
pub struct SceneExtractor {
    locator: ArchiveLocator,
    wgrib: Wgrib,
    variables: Vec<String>,
}

impl SceneExtractor {
    pub fn new(locator: ArchiveLocator, wgrib: Wgrib) -> Self {
        Self {
            locator,
            wgrib,
            variables: SCENE_VARIABLES.iter().map(|v| v.to_string()).collect(),
        }
    }

    /// Archive files needed for `slice`, header first.
    fn slice_files(&self, slice: &TimeSlice, variable: &str) -> [PathBuf; 2] {
        [
            self.locator.slice_path(slice, variable, Extension::Header),
            self.locator.slice_path(slice, variable, Extension::Grib),
        ]
    }

    /// Extract every variable for `scene` into `output_dir`, returning the
    /// text files written.
    ///
    /// Nothing is written unless all archive files are present.
    pub async fn extract(&self, scene: &SceneTime, output_dir: &Path) -> Result<Vec<PathBuf>> {
        let (first, second) = scene.bracketing_slices();
        info!(first = %first, second = %second, "Extracting auxiliary NARR data");

        let mut missing = Vec::new();
        for variable in &self.variables {
            for slice in [&first, &second] {
                for path in self.slice_files(slice, variable) {
                    info!(path = %path.display(), "Using");
                    if !fs::try_exists(&path).await? {
                        missing.push(path);
                    }
                }
            }
        }
        if !missing.is_empty() {
            return Err(ArchiveError::MissingArchiveFiles(missing));
        }

        let mut written = Vec::new();
        for variable in &self.variables {
            for (k, slice) in [(1, &first), (2, &second)] {
                let [hdr, grb] = self.slice_files(slice, variable);
                let target = output_dir.join(format!("{}_{}", variable, k));
                written.extend(self.dump_levels(&hdr, &grb, &target).await?);
            }
        }

        info!(files = written.len(), "Completed extraction of auxiliary NARR data");
        Ok(written)
    }

    async fn dump_levels(&self, hdr: &Path, grb: &Path, target: &Path) -> Result<Vec<PathBuf>> {
        fs::create_dir_all(target).await?;

        let header = fs::read_to_string(hdr).await?;
        let mut written = Vec::new();
        for line in header.lines().filter(|l| !l.trim().is_empty()) {
            let LevelRecord { record, level } = parse_header_line(line)?;
            debug!(record = %record, level = %level, "Dumping record");

            let output = target.join(format!("{}.txt", level));
            self.wgrib.dump_record_text(grb, &record, &output).await?;
            written.push(output);
        }
        Ok(written)
    }
}
