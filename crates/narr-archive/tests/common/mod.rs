#![allow(dead_code)]

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use narr_archive::{ArchiveError, RemoteSource, Result, ToolOutput, ToolRequest, ToolRunner};

/// Stand-in for `wgrib` operating on self-describing text files.
///
/// - `wgrib FILE` prints FILE's contents as its inventory.
/// - `wgrib SRC -i -grib -o OUT` writes the selected inventory lines to OUT.
/// - `wgrib GRB -d REC -text -o OUT` writes a one-line dump to OUT.
#[derive(Default)]
pub struct FakeWgrib {
    fail_variable: Option<String>,
    requests: Mutex<Vec<ToolRequest>>,
}

impl FakeWgrib {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the extraction of `variable` with a non-zero exit.
    pub fn failing_on(variable: &str) -> Self {
        Self {
            fail_variable: Some(variable.to_string()),
            ..Self::default()
        }
    }

    pub fn requests(&self) -> Vec<ToolRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn count_with_arg(&self, arg: &str) -> usize {
        self.requests()
            .iter()
            .filter(|r| r.args.iter().any(|a| a == arg))
            .count()
    }

    fn failure(request: &ToolRequest, output: &str) -> ArchiveError {
        ArchiveError::ExtractionFailed {
            command: request.command_line(),
            detail: "returned error code 1".to_string(),
            output: output.to_string(),
        }
    }
}

#[async_trait]
impl ToolRunner for FakeWgrib {
    async fn run(&self, request: &ToolRequest) -> Result<ToolOutput> {
        self.requests.lock().unwrap().push(request.clone());
        let args: Vec<&str> = request.args.iter().map(String::as_str).collect();

        match args.as_slice() {
            [file] => match std::fs::read_to_string(file) {
                Ok(stdout) => Ok(ToolOutput {
                    stdout,
                    stderr: String::new(),
                }),
                Err(e) => Err(Self::failure(request, &format!("{}: {}", file, e))),
            },
            [_source, "-i", "-grib", "-o", out] => {
                let selection = request.stdin.clone().unwrap_or_default();
                if let Some(variable) = &self.fail_variable {
                    if selection.contains(&format!(":{}:", variable)) {
                        return Err(Self::failure(request, "*** FATAL ERROR: read error ***"));
                    }
                }
                std::fs::write(out, selection)?;
                Ok(ToolOutput::default())
            }
            [grb, "-d", record, "-text", "-o", out] => {
                std::fs::write(out, format!("record {} of {}\n", record, grb))?;
                Ok(ToolOutput {
                    stdout: format!("{}:0:d=15011500\n", record),
                    stderr: String::new(),
                })
            }
            _ => Err(Self::failure(request, "unexpected arguments")),
        }
    }
}

/// In-memory remote archive.
pub struct FakeSource {
    listing: String,
    files: HashMap<String, Vec<u8>>,
    fetches: AtomicUsize,
}

impl FakeSource {
    pub fn new(listing: String) -> Self {
        Self {
            listing,
            files: HashMap::new(),
            fetches: AtomicUsize::new(0),
        }
    }

    pub fn with_file(mut self, name: &str, contents: impl Into<Vec<u8>>) -> Self {
        self.files.insert(name.to_string(), contents.into());
        self
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RemoteSource for FakeSource {
    async fn list_page(&self) -> Result<String> {
        Ok(self.listing.clone())
    }

    async fn fetch(&self, name: &str, destination: &Path) -> Result<u64> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        match self.files.get(name) {
            Some(contents) => {
                std::fs::write(destination, contents)?;
                Ok(contents.len() as u64)
            }
            None => Err(ArchiveError::NotFound(name.to_string())),
        }
    }
}
