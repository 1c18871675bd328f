//! Extraction of variables from GRIB files with the external `wgrib` tool.
//!
//! Process spawning sits behind [`ToolRunner`] so the pipeline can be
//! exercised without `wgrib` installed.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info};

use crate::error::{ArchiveError, Result};

/// One invocation of an external program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolRequest {
    pub program: PathBuf,
    pub args: Vec<String>,
    /// Text piped to the program's standard input.
    pub stdin: Option<String>,
}

impl ToolRequest {
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            stdin: None,
        }
    }

    pub fn with_stdin(mut self, stdin: String) -> Self {
        self.stdin = Some(stdin);
        self
    }

    /// Shell-like rendering for logs and error messages.
    pub fn command_line(&self) -> String {
        let mut line = self.program.display().to_string();
        for arg in &self.args {
            line.push(' ');
            line.push_str(arg);
        }
        if self.stdin.is_some() {
            line.push_str(" < (stdin)");
        }
        line
    }
}

/// Captured output of a successful invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Runs external programs.
#[async_trait]
pub trait ToolRunner: Send + Sync {
    /// Run `request` to completion. A non-zero exit status or death by
    /// signal is [`ArchiveError::ExtractionFailed`] carrying the command
    /// line and captured output.
    async fn run(&self, request: &ToolRequest) -> Result<ToolOutput>;
}

/// [`ToolRunner`] spawning real processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

#[async_trait]
impl ToolRunner for ProcessRunner {
    async fn run(&self, request: &ToolRequest) -> Result<ToolOutput> {
        let command = request.command_line();
        info!(command = %command, "Executing");

        let mut child = Command::new(&request.program)
            .args(&request.args)
            .stdin(if request.stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ArchiveError::ExtractionFailed {
                command: command.clone(),
                detail: format!("failed to start: {}", e),
                output: String::new(),
            })?;

        // Written from a task: the child may fill stdout before draining stdin.
        let feeder = match (child.stdin.take(), request.stdin.clone()) {
            (Some(mut pipe), Some(input)) => Some(tokio::spawn(async move {
                pipe.write_all(input.as_bytes()).await?;
                pipe.shutdown().await
            })),
            _ => None,
        };

        let output = child.wait_with_output().await?;
        if let Some(feeder) = feeder {
            match feeder.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => debug!(error = %e, "Child closed stdin early"),
                Err(e) => debug!(error = %e, "Stdin writer task failed"),
            }
        }

        let captured = ToolOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };

        let detail = match output.status.code() {
            Some(0) => return Ok(captured),
            Some(code) => format!("returned error code {}", code),
            None => "terminated by signal".to_string(),
        };

        Err(ArchiveError::ExtractionFailed {
            command,
            detail,
            output: format!("{}{}", captured.stdout, captured.stderr),
        })
    }
}

/// Keep the inventory lines describing `variable` (the fourth `:`-separated
/// field), newline terminated.
pub fn select_variable(inventory: &str, variable: &str) -> String {
    let mut selected = String::new();
    for line in inventory.lines() {
        if line.split(':').nth(3) == Some(variable) {
            selected.push_str(line);
            selected.push('\n');
        }
    }
    selected
}

/// Wrapper around the `wgrib` command line.
#[derive(Clone)]
pub struct Wgrib {
    program: PathBuf,
    runner: Arc<dyn ToolRunner>,
}

impl Wgrib {
    pub fn new(program: impl Into<PathBuf>, runner: Arc<dyn ToolRunner>) -> Self {
        Self {
            program: program.into(),
            runner,
        }
    }

    fn request(&self, args: Vec<String>) -> ToolRequest {
        ToolRequest::new(self.program.clone(), args)
    }

    /// Full record inventory of `grib`.
    pub async fn inventory(&self, grib: &Path) -> Result<String> {
        let request = self.request(vec![path_arg(grib)]);
        Ok(self.runner.run(&request).await?.stdout)
    }

    /// Extract `variable` from `source` into a GRIB file `grb` and its
    /// inventory `hdr`.
    ///
    /// The header is regenerated from the new file so its record numbers
    /// and offsets refer to `grb`, not to `source`.
    pub async fn extract_variable(
        &self,
        source: &Path,
        variable: &str,
        hdr: &Path,
        grb: &Path,
    ) -> Result<()> {
        info!(source = %source.display(), variable, "Processing");

        let selection = select_variable(&self.inventory(source).await?, variable);
        if selection.is_empty() {
            return Err(ArchiveError::ExtractionFailed {
                command: self.request(vec![path_arg(source)]).command_line(),
                detail: format!("no {} records in inventory", variable),
                output: String::new(),
            });
        }
        tokio::fs::write(hdr, &selection).await?;

        let request = self
            .request(vec![
                path_arg(source),
                "-i".to_string(),
                "-grib".to_string(),
                "-o".to_string(),
                path_arg(grb),
            ])
            .with_stdin(selection);
        let output = self.runner.run(&request).await?;
        debug!(stdout = %output.stdout.trim(), "wgrib extraction output");

        let header = select_variable(&self.inventory(grb).await?, variable);
        tokio::fs::write(hdr, header).await?;
        Ok(())
    }

    /// Write record number `record` of `grb` as text to `output`.
    pub async fn dump_record_text(&self, grb: &Path, record: &str, output: &Path) -> Result<()> {
        let request = self.request(vec![
            path_arg(grb),
            "-d".to_string(),
            record.to_string(),
            "-text".to_string(),
            "-o".to_string(),
            path_arg(output),
        ]);
        let captured = self.runner.run(&request).await?;
        if !captured.stdout.trim().is_empty() {
            debug!(stdout = %captured.stdout.trim(), "wgrib text output");
        }
        Ok(())
    }
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    const INVENTORY: &str = "\
1:0:d=15011500:HGT:kpds5=7:kpds6=100:kpds7=1000:TR=0:P1=0:P2=0:TimeU=1:1000 mb:anl:NAve=0
2:61344:d=15011500:TMP:kpds5=11:kpds6=100:kpds7=1000:TR=0:P1=0:P2=0:TimeU=1:1000 mb:anl:NAve=0
3:122688:d=15011500:HGT:kpds5=7:kpds6=100:kpds7=975:TR=0:P1=0:P2=0:TimeU=1:975 mb:anl:NAve=0
4:184032:d=15011500:SPFH:kpds5=51:kpds6=100:kpds7=1000:TR=0:P1=0:P2=0:TimeU=1:1000 mb:anl:NAve=0
5:245376:d=15011500:HGTX:kpds5=7:kpds6=1:kpds7=0:TR=0:P1=0:P2=0:TimeU=1:sfc:anl:NAve=0
";

    #[test]
    fn test_select_variable_matches_field_exactly() {
        let selected = select_variable(INVENTORY, "HGT");
        let records: Vec<_> = selected.lines().map(|l| l.split(':').next().unwrap()).collect();
        assert_eq!(records, vec!["1", "3"]);
        assert!(selected.ends_with('\n'));
        assert!(select_variable(INVENTORY, "UGRD").is_empty());
    }

    #[test]
    fn test_command_line() {
        let request = ToolRequest::new("wgrib", vec!["in.grb".into(), "-i".into()])
            .with_stdin("1:0\n".into());
        assert_eq!(request.command_line(), "wgrib in.grb -i < (stdin)");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_process_runner_success_and_stdin() {
        let request = ToolRequest::new("cat", vec![]).with_stdin("hello\n".into());
        let output = ProcessRunner.run(&request).await.unwrap();
        assert_eq!(output.stdout, "hello\n");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_process_runner_failure_carries_output() {
        let request = ToolRequest::new(
            "sh",
            vec!["-c".into(), "echo broken record; exit 3".into()],
        );
        match ProcessRunner.run(&request).await {
            Err(ArchiveError::ExtractionFailed {
                command,
                detail,
                output,
            }) => {
                assert!(command.starts_with("sh -c"));
                assert_eq!(detail, "returned error code 3");
                assert!(output.contains("broken record"));
            }
            other => panic!("expected extraction failure, got {:?}", other.map(|_| ())),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_process_runner_missing_program() {
        let request = ToolRequest::new("/nonexistent/wgrib", vec![]);
        let err = ProcessRunner.run(&request).await.unwrap_err();
        assert!(err.to_string().contains("failed to start"));
    }
}
