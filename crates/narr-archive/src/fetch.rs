//! HTTP transport to the remote archive with retry and transfer checks.
//!
//! - 404 and 403 are terminal: the file will not appear by retrying.
//! - Everything else (5xx, timeouts, truncated bodies) is retried with a
//!   linearly growing delay until the attempt ceiling is reached, then
//!   surfaces as [`ArchiveError::TransferFailed`].
//! - The body is streamed to `<destination>.partial` and renamed into
//!   place once the byte count matches `Content-Length`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{Client, StatusCode};
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, instrument, warn};

use crate::catalog::RemoteSource;
use crate::error::{ArchiveError, Result};
use crate::template::{Template, Value};

/// Retry budget for a single transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Delay after the first failed attempt; the n-th failure waits
    /// `n * backoff_base`.
    pub backoff_base: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            backoff_base: Duration::from_millis(1500),
        }
    }
}

impl RetryPolicy {
    /// Delay before the attempt following failed attempt number `attempt`
    /// (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.backoff_base * attempt
    }
}

/// Configuration for the HTTP transport.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub retry: RetryPolicy,
    /// Whole-request timeout
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            request_timeout: Duration::from_secs(300),
            connect_timeout: Duration::from_secs(30),
        }
    }
}

/// Outcome of one failed attempt.
#[derive(Debug)]
enum AttemptError {
    /// Stop now and surface this error.
    Terminal(ArchiveError),
    /// Worth another attempt.
    Retryable(String),
}

/// [`RemoteSource`] over HTTP(S).
pub struct HttpSource {
    client: Client,
    config: FetchConfig,
    url_template: Template,
}

impl HttpSource {
    /// Create a source whose file URLs come from `url_template` (a template
    /// with a single `{name}` placeholder).
    pub fn new(config: FetchConfig, url_template: &str) -> Result<Self> {
        let url_template = Template::parse(url_template, &["name"])?;

        let client = Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout)
            .tcp_nodelay(true)
            .build()
            .map_err(|e| ArchiveError::Config(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            config,
            url_template,
        })
    }

    /// URL of the remote file `name`; an empty name gives the listing.
    pub fn url_for(&self, name: &str) -> String {
        self.url_template.render(&[("name", Value::Text(name))])
    }

    async fn attempt(&self, url: &str, partial: &Path) -> std::result::Result<u64, AttemptError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| AttemptError::Retryable(format!("HTTP request failed: {}", e)))?;

        match response.status() {
            StatusCode::NOT_FOUND => {
                return Err(AttemptError::Terminal(ArchiveError::NotFound(url.to_string())))
            }
            StatusCode::FORBIDDEN => {
                return Err(AttemptError::Terminal(ArchiveError::Forbidden(url.to_string())))
            }
            status if !status.is_success() => {
                return Err(AttemptError::Retryable(format!("HTTP error: {}", status)))
            }
            _ => {}
        }

        let expected = response.content_length();

        let mut file = File::create(partial)
            .await
            .map_err(|e| AttemptError::Terminal(e.into()))?;
        let mut stream = response.bytes_stream();
        let mut received = 0u64;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk
                .map_err(|e| AttemptError::Retryable(format!("Error reading response: {}", e)))?;
            file.write_all(&chunk)
                .await
                .map_err(|e| AttemptError::Terminal(e.into()))?;
            received += chunk.len() as u64;
        }

        file.flush().await.map_err(|e| AttemptError::Terminal(e.into()))?;
        file.sync_all()
            .await
            .map_err(|e| AttemptError::Terminal(e.into()))?;

        check_length(expected, received).map_err(AttemptError::Retryable)?;
        Ok(received)
    }
}

/// Compare the received byte count with the declared `Content-Length`.
pub fn check_length(expected: Option<u64>, received: u64) -> std::result::Result<(), String> {
    match expected {
        Some(expected) if expected != received => Err(format!(
            "Retrieved {} out of {} bytes",
            received, expected
        )),
        _ => Ok(()),
    }
}

pub(crate) fn partial_path(destination: &Path) -> PathBuf {
    let mut name = destination.as_os_str().to_owned();
    name.push(".partial");
    PathBuf::from(name)
}

#[async_trait]
impl RemoteSource for HttpSource {
    async fn list_page(&self) -> Result<String> {
        let url = self.url_for("");
        debug!(url = %url, "Fetching remote listing");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| ArchiveError::RemoteList(format!("{}: {}", url, e)))?;

        if !response.status().is_success() {
            return Err(ArchiveError::RemoteList(format!(
                "{} returned {}",
                url,
                response.status()
            )));
        }

        response
            .text()
            .await
            .map_err(|e| ArchiveError::RemoteList(format!("{}: {}", url, e)))
    }

    #[instrument(skip(self, destination))]
    async fn fetch(&self, name: &str, destination: &Path) -> Result<u64> {
        let url = self.url_for(name);
        let partial = partial_path(destination);
        let policy = &self.config.retry;

        info!(url = %url, "Retrieving remote file");

        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.attempt(&url, &partial).await {
                Ok(bytes) => {
                    fs::rename(&partial, destination).await?;
                    info!(
                        path = %destination.display(),
                        bytes,
                        attempts = attempt,
                        "Transfer complete"
                    );
                    return Ok(bytes);
                }
                Err(AttemptError::Terminal(e)) => {
                    fs::remove_file(&partial).await.ok();
                    warn!(url = %url, error = %e, "Transfer not possible");
                    return Err(e);
                }
                Err(AttemptError::Retryable(reason)) => {
                    if attempt >= policy.max_attempts {
                        fs::remove_file(&partial).await.ok();
                        return Err(ArchiveError::TransferFailed {
                            url,
                            attempts: attempt,
                            reason,
                        });
                    }

                    let delay = policy.delay_after(attempt);
                    warn!(
                        error = %reason,
                        attempt,
                        max_attempts = policy.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        "Transfer failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}
