//! Retrieval of upstream data
//!
//! HTTP text fetches with a fixed timeout and git mirroring of upstream
//! repositories. Failures are classified but never retried.

use anyhow::{bail, Context, Result};
use std::path::Path;
use std::process::Command;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

/// Endpoint used for the startup connectivity probe
pub const CONNECTIVITY_PROBE_URL: &str = "https://httpbin.org/get";

/// Why a fetch failed
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Connection error for {url}: {source}")]
    Connection {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Timeout error for {url}: {source}")]
    Timeout {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("HTTP error for {url}: {status}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },

    #[error("Request error for {url}: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

impl FetchError {
    /// Sort a reqwest error into the taxonomy
    pub fn classify(url: &str, err: reqwest::Error) -> Self {
        let url = url.to_string();
        if err.is_timeout() {
            FetchError::Timeout { url, source: err }
        } else if err.is_connect() {
            FetchError::Connection { url, source: err }
        } else if let Some(status) = err.status() {
            FetchError::Status { url, status }
        } else {
            FetchError::Request { url, source: err }
        }
    }
}

/// Access to upstream resources
pub trait Retriever {
    /// Fetch the body of `url` as text
    fn fetch_text(&self, url: &str) -> Result<String, FetchError>;

    /// Clone `url` into `dest`, or update `dest` if it already holds a clone
    fn mirror_repository(&self, url: &str, dest: &Path) -> Result<()>;
}

/// Blocking HTTP client plus the `git` command line
pub struct HttpRetriever {
    client: reqwest::blocking::Client,
}

impl HttpRetriever {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;
        Ok(HttpRetriever { client })
    }

    /// True when the probe endpoint answers with a success status
    pub fn check_connectivity(&self) -> bool {
        self.client
            .get(CONNECTIVITY_PROBE_URL)
            .send()
            .map(|resp| resp.status().is_success())
            .unwrap_or(false)
    }
}

impl Retriever for HttpRetriever {
    fn fetch_text(&self, url: &str) -> Result<String, FetchError> {
        debug!(url, "fetching");
        let resp = self
            .client
            .get(url)
            .send()
            .and_then(|resp| resp.error_for_status())
            .map_err(|e| FetchError::classify(url, e))?;
        resp.text().map_err(|e| FetchError::classify(url, e))
    }

    fn mirror_repository(&self, url: &str, dest: &Path) -> Result<()> {
        let mut command = Command::new("git");
        if dest.is_dir() {
            info!(repository = url, "Pulling repository");
            command.arg("-C").arg(dest).arg("pull");
        } else {
            info!(repository = url, "Cloning repository");
            command.arg("clone").arg(url).arg(dest);
        }

        let status = command
            .status()
            .with_context(|| format!("Failed to run git for {}", url))?;
        if !status.success() {
            bail!("git exited with {} for {}", status, url);
        }
        Ok(())
    }
}

/// Directory name a repository URL clones into
pub fn repository_dir_name(url: &str) -> String {
    let last = url
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or_default();
    last.strip_suffix(".git").unwrap_or(last).to_string()
}
