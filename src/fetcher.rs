// 📥 Fetcher - download the source spreadsheet into the scratch file
// One attempt by default; optional bounded retries with a fixed delay.

use crate::config::SyncConfig;
use crate::error::{Result, SyncError};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

// ============================================================================
// TRANSPORTS
// ============================================================================

/// Transport - fetches the raw bytes behind a URL
pub trait Transport {
    fn get(&self, url: &str) -> Result<Vec<u8>>;

    /// Transport name for logs
    fn name(&self) -> &str;
}

/// HTTP(S) GET with a browser-like User-Agent and a bounded wait
pub struct HttpTransport {
    client: reqwest::blocking::Client,
}

impl HttpTransport {
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()
            .map_err(|e| SyncError::Transfer(format!("failed to build HTTP client: {}", e)))?;
        Ok(HttpTransport { client })
    }
}

impl Transport for HttpTransport {
    fn get(&self, url: &str) -> Result<Vec<u8>> {
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|e| SyncError::Transfer(describe_http_error(&e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SyncError::Transfer(format!("server answered {}", status)));
        }

        let body = response
            .bytes()
            .map_err(|e| SyncError::Transfer(format!("failed reading body: {}", describe_http_error(&e))))?;
        Ok(body.to_vec())
    }

    fn name(&self) -> &str {
        "http"
    }
}

fn describe_http_error(err: &reqwest::Error) -> String {
    if err.is_timeout() {
        format!("timed out: {}", err)
    } else if err.is_connect() {
        format!("connection failed: {}", err)
    } else {
        err.to_string()
    }
}

/// Reads a local file; accepts `file://` URLs and bare paths
pub struct FileTransport;

impl FileTransport {
    pub fn path_of(url: &str) -> PathBuf {
        PathBuf::from(url.strip_prefix("file://").unwrap_or(url))
    }
}

impl Transport for FileTransport {
    fn get(&self, url: &str) -> Result<Vec<u8>> {
        let path = Self::path_of(url);
        std::fs::read(&path)
            .map_err(|e| SyncError::Transfer(format!("failed to read {}: {}", path.display(), e)))
    }

    fn name(&self) -> &str {
        "file"
    }
}

/// Pick a transport from the URL scheme
pub fn transport_for(config: &SyncConfig) -> Result<Box<dyn Transport>> {
    let url = config.source_url.trim();
    let lower = url.to_ascii_lowercase();

    if lower.starts_with("http://") || lower.starts_with("https://") {
        Ok(Box::new(HttpTransport::new(&config.user_agent, config.timeout())?))
    } else if lower.contains("://") && !lower.starts_with("file://") {
        Err(SyncError::Config(format!("unsupported source URL scheme: {}", url)))
    } else {
        Ok(Box::new(FileTransport))
    }
}

// ============================================================================
// FETCHER
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct FetchReport {
    pub bytes: usize,
    pub attempts: u32,
    pub path: PathBuf,
}

pub struct Fetcher {
    transport: Box<dyn Transport>,
    min_payload_bytes: usize,
    retries: u32,
    retry_delay: Duration,
}

impl Fetcher {
    pub fn new(transport: Box<dyn Transport>, min_payload_bytes: usize) -> Self {
        Fetcher {
            transport,
            min_payload_bytes,
            retries: 0,
            retry_delay: Duration::ZERO,
        }
    }

    pub fn from_config(config: &SyncConfig) -> Result<Self> {
        Ok(Fetcher::new(transport_for(config)?, config.min_payload_bytes)
            .with_retries(config.retries, config.retry_delay()))
    }

    /// Builder pattern: extra attempts after the first failure
    pub fn with_retries(mut self, retries: u32, delay: Duration) -> Self {
        self.retries = retries;
        self.retry_delay = delay;
        self
    }

    /// Download `url` into `scratch`.
    ///
    /// The scratch file is only written once a payload passes the size check.
    pub fn fetch(&self, url: &str, scratch: &Path) -> Result<FetchReport> {
        info!("Downloading spreadsheet ({})...", self.transport.name());

        let max_attempts = self.retries.saturating_add(1);
        let mut attempt = 1;
        let data = loop {
            match self.download(url) {
                Ok(data) => break data,
                Err(e) if attempt < max_attempts => {
                    warn!(
                        "Attempt {}/{} failed: {}; retrying in {}s",
                        attempt,
                        max_attempts,
                        e,
                        self.retry_delay.as_secs()
                    );
                    std::thread::sleep(self.retry_delay);
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        };

        if let Some(parent) = scratch.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    SyncError::Transfer(format!("failed to create {}: {}", parent.display(), e))
                })?;
            }
        }
        std::fs::write(scratch, &data).map_err(|e| {
            SyncError::Transfer(format!("failed to write {}: {}", scratch.display(), e))
        })?;

        info!("Downloaded: {} bytes -> {}", data.len(), scratch.display());
        Ok(FetchReport {
            bytes: data.len(),
            attempts: attempt,
            path: scratch.to_path_buf(),
        })
    }

    fn download(&self, url: &str) -> Result<Vec<u8>> {
        let data = self.transport.get(url)?;
        if data.len() < self.min_payload_bytes {
            return Err(SyncError::Transfer(format!(
                "file too small ({} bytes), probably an error page",
                data.len()
            )));
        }
        Ok(data)
    }
}

// ============================================================================
// TESTS
// ============================================================================
