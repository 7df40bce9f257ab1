// src/aur/transport.rs

//! HTTP transport for RPC queries and snapshot downloads

use crate::error::{Error, Result};
use reqwest::blocking::Client;
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, warn};

/// Maximum attempts for a failed request
const MAX_RETRIES: u32 = 3;

/// Retry delay in milliseconds (multiplied by the attempt number)
const RETRY_DELAY_MS: u64 = 1000;

/// Fetches URLs
pub trait RpcTransport: Send + Sync {
    /// GET `url` and return the body; non-2xx responses are errors
    fn get(&self, url: &str) -> Result<Vec<u8>>;

    /// GET `url` into `dest`
    fn download(&self, url: &str, dest: &Path) -> Result<()> {
        let body = self.get(url)?;
        let mut file = File::create(dest)?;
        file.write_all(&body)?;
        Ok(())
    }
}

/// reqwest-backed transport with retry support
pub struct HttpTransport {
    client: Client,
    max_retries: u32,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("auric/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::InitError(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            max_retries: MAX_RETRIES,
        })
    }
}

impl RpcTransport for HttpTransport {
    fn get(&self, url: &str) -> Result<Vec<u8>> {
        debug!("GET {}", url);

        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.client.get(url).send() {
                Ok(response) => {
                    if !response.status().is_success() {
                        return Err(Error::DownloadError(format!(
                            "HTTP {} from {}",
                            response.status(),
                            url
                        )));
                    }

                    let bytes = response
                        .bytes()
                        .map_err(|e| Error::DownloadError(format!("Failed to read response: {e}")))?;
                    return Ok(bytes.to_vec());
                }
                Err(e) => {
                    if attempt >= self.max_retries {
                        return Err(Error::DownloadError(format!(
                            "Failed to fetch {url} after {attempt} attempts: {e}"
                        )));
                    }
                    warn!("Request attempt {} failed: {}, retrying...", attempt, e);
                    std::thread::sleep(Duration::from_millis(RETRY_DELAY_MS * attempt as u64));
                }
            }
        }
    }

    fn download(&self, url: &str, dest: &Path) -> Result<()> {
        let body = self.get(url)?;

        // dest only appears once fully written
        let temp_path = dest.with_extension("part");
        fs::write(&temp_path, &body)
            .map_err(|e| Error::IoError(format!("Failed to write {}: {e}", temp_path.display())))?;
        fs::rename(&temp_path, dest)
            .map_err(|e| Error::IoError(format!("Failed to move download into place: {e}")))?;

        debug!("downloaded {} bytes to {}", body.len(), dest.display());
        Ok(())
    }
}

/// Transport serving canned bodies
#[cfg(any(test, feature = "test-utils"))]
#[derive(Default)]
pub struct StaticTransport {
    routes: std::collections::HashMap<String, Vec<u8>>,
    requests: std::sync::Mutex<Vec<String>>,
}

#[cfg(any(test, feature = "test-utils"))]
impl StaticTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_route(mut self, url: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
        self.routes.insert(url.into(), body.into());
        self
    }

    /// URLs requested so far, in order
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

#[cfg(any(test, feature = "test-utils"))]
impl RpcTransport for StaticTransport {
    fn get(&self, url: &str) -> Result<Vec<u8>> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(url.to_string());
        }
        self.routes
            .get(url)
            .cloned()
            .ok_or_else(|| Error::DownloadError(format!("HTTP 404 Not Found from {}", url)))
    }
}
