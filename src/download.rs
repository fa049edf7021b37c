//! Download module
//!
//! HTTP transfer engine: text fetches for metadata and streamed file
//! downloads with progress. Redirects are followed by hand so the hop count
//! is bounded and every hop gets its own timeout.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;

use futures_util::StreamExt;
use reqwest::header::LOCATION;
use reqwest::{Client, Response, Url};
use sha2::{Digest, Sha256};
use tokio::io::AsyncWriteExt;

use crate::config;
use crate::error::{FlashError, Result};
use crate::settings::Settings;
use crate::utils::{bytes_to_mb, partial_path, ProgressTracker};
use crate::{log_debug, log_error, log_info, log_warn};

const MODULE: &str = "download";

/// Bookkeeping for one file download
#[derive(Debug, Clone)]
pub struct TransferJob {
    pub source_url: String,
    pub destination_path: PathBuf,
    /// From `Content-Length`, when the server sent one
    pub bytes_expected: Option<u64>,
    pub bytes_transferred: u64,
}

/// HTTP client wrapper shared by image discovery, image download and tool
/// download
#[derive(Clone)]
pub struct Transfer {
    client: Client,
    max_redirects: usize,
    download_timeout: Option<Duration>,
}

impl Transfer {
    pub fn new(settings: &Settings) -> Result<Self> {
        let client = Client::builder()
            .user_agent(config::app::USER_AGENT)
            .redirect(reqwest::redirect::Policy::none())
            .connect_timeout(settings.connect_timeout())
            .build()
            .map_err(|e| FlashError::transfer(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            max_redirects: settings.max_redirects,
            download_timeout: settings.download_timeout(),
        })
    }

    /// Issue a GET and follow redirects up to the configured hop limit
    ///
    /// Returns the first 2xx response. `timeout` applies to each request
    /// separately.
    async fn get_following_redirects(&self, url: &str, timeout: Option<Duration>) -> Result<Response> {
        let mut current = Url::parse(url)
            .map_err(|e| FlashError::transfer(format!("Invalid URL '{}': {}", url, e)))?;

        for hop in 0..=self.max_redirects {
            let mut request = self.client.get(current.clone());
            if let Some(timeout) = timeout {
                request = request.timeout(timeout);
            }

            let response = request.send().await.map_err(|e| {
                log_error!(MODULE, "Request to {} failed: {}", current, e);
                FlashError::from(e)
            })?;
            let status = response.status();

            if status.is_redirection() {
                let location = response
                    .headers()
                    .get(LOCATION)
                    .and_then(|v| v.to_str().ok());
                if let Some(location) = location {
                    let next = current.join(location).map_err(|e| {
                        FlashError::transfer(format!("Invalid redirect location '{}': {}", location, e))
                    })?;
                    log_debug!(MODULE, "Redirect {} ({}): {} -> {}", hop + 1, status, current, next);
                    current = next;
                    continue;
                }
            }

            if !status.is_success() {
                log_error!(MODULE, "Request to {} failed with status: {}", current, status);
                return Err(FlashError::HttpStatus {
                    code: status.as_u16(),
                    message: status.canonical_reason().unwrap_or("Unknown").to_string(),
                });
            }

            return Ok(response);
        }

        log_error!(MODULE, "Gave up on {} after {} redirects", url, self.max_redirects);
        Err(FlashError::TooManyRedirects {
            max: self.max_redirects,
        })
    }

    /// Fetch a text document (e.g. the download page)
    pub async fn fetch_text(&self, url: &str, timeout: Duration) -> Result<String> {
        log_debug!(MODULE, "Fetching text from {}", url);
        let response = self.get_following_redirects(url, Some(timeout)).await?;
        let text = response
            .text()
            .await
            .map_err(|e| FlashError::transfer(format!("Failed to read response: {}", e)))?;
        log_debug!(MODULE, "Fetched {} bytes from {}", text.len(), url);
        Ok(text)
    }

    /// Download `url` to `dest`, reporting integer percentages
    ///
    /// `on_progress` only fires when the server sends a `Content-Length` and
    /// the percentage changes. The body goes to `<dest>.downloading` first and
    /// is renamed on success. On failure nothing is left at either path.
    pub async fn fetch_to_file<F>(&self, url: &str, dest: &Path, mut on_progress: F) -> Result<PathBuf>
    where
        F: FnMut(u8),
    {
        let partial = partial_path(dest);
        log_info!(MODULE, "Download requested: {}", url);
        log_debug!(MODULE, "Output path: {}", dest.display());

        let result = match self.stream_to_file(url, &partial, dest, &mut on_progress).await {
            Ok(job) => tokio::fs::rename(&partial, dest)
                .await
                .map(|_| job)
                .map_err(|e| FlashError::io_at("move download to", dest, e)),
            Err(e) => Err(e),
        };

        match result {
            Ok(job) => {
                log_info!(
                    MODULE,
                    "Download complete: {} ({} bytes)",
                    job.destination_path.display(),
                    job.bytes_transferred
                );
                Ok(job.destination_path)
            }
            Err(e) => {
                log_error!(MODULE, "Download failed: {}", e);
                remove_if_present(&partial).await;
                remove_if_present(dest).await;
                Err(e)
            }
        }
    }

    async fn stream_to_file<F>(
        &self,
        url: &str,
        partial: &Path,
        dest: &Path,
        on_progress: &mut F,
    ) -> Result<TransferJob>
    where
        F: FnMut(u8),
    {
        let response = self.get_following_redirects(url, self.download_timeout).await?;

        let mut job = TransferJob {
            source_url: url.to_string(),
            destination_path: dest.to_path_buf(),
            bytes_expected: response.content_length().filter(|len| *len > 0),
            bytes_transferred: 0,
        };

        match job.bytes_expected {
            Some(total) => log_info!(
                MODULE,
                "Download size: {} bytes ({:.2} MB)",
                total,
                bytes_to_mb(total)
            ),
            None => log_info!(MODULE, "Download size unknown (no Content-Length)"),
        }

        let mut file = tokio::fs::File::create(partial)
            .await
            .map_err(|e| FlashError::io_at("create", partial, e))?;

        let mut tracker = ProgressTracker::new(
            "Download",
            MODULE,
            job.bytes_expected.unwrap_or(0),
            config::logging::DOWNLOAD_LOG_INTERVAL_MB,
        );

        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| FlashError::transfer(format!("Download error: {}", e)))?;
            file.write_all(&chunk)
                .await
                .map_err(|e| FlashError::io_at("write to", partial, e))?;

            job.bytes_transferred += chunk.len() as u64;
            if let Some(percent) = tracker.update(chunk.len() as u64) {
                on_progress(percent);
            }
        }

        file.flush()
            .await
            .map_err(|e| FlashError::io_at("flush", partial, e))?;
        drop(file);

        let summary = tracker.finish();
        log_info!(
            MODULE,
            "Received {:.1} MB in {:.1}s (avg {:.1} MB/s)",
            summary.total_mb,
            summary.elapsed_secs,
            summary.avg_speed_mbps
        );

        if let Some(expected) = job.bytes_expected {
            if job.bytes_transferred < expected {
                return Err(FlashError::transfer(format!(
                    "Connection closed after {} of {} bytes",
                    job.bytes_transferred, expected
                )));
            }
        }

        Ok(job)
    }
}

/// Remove a file; a file that is already gone counts as removed
///
/// Returns whether something was actually deleted.
pub async fn remove_file_if_present(path: &Path) -> std::io::Result<bool> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

async fn remove_if_present(path: &Path) {
    match remove_file_if_present(path).await {
        Ok(true) => log_debug!(MODULE, "Removed {}", path.display()),
        Ok(false) => {}
        Err(e) => log_warn!(MODULE, "Failed to remove {}: {}", path.display(), e),
    }
}

/// Calculate SHA256 of a file
pub fn calculate_file_sha256(path: &Path) -> Result<String> {
    log_debug!(MODULE, "Calculating SHA256 of: {}", path.display());

    let mut file = File::open(path).map_err(|e| FlashError::io_at("open", path, e))?;
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 64 * 1024];

    loop {
        let bytes_read = file
            .read(&mut buffer)
            .map_err(|e| FlashError::io_at("read", path, e))?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    let hash = hex::encode(hasher.finalize());
    log_debug!(MODULE, "Calculated SHA256: {}", hash);
    Ok(hash)
}

/// Verify a file against an expected SHA256 hex digest
pub fn verify_sha256(path: &Path, expected: &str) -> Result<()> {
    let expected = expected.trim().to_lowercase();
    let actual = calculate_file_sha256(path)?;

    if expected == actual {
        log_info!(MODULE, "SHA256 verification PASSED for {}", path.display());
        Ok(())
    } else {
        log_error!(
            MODULE,
            "SHA256 verification FAILED! Expected: {}, Got: {}",
            expected,
            actual
        );
        Err(FlashError::ChecksumMismatch { expected, actual })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_of_known_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("abc.bin");
        std::fs::write(&path, b"abc").unwrap();

        let hash = calculate_file_sha256(&path).unwrap();
        assert_eq!(
            hash,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert!(verify_sha256(&path, &hash.to_uppercase()).is_ok());
    }

    #[test]
    fn test_sha256_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("abc.bin");
        std::fs::write(&path, b"abc").unwrap();

        let err = verify_sha256(&path, "00").unwrap_err();
        assert!(matches!(err, FlashError::ChecksumMismatch { .. }));
    }

    #[tokio::test]
    async fn test_invalid_url_is_transfer_error() {
        let transfer = Transfer::new(&Settings::default()).unwrap();
        let err = transfer
            .fetch_text("not a url", Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, FlashError::Transfer { .. }));
    }
}
