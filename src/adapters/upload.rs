//! Upload client for the external file-hosting endpoint.
//!
//! The service takes a `PUT /<name>` with the raw file bytes as body and
//! answers with the public download URL as plain text. One attempt per
//! call, no retries.

use std::path::Path;
use std::time::Duration;

use reqwest::{StatusCode, Url};
use thiserror::Error;
use tracing::{error, info, instrument};

/// Default hosting endpoint
pub const DEFAULT_UPLOAD_BASE: &str = "https://transfer.sh";

/// Default bound on a single upload request
pub const DEFAULT_UPLOAD_TIMEOUT: Duration = Duration::from_secs(60);

/// Upload failure classification
#[derive(Debug, Error)]
pub enum UploadError {
    /// Connection, timeout or transfer failure
    #[error("Network error during upload: {0}")]
    Network(#[source] reqwest::Error),

    /// The service answered with a non-success status
    #[error("Upload rejected with status {status}: {body}")]
    BadStatus { status: StatusCode, body: String },

    /// Anything else (reading the staged file, building the URL, ...)
    #[error("Unexpected upload failure: {0}")]
    Unexpected(String),
}

impl UploadError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, UploadError::Network(e) if e.is_timeout())
    }
}

/// HTTP client for the hosting endpoint
#[derive(Debug, Clone)]
pub struct UploadClient {
    base_url: Url,
    timeout: Duration,
    client: reqwest::Client,
}

impl UploadClient {
    /// Create a client for `base_url` with the default timeout
    pub fn new(base_url: &str) -> Result<Self, UploadError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| UploadError::Unexpected(format!("Invalid upload base URL '{}': {}", base_url, e)))?;

        if base_url.cannot_be_a_base() {
            return Err(UploadError::Unexpected(format!(
                "Upload base URL '{}' cannot carry a path",
                base_url
            )));
        }

        Ok(Self {
            base_url,
            timeout: DEFAULT_UPLOAD_TIMEOUT,
            client: reqwest::Client::new(),
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Build the target URL: base URL plus the name as one encoded segment
    pub fn target_url(&self, display_name: &str) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push(display_name);
        }
        url
    }

    /// Upload the file at `path` under `display_name`, returning the
    /// retrieval URL sent back by the service
    #[instrument(skip(self, path), fields(timeout = ?self.timeout))]
    pub async fn upload(&self, path: &Path, display_name: &str) -> Result<String, UploadError> {
        let url = self.target_url(display_name);

        let file = tokio::fs::File::open(path)
            .await
            .map_err(|e| UploadError::Unexpected(format!("Failed to open {}: {}", path.display(), e)))?;
        let length = file
            .metadata()
            .await
            .map_err(|e| UploadError::Unexpected(format!("Failed to stat {}: {}", path.display(), e)))?
            .len();

        let response = self
            .client
            .put(url.clone())
            .header(reqwest::header::CONTENT_LENGTH, length)
            .body(reqwest::Body::from(file))
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, "Upload failed");
                UploadError::Network(e)
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(%status, "Upload failed");
            return Err(UploadError::BadStatus {
                status,
                body: body.trim().to_string(),
            });
        }

        let body = response.text().await.map_err(|e| {
            error!(error = %e, "Upload failed while reading response");
            UploadError::Network(e)
        })?;

        let link = body.trim().to_string();
        if link.is_empty() {
            return Err(UploadError::Unexpected(
                "Upload service returned an empty body".to_string(),
            ));
        }

        info!(name = display_name, %link, "Uploaded file");
        Ok(link)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_url() {
        let client = UploadClient::new("https://transfer.sh").unwrap();
        assert_eq!(
            client.target_url("report.pdf").as_str(),
            "https://transfer.sh/report.pdf"
        );
    }

    #[test]
    fn test_target_url_encodes_name() {
        let client = UploadClient::new("https://transfer.sh/").unwrap();
        assert_eq!(
            client.target_url("my report #1.pdf").as_str(),
            "https://transfer.sh/my%20report%20%231.pdf"
        );
    }

    #[test]
    fn test_target_url_keeps_base_path() {
        let client = UploadClient::new("http://localhost:8080/files").unwrap();
        assert_eq!(
            client.target_url("a.txt").as_str(),
            "http://localhost:8080/files/a.txt"
        );
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(matches!(
            UploadClient::new("not a url"),
            Err(UploadError::Unexpected(_))
        ));
    }

    #[test]
    fn test_default_timeout() {
        let client = UploadClient::new(DEFAULT_UPLOAD_BASE).unwrap();
        assert_eq!(client.timeout(), Duration::from_secs(60));
    }
}
