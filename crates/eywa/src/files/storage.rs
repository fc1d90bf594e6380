use bytes::Bytes;
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE};
use tracing::debug;

use super::{DownloadError, UploadError};
use crate::config::StorageConfig;

/// HTTP client for presigned object-storage URLs
#[derive(Debug, Clone)]
pub struct StorageClient {
    http: reqwest::Client,
}

impl StorageClient {
    /// # Errors
    ///
    /// Returns an error if the TLS backend cannot be initialised.
    pub fn new(config: &StorageConfig) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .build()?;
        Ok(Self { http })
    }

    /// PUT `body` to `url` as a single request with an exact `Content-Length`.
    ///
    /// # Errors
    ///
    /// Returns an [`UploadError`] carrying the HTTP status (or `0` when no
    /// response arrived) for anything but a 2xx answer.
    pub async fn put(
        &self,
        url: &str,
        body: Bytes,
        content_type: &str,
    ) -> Result<(), UploadError> {
        let len = body.len();
        debug!(len, content_type, "Uploading to object storage");

        let response = self
            .http
            .put(url)
            .header(CONTENT_TYPE, content_type)
            .header(CONTENT_LENGTH, len)
            .body(body)
            .send()
            .await
            .map_err(|e| UploadError::with_code(format!("S3 upload failed (0): {e}"), 0))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let text = response.text().await.unwrap_or_default();
        Err(UploadError::with_code(
            format!("S3 upload failed ({}): {text}", status.as_u16()),
            status.as_u16(),
        ))
    }

    /// GET the whole object at `url`.
    ///
    /// # Errors
    ///
    /// Returns a [`DownloadError`] for transport failures and non-2xx answers.
    pub async fn get(&self, url: &str) -> Result<Bytes, DownloadError> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| DownloadError::new(format!("Download failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let detail = if text.is_empty() {
                format!("HTTP {}", status.as_u16())
            } else {
                text
            };
            return Err(DownloadError::with_code(
                format!("Download failed: {detail}"),
                status.as_u16(),
            ));
        }

        let content = response
            .bytes()
            .await
            .map_err(|e| DownloadError::new(format!("Download failed: {e}")))?;
        debug!(len = content.len(), "Downloaded from object storage");
        Ok(content)
    }
}
