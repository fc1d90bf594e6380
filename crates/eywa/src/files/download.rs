use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures_util::Stream;
use serde_json::{Value, json};
use tracing::{debug, warn};

use super::{DownloadError, ProgressFn};
use crate::Eywa;

const REQUEST_DOWNLOAD: &str = "
query RequestDownload($file: FileInput!) {
    requestDownloadURL(file: $file)
}";

const DEFAULT_CHUNK_SIZE: usize = 8192;

/// Downloaded object handed out in fixed-size chunks.
///
/// The whole object is already in memory; this only gives callers a
/// streaming shape to consume it with.
#[derive(Debug, Clone)]
pub struct DownloadStream {
    remaining: Bytes,
    chunk_size: usize,
    content_length: usize,
}

impl DownloadStream {
    #[must_use]
    pub fn new(content: Bytes) -> Self {
        Self::with_chunk_size(content, DEFAULT_CHUNK_SIZE)
    }

    #[must_use]
    pub fn with_chunk_size(content: Bytes, chunk_size: usize) -> Self {
        Self {
            content_length: content.len(),
            remaining: content,
            chunk_size: chunk_size.max(1),
        }
    }

    /// Total size of the object in bytes.
    #[must_use]
    pub fn content_length(&self) -> usize {
        self.content_length
    }

    fn next_chunk(&mut self) -> Option<Bytes> {
        if self.remaining.is_empty() {
            return None;
        }
        let len = self.chunk_size.min(self.remaining.len());
        Some(self.remaining.split_to(len))
    }
}

impl Stream for DownloadStream {
    type Item = Bytes;

    fn poll_next(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Option<Bytes>> {
        Poll::Ready(self.get_mut().next_chunk())
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let chunks = self.remaining.len().div_ceil(self.chunk_size);
        (chunks, Some(chunks))
    }
}

impl Eywa {
    /// Download a file into memory.
    ///
    /// # Errors
    ///
    /// Returns a [`DownloadError`] if no URL is handed out or the transfer fails.
    pub async fn download(
        &self,
        file_uuid: &str,
        progress: Option<&ProgressFn>,
    ) -> Result<Bytes, DownloadError> {
        let url = self.request_download_url(file_uuid).await?;
        let content = self.storage.get(&url).await?;

        if let Some(progress) = progress {
            let total = content.len() as u64;
            progress(0, total);
            progress(total, total);
        }
        Ok(content)
    }

    /// Download a file to `path`, creating parent directories as needed.
    ///
    /// A partially written file is removed if the write fails.
    ///
    /// # Errors
    ///
    /// Returns a [`DownloadError`] if the transfer or the write fails.
    pub async fn download_to(
        &self,
        file_uuid: &str,
        path: impl AsRef<Path>,
        progress: Option<&ProgressFn>,
    ) -> Result<PathBuf, DownloadError> {
        let path = path.as_ref();
        let url = self.request_download_url(file_uuid).await?;
        let content = self.storage.get(&url).await?;

        let total = content.len() as u64;
        if let Some(progress) = progress {
            progress(0, total);
        }

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| DownloadError::new(format!("Download failed: {e}")))?;
        }

        if let Err(e) = tokio::fs::write(path, &content).await {
            if tokio::fs::remove_file(path).await.is_ok() {
                warn!(path = %path.display(), "Removed partial download");
            }
            return Err(DownloadError::new(format!("Download failed: {e}")));
        }

        if let Some(progress) = progress {
            progress(total, total);
        }
        debug!(path = %path.display(), total, "Saved download");
        Ok(path.to_path_buf())
    }

    /// Download a file and hand it back as a chunk stream.
    ///
    /// # Errors
    ///
    /// Returns a [`DownloadError`] if no URL is handed out or the transfer fails.
    pub async fn download_stream(&self, file_uuid: &str) -> Result<DownloadStream, DownloadError> {
        let url = self.request_download_url(file_uuid).await?;
        let content = self.storage.get(&url).await?;
        Ok(DownloadStream::new(content))
    }

    /// Download a file into the current directory.
    ///
    /// Without `filename` the stored name is looked up, falling back to
    /// `download_<first 8 chars of the id>`.
    ///
    /// # Errors
    ///
    /// Returns a [`DownloadError`] if the lookup, transfer or write fails.
    pub async fn quick_download(
        &self,
        file_uuid: &str,
        filename: Option<&str>,
    ) -> Result<PathBuf, DownloadError> {
        let name = match filename {
            Some(name) => name.to_string(),
            None => {
                let info = self
                    .file_info(file_uuid)
                    .await
                    .map_err(|e| DownloadError::new(format!("Download failed: {e}")))?;
                info.map_or_else(|| fallback_name(file_uuid), |file| file.name)
            }
        };
        self.download_to(file_uuid, name, None).await
    }

    async fn request_download_url(&self, file_uuid: &str) -> Result<String, DownloadError> {
        let variables = json!({ "file": { "euuid": file_uuid } });
        let response = self
            .graphql(REQUEST_DOWNLOAD, Some(variables))
            .await
            .map_err(|e| DownloadError::new(format!("Failed to get download URL: {e}")))?;

        if let Some(summary) = response.error_summary() {
            return Err(DownloadError::new(format!(
                "Failed to get download URL: {summary}"
            )));
        }

        response
            .field("requestDownloadURL")
            .and_then(Value::as_str)
            .filter(|url| !url.is_empty())
            .map(str::to_string)
            .ok_or_else(|| DownloadError::new("No download URL in response"))
    }
}

fn fallback_name(file_uuid: &str) -> String {
    let prefix: String = file_uuid.chars().take(8).collect();
    format!("download_{prefix}")
}
