use std::path::Path;

use bytes::{Bytes, BytesMut};
use serde_json::{Value, json};
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{debug, info};

use super::{Content, ProgressFn, UploadError, detect_mime_type};
use crate::{Eywa, FileInput};

const REQUEST_UPLOAD: &str = "
mutation RequestUpload($file: FileInput!) {
    requestUploadURL(file: $file)
}";

const CONFIRM_UPLOAD: &str = "
mutation ConfirmUpload($url: String!) {
    confirmFileUpload(url: $url)
}";

const STREAM_CHUNK: usize = 8192;

// Upper bound on what a declared stream size may preallocate
const STREAM_INITIAL_CAPACITY: usize = 1024 * 1024;

impl Eywa {
    /// Upload a file from disk.
    ///
    /// `input.name` defaults to the file name, `content_type` to a guess from
    /// that name, and `size` is always taken from the file.
    ///
    /// # Errors
    ///
    /// Returns an [`UploadError`] if the file is missing or unreadable, or if
    /// any step of the transfer fails.
    pub async fn upload(
        &self,
        path: impl AsRef<Path>,
        mut input: FileInput,
        progress: Option<&ProgressFn>,
    ) -> Result<(), UploadError> {
        let path = path.as_ref();
        let metadata = match tokio::fs::metadata(path).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(UploadError::new(format!(
                    "File not found: {}",
                    path.display()
                )));
            }
            Err(e) => return Err(UploadError::new(format!("Upload failed: {e}"))),
        };
        if !metadata.is_file() {
            return Err(UploadError::new(format!(
                "Path is not a file: {}",
                path.display()
            )));
        }

        if input.name.is_none() {
            input.name = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned());
        }
        let name = input.name.clone().unwrap_or_default();
        if input.content_type.is_none() {
            input.content_type = Some(detect_mime_type(&name).to_string());
        }
        input.size = Some(metadata.len());

        let body = tokio::fs::read(path)
            .await
            .map_err(|e| UploadError::new(format!("Upload failed: {e}")))?;

        info!(file = %name, size = metadata.len(), "Uploading file");
        self.transfer_upload(&input, Bytes::from(body), progress)
            .await
    }

    /// Upload an in-memory string or byte buffer. `input.name` is required.
    ///
    /// # Errors
    ///
    /// Returns an [`UploadError`] if the name is missing or any step fails.
    pub async fn upload_content(
        &self,
        content: impl Into<Content>,
        mut input: FileInput,
        progress: Option<&ProgressFn>,
    ) -> Result<(), UploadError> {
        if input.name.is_none() {
            return Err(UploadError::new("name is required for content uploads"));
        }

        let content = content.into();
        if input.content_type.is_none() {
            input.content_type = Some(content.default_content_type().to_string());
        }
        let body = content.into_bytes();
        input.size = Some(body.len() as u64);

        self.transfer_upload(&input, body, progress).await
    }

    /// Upload everything `reader` yields. Both `input.name` and `input.size`
    /// are required; the URL is requested before the stream is read.
    ///
    /// # Errors
    ///
    /// Returns an [`UploadError`] if required fields are missing, reading
    /// fails, or any step of the transfer fails.
    pub async fn upload_stream<R>(
        &self,
        mut reader: R,
        mut input: FileInput,
        progress: Option<&ProgressFn>,
    ) -> Result<(), UploadError>
    where
        R: AsyncRead + Unpin,
    {
        if input.name.is_none() {
            return Err(UploadError::new("name is required for stream uploads"));
        }
        let Some(total) = input.size else {
            return Err(UploadError::new("size is required for stream uploads"));
        };
        if input.content_type.is_none() {
            input.content_type = Some("application/octet-stream".to_string());
        }

        let url = self.request_upload_url(&input).await?;

        if let Some(progress) = progress {
            progress(0, total);
        }
        let capacity = usize::try_from(total).map_or(STREAM_INITIAL_CAPACITY, |size| {
            size.min(STREAM_INITIAL_CAPACITY)
        });
        let mut buffer = BytesMut::with_capacity(capacity);
        let mut chunk = [0u8; STREAM_CHUNK];
        loop {
            let read = reader
                .read(&mut chunk)
                .await
                .map_err(|e| UploadError::new(format!("Stream upload failed: {e}")))?;
            if read == 0 {
                break;
            }
            buffer.extend_from_slice(&chunk[..read]);
            if buffer.len() as u64 > total {
                return Err(size_mismatch(buffer.len(), total));
            }
            if let Some(progress) = progress {
                progress(buffer.len() as u64, total);
            }
        }
        if buffer.len() as u64 != total {
            return Err(size_mismatch(buffer.len(), total));
        }

        let content_type = input.content_type.as_deref().unwrap_or_default();
        self.storage.put(&url, buffer.freeze(), content_type).await?;
        if let Some(progress) = progress {
            progress(total, total);
        }
        self.confirm_upload(&url).await
    }

    /// Upload a file under a freshly generated id and return that id.
    ///
    /// # Errors
    ///
    /// Same as [`Eywa::upload`].
    pub async fn quick_upload(&self, path: impl AsRef<Path>) -> Result<String, UploadError> {
        let euuid = uuid::Uuid::new_v4().to_string();
        self.upload(path, FileInput::default().with_euuid(euuid.clone()), None)
            .await?;
        Ok(euuid)
    }

    async fn transfer_upload(
        &self,
        input: &FileInput,
        body: Bytes,
        progress: Option<&ProgressFn>,
    ) -> Result<(), UploadError> {
        let url = self.request_upload_url(input).await?;

        let total = body.len() as u64;
        if let Some(progress) = progress {
            progress(0, total);
        }
        let content_type = input.content_type.as_deref().unwrap_or_default();
        self.storage.put(&url, body, content_type).await?;
        if let Some(progress) = progress {
            progress(total, total);
        }

        self.confirm_upload(&url).await
    }

    async fn request_upload_url(&self, input: &FileInput) -> Result<String, UploadError> {
        let variables = json!({ "file": input });
        let response = self
            .graphql(REQUEST_UPLOAD, Some(variables))
            .await
            .map_err(|e| UploadError::new(format!("Failed to get upload URL: {e}")))?;

        if let Some(summary) = response.error_summary() {
            return Err(UploadError::new(format!(
                "Failed to get upload URL: {summary}"
            )));
        }

        let url = response
            .field("requestUploadURL")
            .and_then(Value::as_str)
            .filter(|url| !url.is_empty())
            .ok_or_else(|| UploadError::new("No upload URL in response"))?;
        debug!("Got upload URL");
        Ok(url.to_string())
    }

    async fn confirm_upload(&self, url: &str) -> Result<(), UploadError> {
        let response = self
            .graphql(CONFIRM_UPLOAD, Some(json!({ "url": url })))
            .await
            .map_err(|e| UploadError::new(format!("Upload confirmation failed: {e}")))?;

        if let Some(summary) = response.error_summary() {
            return Err(UploadError::new(format!(
                "Upload confirmation failed: {summary}"
            )));
        }

        match response.field("confirmFileUpload") {
            Some(Value::Bool(true)) => Ok(()),
            _ => Err(UploadError::new("Upload confirmation returned false")),
        }
    }
}

fn size_mismatch(read: usize, declared: u64) -> UploadError {
    UploadError::new(format!(
        "Stream upload failed: read {read} bytes, expected {declared}"
    ))
}
