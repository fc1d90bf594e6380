//! File service: direct transfers to object storage and file/folder records.
//!
//! Uploads and downloads follow the same three steps. A GraphQL call hands
//! out a presigned URL, the bytes move over plain HTTP, and (for uploads) a
//! second GraphQL call confirms the object so the file record becomes
//! visible. Bodies are fully buffered so the storage backend always sees an
//! exact `Content-Length`; it rejects chunked transfers. Nothing is retried.

mod download;
mod hash;
mod manage;
mod mime;
mod storage;
mod upload;

use bytes::Bytes;
use thiserror::Error;

pub use download::DownloadStream;
pub use hash::calculate_file_hash;
pub use mime::detect_mime_type;
pub use storage::StorageClient;

/// Progress callback, called with `(bytes_done, bytes_total)`.
pub type ProgressFn = dyn Fn(u64, u64) + Send + Sync;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct UploadError {
    pub message: String,
    /// HTTP status from object storage, `0` when the request never got an answer
    pub code: Option<u16>,
}

impl UploadError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
        }
    }

    pub fn with_code(message: impl Into<String>, code: u16) -> Self {
        Self {
            message: message.into(),
            code: Some(code),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct DownloadError {
    pub message: String,
    pub code: Option<u16>,
}

impl DownloadError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
        }
    }

    pub fn with_code(message: impl Into<String>, code: u16) -> Self {
        Self {
            message: message.into(),
            code: Some(code),
        }
    }
}

/// A file or folder management call was rejected by the dataset API.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct FileError {
    pub message: String,
}

impl FileError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// In-memory payload for [`Eywa::upload_content`](crate::Eywa::upload_content)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Content {
    Text(String),
    Binary(Bytes),
}

impl Content {
    #[must_use]
    pub fn default_content_type(&self) -> &'static str {
        match self {
            Self::Text(_) => "text/plain",
            Self::Binary(_) => "application/octet-stream",
        }
    }

    #[must_use]
    pub fn into_bytes(self) -> Bytes {
        match self {
            Self::Text(text) => Bytes::from(text),
            Self::Binary(bytes) => bytes,
        }
    }
}

impl From<String> for Content {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for Content {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<Vec<u8>> for Content {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Binary(Bytes::from(bytes))
    }
}

impl From<&[u8]> for Content {
    fn from(bytes: &[u8]) -> Self {
        Self::Binary(Bytes::copy_from_slice(bytes))
    }
}

impl From<Bytes> for Content {
    fn from(bytes: Bytes) -> Self {
        Self::Binary(bytes)
    }
}
