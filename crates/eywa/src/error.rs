use thiserror::Error;

use crate::files::{DownloadError, FileError, UploadError};

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Rpc(#[from] eywa_rpc::Error),

    #[error("GraphQL error: {0}")]
    Graphql(String),

    #[error(transparent)]
    Upload(#[from] UploadError),

    #[error(transparent)]
    Download(#[from] DownloadError),

    #[error(transparent)]
    File(#[from] FileError),

    #[error("Config error: {0}")]
    Config(String),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
}

impl Error {
    /// The remote error object, when the host rejected a call.
    #[must_use]
    pub fn remote(&self) -> Option<&eywa_rpc::RemoteError> {
        match self {
            Self::Rpc(e) => e.remote(),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_connection_closed(&self) -> bool {
        matches!(self, Self::Rpc(eywa_rpc::Error::ConnectionClosed))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
