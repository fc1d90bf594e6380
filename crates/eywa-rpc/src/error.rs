//! Error taxonomy and error types for the eywa-rpc crate.
//!
//! Numeric JSON-RPC error codes map to a fixed set of kinds, each with a
//! human title. The server band (-32099..=-32000) is one kind covering the
//! whole range.

use serde_json::Value;

use crate::protocol::{
    INTERNAL_ERROR, INVALID_PARAMS, INVALID_REQUEST, METHOD_NOT_FOUND, PARSE_ERROR, RpcError,
    SERVER_ERROR_MAX, SERVER_ERROR_MIN,
};
use crate::transport::CodecError;

/// Standard JSON-RPC error category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    ParseError,
    InvalidRequest,
    MethodNotFound,
    InvalidParams,
    InternalError,
    ServerError,
}

/// Inclusive code ranges, searched in order.
static TAXONOMY: [(i32, i32, ErrorKind); 6] = [
    (PARSE_ERROR, PARSE_ERROR, ErrorKind::ParseError),
    (INVALID_REQUEST, INVALID_REQUEST, ErrorKind::InvalidRequest),
    (METHOD_NOT_FOUND, METHOD_NOT_FOUND, ErrorKind::MethodNotFound),
    (INVALID_PARAMS, INVALID_PARAMS, ErrorKind::InvalidParams),
    (INTERNAL_ERROR, INTERNAL_ERROR, ErrorKind::InternalError),
    (SERVER_ERROR_MIN, SERVER_ERROR_MAX, ErrorKind::ServerError),
];

impl ErrorKind {
    /// Look up the kind for a numeric code. Codes outside the taxonomy
    /// return `None`.
    #[must_use]
    pub fn from_code(code: i32) -> Option<Self> {
        TAXONOMY
            .iter()
            .find(|(low, high, _)| (*low..=*high).contains(&code))
            .map(|(_, _, kind)| *kind)
    }

    #[must_use]
    pub const fn title(self) -> &'static str {
        match self {
            ErrorKind::ParseError => "Parse error",
            ErrorKind::InvalidRequest => "Invalid Request",
            ErrorKind::MethodNotFound => "Method not found",
            ErrorKind::InvalidParams => "Invalid params",
            ErrorKind::InternalError => "Internal error",
            ErrorKind::ServerError => "Server error",
        }
    }

    /// Canonical code. The server band reports its upper bound.
    #[must_use]
    pub const fn code(self) -> i32 {
        match self {
            ErrorKind::ParseError => PARSE_ERROR,
            ErrorKind::InvalidRequest => INVALID_REQUEST,
            ErrorKind::MethodNotFound => METHOD_NOT_FOUND,
            ErrorKind::InvalidParams => INVALID_PARAMS,
            ErrorKind::InternalError => INTERNAL_ERROR,
            ErrorKind::ServerError => SERVER_ERROR_MAX,
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.title())
    }
}

/// Error reply received from the peer
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteError {
    pub code: i32,
    pub kind: Option<ErrorKind>,
    pub message: String,
    pub data: Option<Value>,
}

impl RemoteError {
    /// Taxonomy title, or the peer's message for codes outside the taxonomy.
    #[must_use]
    pub fn title(&self) -> &str {
        match self.kind {
            Some(kind) => kind.title(),
            None => &self.message,
        }
    }
}

impl From<RpcError> for RemoteError {
    fn from(e: RpcError) -> Self {
        Self {
            code: e.code,
            kind: ErrorKind::from_code(e.code),
            message: e.message,
            data: e.data,
        }
    }
}

impl std::fmt::Display for RemoteError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.title(), self.code)?;
        if let Some(data) = &self.data {
            match data {
                Value::String(s) => write!(f, ", data: {s}")?,
                other => write!(f, ", data: {other}")?,
            }
        }
        Ok(())
    }
}

impl std::error::Error for RemoteError {}

/// Unified error type for RPC operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("{0}")]
    Rpc(#[from] RemoteError),

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Request timeout")]
    Timeout,
}

impl Error {
    pub fn rpc(code: i32, message: impl Into<String>) -> Self {
        Self::Rpc(RpcError::new(code, message).into())
    }

    /// Taxonomy kind for remote errors.
    #[must_use]
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            Error::Rpc(remote) => remote.kind,
            _ => None,
        }
    }

    #[must_use]
    pub fn remote(&self) -> Option<&RemoteError> {
        match self {
            Error::Rpc(remote) => Some(remote),
            _ => None,
        }
    }
}

impl From<RpcError> for Error {
    fn from(e: RpcError) -> Self {
        Self::Rpc(e.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
