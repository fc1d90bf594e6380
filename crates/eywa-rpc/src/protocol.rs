//! JSON-RPC 2.0 message types.
//!
//! Inbound lines are decoded into a [`Value`] and then classified into exactly
//! one of the four message shapes. Anything that does not fit one of them is
//! rejected with a [`ProtocolError`] instead of being routed.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::error::ErrorKind;

pub const JSONRPC_VERSION: &str = "2.0";
pub const PARSE_ERROR: i32 = -32700;
pub const INVALID_REQUEST: i32 = -32600;
pub const METHOD_NOT_FOUND: i32 = -32601;
pub const INVALID_PARAMS: i32 = -32602;
pub const INTERNAL_ERROR: i32 = -32603;
pub const SERVER_ERROR_MIN: i32 = -32099;
pub const SERVER_ERROR_MAX: i32 = -32000;

/// JSON-RPC 2.0 Request ID
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    Number(i64),
    String(String),
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RequestId::Number(n) => write!(f, "{n}"),
            RequestId::String(s) => write!(f, "{s}"),
        }
    }
}

impl From<i64> for RequestId {
    fn from(n: i64) -> Self {
        RequestId::Number(n)
    }
}

impl From<String> for RequestId {
    fn from(s: String) -> Self {
        RequestId::String(s)
    }
}

impl From<&str> for RequestId {
    fn from(s: &str) -> Self {
        RequestId::String(s.to_string())
    }
}

/// Call expecting a reply
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Request {
    pub jsonrpc: String,
    pub id: RequestId,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

/// Call without an id; the peer never replies
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    pub jsonrpc: String,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

/// Successful reply
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Response {
    pub jsonrpc: String,
    pub id: RequestId,
    pub result: Value,
}

/// Failed reply
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorResponse {
    pub jsonrpc: String,
    pub id: RequestId,
    pub error: RpcError,
}

/// JSON-RPC 2.0 Error object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl RpcError {
    #[must_use]
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    #[must_use]
    pub fn with_data(code: i32, message: impl Into<String>, data: Value) -> Self {
        Self {
            code,
            message: message.into(),
            data: Some(data),
        }
    }

    /// Error whose message is the taxonomy title of `kind`.
    #[must_use]
    pub fn from_kind(kind: ErrorKind, data: Option<Value>) -> Self {
        Self {
            code: kind.code(),
            message: kind.title().to_string(),
            data,
        }
    }

    #[must_use]
    pub fn parse_error() -> Self {
        Self::from_kind(ErrorKind::ParseError, None)
    }

    #[must_use]
    pub fn invalid_request() -> Self {
        Self::from_kind(ErrorKind::InvalidRequest, None)
    }

    /// `data` carries the method that was not found.
    #[must_use]
    pub fn method_not_found(method: impl Into<String>) -> Self {
        Self::from_kind(ErrorKind::MethodNotFound, Some(Value::String(method.into())))
    }

    #[must_use]
    pub fn invalid_params(detail: impl Into<String>) -> Self {
        Self::from_kind(ErrorKind::InvalidParams, Some(Value::String(detail.into())))
    }

    #[must_use]
    pub fn internal_error(detail: impl Into<String>) -> Self {
        Self::from_kind(ErrorKind::InternalError, Some(Value::String(detail.into())))
    }

    /// Peer-defined error in the reserved server band.
    #[must_use]
    pub fn server_error(code: i32, message: impl Into<String>) -> Self {
        debug_assert!((SERVER_ERROR_MIN..=SERVER_ERROR_MAX).contains(&code));
        Self::new(code, message)
    }

    #[must_use]
    pub fn kind(&self) -> Option<ErrorKind> {
        ErrorKind::from_code(self.code)
    }

    fn from_value(value: Value) -> Result<Self, ProtocolError> {
        let Value::Object(mut obj) = value else {
            return Err(ProtocolError::InvalidField {
                field: "error",
                reason: "must be an object",
            });
        };

        let code = obj
            .remove("code")
            .and_then(|code| code.as_i64())
            .and_then(|code| i32::try_from(code).ok())
            .ok_or(ProtocolError::InvalidField {
                field: "error.code",
                reason: "must be a 32-bit integer",
            })?;

        let message = match obj.remove("message") {
            Some(Value::String(message)) => message,
            None | Some(Value::Null) => ErrorKind::from_code(code)
                .map(|kind| kind.title().to_string())
                .unwrap_or_default(),
            Some(_) => {
                return Err(ProtocolError::InvalidField {
                    field: "error.message",
                    reason: "must be a string",
                });
            }
        };

        Ok(Self {
            code,
            message,
            data: obj.remove("data"),
        })
    }
}

impl std::fmt::Display for RpcError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "RPC error {}: {}", self.code, self.message)
    }
}

impl std::error::Error for RpcError {}

/// Reasons an inbound line is not a valid message
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("Parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Message is not a JSON object")]
    NotAnObject,

    #[error("Unsupported jsonrpc version: {0}")]
    UnsupportedVersion(Value),

    #[error("Invalid '{field}': {reason}")]
    InvalidField {
        field: &'static str,
        reason: &'static str,
    },

    #[error("Message is neither a request, a notification nor a response")]
    UnknownShape,

    #[error("Message mixes request and reply members")]
    ConflictingMembers,
}

impl ProtocolError {
    /// Taxonomy entry matching this failure.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            ProtocolError::Json(_) => ErrorKind::ParseError,
            _ => ErrorKind::InvalidRequest,
        }
    }
}

/// Any JSON-RPC message
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Message {
    Request(Request),
    Notification(Notification),
    Response(Response),
    ErrorResponse(ErrorResponse),
}

impl Message {
    #[must_use]
    pub fn request(id: RequestId, method: impl Into<String>, params: Option<Value>) -> Self {
        Message::Request(Request {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            method: method.into(),
            params,
        })
    }

    #[must_use]
    pub fn notification(method: impl Into<String>, params: Option<Value>) -> Self {
        Message::Notification(Notification {
            jsonrpc: JSONRPC_VERSION.to_string(),
            method: method.into(),
            params,
        })
    }

    #[must_use]
    pub fn response(id: RequestId, result: Value) -> Self {
        Message::Response(Response {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result,
        })
    }

    #[must_use]
    pub fn error_response(id: RequestId, error: RpcError) -> Self {
        Message::ErrorResponse(ErrorResponse {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            error,
        })
    }

    /// Decode and classify one line of input.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Json`] for malformed JSON and another variant
    /// when the JSON does not have a valid message shape.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, ProtocolError> {
        let value: Value = serde_json::from_slice(bytes)?;
        Self::from_value(value)
    }

    /// Parse a JSON string into a `Message`.
    ///
    /// # Errors
    ///
    /// Same as [`Message::from_slice`].
    pub fn parse(json: &str) -> Result<Self, ProtocolError> {
        Self::from_slice(json.as_bytes())
    }

    /// Classify a decoded JSON value.
    ///
    /// `method` makes it a request (with `id`) or a notification (without).
    /// Otherwise `error` or `result` together with `id` make it a reply. A
    /// `null` error member counts as absent. At most one of `method`,
    /// `result` and `error` may be present.
    ///
    /// # Errors
    ///
    /// Returns a [`ProtocolError`] describing the first rule the value breaks.
    pub fn from_value(value: Value) -> Result<Self, ProtocolError> {
        let Value::Object(mut obj) = value else {
            return Err(ProtocolError::NotAnObject);
        };

        if let Some(version) = obj.remove("jsonrpc")
            && version.as_str() != Some(JSONRPC_VERSION)
        {
            return Err(ProtocolError::UnsupportedVersion(version));
        }

        let id = obj.remove("id").map(parse_id).transpose()?;
        let error = take_non_null(&mut obj, "error");
        let result = obj.remove("result");

        if let Some(method) = obj.remove("method") {
            if result.is_some() || error.is_some() {
                return Err(ProtocolError::ConflictingMembers);
            }
            let Value::String(method) = method else {
                return Err(ProtocolError::InvalidField {
                    field: "method",
                    reason: "must be a string",
                });
            };
            let params = obj.remove("params");

            return Ok(match id {
                Some(id) => Message::request(id, method, params),
                None => Message::notification(method, params),
            });
        }

        let Some(id) = id else {
            return Err(ProtocolError::UnknownShape);
        };

        match (error, result) {
            (Some(_), Some(_)) => Err(ProtocolError::ConflictingMembers),
            (Some(error), None) => Ok(Message::error_response(id, RpcError::from_value(error)?)),
            (None, Some(result)) => Ok(Message::response(id, result)),
            (None, None) => Err(ProtocolError::UnknownShape),
        }
    }

    /// Serialize this message to JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    #[must_use]
    pub fn id(&self) -> Option<&RequestId> {
        match self {
            Message::Request(r) => Some(&r.id),
            Message::Response(r) => Some(&r.id),
            Message::ErrorResponse(r) => Some(&r.id),
            Message::Notification(_) => None,
        }
    }

    #[must_use]
    pub fn method(&self) -> Option<&str> {
        match self {
            Message::Request(r) => Some(&r.method),
            Message::Notification(n) => Some(&n.method),
            Message::Response(_) | Message::ErrorResponse(_) => None,
        }
    }

    #[must_use]
    pub fn is_request(&self) -> bool {
        matches!(self, Message::Request(_))
    }

    #[must_use]
    pub fn is_notification(&self) -> bool {
        matches!(self, Message::Notification(_))
    }

    #[must_use]
    pub fn is_response(&self) -> bool {
        matches!(self, Message::Response(_) | Message::ErrorResponse(_))
    }
}

impl<'de> Deserialize<'de> for Message {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Message::from_value(value).map_err(serde::de::Error::custom)
    }
}

fn parse_id(value: Value) -> Result<RequestId, ProtocolError> {
    match value {
        Value::String(s) => Ok(RequestId::String(s)),
        Value::Number(n) => n.as_i64().map(RequestId::Number).ok_or(ProtocolError::InvalidField {
            field: "id",
            reason: "numeric ids must be integers",
        }),
        _ => Err(ProtocolError::InvalidField {
            field: "id",
            reason: "must be an integer or a string",
        }),
    }
}

fn take_non_null(obj: &mut Map<String, Value>, key: &str) -> Option<Value> {
    obj.remove(key).filter(|value| !value.is_null())
}
