//! Line-delimited JSON-RPC 2.0 for EYWA task processes.
//!
//! A task process talks to its EYWA host over stdin/stdout: one JSON message
//! per line, in both directions. Either side may issue requests and
//! notifications at any time.
//!
//! # Architecture
//!
//! - [`protocol`]: message types and the inbound classifier
//! - [`transport`]: newline framing codec
//! - [`dispatch`]: handler trait and method registry
//! - [`connection`]: reader task, pending-call correlation, outbound writer
//! - [`error`]: error taxonomy and the crate `Error`
//!
//! # Example
//!
//! ```no_run
//! use eywa_rpc::{Connection, RpcError};
//! use serde_json::{Value, json};
//!
//! # async fn example() -> eywa_rpc::Result<()> {
//! let conn = Connection::builder()
//!     .register_handler("ping", |_params: Option<Value>| async move {
//!         Ok::<_, RpcError>(json!("pong"))
//!     })
//!     .open_stdio();
//!
//! let task = conn.call("task.get", None).await?;
//! conn.notify("task.log", Some(json!({"event": "INFO", "message": "started"}))).await?;
//! println!("{task}");
//! conn.close().await;
//! # Ok(())
//! # }
//! ```

pub mod connection;
pub mod dispatch;
pub mod error;
pub mod protocol;
pub mod transport;

pub use connection::{Connection, ConnectionBuilder, ConnectionConfig};
pub use dispatch::{Handler, HandlerRegistry, HandlerResult};
pub use error::{Error, ErrorKind, RemoteError, Result};
pub use protocol::{
    ErrorResponse, INTERNAL_ERROR, INVALID_PARAMS, INVALID_REQUEST, JSONRPC_VERSION,
    METHOD_NOT_FOUND, Message, Notification, PARSE_ERROR, ProtocolError, Request, RequestId,
    Response, RpcError, SERVER_ERROR_MAX, SERVER_ERROR_MIN,
};
pub use transport::{CodecError, DEFAULT_MAX_LINE_LENGTH, Frame, JsonLineCodec};
