//! JSON-RPC connection over a pair of byte streams.
//!
//! A [`Connection`] owns a background reader that classifies every inbound
//! line. Replies resolve the matching pending call, requests and
//! notifications are handed to the [`HandlerRegistry`] on their own task so a
//! slow handler never stalls the reader.
//!
//! Outbound messages share one writer behind a mutex; each message is written
//! and flushed as a whole line before the lock is released.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{Mutex, oneshot};
use tokio::task::JoinHandle;
use tokio_util::codec::{FramedRead, FramedWrite};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, trace, warn};

use crate::dispatch::{Handler, HandlerRegistry};
use crate::error::{Error, Result};
use crate::protocol::{ErrorResponse, Message, Notification, Request, RequestId, Response, RpcError};
use crate::transport::{DEFAULT_MAX_LINE_LENGTH, Frame, JsonLineCodec};

type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Pending call waiting for its reply
type PendingCall = oneshot::Sender<std::result::Result<Value, RpcError>>;

/// Connection tuning
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Upper bound on how long `call` waits for a reply. `None` waits forever.
    pub call_timeout: Option<Duration>,
    /// Inbound lines longer than this are dropped.
    pub max_line_length: usize,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            call_timeout: None,
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
        }
    }
}

impl ConnectionConfig {
    #[must_use]
    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn with_max_line_length(mut self, max_line_length: usize) -> Self {
        self.max_line_length = max_line_length;
        self
    }
}

/// Collects handlers and settings, then opens a [`Connection`].
#[derive(Debug, Default)]
pub struct ConnectionBuilder {
    config: ConnectionConfig,
    handlers: HandlerRegistry,
}

impl ConnectionBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn config(mut self, config: ConnectionConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn register_handler(mut self, method: impl Into<String>, handler: impl Handler) -> Self {
        let method = method.into();
        if self.handlers.register(method.clone(), handler) {
            warn!(method, "Replacing previously registered handler");
        }
        self
    }

    #[must_use]
    pub fn handlers(mut self, handlers: HandlerRegistry) -> Self {
        self.handlers = handlers;
        self
    }

    /// Start the connection over the given streams.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn open<R, W>(self, reader: R, writer: W) -> Connection
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let max_line_length = self.config.max_line_length;
        let shared = Arc::new(Shared {
            writer: Mutex::new(FramedWrite::new(
                Box::new(writer) as BoxedWriter,
                JsonLineCodec::with_max_length(max_line_length),
            )),
            pending: Mutex::new(HashMap::new()),
            next_id: AtomicI64::new(1),
            dropped: AtomicU64::new(0),
            call_timeout: self.config.call_timeout,
            cancel: CancellationToken::new(),
        });

        let frames = FramedRead::new(reader, JsonLineCodec::with_max_length(max_line_length));
        let reader_task = tokio::spawn(read_loop(
            frames,
            Arc::clone(&shared),
            Arc::new(self.handlers),
        ));

        debug!(max_line_length, "Connection opened");

        Connection {
            shared,
            reader_task: Arc::new(Mutex::new(Some(reader_task))),
        }
    }

    /// Start the connection over the process's stdin and stdout.
    pub fn open_stdio(self) -> Connection {
        self.open(tokio::io::stdin(), tokio::io::stdout())
    }
}

struct Shared {
    writer: Mutex<FramedWrite<BoxedWriter, JsonLineCodec>>,
    pending: Mutex<HashMap<RequestId, PendingCall>>,
    next_id: AtomicI64,
    dropped: AtomicU64,
    call_timeout: Option<Duration>,
    cancel: CancellationToken,
}

impl Shared {
    async fn send(&self, message: Message) -> Result<()> {
        let mut writer = self.writer.lock().await;
        writer.send(message).await?;
        Ok(())
    }

    async fn resolve(&self, id: RequestId, outcome: std::result::Result<Value, RpcError>) {
        let waiter = self.pending.lock().await.remove(&id);
        match waiter {
            Some(tx) => {
                if tx.send(outcome).is_err() {
                    debug!(%id, "Caller stopped waiting before the reply arrived");
                }
            }
            None => warn!(%id, "Dropping reply with no pending call"),
        }
    }

    /// Dropping the senders wakes every waiter with `ConnectionClosed`.
    async fn fail_pending(&self) {
        let drained: Vec<_> = self.pending.lock().await.drain().collect();
        if !drained.is_empty() {
            debug!(count = drained.len(), "Failing outstanding calls");
        }
    }

    fn drop_message(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }
}

/// Handle to an open connection. Cheap to clone; all clones share the same
/// streams and pending-call table.
#[derive(Clone)]
pub struct Connection {
    shared: Arc<Shared>,
    reader_task: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl Connection {
    #[must_use]
    pub fn builder() -> ConnectionBuilder {
        ConnectionBuilder::new()
    }

    /// Send a request and wait for its reply.
    ///
    /// # Errors
    ///
    /// - [`Error::Rpc`] when the peer answers with an error object
    /// - [`Error::Timeout`] when a call timeout is configured and elapses
    /// - [`Error::ConnectionClosed`] when the connection ends first
    /// - [`Error::Codec`] when the request cannot be written
    pub async fn call(&self, method: &str, params: Option<Value>) -> Result<Value> {
        if self.is_closed() {
            return Err(Error::ConnectionClosed);
        }

        let id = RequestId::Number(self.shared.next_id.fetch_add(1, Ordering::SeqCst));
        let (tx, rx) = oneshot::channel();
        self.shared.pending.lock().await.insert(id.clone(), tx);

        // A close racing the insert above has already drained the table
        if self.is_closed() {
            self.shared.pending.lock().await.remove(&id);
            return Err(Error::ConnectionClosed);
        }

        if let Err(e) = self
            .shared
            .send(Message::request(id.clone(), method, params))
            .await
        {
            self.shared.pending.lock().await.remove(&id);
            return Err(e);
        }
        trace!(%id, method, "Request sent");

        let outcome = match self.shared.call_timeout {
            Some(limit) => {
                if let Ok(outcome) = tokio::time::timeout(limit, rx).await {
                    outcome
                } else {
                    self.shared.pending.lock().await.remove(&id);
                    debug!(%id, method, "Call timed out");
                    return Err(Error::Timeout);
                }
            }
            None => rx.await,
        };

        match outcome {
            Ok(Ok(result)) => Ok(result),
            Ok(Err(error)) => Err(error.into()),
            Err(_) => Err(Error::ConnectionClosed),
        }
    }

    /// Send a request and deserialize the reply.
    ///
    /// # Errors
    ///
    /// Same as [`Connection::call`], plus [`Error::Json`] if the result does
    /// not match `T`.
    pub async fn call_as<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Option<Value>,
    ) -> Result<T> {
        let result = self.call(method, params).await?;
        Ok(serde_json::from_value(result)?)
    }

    /// Send a notification. Returns once the line has been written and
    /// flushed, so a full output pipe blocks the caller until the peer reads.
    /// The reader loop is never blocked by it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionClosed`] after close, or [`Error::Codec`]
    /// if writing fails.
    pub async fn notify(&self, method: &str, params: Option<Value>) -> Result<()> {
        if self.is_closed() {
            return Err(Error::ConnectionClosed);
        }
        self.shared
            .send(Message::notification(method, params))
            .await
    }

    /// Stop the reader, fail outstanding calls and shut down the writer.
    pub async fn close(&self) {
        self.shared.cancel.cancel();

        let reader_task = self.reader_task.lock().await.take();
        if let Some(handle) = reader_task
            && let Err(e) = handle.await
            && e.is_panic()
        {
            error!("Reader task panicked: {e}");
        }

        self.shared.fail_pending().await;

        let mut writer = self.shared.writer.lock().await;
        if let Err(e) = writer.close().await {
            debug!("Error closing writer: {e}");
        }
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.shared.cancel.is_cancelled()
    }

    /// Number of calls still waiting for a reply.
    pub async fn pending_calls(&self) -> usize {
        self.shared.pending.lock().await.len()
    }

    /// Inbound lines that were dropped as malformed, invalid or oversized.
    #[must_use]
    pub fn dropped_messages(&self) -> u64 {
        self.shared.dropped.load(Ordering::Relaxed)
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("closed", &self.is_closed())
            .field("dropped_messages", &self.dropped_messages())
            .finish_non_exhaustive()
    }
}

async fn read_loop<R>(
    mut frames: FramedRead<R, JsonLineCodec>,
    shared: Arc<Shared>,
    handlers: Arc<HandlerRegistry>,
) where
    R: AsyncRead + Unpin,
{
    loop {
        let next = tokio::select! {
            biased;
            () = shared.cancel.cancelled() => {
                debug!("Reader stopped");
                break;
            }
            next = frames.next() => next,
        };

        match next {
            Some(Ok(Frame::Line(line))) => route(&shared, &handlers, &line).await,
            Some(Ok(Frame::Oversized(len))) => {
                shared.drop_message();
                warn!(len, "Dropping oversized line");
            }
            Some(Err(e)) => {
                error!("Failed to read input: {e}");
                break;
            }
            None => {
                debug!("Input closed");
                break;
            }
        }
    }

    shared.cancel.cancel();
    shared.fail_pending().await;
}

async fn route(shared: &Arc<Shared>, handlers: &Arc<HandlerRegistry>, line: &[u8]) {
    let message = match Message::from_slice(line) {
        Ok(message) => message,
        Err(e) => {
            shared.drop_message();
            warn!(kind = %e.kind(), "Dropping invalid message: {e}");
            return;
        }
    };

    match message {
        Message::Request(Request {
            id, method, params, ..
        }) => {
            trace!(%id, method, "Request received");
            let shared = Arc::clone(shared);
            let handlers = Arc::clone(handlers);
            tokio::spawn(async move {
                let reply = handlers.dispatch(id, &method, params).await;
                if let Err(e) = shared.send(reply).await {
                    warn!(method, "Failed to send reply: {e}");
                }
            });
        }
        Message::Notification(Notification { method, params, .. }) => {
            trace!(method, "Notification received");
            let handlers = Arc::clone(handlers);
            tokio::spawn(async move {
                handlers.dispatch_notification(&method, params).await;
            });
        }
        Message::Response(Response { id, result, .. }) => shared.resolve(id, Ok(result)).await,
        Message::ErrorResponse(ErrorResponse { id, error, .. }) => {
            shared.resolve(id, Err(error)).await;
        }
    }
}
