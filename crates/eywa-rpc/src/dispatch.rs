//! Routing of inbound requests and notifications to registered handlers.

use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use serde_json::Value;
use tracing::{debug, error, warn};

use crate::protocol::{Message, RequestId, RpcError};

pub type HandlerResult = Result<Value, RpcError>;

/// Something that can answer a method call.
///
/// Implemented for any `Fn(Option<Value>) -> impl Future<Output = HandlerResult>`
/// so plain async closures can be registered directly.
pub trait Handler: Send + Sync + 'static {
    fn handle(&self, params: Option<Value>) -> BoxFuture<'static, HandlerResult>;
}

impl<F, Fut> Handler for F
where
    F: Fn(Option<Value>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    fn handle(&self, params: Option<Value>) -> BoxFuture<'static, HandlerResult> {
        Box::pin(self(params))
    }
}

/// Method name to handler table
#[derive(Default, Clone)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn Handler>>,
}

impl HandlerRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `method`. Returns `true` if an earlier handler
    /// for the same method was replaced.
    pub fn register(&mut self, method: impl Into<String>, handler: impl Handler) -> bool {
        self.handlers
            .insert(method.into(), Arc::new(handler))
            .is_some()
    }

    #[must_use]
    pub fn contains(&self, method: &str) -> bool {
        self.handlers.contains_key(method)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Run the handler for a request and build the reply.
    pub async fn dispatch(&self, id: RequestId, method: &str, params: Option<Value>) -> Message {
        let Some(handler) = self.handlers.get(method).cloned() else {
            debug!(%id, method, "No handler registered");
            return Message::error_response(id, RpcError::method_not_found(method));
        };

        match invoke(handler, method, params).await {
            Ok(result) => Message::response(id, result),
            Err(error) => Message::error_response(id, error),
        }
    }

    /// Run the handler for a notification. Unknown methods are dropped.
    pub async fn dispatch_notification(&self, method: &str, params: Option<Value>) {
        let Some(handler) = self.handlers.get(method).cloned() else {
            debug!(method, "Dropping notification without handler");
            return;
        };

        if let Err(e) = invoke(handler, method, params).await {
            warn!(method, code = e.code, "Notification handler failed: {}", e.message);
        }
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut methods: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        methods.sort_unstable();
        f.debug_struct("HandlerRegistry")
            .field("methods", &methods)
            .finish()
    }
}

async fn invoke(handler: Arc<dyn Handler>, method: &str, params: Option<Value>) -> HandlerResult {
    match AssertUnwindSafe(handler.handle(params)).catch_unwind().await {
        Ok(result) => result,
        Err(panic) => {
            let detail = panic_message(panic.as_ref());
            error!(method, "Handler panicked: {detail}");
            Err(RpcError::internal_error(detail))
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "handler panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{ErrorResponse, INTERNAL_ERROR, METHOD_NOT_FOUND, Response};
    use serde_json::json;

    fn registry() -> HandlerRegistry {
        let mut registry = HandlerRegistry::new();
        registry.register("echo", |params: Option<Value>| async move {
            Ok::<_, RpcError>(params.unwrap_or(Value::Null))
        });
        registry.register("fail", |_params: Option<Value>| async move {
            Err::<Value, _>(RpcError::invalid_params("missing 'query'"))
        });
        registry
    }

    #[tokio::test]
    async fn test_dispatch_echo() {
        let reply = registry()
            .dispatch(7.into(), "echo", Some(json!({"x": 1})))
            .await;

        let Message::Response(Response { id, result, .. }) = reply else {
            panic!("Expected Response, got {reply:?}");
        };
        assert_eq!(id, RequestId::Number(7));
        assert_eq!(result, json!({"x": 1}));
    }

    #[tokio::test]
    async fn test_dispatch_unknown_method() {
        let reply = registry().dispatch(3.into(), "nope", None).await;

        let Message::ErrorResponse(ErrorResponse { id, error, .. }) = reply else {
            panic!("Expected ErrorResponse, got {reply:?}");
        };
        assert_eq!(id, RequestId::Number(3));
        assert_eq!(error.code, METHOD_NOT_FOUND);
        assert_eq!(error.data, Some(json!("nope")));
    }

    #[tokio::test]
    async fn test_dispatch_handler_error_passes_through() {
        let reply = registry().dispatch("q".into(), "fail", None).await;

        let Message::ErrorResponse(ErrorResponse { error, .. }) = reply else {
            panic!("Expected ErrorResponse");
        };
        assert_eq!(error.message, "Invalid params");
        assert_eq!(error.data, Some(json!("missing 'query'")));
    }

    #[tokio::test]
    async fn test_dispatch_panic_becomes_internal_error() {
        let mut registry = HandlerRegistry::new();
        registry.register("boom", |_params: Option<Value>| async move {
            if true {
                panic!("kaboom");
            }
            Ok::<_, RpcError>(Value::Null)
        });

        let reply = registry.dispatch(1.into(), "boom", None).await;

        let Message::ErrorResponse(ErrorResponse { error, .. }) = reply else {
            panic!("Expected ErrorResponse");
        };
        assert_eq!(error.code, INTERNAL_ERROR);
        assert_eq!(error.data, Some(json!("kaboom")));
    }

    #[tokio::test]
    async fn test_dispatch_notification_runs_handler() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let mut registry = HandlerRegistry::new();
        registry.register("update", move |params: Option<Value>| {
            let tx = tx.clone();
            async move {
                tx.send(params).ok();
                Ok::<_, RpcError>(Value::Null)
            }
        });

        registry
            .dispatch_notification("update", Some(json!({"status": "PROCESSING"})))
            .await;
        registry.dispatch_notification("unknown", None).await;

        assert_eq!(rx.recv().await, Some(Some(json!({"status": "PROCESSING"}))));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_register_replaces() {
        let mut registry = registry();
        assert_eq!(registry.len(), 2);
        let replaced = registry.register("echo", |_params: Option<Value>| async move {
            Ok::<_, RpcError>(json!(1))
        });
        assert!(replaced);
        assert_eq!(registry.len(), 2);
        assert!(registry.contains("fail"));
        assert!(!registry.is_empty());
    }

    #[test]
    fn test_debug_lists_methods() {
        let debug = format!("{:?}", registry());
        assert!(debug.contains("echo"));
        assert!(debug.contains("fail"));
    }
}
