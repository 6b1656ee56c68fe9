// src/dispatch/outcome.rs

use serde_json::{Map, Value};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::pipeline::context::ConnectionContext;

/// What a handler produced, adapted by the dispatcher against the declared
/// return kind.
#[derive(Debug)]
pub enum Outcome {
    /// Exactly one response value
    Single(Value),
    /// A lazy sequence of values; closing the sender ends the stream
    Stream(mpsc::Receiver<Value>),
    /// Void acknowledgment (fire-and-forget)
    Done,
}

impl Outcome {
    /// Convenience for stream handlers: returns the producing side plus the
    /// outcome wrapping the consuming side.
    pub fn stream(capacity: usize) -> (mpsc::Sender<Value>, Outcome) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (tx, Outcome::Stream(rx))
    }

    pub fn describe(&self) -> &'static str {
        match self {
            Outcome::Single(_) => "a single value",
            Outcome::Stream(_) => "a stream",
            Outcome::Done => "no value",
        }
    }
}

/// Failure signal returned by a handler. Converted to a handler-failure
/// error envelope; never allowed to take the connection down.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct HandlerFailure {
    pub message: String,
}

impl HandlerFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<&str> for HandlerFailure {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

impl From<String> for HandlerFailure {
    fn from(message: String) -> Self {
        Self { message }
    }
}

/// One validated invocation: normalized arguments keyed by parameter name,
/// plus the owning connection's context for session state and cancellation.
pub struct CommandCall {
    pub args: Map<String, Value>,
    pub context: Arc<ConnectionContext>,
}

impl CommandCall {
    pub fn arg(&self, name: &str) -> Option<&Value> {
        self.args.get(name)
    }

    /// Text argument helper; validation guarantees the type for declared
    /// text parameters.
    pub fn text_arg(&self, name: &str) -> Option<&str> {
        self.args.get(name).and_then(Value::as_str)
    }

    pub fn int_arg(&self, name: &str) -> Option<i64> {
        self.args.get(name).and_then(Value::as_i64)
    }

    /// True once the connection is closing; stream handlers should stop
    /// producing when this flips.
    pub fn cancelled(&self) -> bool {
        self.context.cancelled()
    }

    /// Watch receiver that flips to true on cancellation, for use in select
    /// loops inside long-running handlers.
    pub fn cancel_signal(&self) -> tokio::sync::watch::Receiver<bool> {
        self.context.cancel_signal()
    }
}

pub type HandlerFuture = Pin<Box<dyn Future<Output = Result<Outcome, HandlerFailure>> + Send>>;

/// The opaque invocable stored in a descriptor.
pub type HandlerFn = Arc<dyn Fn(CommandCall) -> HandlerFuture + Send + Sync>;

/// Wrap an async closure into the opaque invocable form.
pub fn handler_fn<F, Fut>(f: F) -> HandlerFn
where
    F: Fn(CommandCall) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Outcome, HandlerFailure>> + Send + 'static,
{
    Arc::new(move |call| -> HandlerFuture { Box::pin(f(call)) })
}
