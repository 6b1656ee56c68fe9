// src/dispatch/middleware.rs

use async_trait::async_trait;

use crate::pipeline::context::ConnectionContext;
use crate::wire::envelope::MessageEnvelope;

/// Cross-cutting hooks around the connection and dispatch lifecycle. All
/// hooks default to no-ops; implement only what you need. Hooks must not
/// block for long, they run inline on the pipeline.
#[async_trait]
pub trait Middleware: Send + Sync {
    async fn on_connect(&self, _ctx: &ConnectionContext) {}

    async fn before_dispatch(&self, _ctx: &ConnectionContext, _envelope: &MessageEnvelope) {}

    /// Runs only after a successful handler invocation.
    async fn after_dispatch(&self, _ctx: &ConnectionContext, _envelope: &MessageEnvelope) {}

    /// Any request-scoped failure: unknown command, handler failure, hook failure.
    async fn on_exception(&self, _ctx: &ConnectionContext, _detail: &str) {}

    async fn on_timeout(&self, _ctx: &ConnectionContext) {}

    async fn on_disconnect(&self, _ctx: &ConnectionContext) {}

    /// Malformed wire data or an envelope kind the server cannot accept.
    async fn on_protocol_error(&self, _ctx: &ConnectionContext, _detail: &str) {}
}
