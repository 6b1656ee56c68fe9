// src/dispatch/dispatcher.rs
// Resolves a request to a registry entry, invokes the handler, and adapts
// its outcome into terminal envelopes. Every per-request failure ends here
// as an error envelope; nothing propagates into the pipeline state machine.

use std::sync::Arc;
use tokio::sync::mpsc;

use crate::dispatch::events::emit_dispatch_event;
use crate::dispatch::middleware::Middleware;
use crate::dispatch::outcome::{CommandCall, Outcome};
use crate::events::model::LogLevel;
use crate::metadata::ReturnKind;
use crate::pipeline::context::ConnectionContext;
use crate::registry::table::RoutingTable;
use crate::validation::{validate, ValidationResult};
use crate::wire::envelope::{ErrorBody, ErrorKind, MessageEnvelope};

pub struct Dispatcher {
    table: Arc<RoutingTable>,
    middleware: Arc<Vec<Arc<dyn Middleware>>>,
}

impl Dispatcher {
    pub fn new(table: Arc<RoutingTable>, middleware: Arc<Vec<Arc<dyn Middleware>>>) -> Self {
        Self { table, middleware }
    }

    pub fn table(&self) -> &Arc<RoutingTable> {
        &self.table
    }

    /// Produce the terminal envelope(s) for one request envelope.
    pub async fn dispatch(
        &self,
        ctx: Arc<ConnectionContext>,
        envelope: MessageEnvelope,
        out: mpsc::Sender<MessageEnvelope>,
    ) {
        for mw in self.middleware.iter() {
            mw.before_dispatch(&ctx, &envelope).await;
        }

        let descriptor = match self.table.lookup(&envelope.command) {
            Some(d) => d.clone(),
            None => {
                let detail = format!("no handler for command '{}'", envelope.command);
                for mw in self.middleware.iter() {
                    mw.on_exception(&ctx, &detail).await;
                }
                emit_dispatch_event(
                    LogLevel::Warn,
                    "not_found",
                    ctx.id(),
                    Some(envelope.command.clone()),
                    None,
                );
                let body = ErrorBody::new(ErrorKind::NotFound, detail);
                let _ = out
                    .send(MessageEnvelope::error(
                        envelope.command.clone(),
                        envelope.correlation.clone(),
                        &body,
                    ))
                    .await;
                return;
            }
        };

        if let Some(dep) = &descriptor.deprecated {
            emit_dispatch_event(
                LogLevel::Warn,
                "deprecated_command",
                ctx.id(),
                Some(descriptor.command.qualified()),
                Some(match &dep.message {
                    Some(msg) => format!("since={} {}", dep.since, msg),
                    None => format!("since={}", dep.since),
                }),
            );
        }

        let args = match validate(&descriptor, &envelope.payload) {
            ValidationResult::Accepted(args) => args,
            ValidationResult::Rejected(violations) => {
                emit_dispatch_event(
                    LogLevel::Warn,
                    "validation_failed",
                    ctx.id(),
                    Some(envelope.command.clone()),
                    Some(format!("violations={}", violations.len())),
                );
                let body = ErrorBody::new(
                    ErrorKind::ValidationFailed,
                    format!("validation failed for '{}'", envelope.command),
                )
                .with_violations(violations);
                let _ = out
                    .send(MessageEnvelope::error(
                        envelope.command.clone(),
                        envelope.correlation.clone(),
                        &body,
                    ))
                    .await;
                return;
            }
        };

        let call = CommandCall {
            args,
            context: ctx.clone(),
        };
        let invocation = (descriptor.handler.as_ref())(call);

        if descriptor.return_kind == ReturnKind::FireAndForget {
            // Complete on successful invocation start; failures are logged,
            // never sent, there is no envelope to attach them to.
            let middleware = self.middleware.clone();
            let task_ctx = ctx.clone();
            let command = envelope.command.clone();
            tokio::spawn(async move {
                if let Err(failure) = invocation.await {
                    for mw in middleware.iter() {
                        mw.on_exception(&task_ctx, &failure.message).await;
                    }
                    emit_dispatch_event(
                        LogLevel::Error,
                        "fire_and_forget_failed",
                        task_ctx.id(),
                        Some(command),
                        Some(failure.message),
                    );
                }
            });
            for mw in self.middleware.iter() {
                mw.after_dispatch(&ctx, &envelope).await;
            }
            emit_dispatch_event(
                LogLevel::Debug,
                "fire_and_forget_started",
                ctx.id(),
                Some(envelope.command.clone()),
                None,
            );
            return;
        }

        // Spawned so a panicking handler surfaces as a join error instead of
        // tearing down the connection task.
        let outcome = match tokio::spawn(invocation).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(failure)) => {
                self.handler_failure(&ctx, &envelope, &out, failure.message).await;
                return;
            }
            Err(join_err) => {
                let message = if join_err.is_panic() {
                    "handler panicked".to_string()
                } else {
                    "handler task cancelled".to_string()
                };
                self.handler_failure(&ctx, &envelope, &out, message).await;
                return;
            }
        };

        match (descriptor.return_kind, outcome) {
            (ReturnKind::Single, Outcome::Single(value)) => {
                let _ = out
                    .send(MessageEnvelope::response(
                        envelope.command.clone(),
                        envelope.correlation.clone(),
                        value,
                    ))
                    .await;
                for mw in self.middleware.iter() {
                    mw.after_dispatch(&ctx, &envelope).await;
                }
                emit_dispatch_event(
                    LogLevel::Debug,
                    "completed",
                    ctx.id(),
                    Some(envelope.command.clone()),
                    None,
                );
            }
            (ReturnKind::Stream, Outcome::Stream(rx)) => {
                match self.pump_stream(&ctx, &envelope, rx, &out).await {
                    Some(items) => {
                        for mw in self.middleware.iter() {
                            mw.after_dispatch(&ctx, &envelope).await;
                        }
                        emit_dispatch_event(
                            LogLevel::Debug,
                            "stream_completed",
                            ctx.id(),
                            Some(envelope.command.clone()),
                            Some(format!("items={}", items)),
                        );
                    }
                    None => {
                        emit_dispatch_event(
                            LogLevel::Debug,
                            "stream_cancelled",
                            ctx.id(),
                            Some(envelope.command.clone()),
                            None,
                        );
                    }
                }
            }
            (kind, other) => {
                let message = format!(
                    "handler returned {} but command declares {}",
                    other.describe(),
                    kind.label()
                );
                self.handler_failure(&ctx, &envelope, &out, message).await;
            }
        }
    }

    /// Forward stream items until the handler closes its sender, the
    /// connection cancels, or the peer goes away. Returns the item count on
    /// normal completion, None when cancelled (no stream-end is sent then;
    /// nothing may follow a cancellation).
    async fn pump_stream(
        &self,
        ctx: &Arc<ConnectionContext>,
        envelope: &MessageEnvelope,
        mut rx: mpsc::Receiver<serde_json::Value>,
        out: &mpsc::Sender<MessageEnvelope>,
    ) -> Option<u64> {
        if ctx.cancelled() {
            return None;
        }
        let mut cancel = ctx.cancel_signal();
        let mut items = 0u64;
        loop {
            tokio::select! {
                _ = cancel.changed() => return None,
                item = rx.recv() => match item {
                    Some(value) => {
                        let sent = out
                            .send(MessageEnvelope::stream_item(
                                envelope.command.clone(),
                                envelope.correlation.clone(),
                                value,
                            ))
                            .await;
                        if sent.is_err() {
                            return None;
                        }
                        items += 1;
                    }
                    None => {
                        let _ = out
                            .send(MessageEnvelope::stream_end(
                                envelope.command.clone(),
                                envelope.correlation.clone(),
                            ))
                            .await;
                        return Some(items);
                    }
                }
            }
        }
    }

    async fn handler_failure(
        &self,
        ctx: &Arc<ConnectionContext>,
        envelope: &MessageEnvelope,
        out: &mpsc::Sender<MessageEnvelope>,
        message: String,
    ) {
        for mw in self.middleware.iter() {
            mw.on_exception(ctx, &message).await;
        }
        emit_dispatch_event(
            LogLevel::Error,
            "handler_failure",
            ctx.id(),
            Some(envelope.command.clone()),
            Some(message.clone()),
        );
        let body = ErrorBody::new(ErrorKind::HandlerFailure, message);
        let _ = out
            .send(MessageEnvelope::error(
                envelope.command.clone(),
                envelope.correlation.clone(),
                &body,
            ))
            .await;
    }
}
