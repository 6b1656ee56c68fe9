//! # Switchboard Core Library
//!
//! Command-dispatch framework for TCP services: applications declare
//! handlers as metadata attached to ordinary values, the framework freezes
//! them into an immutable routing table at startup, and every accepted
//! connection runs its own non-blocking pipeline of
//! decode -> validate -> dispatch -> encode -> write under backpressure.
//!
//! ## Design Principles
//! * Async-first: all I/O paths are non-blocking (Tokio + async traits).
//! * Handlers are data: descriptors built once, frozen, shared lock-free.
//! * Codec-agnostic core: the envelope contract is the only wire assumption.
//! * Per-request failures become error envelopes, never pipeline crashes.
//! * End-to-end flow control: reads gate on in-flight slots, stream
//!   production gates on the outbound queue.
//!
//! ## Key Modules
//! * `config` – Runtime configuration tables (TOML-deserializable).
//! * `metadata` – Descriptors, parameter specs, constraint rules.
//! * `registry` – Candidate scan, duplicate detection, frozen routing table.
//! * `validation` – Constraint evaluation with complete violation collection.
//! * `wire` – Message envelope, codec contract, framing strategies.
//! * `pipeline` – Per-connection state machine, sessions, listener.
//! * `dispatch` – Handler invocation, outcome adaptation, middleware.
//! * `events` – Structured logging/events dispatcher.

pub mod config;
pub mod constants;
pub mod dispatch;
pub mod events;
pub mod metadata;
pub mod pipeline;
pub mod prelude; // curated stable-intent re-exports
pub mod registry;
pub mod validation;
pub mod wire;

use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::watch;

use crate::config::Config;
use crate::dispatch::dispatcher::Dispatcher;
use crate::dispatch::middleware::Middleware;
use crate::events::{
    dispatcher as event_dispatcher,
    model::{LogEvent, LogLevel, ServerEvent},
};
use crate::pipeline::connection::Pipeline;
use crate::pipeline::listener::run_listener;
use crate::pipeline::sessions::SessionRegistry;
use crate::registry::builder::{RegistrationError, RegistryBuilder};
use crate::registry::set::HandlerSet;
use crate::registry::table::RoutingTable;
use crate::wire::codec::{JsonCodec, WireCodec};
use crate::wire::envelope::{ErrorBody, ErrorKind, MessageEnvelope};
use crate::wire::framing::{self, Framing};

#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Registration(#[from] RegistrationError),
    #[error("configuration error: {0}")]
    Config(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Assembles a Server: config plus handler sets, middleware, and optional
/// codec/framing overrides. `build` runs the registry scan; registration
/// failures abort before any socket is bound.
pub struct ServerBuilder {
    config: Config,
    registry: RegistryBuilder,
    middleware: Vec<Arc<dyn Middleware>>,
    codec: Option<Arc<dyn WireCodec>>,
    framing: Option<Arc<dyn Framing>>,
}

impl ServerBuilder {
    pub fn handlers(mut self, set: Box<dyn HandlerSet>) -> Self {
        self.registry = self.registry.register(set);
        self
    }

    pub fn middleware(mut self, middleware: Arc<dyn Middleware>) -> Self {
        self.middleware.push(middleware);
        self
    }

    pub fn codec(mut self, codec: Arc<dyn WireCodec>) -> Self {
        self.codec = Some(codec);
        self
    }

    pub fn framing(mut self, framing: Arc<dyn Framing>) -> Self {
        self.framing = Some(framing);
        self
    }

    pub fn build(self) -> Result<Server, ServerError> {
        let framing = match self.framing {
            Some(f) => f,
            None => framing::from_config(&self.config.framing()).map_err(ServerError::Config)?,
        };
        let codec = self
            .codec
            .unwrap_or_else(|| Arc::new(JsonCodec) as Arc<dyn WireCodec>);
        let table = Arc::new(self.registry.build()?);
        let middleware = Arc::new(self.middleware);
        let dispatcher = Arc::new(Dispatcher::new(table.clone(), middleware.clone()));
        let pipeline = Pipeline {
            dispatcher,
            codec,
            framing,
            sessions: SessionRegistry::new(),
            middleware,
            config: self.config.pipeline(),
        };
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Ok(Server {
            config: self.config,
            table,
            pipeline,
            shutdown_tx: Arc::new(shutdown_tx),
            shutdown_rx,
        })
    }
}

/// A built server: frozen routing table, shared pipeline parts, shutdown
/// signal. Wrap in Arc to drive `serve` from a spawned task.
pub struct Server {
    config: Config,
    table: Arc<RoutingTable>,
    pipeline: Pipeline,
    shutdown_tx: Arc<watch::Sender<bool>>,
    shutdown_rx: watch::Receiver<bool>,
}

impl Server {
    pub fn builder(config: Config) -> ServerBuilder {
        ServerBuilder {
            config,
            registry: RegistryBuilder::new(),
            middleware: Vec::new(),
            codec: None,
            framing: None,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn routing_table(&self) -> &Arc<RoutingTable> {
        &self.table
    }

    pub fn sessions(&self) -> &SessionRegistry {
        &self.pipeline.sessions
    }

    /// The shared pipeline, exposed so embedders can drive connections over
    /// non-TCP transports (any AsyncRead + AsyncWrite stream).
    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            tx: self.shutdown_tx.clone(),
        }
    }

    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    /// Bind the configured port and serve until shutdown.
    pub async fn serve(&self) -> Result<(), ServerError> {
        let listener = TcpListener::bind(("0.0.0.0", self.config.port)).await?;
        self.serve_with(listener).await
    }

    /// Serve on an already bound listener (lets callers bind port 0 and read
    /// the local address first).
    pub async fn serve_with(&self, listener: TcpListener) -> Result<(), ServerError> {
        emit_server_event(
            LogLevel::Info,
            "server_start",
            Some(format!(
                "addr={} commands={}",
                listener
                    .local_addr()
                    .map(|a| a.to_string())
                    .unwrap_or_else(|_| "unknown".into()),
                self.table.len()
            )),
        );
        emit_server_event(LogLevel::Debug, "routing_report", Some(self.table.report()));

        run_listener(self.pipeline.clone(), listener, self.shutdown_rx.clone()).await;

        self.drain_sessions().await;
        emit_server_event(LogLevel::Info, "server_stop", None);
        Ok(())
    }

    /// Notify every open session, cancel their outstanding work, and wait
    /// for the pipelines to unregister themselves within the drain deadline.
    async fn drain_sessions(&self) {
        let notice = MessageEnvelope::error(
            "server.shutdown",
            serde_json::Value::Null,
            &ErrorBody::new(ErrorKind::Protocol, "server is shutting down"),
        );
        let notified = self.pipeline.sessions.broadcast(notice).await;
        emit_server_event(
            LogLevel::Info,
            "shutdown_notice",
            Some(format!("sessions={}", notified)),
        );
        self.pipeline.sessions.cancel_all().await;

        let deadline = Instant::now() + self.config.pipeline().drain_timeout();
        while self.pipeline.sessions.count().await > 0 && Instant::now() < deadline {
            tokio::time::sleep(std::time::Duration::from_millis(25)).await;
        }
    }
}

/// Cloneable handle for triggering shutdown from another task.
#[derive(Clone)]
pub struct ShutdownHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl ShutdownHandle {
    pub fn shutdown(&self) {
        let _ = self.tx.send(true);
    }
}

fn emit_server_event(level: LogLevel, action: &str, detail: Option<String>) {
    let mut meta = event_dispatcher::meta("server", level);
    meta.corr_id = Some(event_dispatcher::correlation_id());
    event_dispatcher::emit(LogEvent::Server(ServerEvent {
        meta,
        action: action.to_string(),
        detail,
    }));
}
