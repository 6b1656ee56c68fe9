// src/pipeline/connection.rs
// Per-connection pipeline: decode -> validate -> dispatch -> encode -> write,
// with semaphore-gated reads and a bounded outbound queue so a slow peer or
// handler can never force unbounded buffering.

use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, BufReader};
use tokio::sync::{mpsc, Semaphore};

use crate::config::PipelineConfig;
use crate::dispatch::dispatcher::Dispatcher;
use crate::dispatch::middleware::Middleware;
use crate::events::model::LogLevel;
use crate::pipeline::context::{ConnectionContext, ConnectionState};
use crate::pipeline::events::emit_session_event;
use crate::pipeline::sessions::SessionRegistry;
use crate::wire::codec::WireCodec;
use crate::wire::envelope::{ErrorBody, ErrorKind, MessageEnvelope, PayloadKind};
use crate::wire::framing::{FrameReader, FrameWriter, Framing};

/// Everything shared by the pipelines of one server. Cheap to clone; the
/// routing table behind the dispatcher is the only cross-connection state
/// and it is frozen.
#[derive(Clone)]
pub struct Pipeline {
    pub dispatcher: Arc<Dispatcher>,
    pub codec: Arc<dyn WireCodec>,
    pub framing: Arc<dyn Framing>,
    pub sessions: SessionRegistry,
    pub middleware: Arc<Vec<Arc<dyn Middleware>>>,
    pub config: PipelineConfig,
}

enum ReadOutcome {
    Frame(Vec<u8>),
    Eof,
    Idle,
    Failed(std::io::Error),
}

async fn next_frame(
    framing: &dyn Framing,
    reader: &mut FrameReader,
    idle: Option<Duration>,
) -> ReadOutcome {
    let result = match idle {
        Some(limit) => match tokio::time::timeout(limit, framing.read_frame(reader)).await {
            Ok(r) => r,
            Err(_) => return ReadOutcome::Idle,
        },
        None => framing.read_frame(reader).await,
    };
    match result {
        Ok(Some(frame)) => ReadOutcome::Frame(frame),
        Ok(None) => ReadOutcome::Eof,
        Err(e) => ReadOutcome::Failed(e),
    }
}

impl Pipeline {
    /// Drive one connection to completion. Generic over the transport so
    /// in-process streams work the same as TCP sockets.
    pub async fn run_connection<S>(&self, stream: S, peer: String)
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (read_half, write_half) = tokio::io::split(stream);
        let mut reader: FrameReader = BufReader::new(Box::new(read_half));
        let writer: FrameWriter = Box::new(write_half);

        let ctx = ConnectionContext::new(peer.clone());
        emit_session_event(
            "pipeline",
            LogLevel::Info,
            "session_open",
            ctx.id(),
            Some(peer.clone()),
            None,
        );
        for mw in self.middleware.iter() {
            mw.on_connect(&ctx).await;
        }

        let (out_tx, out_rx) = mpsc::channel::<MessageEnvelope>(self.config.write_queue_depth());
        let writer_task = self.spawn_writer(ctx.id().to_string(), writer, out_rx);

        if let Err(e) = self.sessions.register(ctx.clone(), out_tx.clone()).await {
            emit_session_event(
                "pipeline",
                LogLevel::Error,
                "session_register_failed",
                ctx.id(),
                Some(peer),
                Some(e),
            );
            return;
        }

        let limit = self.config.in_flight_limit();
        let semaphore = Arc::new(Semaphore::new(limit));
        let idle = self.config.idle_timeout();
        let mut cancel = ctx.cancel_signal();
        ctx.set_state(ConnectionState::Reading);

        let drain_reason = loop {
            let frame = tokio::select! {
                _ = cancel.changed() => break "cancelled",
                read = next_frame(self.framing.as_ref(), &mut reader, idle) => match read {
                    ReadOutcome::Frame(frame) => frame,
                    ReadOutcome::Eof => break "disconnect",
                    ReadOutcome::Idle => {
                        for mw in self.middleware.iter() {
                            mw.on_timeout(&ctx).await;
                        }
                        break "idle_timeout";
                    }
                    ReadOutcome::Failed(e) => {
                        emit_session_event(
                            "pipeline",
                            LogLevel::Error,
                            "read_failed",
                            ctx.id(),
                            None,
                            Some(e.to_string()),
                        );
                        break "read_error";
                    }
                },
            };
            ctx.touch();

            let envelope = match self.codec.decode(&frame) {
                Ok(envelope) => envelope,
                Err(e) => {
                    let detail = e.to_string();
                    for mw in self.middleware.iter() {
                        mw.on_protocol_error(&ctx, &detail).await;
                    }
                    emit_session_event(
                        "pipeline",
                        LogLevel::Warn,
                        "decode_failed",
                        ctx.id(),
                        None,
                        Some(detail.clone()),
                    );
                    // Reply only if the correlation token survived the damage;
                    // otherwise the peer could not re-associate it anyway.
                    if let Some(correlation) = self.codec.recover_correlation(&frame) {
                        let body = ErrorBody::new(ErrorKind::Decode, detail);
                        let _ = out_tx
                            .send(MessageEnvelope::error("", correlation, &body))
                            .await;
                    }
                    break "decode_error";
                }
            };

            if envelope.kind != PayloadKind::Request {
                let detail = format!(
                    "expected a request envelope, got {}",
                    envelope.kind.label()
                );
                for mw in self.middleware.iter() {
                    mw.on_protocol_error(&ctx, &detail).await;
                }
                let body = ErrorBody::new(ErrorKind::Protocol, detail);
                let _ = out_tx
                    .send(MessageEnvelope::error(
                        envelope.command.clone(),
                        envelope.correlation.clone(),
                        &body,
                    ))
                    .await;
                continue;
            }

            // Backpressure gate: no further reads while the connection is at
            // its in-flight limit.
            let permit = tokio::select! {
                _ = cancel.changed() => break "cancelled",
                permit = semaphore.clone().acquire_owned() => match permit {
                    Ok(p) => p,
                    Err(_) => break "cancelled",
                },
            };

            let n = ctx.dispatch_started();
            ctx.set_state(ConnectionState::Dispatching);
            emit_session_event(
                "pipeline",
                LogLevel::Debug,
                "dispatch_started",
                ctx.id(),
                None,
                Some(format!("command={} in_flight={}", envelope.command, n)),
            );

            let dispatcher = self.dispatcher.clone();
            let task_ctx = ctx.clone();
            let task_out = out_tx.clone();
            tokio::spawn(async move {
                dispatcher.dispatch(task_ctx.clone(), envelope, task_out).await;
                let remaining = task_ctx.dispatch_finished();
                if remaining == 0 && !task_ctx.is_closing() {
                    task_ctx.set_state(ConnectionState::Reading);
                }
                drop(permit);
            });
        };

        self.drain(&ctx, drain_reason, semaphore, limit).await;

        for mw in self.middleware.iter() {
            mw.on_disconnect(&ctx).await;
        }
        self.sessions.remove(ctx.id()).await;
        drop(out_tx);
        let _ = tokio::time::timeout(self.config.drain_timeout(), writer_task).await;
        ctx.set_state(ConnectionState::Closed);
        emit_session_event(
            "pipeline",
            LogLevel::Info,
            "session_close",
            ctx.id(),
            Some(ctx.peer().to_string()),
            Some(format!("reason={}", drain_reason)),
        );
    }

    fn spawn_writer(
        &self,
        connection_id: String,
        mut writer: FrameWriter,
        mut out_rx: mpsc::Receiver<MessageEnvelope>,
    ) -> tokio::task::JoinHandle<()> {
        let codec = self.codec.clone();
        let framing = self.framing.clone();
        tokio::spawn(async move {
            while let Some(envelope) = out_rx.recv().await {
                let bytes = codec.encode(&envelope);
                if let Err(e) = framing.write_frame(&mut writer, &bytes).await {
                    emit_session_event(
                        "writer",
                        LogLevel::Error,
                        "write_failed",
                        &connection_id,
                        None,
                        Some(e.to_string()),
                    );
                    break;
                }
            }
        })
    }

    /// Stop reading, let outstanding dispatches finish inside the drain
    /// deadline, cancel whatever remains.
    async fn drain(
        &self,
        ctx: &Arc<ConnectionContext>,
        reason: &str,
        semaphore: Arc<Semaphore>,
        limit: usize,
    ) {
        ctx.begin_close();
        ctx.set_state(ConnectionState::Draining);
        emit_session_event(
            "pipeline",
            LogLevel::Info,
            "draining",
            ctx.id(),
            None,
            Some(format!("reason={} in_flight={}", reason, ctx.in_flight())),
        );

        let all_permits = semaphore.acquire_many_owned(limit as u32);
        match tokio::time::timeout(self.config.drain_timeout(), all_permits).await {
            Ok(Ok(_permits)) => {}
            _ => {
                emit_session_event(
                    "pipeline",
                    LogLevel::Warn,
                    "drain_timeout",
                    ctx.id(),
                    None,
                    Some(format!("cancelling in_flight={}", ctx.in_flight())),
                );
                ctx.cancel();
            }
        }
    }
}
