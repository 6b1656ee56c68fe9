// Shared fixtures for the integration tests: a small command set covering
// the three return kinds, plus line-framed JSON client helpers.
#![allow(dead_code)]

use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};

use switchboard::config::PipelineConfig;
use switchboard::dispatch::{handler_fn, Dispatcher, Middleware, Outcome};
use switchboard::metadata::{CommandSpec, ParamSpec, ReturnKind, SemanticType};
use switchboard::pipeline::{Pipeline, SessionRegistry};
use switchboard::registry::{HandlerSet, RegistryBuilder, RoutingTable};
use switchboard::wire::{JsonCodec, LineFraming};

pub struct EchoHandlers;

impl HandlerSet for EchoHandlers {
    fn set_name(&self) -> &str {
        "EchoHandlers"
    }

    fn commands(&self) -> Vec<CommandSpec> {
        vec![
            CommandSpec::new(
                "echo",
                ReturnKind::Single,
                handler_fn(|call| async move {
                    let text = call.text_arg("text").unwrap_or_default().to_string();
                    Ok(Outcome::Single(Value::String(text)))
                }),
            )
            .param(ParamSpec::required("text", SemanticType::Text)),
            CommandSpec::new(
                "slow_echo",
                ReturnKind::Single,
                handler_fn(|call| async move {
                    let text = call.text_arg("text").unwrap_or_default().to_string();
                    tokio::time::sleep(Duration::from_millis(200)).await;
                    Ok(Outcome::Single(Value::String(text)))
                }),
            )
            .param(ParamSpec::required("text", SemanticType::Text)),
            CommandSpec::new(
                "countdown",
                ReturnKind::Stream,
                handler_fn(|call| async move {
                    let from = call.int_arg("from").unwrap_or(3);
                    let delay = call.int_arg("delay_ms").unwrap_or(0) as u64;
                    let (tx, outcome) = Outcome::stream(4);
                    let mut cancel = call.cancel_signal();
                    tokio::spawn(async move {
                        for i in (1..=from).rev() {
                            if delay > 0 {
                                tokio::select! {
                                    _ = cancel.changed() => return,
                                    _ = tokio::time::sleep(Duration::from_millis(delay)) => {}
                                }
                            }
                            if tx.send(json!(i)).await.is_err() {
                                return;
                            }
                        }
                    });
                    Ok(outcome)
                }),
            )
            .param(ParamSpec::optional("from", SemanticType::Integer))
            .param(ParamSpec::optional("delay_ms", SemanticType::Integer)),
            CommandSpec::new(
                "fail",
                ReturnKind::Single,
                handler_fn(|_call| async move { Err("deliberate failure".into()) }),
            ),
            CommandSpec::new(
                "note",
                ReturnKind::FireAndForget,
                handler_fn(|_call| async move { Ok(Outcome::Done) }),
            )
            .param(ParamSpec::optional("text", SemanticType::Text)),
        ]
    }
}

pub fn build_table() -> RoutingTable {
    RegistryBuilder::new()
        .register(Box::new(EchoHandlers))
        .build()
        .expect("registry build")
}

/// A line-framed JSON pipeline around the echo set, ready to drive over any
/// stream (tests mostly feed it one half of a duplex pair).
pub fn build_pipeline(config: PipelineConfig, middleware: Vec<Arc<dyn Middleware>>) -> Pipeline {
    let table = Arc::new(build_table());
    let middleware = Arc::new(middleware);
    Pipeline {
        dispatcher: Arc::new(Dispatcher::new(table, middleware.clone())),
        codec: Arc::new(JsonCodec),
        framing: Arc::new(LineFraming),
        sessions: SessionRegistry::new(),
        middleware,
        config,
    }
}

/// Spawn a pipeline over one half of an in-memory duplex pair; returns the
/// client's halves plus the connection task handle.
pub fn spawn_connection(
    pipeline: &Pipeline,
) -> (
    tokio::io::WriteHalf<tokio::io::DuplexStream>,
    BufReader<tokio::io::ReadHalf<tokio::io::DuplexStream>>,
    tokio::task::JoinHandle<()>,
) {
    let (client, server) = tokio::io::duplex(16 * 1024);
    let pipeline = pipeline.clone();
    let task = tokio::spawn(async move {
        pipeline.run_connection(server, "duplex-peer".to_string()).await;
    });
    let (read, write) = tokio::io::split(client);
    (write, BufReader::new(read), task)
}

pub async fn send_json<W: AsyncWrite + Unpin>(writer: &mut W, value: &Value) {
    let mut line = value.to_string().into_bytes();
    line.push(b'\n');
    writer.write_all(&line).await.expect("write frame");
}

/// Read one line-framed JSON value, failing the test after the timeout.
pub async fn read_json<R: AsyncRead + Unpin>(reader: &mut BufReader<R>) -> Value {
    try_read_json(reader, Duration::from_secs(2))
        .await
        .expect("expected a frame before timeout")
}

/// None when the timeout elapses or the stream closes first.
pub async fn try_read_json<R: AsyncRead + Unpin>(
    reader: &mut BufReader<R>,
    wait: Duration,
) -> Option<Value> {
    let mut line = String::new();
    match tokio::time::timeout(wait, reader.read_line(&mut line)).await {
        Ok(Ok(0)) | Err(_) => None,
        Ok(Ok(_)) => serde_json::from_str(line.trim()).ok(),
        Ok(Err(_)) => None,
    }
}
