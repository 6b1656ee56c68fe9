// src/pipeline/listener.rs

use tokio::net::TcpListener;
use tokio::sync::watch;

use crate::events::model::LogLevel;
use crate::pipeline::connection::Pipeline;
use crate::pipeline::events::emit_session_event;

/// Accept loop: one spawned pipeline per connection, until the shutdown
/// signal flips. The listener socket is handed in already bound so callers
/// can bind port 0 and read the local address first.
pub async fn run_listener(
    pipeline: Pipeline,
    listener: TcpListener,
    mut shutdown: watch::Receiver<bool>,
) {
    let local = listener
        .local_addr()
        .map(|a| a.to_string())
        .unwrap_or_else(|_| "unknown".into());
    emit_session_event(
        "listener",
        LogLevel::Info,
        "listener_bind",
        "-",
        Some(local.clone()),
        None,
    );

    loop {
        tokio::select! {
            // wait_for also observes a shutdown signalled before this loop
            // started, unlike changed().
            _ = shutdown.wait_for(|stop| *stop) => {
                emit_session_event(
                    "listener",
                    LogLevel::Info,
                    "listener_stopped",
                    "-",
                    Some(local),
                    None,
                );
                break;
            }
            accepted = listener.accept() => match accepted {
                Ok((stream, peer_addr)) => {
                    emit_session_event(
                        "listener",
                        LogLevel::Info,
                        "incoming_connection",
                        "-",
                        Some(peer_addr.to_string()),
                        None,
                    );
                    let pipeline = pipeline.clone();
                    tokio::spawn(async move {
                        pipeline.run_connection(stream, peer_addr.to_string()).await;
                    });
                }
                Err(e) => {
                    emit_session_event(
                        "listener",
                        LogLevel::Error,
                        "accept_failed",
                        "-",
                        None,
                        Some(e.to_string()),
                    );
                }
            }
        }
    }
}
