// src/pipeline/context.rs

use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use uuid::Uuid;

/// Lifecycle of one connection's pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Accepted,
    Reading,
    Dispatching,
    Draining,
    Closed,
}

impl ConnectionState {
    pub fn label(&self) -> &'static str {
        match self {
            ConnectionState::Accepted => "accepted",
            ConnectionState::Reading => "reading",
            ConnectionState::Dispatching => "dispatching",
            ConnectionState::Draining => "draining",
            ConnectionState::Closed => "closed",
        }
    }
}

/// Per-connection state, owned exclusively by that connection's pipeline.
/// The cancellation signal is reachable from both the transport side (on
/// disconnect) and the dispatcher side (on protocol violation or server
/// shutdown); everything else is plain bookkeeping.
pub struct ConnectionContext {
    id: String,
    peer: String,
    state: Mutex<ConnectionState>,
    in_flight: AtomicUsize,
    closing: AtomicBool,
    cancel_tx: watch::Sender<bool>,
    cancel_rx: watch::Receiver<bool>,
    attributes: Mutex<HashMap<String, Value>>,
    last_seen: Mutex<Instant>,
}

impl ConnectionContext {
    pub fn new(peer: impl Into<String>) -> Arc<Self> {
        let (cancel_tx, cancel_rx) = watch::channel(false);
        Arc::new(Self {
            id: Uuid::new_v4().to_string(),
            peer: peer.into(),
            state: Mutex::new(ConnectionState::Accepted),
            in_flight: AtomicUsize::new(0),
            closing: AtomicBool::new(false),
            cancel_tx,
            cancel_rx,
            attributes: Mutex::new(HashMap::new()),
            last_seen: Mutex::new(Instant::now()),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn peer(&self) -> &str {
        &self.peer
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.lock()
    }

    pub(crate) fn set_state(&self, state: ConnectionState) {
        *self.state.lock() = state;
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Returns the new in-flight count.
    pub(crate) fn dispatch_started(&self) -> usize {
        self.in_flight.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Returns the remaining in-flight count.
    pub(crate) fn dispatch_finished(&self) -> usize {
        self.in_flight.fetch_sub(1, Ordering::SeqCst).saturating_sub(1)
    }

    pub fn is_closing(&self) -> bool {
        self.closing.load(Ordering::SeqCst)
    }

    /// Mark the connection as closing without cancelling outstanding work.
    pub(crate) fn begin_close(&self) {
        self.closing.store(true, Ordering::SeqCst);
    }

    /// Cancel every outstanding dispatch for this connection. Handlers must
    /// observe the signal and stop producing.
    pub fn cancel(&self) {
        self.closing.store(true, Ordering::SeqCst);
        let _ = self.cancel_tx.send(true);
    }

    pub fn cancelled(&self) -> bool {
        *self.cancel_rx.borrow()
    }

    pub fn cancel_signal(&self) -> watch::Receiver<bool> {
        self.cancel_rx.clone()
    }

    /// Record activity for the idle monitor.
    pub fn touch(&self) {
        *self.last_seen.lock() = Instant::now();
    }

    pub fn idle_for(&self) -> Duration {
        self.last_seen.lock().elapsed()
    }

    pub fn set_attribute(&self, key: impl Into<String>, value: Value) {
        self.attributes.lock().insert(key.into(), value);
    }

    pub fn attribute(&self, key: &str) -> Option<Value> {
        self.attributes.lock().get(key).cloned()
    }

    pub fn remove_attribute(&self, key: &str) -> Option<Value> {
        self.attributes.lock().remove(key)
    }
}
