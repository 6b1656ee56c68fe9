// src/pipeline/sessions.rs

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc::Sender;
use tokio::sync::Mutex;

use crate::pipeline::context::ConnectionContext;
use crate::wire::envelope::MessageEnvelope;

/// One registered connection: its context plus the sender feeding its
/// outbound writer task.
#[derive(Clone)]
pub struct SessionHandle {
    pub context: Arc<ConnectionContext>,
    pub outbound: Sender<MessageEnvelope>,
}

/// Registry of live connections, keyed by connection id. Lets the server
/// broadcast (e.g. the shutdown notice) and cancel everything on teardown.
#[derive(Clone, Default)]
pub struct SessionRegistry {
    sessions: Arc<Mutex<HashMap<String, SessionHandle>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(
        &self,
        context: Arc<ConnectionContext>,
        outbound: Sender<MessageEnvelope>,
    ) -> Result<(), String> {
        let mut sessions = self.sessions.lock().await;
        if sessions.contains_key(context.id()) {
            return Err(format!("duplicate connection id {}", context.id()));
        }
        sessions.insert(context.id().to_string(), SessionHandle { context, outbound });
        Ok(())
    }

    pub async fn remove(&self, id: &str) -> Option<SessionHandle> {
        self.sessions.lock().await.remove(id)
    }

    pub async fn count(&self) -> usize {
        self.sessions.lock().await.len()
    }

    pub async fn list_ids(&self) -> Vec<String> {
        self.sessions.lock().await.keys().cloned().collect()
    }

    pub async fn send_to(&self, id: &str, envelope: MessageEnvelope) -> Result<(), String> {
        let handle = {
            let sessions = self.sessions.lock().await;
            sessions.get(id).cloned()
        };
        match handle {
            Some(h) => h
                .outbound
                .send(envelope)
                .await
                .map_err(|_| format!("connection {} is gone", id)),
            None => Err(format!("no connection with id {}", id)),
        }
    }

    /// Deliver an envelope to every live connection. Returns how many
    /// accepted it; connections mid-teardown are skipped.
    pub async fn broadcast(&self, envelope: MessageEnvelope) -> usize {
        let handles: Vec<SessionHandle> = {
            let sessions = self.sessions.lock().await;
            sessions.values().cloned().collect()
        };
        let mut delivered = 0;
        for handle in handles {
            if handle.outbound.send(envelope.clone()).await.is_ok() {
                delivered += 1;
            }
        }
        delivered
    }

    /// Fire every connection's cancellation signal.
    pub async fn cancel_all(&self) {
        let handles: Vec<SessionHandle> = {
            let sessions = self.sessions.lock().await;
            sessions.values().cloned().collect()
        };
        for handle in handles {
            handle.context.cancel();
        }
    }
}
