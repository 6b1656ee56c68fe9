// src/wire/codec.rs

use serde_json::Value;
use thiserror::Error;

use crate::wire::envelope::MessageEnvelope;

/// Malformed wire data. Connection-scoped: the pipeline drains after one.
#[derive(Debug, Clone, Error)]
pub enum DecodeError {
    #[error("malformed frame: {0}")]
    Malformed(String),
}

/// Contract a transport-specific codec must satisfy. The core never assumes
/// a byte layout; it only requires lossless round-tripping of command id,
/// correlation token, kind tag and payload, and that malformed bytes yield
/// an error rather than a partial envelope.
pub trait WireCodec: Send + Sync {
    fn decode(&self, raw: &[u8]) -> Result<MessageEnvelope, DecodeError>;

    fn encode(&self, envelope: &MessageEnvelope) -> Vec<u8>;

    /// Best-effort correlation token recovery from a frame that failed to
    /// decode, so the peer can still re-associate the error reply.
    fn recover_correlation(&self, _raw: &[u8]) -> Option<Value> {
        None
    }
}

/// Default codec: one JSON document per frame.
pub struct JsonCodec;

impl WireCodec for JsonCodec {
    fn decode(&self, raw: &[u8]) -> Result<MessageEnvelope, DecodeError> {
        serde_json::from_slice(raw).map_err(|e| DecodeError::Malformed(e.to_string()))
    }

    fn encode(&self, envelope: &MessageEnvelope) -> Vec<u8> {
        serde_json::to_vec(envelope).unwrap_or_default()
    }

    fn recover_correlation(&self, raw: &[u8]) -> Option<Value> {
        serde_json::from_slice::<Value>(raw)
            .ok()
            .and_then(|v| v.get("correlation").cloned())
            .filter(|c| !c.is_null())
    }
}
