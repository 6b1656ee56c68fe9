// src/wire/envelope.rs

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::validation::Violation;

/// Kind tag carried by every envelope on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PayloadKind {
    Request,
    Response,
    Error,
    StreamItem,
    StreamEnd,
}

impl PayloadKind {
    pub fn label(&self) -> &'static str {
        match self {
            PayloadKind::Request => "request",
            PayloadKind::Response => "response",
            PayloadKind::Error => "error",
            PayloadKind::StreamItem => "stream-item",
            PayloadKind::StreamEnd => "stream-end",
        }
    }
}

/// Category of a request-scoped or connection-scoped error reported to the peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorKind {
    NotFound,
    ValidationFailed,
    HandlerFailure,
    Decode,
    Protocol,
}

/// Payload of an error envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error_kind: ErrorKind,
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub violations: Vec<Violation>,
}

impl ErrorBody {
    pub fn new(error_kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            error_kind,
            message: message.into(),
            violations: Vec::new(),
        }
    }

    pub fn with_violations(mut self, violations: Vec<Violation>) -> Self {
        self.violations = violations;
        self
    }
}

/// The unit exchanged with a peer. The correlation token is an opaque JSON
/// scalar chosen by the peer and echoed verbatim on every reply.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageEnvelope {
    pub command: String,
    pub kind: PayloadKind,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub correlation: Value,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub payload: Value,
}

impl MessageEnvelope {
    pub fn request(command: impl Into<String>, correlation: Value, payload: Value) -> Self {
        Self {
            command: command.into(),
            kind: PayloadKind::Request,
            correlation,
            payload,
        }
    }

    pub fn response(command: impl Into<String>, correlation: Value, payload: Value) -> Self {
        Self {
            command: command.into(),
            kind: PayloadKind::Response,
            correlation,
            payload,
        }
    }

    pub fn stream_item(command: impl Into<String>, correlation: Value, payload: Value) -> Self {
        Self {
            command: command.into(),
            kind: PayloadKind::StreamItem,
            correlation,
            payload,
        }
    }

    pub fn stream_end(command: impl Into<String>, correlation: Value) -> Self {
        Self {
            command: command.into(),
            kind: PayloadKind::StreamEnd,
            correlation,
            payload: Value::Null,
        }
    }

    pub fn error(command: impl Into<String>, correlation: Value, body: &ErrorBody) -> Self {
        Self {
            command: command.into(),
            kind: PayloadKind::Error,
            correlation,
            payload: serde_json::to_value(body).unwrap_or(Value::Null),
        }
    }

    /// Parse the payload back into an error body; None for non-error kinds.
    pub fn error_body(&self) -> Option<ErrorBody> {
        if self.kind != PayloadKind::Error {
            return None;
        }
        serde_json::from_value(self.payload.clone()).ok()
    }

    /// Terminal envelopes settle a request: one per request, always.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self.kind,
            PayloadKind::Response | PayloadKind::Error | PayloadKind::StreamEnd
        )
    }
}
