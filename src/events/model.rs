use serde::Serialize;
use std::time::SystemTime;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

#[derive(Debug, Clone, Serialize)]
pub struct EventMeta {
    pub ts: SystemTime,
    pub level: LogLevel,
    pub corr_id: Option<String>,
    pub session_id: String,
    pub component: &'static str,
    pub suppress_console: bool,
}

/// Server lifecycle: bind, registry build, start, stop.
#[derive(Debug, Clone, Serialize)]
pub struct ServerEvent {
    pub meta: EventMeta,
    pub action: String,
    pub detail: Option<String>,
}

/// Per-connection lifecycle: open, state transitions, drain, close.
#[derive(Debug, Clone, Serialize)]
pub struct SessionEvent {
    pub meta: EventMeta,
    pub action: String,
    pub connection_id: String,
    pub peer: Option<String>,
    pub detail: Option<String>,
}

/// Request routing outcomes: completed, not_found, validation_failed, handler_failure.
#[derive(Debug, Clone, Serialize)]
pub struct DispatchEvent {
    pub meta: EventMeta,
    pub action: String,
    pub connection_id: String,
    pub command: Option<String>,
    pub detail: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SystemEvent {
    pub meta: EventMeta,
    pub action: String,
    pub detail: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LogEvent {
    Server(ServerEvent),
    Session(SessionEvent),
    Dispatch(DispatchEvent),
    System(SystemEvent),
}
