use crate::events::{
    dispatcher,
    model::{LogEvent, LogLevel, SessionEvent},
};

/// Emit a structured session event for one connection.
pub(crate) fn emit_session_event(
    component: &'static str,
    level: LogLevel,
    action: &str,
    connection_id: &str,
    peer: Option<String>,
    detail: Option<String>,
) {
    let mut meta = dispatcher::meta(component, level);
    meta.corr_id = Some(dispatcher::correlation_id());
    dispatcher::emit(LogEvent::Session(SessionEvent {
        meta,
        action: action.to_string(),
        connection_id: connection_id.to_string(),
        peer,
        detail,
    }));
}
