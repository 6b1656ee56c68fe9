use crate::events::{
    dispatcher,
    model::{DispatchEvent, LogEvent, LogLevel},
};

/// Emit a structured dispatch event for one request.
pub(crate) fn emit_dispatch_event(
    level: LogLevel,
    action: &str,
    connection_id: &str,
    command: Option<String>,
    detail: Option<String>,
) {
    let mut meta = dispatcher::meta("dispatcher", level);
    meta.corr_id = Some(dispatcher::correlation_id());
    dispatcher::emit(LogEvent::Dispatch(DispatchEvent {
        meta,
        action: action.to_string(),
        connection_id: connection_id.to_string(),
        command,
        detail,
    }));
}
