//! Central place for application-wide constants and default values.

/// Default application name (can be overridden in config)
pub const DEFAULT_APP_NAME: &str = "Switchboard";

/// Left padding used to align log lines with those that include emoji prefixes.
/// Keep this to a fixed width matching the emoji prefix you use elsewhere.
pub const ICON_PLACEHOLDER: &str = "   "; // Three spaces for alignment

/// Protocol branding shown in logs and the registry report
pub const PROTOCOL_NAME: &str = "switchboard";
/// Protocol version for compatibility checks (bump when the envelope shape changes)
pub const PROTOCOL_VERSION: &str = "1";

/// Namespace a handler set registers under when it does not declare one.
pub const DEFAULT_NAMESPACE: &str = "core";

/// Default TCP port
pub const DEFAULT_PORT: u16 = 7070;

/// Default per-connection in-flight dispatch limit. One keeps strict
/// request/response ordering; raise it for pipelined peers.
pub const DEFAULT_IN_FLIGHT_LIMIT: usize = 1;

/// Default drain deadline before outstanding dispatches are cancelled (seconds)
pub const DEFAULT_DRAIN_TIMEOUT_SECS: u64 = 5;

/// Default idle timeout before a silent connection is drained (seconds)
pub const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 30;

/// Default depth of the per-connection outbound envelope queue
pub const DEFAULT_WRITE_QUEUE_DEPTH: usize = 32;

/// Default upper bound for a single length-prefixed frame
pub const DEFAULT_MAX_FRAME_BYTES: usize = 1024 * 1024;

/// Application / crate version (populated from Cargo.toml via env! macro)
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Human friendly composite version string used in logs and reports.
pub fn full_version() -> String {
    format!("v{} (protocol={})", APP_VERSION, PROTOCOL_VERSION)
}
