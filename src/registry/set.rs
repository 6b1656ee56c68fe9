// src/registry/set.rs

use crate::constants::DEFAULT_NAMESPACE;
use crate::metadata::CommandSpec;

/// A candidate type for registry discovery: one application value exposing a
/// batch of command specs. Sets are scanned in lexical order of
/// (namespace, set name) so diagnostics are reproducible across runs.
pub trait HandlerSet: Send + Sync {
    /// Namespace the set's commands register under. Command identifiers must
    /// be unique within a namespace.
    fn namespace(&self) -> &str {
        DEFAULT_NAMESPACE
    }

    /// Stable name used in diagnostics and duplicate reports.
    fn set_name(&self) -> &str;

    fn commands(&self) -> Vec<CommandSpec>;
}
