// src/registry/table.rs

use std::collections::HashMap;

use crate::constants::{full_version, PROTOCOL_NAME};
use crate::metadata::{CommandKey, ParamSpec, SharedDescriptor};

/// Frozen mapping from command key to descriptor. Total after build, never
/// mutated, safe for unsynchronized concurrent reads from every pipeline.
pub struct RoutingTable {
    entries: HashMap<CommandKey, SharedDescriptor>,
}

impl RoutingTable {
    pub(crate) fn new(entries: HashMap<CommandKey, SharedDescriptor>) -> Self {
        Self { entries }
    }

    /// Resolve a wire command id (`ns.cmd`, or a bare name in the default
    /// namespace). Matching is case-insensitive.
    pub fn lookup(&self, raw_command: &str) -> Option<&SharedDescriptor> {
        self.lookup_key(&CommandKey::parse(raw_command))
    }

    pub fn lookup_key(&self, key: &CommandKey) -> Option<&SharedDescriptor> {
        self.entries.get(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All descriptors in lexical key order.
    pub fn descriptors(&self) -> Vec<&SharedDescriptor> {
        let mut all: Vec<_> = self.entries.values().collect();
        all.sort_by(|a, b| a.command.cmp(&b.command));
        all
    }

    /// Human-readable startup report of everything routable.
    pub fn report(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!(
            "{} {} routing table: {} command(s)\n",
            PROTOCOL_NAME,
            full_version(),
            self.len()
        ));
        out.push_str(&format!(
            "  {:<28} {:<16} {:<40} {}\n",
            "COMMAND", "KIND", "PARAMS", "SET"
        ));
        for descriptor in self.descriptors() {
            let mut line = format!(
                "  {:<28} {:<16} {:<40} {}",
                descriptor.command.qualified(),
                descriptor.return_kind.label(),
                params_summary(&descriptor.params),
                descriptor.registered_by,
            );
            if descriptor.deprecated.is_some() {
                line.push_str("  [deprecated]");
            }
            line.push('\n');
            out.push_str(&line);
        }
        out
    }
}

fn params_summary(params: &[ParamSpec]) -> String {
    if params.is_empty() {
        return "(none)".into();
    }
    params
        .iter()
        .map(|p| {
            let marker = if p.required { "" } else { "?" };
            format!("{}{}:{}", p.name, marker, p.semantic_type.label())
        })
        .collect::<Vec<_>>()
        .join(", ")
}
