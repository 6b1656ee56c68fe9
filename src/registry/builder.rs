// src/registry/builder.rs

use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

use crate::events::{
    dispatcher,
    model::{LogEvent, LogLevel, ServerEvent},
};
use crate::metadata::{CommandKey, Constraint, HandlerDescriptor, ParamSpec, SemanticType};
use crate::registry::set::HandlerSet;
use crate::registry::table::RoutingTable;

/// Startup-fatal registration failures. No routing table is published when
/// any of these occur.
#[derive(Debug, Clone, Error)]
pub enum RegistrationError {
    #[error("duplicate command '{command}' registered by both '{first}' and '{second}'")]
    DuplicateCommand {
        command: String,
        first: String,
        second: String,
    },
    #[error("command '{command}', parameter '{path}': {reason}")]
    InvalidConstraint {
        command: String,
        path: String,
        reason: String,
    },
    #[error("command '{command}': {reason}")]
    UnresolvableType { command: String, reason: String },
}

/// Collects candidate handler sets and freezes them into a RoutingTable.
#[derive(Default)]
pub struct RegistryBuilder {
    sets: Vec<Box<dyn HandlerSet>>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, set: Box<dyn HandlerSet>) -> Self {
        self.sets.push(set);
        self
    }

    /// Scan every candidate set in lexical (namespace, set name) order and
    /// build the frozen table. Any failure aborts the build; a partially
    /// populated table is never published.
    pub fn build(mut self) -> Result<RoutingTable, RegistrationError> {
        self.sets.sort_by(|a, b| {
            (a.namespace().to_ascii_lowercase(), a.set_name().to_string())
                .cmp(&(b.namespace().to_ascii_lowercase(), b.set_name().to_string()))
        });

        let mut entries: HashMap<CommandKey, Arc<HandlerDescriptor>> = HashMap::new();
        for set in &self.sets {
            for spec in set.commands() {
                if spec.name.trim().is_empty() {
                    return Err(RegistrationError::UnresolvableType {
                        command: format!("{}.?", set.namespace()),
                        reason: format!("set '{}' declares a command with an empty name", set.set_name()),
                    });
                }
                let key = CommandKey::new(set.namespace(), &spec.name);
                check_params(&key, "", &spec.params)?;
                if let Some(existing) = entries.get(&key) {
                    return Err(RegistrationError::DuplicateCommand {
                        command: key.qualified(),
                        first: existing.registered_by.clone(),
                        second: set.set_name().to_string(),
                    });
                }
                entries.insert(
                    key.clone(),
                    Arc::new(HandlerDescriptor {
                        command: key,
                        params: spec.params,
                        return_kind: spec.return_kind,
                        handler: spec.handler,
                        deprecated: spec.deprecated,
                        registered_by: set.set_name().to_string(),
                    }),
                );
            }
        }

        let mut meta = dispatcher::meta("registry", LogLevel::Info);
        meta.corr_id = Some(dispatcher::correlation_id());
        dispatcher::emit(LogEvent::Server(ServerEvent {
            meta,
            action: "registry_built".into(),
            detail: Some(format!("commands={} sets={}", entries.len(), self.sets.len())),
        }));

        Ok(RoutingTable::new(entries))
    }
}

/// Reject specs the validation layer could never evaluate sensibly: rules
/// attached to types they cannot apply to, patterns that do not compile,
/// structured parameters with no fields.
fn check_params(
    command: &CommandKey,
    prefix: &str,
    params: &[ParamSpec],
) -> Result<(), RegistrationError> {
    for param in params {
        if param.name.trim().is_empty() {
            return Err(RegistrationError::UnresolvableType {
                command: command.qualified(),
                reason: "parameter with an empty name".into(),
            });
        }
        let path = if prefix.is_empty() {
            param.name.clone()
        } else {
            format!("{}.{}", prefix, param.name)
        };
        for constraint in &param.constraints {
            if !constraint.applies_to(&param.semantic_type) {
                return Err(RegistrationError::InvalidConstraint {
                    command: command.qualified(),
                    path,
                    reason: format!(
                        "'{}' cannot apply to {}",
                        constraint.rule_id(),
                        param.semantic_type.label()
                    ),
                });
            }
            if let Constraint::Pattern(rule) = constraint {
                if let Err(e) = rule.compiled() {
                    return Err(RegistrationError::InvalidConstraint {
                        command: command.qualified(),
                        path,
                        reason: format!("invalid pattern '{}': {}", rule.source(), e),
                    });
                }
            }
        }
        check_type(command, &path, &param.semantic_type)?;
    }
    Ok(())
}

fn check_type(
    command: &CommandKey,
    path: &str,
    ty: &SemanticType,
) -> Result<(), RegistrationError> {
    match ty {
        SemanticType::Structured(inner) => {
            if inner.is_empty() {
                return Err(RegistrationError::UnresolvableType {
                    command: command.qualified(),
                    reason: format!("structured parameter '{}' declares no fields", path),
                });
            }
            check_params(command, path, inner)
        }
        SemanticType::List(element) => check_type(command, &format!("{}[]", path), element),
        _ => Ok(()),
    }
}
