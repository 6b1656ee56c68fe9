// src/metadata.rs
// Inert handler metadata. Everything here is data; nothing dispatches.

use once_cell::sync::OnceCell;
use regex::Regex;
use std::fmt;
use std::sync::Arc;

use crate::constants::DEFAULT_NAMESPACE;
use crate::dispatch::outcome::HandlerFn;

/// Semantic type of a declared parameter. `Structured` nests further specs,
/// `List` wraps an element type.
#[derive(Debug, Clone)]
pub enum SemanticType {
    Text,
    Integer,
    Float,
    Boolean,
    Structured(Vec<ParamSpec>),
    List(Box<SemanticType>),
}

impl SemanticType {
    pub fn label(&self) -> &'static str {
        match self {
            SemanticType::Text => "text",
            SemanticType::Integer => "integer",
            SemanticType::Float => "float",
            SemanticType::Boolean => "boolean",
            SemanticType::Structured(_) => "structured",
            SemanticType::List(_) => "list",
        }
    }
}

/// Pattern rule source plus its lazily compiled regex. The registry compiles
/// it once at build time; validation reuses the compiled form.
#[derive(Debug, Clone)]
pub struct PatternRule {
    source: String,
    compiled: OnceCell<Regex>,
}

impl PatternRule {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            compiled: OnceCell::new(),
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn compiled(&self) -> Result<&Regex, regex::Error> {
        self.compiled.get_or_try_init(|| Regex::new(&self.source))
    }
}

/// A named constraint rule carrying its own parameters. Required-ness lives
/// on the ParamSpec, not here.
#[derive(Debug, Clone)]
pub enum Constraint {
    /// Numeric bounds, inclusive
    Range { min: Option<f64>, max: Option<f64> },
    /// Regex match over text
    Pattern(PatternRule),
    /// Character-count bounds over text, inclusive
    Length { min: Option<usize>, max: Option<usize> },
    /// Element-count bounds over lists, inclusive
    Size { min: Option<usize>, max: Option<usize> },
}

impl Constraint {
    pub fn pattern(source: impl Into<String>) -> Self {
        Constraint::Pattern(PatternRule::new(source))
    }

    pub fn rule_id(&self) -> &'static str {
        match self {
            Constraint::Range { .. } => "range",
            Constraint::Pattern(_) => "pattern",
            Constraint::Length { .. } => "length",
            Constraint::Size { .. } => "size",
        }
    }

    /// Whether this rule can evaluate against values of the given type.
    pub fn applies_to(&self, ty: &SemanticType) -> bool {
        match self {
            Constraint::Range { .. } => {
                matches!(ty, SemanticType::Integer | SemanticType::Float)
            }
            Constraint::Pattern(_) | Constraint::Length { .. } => {
                matches!(ty, SemanticType::Text)
            }
            Constraint::Size { .. } => matches!(ty, SemanticType::List(_)),
        }
    }
}

/// One declared parameter of a command.
#[derive(Debug, Clone)]
pub struct ParamSpec {
    pub name: String,
    pub semantic_type: SemanticType,
    pub required: bool,
    pub constraints: Vec<Constraint>,
}

impl ParamSpec {
    pub fn required(name: impl Into<String>, semantic_type: SemanticType) -> Self {
        Self {
            name: name.into(),
            semantic_type,
            required: true,
            constraints: Vec::new(),
        }
    }

    pub fn optional(name: impl Into<String>, semantic_type: SemanticType) -> Self {
        Self {
            name: name.into(),
            semantic_type,
            required: false,
            constraints: Vec::new(),
        }
    }

    pub fn constrained(mut self, constraint: Constraint) -> Self {
        self.constraints.push(constraint);
        self
    }
}

/// Declared shape of a handler's result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnKind {
    Single,
    Stream,
    FireAndForget,
}

impl ReturnKind {
    pub fn label(&self) -> &'static str {
        match self {
            ReturnKind::Single => "single",
            ReturnKind::Stream => "stream",
            ReturnKind::FireAndForget => "fire-and-forget",
        }
    }
}

/// Deprecation tag carried through to dispatch-time warnings.
#[derive(Debug, Clone)]
pub struct Deprecation {
    pub since: String,
    pub message: Option<String>,
}

/// Namespace-qualified command identifier. Stored lowercased so wire lookup
/// is case-insensitive.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CommandKey {
    pub namespace: String,
    pub name: String,
}

impl CommandKey {
    pub fn new(namespace: &str, name: &str) -> Self {
        Self {
            namespace: namespace.to_ascii_lowercase(),
            name: name.to_ascii_lowercase(),
        }
    }

    /// Parse a wire command id. `ns.cmd` selects a namespace; a bare name
    /// resolves in the default namespace.
    pub fn parse(raw: &str) -> Self {
        match raw.split_once('.') {
            Some((ns, name)) if !ns.is_empty() && !name.is_empty() => Self::new(ns, name),
            _ => Self::new(DEFAULT_NAMESPACE, raw),
        }
    }

    pub fn qualified(&self) -> String {
        format!("{}.{}", self.namespace, self.name)
    }
}

impl fmt::Display for CommandKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.namespace, self.name)
    }
}

/// Declarative description of one dispatchable command, produced by a
/// HandlerSet and consumed by the registry builder.
#[derive(Clone)]
pub struct CommandSpec {
    pub name: String,
    pub params: Vec<ParamSpec>,
    pub return_kind: ReturnKind,
    pub handler: HandlerFn,
    pub deprecated: Option<Deprecation>,
}

impl CommandSpec {
    pub fn new(name: impl Into<String>, return_kind: ReturnKind, handler: HandlerFn) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
            return_kind,
            handler,
            deprecated: None,
        }
    }

    pub fn param(mut self, spec: ParamSpec) -> Self {
        self.params.push(spec);
        self
    }

    pub fn deprecated(mut self, since: impl Into<String>, message: Option<String>) -> Self {
        self.deprecated = Some(Deprecation {
            since: since.into(),
            message,
        });
        self
    }
}

impl fmt::Debug for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandSpec")
            .field("name", &self.name)
            .field("params", &self.params)
            .field("return_kind", &self.return_kind)
            .field("deprecated", &self.deprecated)
            .finish_non_exhaustive()
    }
}

/// Frozen registry entry. Immutable after the registry build; shared across
/// pipelines behind Arc.
pub struct HandlerDescriptor {
    pub command: CommandKey,
    pub params: Vec<ParamSpec>,
    pub return_kind: ReturnKind,
    pub handler: HandlerFn,
    pub deprecated: Option<Deprecation>,
    /// Handler set that registered this command, kept for diagnostics.
    pub registered_by: String,
}

impl fmt::Debug for HandlerDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerDescriptor")
            .field("command", &self.command)
            .field("params", &self.params)
            .field("return_kind", &self.return_kind)
            .field("registered_by", &self.registered_by)
            .finish_non_exhaustive()
    }
}

pub type SharedDescriptor = Arc<HandlerDescriptor>;
