// src/validation.rs
// Declarative constraint evaluation over decoded request payloads. Collects
// every violation before returning so the peer gets one complete diagnostic.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use crate::metadata::{Constraint, HandlerDescriptor, ParamSpec, SemanticType};

/// One failed constraint, attributed to a dotted/indexed field path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    pub path: String,
    pub rule: String,
    pub message: String,
}

impl Violation {
    fn new(path: impl Into<String>, rule: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            rule: rule.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} ({})", self.path, self.message, self.rule)
    }
}

/// Either the normalized arguments or the full set of violations. Never
/// partially valid.
#[derive(Debug)]
pub enum ValidationResult {
    Accepted(Map<String, Value>),
    Rejected(Vec<Violation>),
}

impl ValidationResult {
    pub fn is_accepted(&self) -> bool {
        matches!(self, ValidationResult::Accepted(_))
    }

    pub fn violations(&self) -> &[Violation] {
        match self {
            ValidationResult::Accepted(_) => &[],
            ValidationResult::Rejected(v) => v,
        }
    }
}

/// Validate a raw request payload against a descriptor's parameter specs.
/// Coercion failures are violations, not panics.
pub fn validate(descriptor: &HandlerDescriptor, payload: &Value) -> ValidationResult {
    let empty = Map::new();
    let fields = match payload {
        Value::Object(map) => map,
        Value::Null => &empty,
        other => {
            return ValidationResult::Rejected(vec![Violation::new(
                "",
                "payload",
                format!("payload must be an object, got {}", value_kind(other)),
            )]);
        }
    };

    let mut violations = Vec::new();
    let mut normalized = Map::new();
    for spec in &descriptor.params {
        if let Some(value) = check_param(&spec.name, spec, fields.get(&spec.name), &mut violations)
        {
            normalized.insert(spec.name.clone(), value);
        }
    }

    if violations.is_empty() {
        ValidationResult::Accepted(normalized)
    } else {
        ValidationResult::Rejected(violations)
    }
}

fn check_param(
    path: &str,
    spec: &ParamSpec,
    value: Option<&Value>,
    out: &mut Vec<Violation>,
) -> Option<Value> {
    let value = match value {
        None | Some(Value::Null) => {
            if spec.required {
                out.push(Violation::new(
                    path,
                    "required",
                    format!("missing required parameter '{}'", spec.name),
                ));
            }
            return None;
        }
        Some(v) => v,
    };

    let coerced = coerce(path, value, &spec.semantic_type, out)?;
    for constraint in &spec.constraints {
        if let Some(violation) = evaluate(path, constraint, &coerced) {
            out.push(violation);
        }
    }
    Some(coerced)
}

/// Coerce a raw value to the declared semantic type, recursing into
/// structured and list shapes. Pushes a violation and returns None on
/// mismatch.
fn coerce(path: &str, value: &Value, ty: &SemanticType, out: &mut Vec<Violation>) -> Option<Value> {
    match ty {
        SemanticType::Text => match value {
            Value::String(s) => Some(Value::String(s.clone())),
            other => mismatch(path, ty, other, out),
        },
        SemanticType::Integer => match value {
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Some(Value::from(i))
                } else if let Some(f) = n.as_f64() {
                    // Integral floats coerce; lossy ones do not.
                    if f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64 {
                        Some(Value::from(f as i64))
                    } else {
                        mismatch(path, ty, value, out)
                    }
                } else {
                    mismatch(path, ty, value, out)
                }
            }
            other => mismatch(path, ty, other, out),
        },
        SemanticType::Float => match value {
            Value::Number(n) => n
                .as_f64()
                .map(Value::from)
                .or_else(|| mismatch(path, ty, value, out)),
            other => mismatch(path, ty, other, out),
        },
        SemanticType::Boolean => match value {
            Value::Bool(b) => Some(Value::Bool(*b)),
            other => mismatch(path, ty, other, out),
        },
        SemanticType::Structured(specs) => match value {
            Value::Object(map) => {
                let before = out.len();
                let mut object = Map::new();
                for spec in specs {
                    let nested_path = format!("{}.{}", path, spec.name);
                    if let Some(v) = check_param(&nested_path, spec, map.get(&spec.name), out) {
                        object.insert(spec.name.clone(), v);
                    }
                }
                if out.len() > before {
                    None
                } else {
                    Some(Value::Object(object))
                }
            }
            other => mismatch(path, ty, other, out),
        },
        SemanticType::List(element) => match value {
            Value::Array(items) => {
                let before = out.len();
                let mut coerced_items = Vec::with_capacity(items.len());
                for (idx, item) in items.iter().enumerate() {
                    let item_path = format!("{}[{}]", path, idx);
                    if let Some(v) = coerce(&item_path, item, element, out) {
                        coerced_items.push(v);
                    }
                }
                if out.len() > before {
                    None
                } else {
                    Some(Value::Array(coerced_items))
                }
            }
            other => mismatch(path, ty, other, out),
        },
    }
}

fn mismatch(
    path: &str,
    ty: &SemanticType,
    value: &Value,
    out: &mut Vec<Violation>,
) -> Option<Value> {
    out.push(Violation::new(
        path,
        "type",
        format!("expected {}, got {}", ty.label(), value_kind(value)),
    ));
    None
}

/// Evaluate one constraint rule against an already coerced value. Value
/// shapes the rule cannot apply to are rejected at registry build time, so
/// they pass silently here.
fn evaluate(path: &str, constraint: &Constraint, value: &Value) -> Option<Violation> {
    match constraint {
        Constraint::Range { min, max } => {
            let n = value.as_f64()?;
            if let Some(min) = min {
                if n < *min {
                    return Some(Violation::new(
                        path,
                        "range",
                        format!("must be at least {}", min),
                    ));
                }
            }
            if let Some(max) = max {
                if n > *max {
                    return Some(Violation::new(
                        path,
                        "range",
                        format!("must be at most {}", max),
                    ));
                }
            }
            None
        }
        Constraint::Pattern(rule) => {
            let s = value.as_str()?;
            match rule.compiled() {
                Ok(re) if re.is_match(s) => None,
                Ok(_) => Some(Violation::new(
                    path,
                    "pattern",
                    format!("does not match pattern '{}'", rule.source()),
                )),
                Err(_) => Some(Violation::new(
                    path,
                    "pattern",
                    format!("invalid pattern '{}'", rule.source()),
                )),
            }
        }
        Constraint::Length { min, max } => {
            let len = value.as_str()?.chars().count();
            bounds_violation(path, "length", len, *min, *max)
        }
        Constraint::Size { min, max } => {
            let len = value.as_array()?.len();
            bounds_violation(path, "size", len, *min, *max)
        }
    }
}

fn bounds_violation(
    path: &str,
    rule: &str,
    actual: usize,
    min: Option<usize>,
    max: Option<usize>,
) -> Option<Violation> {
    if let Some(min) = min {
        if actual < min {
            return Some(Violation::new(
                path,
                rule,
                format!("{} must be at least {}, was {}", rule, min, actual),
            ));
        }
    }
    if let Some(max) = max {
        if actual > max {
            return Some(Violation::new(
                path,
                rule,
                format!("{} must be at most {}, was {}", rule, max, actual),
            ));
        }
    }
    None
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "text",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
