mod common;

use serde_json::Value;
use switchboard::dispatch::{handler_fn, Outcome};
use switchboard::metadata::{CommandSpec, Constraint, ParamSpec, ReturnKind, SemanticType};
use switchboard::registry::{HandlerSet, RegistrationError, RegistryBuilder};

fn noop_single(name: &str) -> CommandSpec {
    CommandSpec::new(
        name,
        ReturnKind::Single,
        handler_fn(|_call| async move { Ok(Outcome::Single(Value::Null)) }),
    )
}

struct NamedSet {
    name: &'static str,
    namespace: &'static str,
    commands: Vec<&'static str>,
}

impl HandlerSet for NamedSet {
    fn namespace(&self) -> &str {
        self.namespace
    }
    fn set_name(&self) -> &str {
        self.name
    }
    fn commands(&self) -> Vec<CommandSpec> {
        self.commands.iter().map(|c| noop_single(c)).collect()
    }
}

#[tokio::test]
async fn build_and_lookup_registered_commands() {
    let table = common::build_table();
    assert_eq!(table.len(), 5);

    let echo = table.lookup("echo").expect("echo registered");
    assert_eq!(echo.command.qualified(), "core.echo");
    assert_eq!(echo.return_kind, ReturnKind::Single);

    // Qualified and case-insensitive lookups resolve to the same entry.
    assert!(table.lookup("core.echo").is_some());
    assert!(table.lookup("ECHO").is_some());
    assert!(table.lookup("ghost").is_none());
}

#[tokio::test]
async fn same_command_in_two_namespaces_is_allowed() {
    let table = RegistryBuilder::new()
        .register(Box::new(NamedSet {
            name: "Admin",
            namespace: "admin",
            commands: vec!["status"],
        }))
        .register(Box::new(NamedSet {
            name: "Public",
            namespace: "public",
            commands: vec!["status"],
        }))
        .build()
        .expect("distinct namespaces must coexist");

    assert!(table.lookup("admin.status").is_some());
    assert!(table.lookup("public.status").is_some());
    // A bare name resolves in the default namespace only.
    assert!(table.lookup("status").is_none());
}

#[tokio::test]
async fn duplicate_command_fails_build_with_both_set_names() {
    let result = RegistryBuilder::new()
        .register(Box::new(NamedSet {
            name: "Zeta",
            namespace: "core",
            commands: vec!["ping"],
        }))
        .register(Box::new(NamedSet {
            name: "Alpha",
            namespace: "core",
            commands: vec!["ping", "pong"],
        }))
        .build();

    match result {
        Err(RegistrationError::DuplicateCommand {
            command,
            first,
            second,
        }) => {
            assert_eq!(command, "core.ping");
            // Lexical scan order makes the diagnostic reproducible: Alpha
            // registers first, Zeta is reported as the collision.
            assert_eq!(first, "Alpha");
            assert_eq!(second, "Zeta");
        }
        other => panic!("expected duplicate command error, got {:?}", other.map(|t| t.len())),
    }
}

#[tokio::test]
async fn duplicate_detection_is_case_insensitive() {
    let result = RegistryBuilder::new()
        .register(Box::new(NamedSet {
            name: "A",
            namespace: "core",
            commands: vec!["Ping"],
        }))
        .register(Box::new(NamedSet {
            name: "B",
            namespace: "core",
            commands: vec!["PING"],
        }))
        .build();
    assert!(matches!(
        result,
        Err(RegistrationError::DuplicateCommand { .. })
    ));
}

struct BadConstraintSet;

impl HandlerSet for BadConstraintSet {
    fn set_name(&self) -> &str {
        "BadConstraintSet"
    }
    fn commands(&self) -> Vec<CommandSpec> {
        vec![noop_single("shout").param(
            ParamSpec::required("text", SemanticType::Text).constrained(Constraint::Range {
                min: Some(0.0),
                max: None,
            }),
        )]
    }
}

#[tokio::test]
async fn constraint_on_wrong_type_fails_build() {
    let result = RegistryBuilder::new()
        .register(Box::new(BadConstraintSet))
        .build();
    match result {
        Err(RegistrationError::InvalidConstraint { command, path, .. }) => {
            assert_eq!(command, "core.shout");
            assert_eq!(path, "text");
        }
        other => panic!("expected invalid constraint, got {:?}", other.map(|t| t.len())),
    }
}

struct BadPatternSet;

impl HandlerSet for BadPatternSet {
    fn set_name(&self) -> &str {
        "BadPatternSet"
    }
    fn commands(&self) -> Vec<CommandSpec> {
        vec![noop_single("find").param(
            ParamSpec::required("query", SemanticType::Text)
                .constrained(Constraint::pattern("(unclosed")),
        )]
    }
}

#[tokio::test]
async fn uncompilable_pattern_fails_build() {
    let result = RegistryBuilder::new().register(Box::new(BadPatternSet)).build();
    assert!(matches!(
        result,
        Err(RegistrationError::InvalidConstraint { .. })
    ));
}

struct EmptyStructuredSet;

impl HandlerSet for EmptyStructuredSet {
    fn set_name(&self) -> &str {
        "EmptyStructuredSet"
    }
    fn commands(&self) -> Vec<CommandSpec> {
        vec![noop_single("save")
            .param(ParamSpec::required("record", SemanticType::Structured(vec![])))]
    }
}

#[tokio::test]
async fn empty_structured_parameter_fails_build() {
    let result = RegistryBuilder::new()
        .register(Box::new(EmptyStructuredSet))
        .build();
    assert!(matches!(
        result,
        Err(RegistrationError::UnresolvableType { .. })
    ));
}

#[tokio::test]
async fn report_lists_every_command_in_order() {
    let table = common::build_table();
    let report = table.report();
    assert!(report.contains("5 command(s)"));
    let countdown = report.find("core.countdown").expect("countdown listed");
    let echo = report.find("core.echo").expect("echo listed");
    let note = report.find("core.note").expect("note listed");
    assert!(countdown < echo && echo < note, "report must be lexically ordered");
    assert!(report.contains("fire-and-forget"));
}
