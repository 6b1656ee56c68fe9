use serde_json::{json, Value};
use switchboard::dispatch::{handler_fn, Outcome};
use switchboard::metadata::{CommandSpec, Constraint, ParamSpec, ReturnKind, SemanticType};
use switchboard::registry::{HandlerSet, RegistryBuilder, RoutingTable};
use switchboard::validation::{validate, ValidationResult};

struct RegistrationSet;

impl HandlerSet for RegistrationSet {
    fn set_name(&self) -> &str {
        "RegistrationSet"
    }

    fn commands(&self) -> Vec<CommandSpec> {
        let address = SemanticType::Structured(vec![
            ParamSpec::required("street", SemanticType::Text),
            ParamSpec::required("zip_code", SemanticType::Text)
                .constrained(Constraint::pattern(r"^\d{5}$")),
        ]);
        vec![CommandSpec::new(
            "register",
            ReturnKind::Single,
            handler_fn(|_call| async move { Ok(Outcome::Single(Value::Null)) }),
        )
        .param(
            ParamSpec::required("name", SemanticType::Text).constrained(Constraint::Length {
                min: Some(2),
                max: Some(32),
            }),
        )
        .param(
            ParamSpec::required("age", SemanticType::Integer).constrained(Constraint::Range {
                min: Some(0.0),
                max: Some(130.0),
            }),
        )
        .param(ParamSpec::required("address", address))
        .param(
            ParamSpec::optional("tags", SemanticType::List(Box::new(SemanticType::Text)))
                .constrained(Constraint::Size {
                    min: None,
                    max: Some(3),
                }),
        )]
    }
}

fn build() -> RoutingTable {
    RegistryBuilder::new()
        .register(Box::new(RegistrationSet))
        .build()
        .expect("registry build")
}

fn reject(table: &RoutingTable, payload: Value) -> Vec<switchboard::validation::Violation> {
    let descriptor = table.lookup("register").expect("registered");
    match validate(descriptor, &payload) {
        ValidationResult::Rejected(violations) => violations,
        ValidationResult::Accepted(_) => panic!("payload should have been rejected"),
    }
}

#[test]
fn accepts_and_normalizes_a_valid_payload() {
    let table = build();
    let descriptor = table.lookup("register").expect("registered");
    let payload = json!({
        "name": "Ada",
        "age": 36.0,
        "address": {"street": "1 Loop Rd", "zip_code": "02139"},
    });
    match validate(descriptor, &payload) {
        ValidationResult::Accepted(args) => {
            // The integral float is normalized to an integer.
            assert_eq!(args.get("age"), Some(&json!(36)));
            assert_eq!(args.get("name"), Some(&json!("Ada")));
            assert!(args.get("tags").is_none(), "absent optional stays absent");
        }
        ValidationResult::Rejected(v) => panic!("unexpected violations: {:?}", v),
    }
}

#[test]
fn missing_required_parameter_is_reported_by_path() {
    let table = build();
    let violations = reject(
        &table,
        json!({"age": 10, "address": {"street": "x", "zip_code": "12345"}}),
    );
    assert!(violations.iter().any(|v| v.path == "name" && v.rule == "required"));
}

#[test]
fn all_violations_are_collected_in_one_pass() {
    let table = build();
    // Four independent problems, one rejection carrying all of them.
    let violations = reject(
        &table,
        json!({
            "name": "A",
            "age": 200,
            "address": {"street": "x", "zip_code": "abc"},
            "tags": ["a", "b", "c", "d"],
        }),
    );
    let paths: Vec<&str> = violations.iter().map(|v| v.path.as_str()).collect();
    assert!(paths.contains(&"name"), "length violation missing: {:?}", paths);
    assert!(paths.contains(&"age"), "range violation missing: {:?}", paths);
    assert!(
        paths.contains(&"address.zip_code"),
        "nested pattern violation missing: {:?}",
        paths
    );
    assert!(paths.contains(&"tags"), "size violation missing: {:?}", paths);
    assert_eq!(violations.len(), 4);
}

#[test]
fn type_mismatch_is_a_violation_not_a_crash() {
    let table = build();
    let violations = reject(
        &table,
        json!({"name": 7, "age": "old", "address": {"street": "x", "zip_code": "12345"}}),
    );
    let rules: Vec<(&str, &str)> = violations
        .iter()
        .map(|v| (v.path.as_str(), v.rule.as_str()))
        .collect();
    assert!(rules.contains(&("name", "type")));
    assert!(rules.contains(&("age", "type")));
}

#[test]
fn lossy_float_does_not_coerce_to_integer() {
    let table = build();
    let violations = reject(
        &table,
        json!({"name": "Ada", "age": 36.5, "address": {"street": "x", "zip_code": "12345"}}),
    );
    assert!(violations.iter().any(|v| v.path == "age" && v.rule == "type"));
}

#[test]
fn list_items_are_attributed_by_index() {
    let table = build();
    let violations = reject(
        &table,
        json!({
            "name": "Ada",
            "age": 36,
            "address": {"street": "x", "zip_code": "12345"},
            "tags": ["ok", 7],
        }),
    );
    assert!(violations.iter().any(|v| v.path == "tags[1]" && v.rule == "type"));
}

#[test]
fn non_object_payload_is_rejected_whole() {
    let table = build();
    let violations = reject(&table, json!("just a string"));
    assert_eq!(violations.len(), 1);
    assert_eq!(violations[0].rule, "payload");
}

#[test]
fn null_payload_reports_every_required_parameter() {
    let table = build();
    let violations = reject(&table, Value::Null);
    let paths: Vec<&str> = violations.iter().map(|v| v.path.as_str()).collect();
    assert!(paths.contains(&"name"));
    assert!(paths.contains(&"age"));
    assert!(paths.contains(&"address"));
    assert!(!paths.contains(&"tags"), "optional must not be required");
}
