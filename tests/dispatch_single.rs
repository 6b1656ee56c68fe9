mod common;

use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use switchboard::dispatch::Dispatcher;
use switchboard::pipeline::ConnectionContext;
use switchboard::wire::{ErrorKind, MessageEnvelope, PayloadKind};

fn dispatcher() -> Dispatcher {
    Dispatcher::new(Arc::new(common::build_table()), Arc::new(Vec::new()))
}

async fn collect_for(
    rx: &mut mpsc::Receiver<MessageEnvelope>,
    wait: Duration,
) -> Vec<MessageEnvelope> {
    let mut got = Vec::new();
    loop {
        match tokio::time::timeout(wait, rx.recv()).await {
            Ok(Some(envelope)) => got.push(envelope),
            _ => break,
        }
    }
    got
}

#[tokio::test]
async fn single_handler_yields_exactly_one_response_with_same_correlation() {
    let dispatcher = dispatcher();
    let ctx = ConnectionContext::new("test-peer");
    let (tx, mut rx) = mpsc::channel(8);

    let request = MessageEnvelope::request("echo", json!(7), json!({"text": "hi"}));
    dispatcher.dispatch(ctx, request, tx).await;

    let got = collect_for(&mut rx, Duration::from_millis(200)).await;
    assert_eq!(got.len(), 1, "exactly one terminal envelope");
    assert_eq!(got[0].kind, PayloadKind::Response);
    assert_eq!(got[0].correlation, json!(7));
    assert_eq!(got[0].payload, json!("hi"));
}

#[tokio::test]
async fn unknown_command_yields_a_not_found_error() {
    let dispatcher = dispatcher();
    let ctx = ConnectionContext::new("test-peer");
    let (tx, mut rx) = mpsc::channel(8);

    let request = MessageEnvelope::request("ghost", json!("corr-9"), json!({}));
    dispatcher.dispatch(ctx, request, tx).await;

    let got = collect_for(&mut rx, Duration::from_millis(200)).await;
    assert_eq!(got.len(), 1);
    assert_eq!(got[0].kind, PayloadKind::Error);
    assert_eq!(got[0].correlation, json!("corr-9"));
    let body = got[0].error_body().expect("error body");
    assert_eq!(body.error_kind, ErrorKind::NotFound);
}

#[tokio::test]
async fn validation_rejection_reports_the_full_violation_list() {
    let dispatcher = dispatcher();
    let ctx = ConnectionContext::new("test-peer");
    let (tx, mut rx) = mpsc::channel(8);

    // text is missing and no other parameter is declared, so exactly one
    // violation is expected, attributed to its field path.
    let request = MessageEnvelope::request("echo", json!(3), json!({}));
    dispatcher.dispatch(ctx, request, tx).await;

    let got = collect_for(&mut rx, Duration::from_millis(200)).await;
    assert_eq!(got.len(), 1);
    let body = got[0].error_body().expect("error body");
    assert_eq!(body.error_kind, ErrorKind::ValidationFailed);
    assert_eq!(body.violations.len(), 1);
    assert_eq!(body.violations[0].path, "text");
    assert_eq!(body.violations[0].rule, "required");
}

#[tokio::test]
async fn handler_failure_becomes_an_error_envelope() {
    let dispatcher = dispatcher();
    let ctx = ConnectionContext::new("test-peer");
    let (tx, mut rx) = mpsc::channel(8);

    let request = MessageEnvelope::request("fail", json!(11), json!({}));
    dispatcher.dispatch(ctx, request, tx).await;

    let got = collect_for(&mut rx, Duration::from_millis(200)).await;
    assert_eq!(got.len(), 1);
    assert_eq!(got[0].correlation, json!(11));
    let body = got[0].error_body().expect("error body");
    assert_eq!(body.error_kind, ErrorKind::HandlerFailure);
    assert!(body.message.contains("deliberate failure"));
}

#[tokio::test]
async fn fire_and_forget_emits_no_envelope() {
    let dispatcher = dispatcher();
    let ctx = ConnectionContext::new("test-peer");
    let (tx, mut rx) = mpsc::channel(8);

    let request = MessageEnvelope::request("note", json!(1), json!({"text": "fyi"}));
    dispatcher.dispatch(ctx, request, tx).await;

    let got = collect_for(&mut rx, Duration::from_millis(200)).await;
    assert!(got.is_empty(), "fire-and-forget must not reply, got {:?}", got);
}

#[tokio::test]
async fn session_attributes_persist_across_dispatches_on_one_connection() {
    use switchboard::dispatch::{handler_fn, Outcome};
    use switchboard::metadata::{CommandSpec, ParamSpec, ReturnKind, SemanticType};
    use switchboard::registry::{HandlerSet, RegistryBuilder};

    struct SessionSet;
    impl HandlerSet for SessionSet {
        fn set_name(&self) -> &str {
            "SessionSet"
        }
        fn commands(&self) -> Vec<CommandSpec> {
            vec![
                CommandSpec::new(
                    "set_name",
                    ReturnKind::FireAndForget,
                    handler_fn(|call| async move {
                        let name = call.arg("name").cloned().unwrap_or(serde_json::Value::Null);
                        call.context.set_attribute("name", name);
                        Ok(Outcome::Done)
                    }),
                )
                .param(ParamSpec::required("name", SemanticType::Text)),
                CommandSpec::new(
                    "whoami",
                    ReturnKind::Single,
                    handler_fn(|call| async move {
                        Ok(Outcome::Single(
                            call.context
                                .attribute("name")
                                .unwrap_or(serde_json::Value::Null),
                        ))
                    }),
                ),
            ]
        }
    }

    let table = RegistryBuilder::new()
        .register(Box::new(SessionSet))
        .build()
        .expect("build");
    let dispatcher = Dispatcher::new(Arc::new(table), Arc::new(Vec::new()));
    let ctx = ConnectionContext::new("test-peer");
    let (tx, mut rx) = mpsc::channel(8);

    dispatcher
        .dispatch(
            ctx.clone(),
            MessageEnvelope::request("set_name", json!(1), json!({"name": "ada"})),
            tx.clone(),
        )
        .await;
    // Fire-and-forget runs detached; give it a beat to store the attribute.
    tokio::time::sleep(Duration::from_millis(50)).await;
    dispatcher
        .dispatch(
            ctx,
            MessageEnvelope::request("whoami", json!(2), json!({})),
            tx,
        )
        .await;

    let got = collect_for(&mut rx, Duration::from_millis(200)).await;
    assert_eq!(got.len(), 1, "only whoami replies");
    assert_eq!(got[0].payload, json!("ada"));
}

#[tokio::test]
async fn outcome_contradicting_declared_kind_is_a_handler_failure() {
    use switchboard::dispatch::{handler_fn, Outcome};
    use switchboard::metadata::{CommandSpec, ReturnKind};
    use switchboard::registry::{HandlerSet, RegistryBuilder};

    struct LyingSet;
    impl HandlerSet for LyingSet {
        fn set_name(&self) -> &str {
            "LyingSet"
        }
        fn commands(&self) -> Vec<CommandSpec> {
            // Declares single, returns a stream.
            vec![CommandSpec::new(
                "lie",
                ReturnKind::Single,
                handler_fn(|_call| async move {
                    let (_tx, outcome) = Outcome::stream(1);
                    Ok(outcome)
                }),
            )]
        }
    }

    let table = RegistryBuilder::new()
        .register(Box::new(LyingSet))
        .build()
        .expect("build");
    let dispatcher = Dispatcher::new(Arc::new(table), Arc::new(Vec::new()));
    let ctx = ConnectionContext::new("test-peer");
    let (tx, mut rx) = mpsc::channel(8);

    dispatcher
        .dispatch(ctx, MessageEnvelope::request("lie", json!(5), json!({})), tx)
        .await;

    let got = collect_for(&mut rx, Duration::from_millis(200)).await;
    assert_eq!(got.len(), 1);
    let body = got[0].error_body().expect("error body");
    assert_eq!(body.error_kind, ErrorKind::HandlerFailure);
}
