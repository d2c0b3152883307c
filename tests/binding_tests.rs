mod common;

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use futures::future::join_all;
use rmcp::model::{CallToolResult, RawContent};
use serde_json::{json, Value};
use toolbridge::binding::{decode, encode};
use toolbridge::{
    BindError, CallContext, CancellationToken, InvocationError, InvocationResult, ToolArgs,
    ToolBinding,
};

use common::{args, calculate, CalculateArgs, TestArgs, TestResult};

async fn greet_test(_ctx: CallContext, args: TestArgs) -> Result<TestResult, String> {
    Ok(TestResult {
        message: format!("Hello, {}!", args.name),
    })
}

fn greet_binding() -> ToolBinding {
    ToolBinding::bind("test_tool", "A test tool", greet_test).unwrap()
}

/// A handler that records whether it ever ran.
fn tracked_binding(called: Arc<AtomicBool>) -> ToolBinding {
    ToolBinding::bind("tracked", "Tracks calls", move |_ctx: CallContext, args: TestArgs| {
        let called = Arc::clone(&called);
        async move {
            called.store(true, Ordering::SeqCst);
            Ok::<_, String>(TestResult { message: args.name })
        }
    })
    .unwrap()
}

fn text_of(result: &CallToolResult) -> String {
    match &result.content[0].raw {
        RawContent::Text(text) => text.text.clone(),
        other => panic!("expected text content, got {:?}", other),
    }
}

#[tokio::test]
async fn test_successful_invocation() {
    let binding = greet_binding();
    let result = binding
        .invoke(
            args(json!({ "name": "Alice", "age": 30, "category": "A" })),
            CancellationToken::new(),
        )
        .await;

    match result {
        InvocationResult::Structured(map) => {
            assert_eq!(map.get("message"), Some(&json!("Hello, Alice!")));
        }
        other => panic!("expected structured result, got {:?}", other),
    }
}

#[tokio::test]
async fn test_validation_failure_skips_handler() {
    let called = Arc::new(AtomicBool::new(false));
    let binding = tracked_binding(Arc::clone(&called));

    let result = binding
        .invoke(
            args(json!({ "name": "Al", "age": 30, "category": "A" })),
            CancellationToken::new(),
        )
        .await;

    assert!(result.is_error());
    assert!(matches!(result.error(), Some(InvocationError::Validation(_))));
    assert_eq!(
        result.error_message().unwrap(),
        "validation failed: name: must be at least 3"
    );
    assert!(!called.load(Ordering::SeqCst));
}

#[tokio::test]
async fn test_decode_failure_skips_handler() {
    let called = Arc::new(AtomicBool::new(false));
    let binding = tracked_binding(Arc::clone(&called));

    let result = binding
        .invoke(
            args(json!({ "name": "Alice", "age": "thirty", "category": "A" })),
            CancellationToken::new(),
        )
        .await;

    let error = result.error().unwrap();
    assert_eq!(error.stage(), "decode_failed");
    assert!(error.to_string().starts_with("failed to decode arguments:"));
    assert!(!called.load(Ordering::SeqCst));
}

#[tokio::test]
async fn test_missing_keys_keep_defaults() {
    let binding = greet_binding();
    let result = binding
        .invoke(
            args(json!({ "name": "Alice", "category": "A" })),
            CancellationToken::new(),
        )
        .await;

    // age stays 0, which the required rule rejects
    assert_eq!(
        result.error_message().unwrap(),
        "validation failed: age: is required"
    );
}

#[tokio::test]
async fn test_handler_error() {
    let binding = ToolBinding::bind("calculate", "Perform arithmetic", calculate).unwrap();

    let result = binding
        .invoke(
            args(json!({ "a": 10, "b": 0, "operation": "divide" })),
            CancellationToken::new(),
        )
        .await;

    assert!(result.is_error());
    assert_eq!(result.error().unwrap().stage(), "handler_failed");
    assert_eq!(result.error_message().unwrap(), "handler error: division by zero");
    assert_eq!(
        result.error_payload().unwrap(),
        json!({ "message": "handler error: division by zero" })
    );
}

#[tokio::test]
async fn test_calculate() {
    let binding = ToolBinding::bind("calculate", "Perform arithmetic", calculate).unwrap();

    let result = binding
        .invoke(
            args(json!({ "a": 7, "b": 2, "operation": "divide" })),
            CancellationToken::new(),
        )
        .await;

    match result {
        InvocationResult::Structured(map) => assert_eq!(map.get("result"), Some(&json!(3.5))),
        other => panic!("expected structured result, got {:?}", other),
    }
}

#[tokio::test]
async fn test_text_result() {
    let binding = ToolBinding::bind("echo", "Echo the name", |_ctx: CallContext, args: TestArgs| async move {
        Ok::<_, String>(format!("Hey {}!", args.name))
    })
    .unwrap();

    let result = binding
        .invoke(
            args(json!({ "name": "Alice", "age": 30, "category": "A" })),
            CancellationToken::new(),
        )
        .await;

    match result {
        InvocationResult::Text(text) => assert_eq!(text, "Hey Alice!"),
        other => panic!("expected text result, got {:?}", other),
    }
}

#[tokio::test]
async fn test_unencodable_result() {
    let binding = ToolBinding::bind("list", "Returns a list", |_ctx: CallContext, _args: TestArgs| async move {
        Ok::<_, String>(vec![1, 2, 3])
    })
    .unwrap();

    let result = binding
        .invoke(
            args(json!({ "name": "Alice", "age": 30, "category": "A" })),
            CancellationToken::new(),
        )
        .await;

    assert_eq!(result.error().unwrap().stage(), "encode_failed");
    assert_eq!(
        result.error_message().unwrap(),
        "failed to encode result: expected an object or a string, got array"
    );
}

#[test]
fn test_call_tool_result_mapping() {
    let structured = CallToolResult::from(InvocationResult::Structured(args(json!({ "ok": true }))));
    assert_eq!(structured.is_error, Some(false));
    assert_eq!(structured.structured_content, Some(json!({ "ok": true })));
    assert_eq!(text_of(&structured), r#"{"ok":true}"#);

    let text = CallToolResult::from(InvocationResult::Text("done".to_string()));
    assert_eq!(text.is_error, Some(false));
    assert_eq!(text_of(&text), "done");

    let failed = CallToolResult::from(InvocationResult::Failed(InvocationError::Handler(
        "boom".to_string(),
    )));
    assert_eq!(failed.is_error, Some(true));
    assert_eq!(text_of(&failed), "handler error: boom");
    assert_eq!(
        failed.structured_content,
        Some(json!({ "message": "handler error: boom" }))
    );
}

#[test]
fn test_encode_decode_round_trip() {
    let input = args(json!({
        "name": "Alice",
        "age": 30,
        "email": "alice@example.com",
        "category": "B"
    }));

    let decoded = decode::<TestArgs>(input.clone()).unwrap();
    assert_eq!(decoded.age, 30);
    assert_eq!(decoded.field_values().values(), &input);

    match encode(&decoded).unwrap() {
        InvocationResult::Structured(map) => assert_eq!(map, input),
        other => panic!("expected structured result, got {:?}", other),
    }
}

#[test]
fn test_encode_rejects_non_objects() {
    assert!(matches!(encode(&"plain").unwrap(), InvocationResult::Text(_)));

    let err = encode(&42).unwrap_err();
    assert_eq!(err.to_string(), "failed to encode result: expected an object or a string, got number");

    let err = encode(&Value::Null).unwrap_err();
    assert!(err.to_string().ends_with("got null"));
}

#[test]
fn test_bind_errors() {
    let err = ToolBinding::bind("", "No name", greet_test).unwrap_err();
    assert!(matches!(err, BindError::MissingIdentifier));

    let err = ToolBinding::bind("   ", "Blank name", greet_test).unwrap_err();
    assert!(matches!(err, BindError::MissingIdentifier));

    let err = ToolBinding::bind("scalar", "Takes a string", |_ctx: CallContext, input: String| async move {
        Ok::<_, String>(input)
    })
    .unwrap_err();
    match err {
        BindError::SchemaDerivation { tool, source } => {
            assert_eq!(tool, "scalar");
            assert_eq!(source.found, "string");
        }
        other => panic!("expected schema derivation error, got {:?}", other),
    }
}

#[test]
fn test_binding_exposes_schema() {
    let binding = greet_binding();
    let tool = binding.to_tool();

    assert_eq!(tool.name, "test_tool");
    assert_eq!(tool.description.as_deref(), Some("A test tool"));
    assert_eq!(tool.input_schema.get("type"), Some(&json!("object")));
    assert_eq!(binding.descriptor().required, vec!["name", "age", "category"]);
    assert_eq!(binding.schema().as_ref(), &binding.descriptor().to_json_schema());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_invocations() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let binding = ToolBinding::bind("count", "Counts calls", move |_ctx: CallContext, args: TestArgs| {
        let counter = Arc::clone(&counter);
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            tokio::task::yield_now().await;
            Ok::<_, String>(TestResult { message: args.name })
        }
    })
    .unwrap();

    let tasks = (0..16).map(|i| {
        let binding = binding.clone();
        tokio::spawn(async move {
            let name = format!("caller-{:02}", i);
            let result = binding
                .invoke(
                    args(json!({ "name": name, "age": 20 + i, "category": "C" })),
                    CancellationToken::new(),
                )
                .await;
            (name, result)
        })
    });

    for joined in join_all(tasks).await {
        let (name, result) = joined.unwrap();
        match result {
            InvocationResult::Structured(map) => assert_eq!(map.get("message"), Some(&json!(name))),
            other => panic!("expected structured result, got {:?}", other),
        }
    }
    assert_eq!(calls.load(Ordering::SeqCst), 16);
}

#[tokio::test]
async fn test_cancellation_reaches_handler() {
    let binding = ToolBinding::bind("slow", "Waits for cancellation", |ctx: CallContext, _args: TestArgs| async move {
        assert_eq!(ctx.tool(), "slow");
        ctx.cancelled().await;
        Err::<TestResult, _>("cancelled".to_string())
    })
    .unwrap();

    let ct = CancellationToken::new();
    ct.cancel();

    let result = binding
        .invoke(args(json!({ "name": "Alice", "age": 30, "category": "A" })), ct)
        .await;

    assert_eq!(result.error_message().unwrap(), "handler error: cancelled");
}

#[tokio::test]
async fn test_invoke_with_context() {
    let binding = ToolBinding::bind("ctx", "Reports context", |ctx: CallContext, _args: TestArgs| async move {
        Ok::<_, String>(format!("{}:{}", ctx.tool(), ctx.is_cancelled()))
    })
    .unwrap();

    let result = binding
        .invoke_with(
            args(json!({ "name": "Alice", "age": 30, "category": "A" })),
            CallContext::new("renamed", CancellationToken::new()),
        )
        .await;

    match result {
        InvocationResult::Text(text) => assert_eq!(text, "renamed:false"),
        other => panic!("expected text result, got {:?}", other),
    }
}
