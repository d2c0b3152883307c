mod common;

use serde::{Deserialize, Serialize};
use serde_json::json;
use toolbridge::{
    BindError, CallContext, CancellationToken, CommandInfo, CommandOutcome, CommandSource,
    InvocationResult, ToolArgs, ToolRegistry,
};

use common::{args, TestArgs, TestResult};

#[derive(Debug, Default, Serialize, Deserialize, ToolArgs)]
struct DeployArgs {
    #[schema("required,description=Deployment target")]
    #[validate("required,oneof=staging production")]
    target: String,
    #[schema("description=Skip confirmation")]
    force: bool,
}

async fn greet_handler(_ctx: CallContext, args: TestArgs) -> Result<TestResult, String> {
    Ok(TestResult {
        message: format!("Hello, {}!", args.name),
    })
}

#[test]
fn test_clap_command_identity() {
    let command = clap::Command::new("test-cmd").about("Test command description");

    assert_eq!(
        command.tool_identity(),
        Some(("test-cmd".to_string(), "Test command description".to_string()))
    );
}

#[test]
fn test_description_fallbacks() {
    let long_only = clap::Command::new("report").long_about("Generate the weekly report");
    assert_eq!(
        long_only.tool_identity().unwrap().1,
        "Generate the weekly report"
    );

    let bare = clap::Command::new("report");
    assert_eq!(bare.tool_identity().unwrap().1, "Execute report command");

    let blank = CommandInfo::new("sync").with_short("   ").with_long("Synchronize state");
    assert_eq!(blank.tool_identity().unwrap().1, "Synchronize state");

    let both = CommandInfo::new("sync")
        .with_short("Sync now")
        .with_long("Synchronize state");
    assert_eq!(both.tool_identity().unwrap().1, "Sync now");
}

#[test]
fn test_register_clap_command() {
    let mut registry = ToolRegistry::new();
    let command = clap::Command::new("test-cmd").about("Test command description");

    registry.register_command(&command, greet_handler).unwrap();

    let tool = registry.get("test-cmd").unwrap();
    assert_eq!(tool.description(), "Test command description");
    assert_eq!(tool.descriptor().required, vec!["name", "age", "category"]);
}

#[test]
fn test_command_without_identifier_is_rejected() {
    let mut registry = ToolRegistry::new();

    let err = registry
        .register_command(&CommandInfo::default(), greet_handler)
        .unwrap_err();
    assert!(matches!(err, BindError::MissingIdentifier));

    let err = registry
        .register_command(&clap::Command::new(""), greet_handler)
        .unwrap_err();
    assert!(matches!(err, BindError::MissingIdentifier));

    assert!(registry.is_empty());
    assert!(registry.definitions().is_empty());
}

#[tokio::test]
async fn test_command_runner_success() {
    let mut registry = ToolRegistry::new();
    let command = clap::Command::new("deploy").about("Deploy the service");

    registry
        .register_command_runner(&command, |_args: &DeployArgs| Ok::<(), String>(()))
        .unwrap();

    let result = registry
        .call(
            "deploy",
            args(json!({ "target": "staging" })),
            CancellationToken::new(),
        )
        .await
        .unwrap();

    match result {
        InvocationResult::Structured(map) => {
            assert_eq!(
                serde_json::from_value::<CommandOutcome>(map.into()).unwrap(),
                CommandOutcome {
                    success: true,
                    message: "Command deploy executed successfully".to_string(),
                }
            );
        }
        other => panic!("expected structured result, got {:?}", other),
    }
}

#[tokio::test]
async fn test_command_runner_failure() {
    let mut registry = ToolRegistry::new();
    let command = clap::Command::new("deploy").about("Deploy the service");

    registry
        .register_command_runner(&command, |args: &DeployArgs| {
            if args.target == "production" && !args.force {
                Err("production deploys require force".to_string())
            } else {
                Ok(())
            }
        })
        .unwrap();

    let result = registry
        .call(
            "deploy",
            args(json!({ "target": "production" })),
            CancellationToken::new(),
        )
        .await
        .unwrap();
    assert_eq!(
        result.error_message().unwrap(),
        "handler error: production deploys require force"
    );

    let result = registry
        .call(
            "deploy",
            args(json!({ "target": "moon" })),
            CancellationToken::new(),
        )
        .await
        .unwrap();
    assert_eq!(
        result.error_message().unwrap(),
        "validation failed: target: must be one of: staging production"
    );
}
