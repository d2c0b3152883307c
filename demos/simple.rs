use rmcp::{transport::stdio, ServiceExt};
use serde::{Deserialize, Serialize};
use toolbridge::{CallContext, ServerOptions, ToolArgs, ToolRegistry};
use tracing_subscriber::EnvFilter;

// ============================================================================================
// Step 1: Define Tool Arguments
// ============================================================================================
// `#[schema]` drives the JSON schema clients see, `#[validate]` is checked on every call.
// Missing keys keep their `Default` value.
#[derive(Debug, Default, Serialize, Deserialize, ToolArgs)]
pub struct GreetArgs {
    #[schema("required,description=Name to greet")]
    #[validate("required,min=1")]
    pub name: String,
    #[schema("enum=formal,enum=casual,description=Greeting style")]
    #[validate("omitempty,oneof=formal casual")]
    pub format: String,
}

#[derive(Debug, Default, Serialize, Deserialize, ToolArgs)]
pub struct CalculateArgs {
    #[schema("required,description=First number")]
    #[validate("required")]
    pub a: i64,
    #[schema("required,description=Second number")]
    pub b: i64,
    #[schema("required,enum=add,enum=subtract,enum=multiply,enum=divide,description=Operation to perform")]
    #[validate("required,oneof=add subtract multiply divide")]
    pub operation: String,
}

#[derive(Debug, Serialize)]
pub struct GreetResult {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct CalculateResult {
    pub result: f64,
}

// ============================================================================================
// Step 2: Define the Handlers
// ============================================================================================
async fn greet(_ctx: CallContext, args: GreetArgs) -> Result<GreetResult, String> {
    let message = if args.format == "formal" {
        format!("Good day, {}", args.name)
    } else {
        format!("Hey {}!", args.name)
    };
    Ok(GreetResult { message })
}

async fn calculate(_ctx: CallContext, args: CalculateArgs) -> Result<CalculateResult, String> {
    let result = match args.operation.as_str() {
        "add" => (args.a + args.b) as f64,
        "subtract" => (args.a - args.b) as f64,
        "multiply" => (args.a * args.b) as f64,
        "divide" => {
            if args.b == 0 {
                return Err("division by zero".to_string());
            }
            args.a as f64 / args.b as f64
        }
        other => return Err(format!("unsupported operation: {}", other)),
    };
    Ok(CalculateResult { result })
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // stdout carries the MCP protocol, so logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    // ============================================================================================
    // Step 3: Register Tools
    // ============================================================================================
    let mut registry = ToolRegistry::with_options(ServerOptions::new("simple-example", "1.0.0"));

    registry.register("greet", "Greet someone by name with optional format", greet)?;
    registry.register("calculate", "Perform basic arithmetic operations", calculate)?;

    // A clap command lends its name and about text to the tool.
    let greet_command = clap::Command::new("greet-command").about("Greet someone using a clap command");
    registry.register_command(&greet_command, greet)?;

    // ============================================================================================
    // Step 4: Serve over stdio
    // ============================================================================================
    tracing::info!("Starting MCP server with {} tools", registry.len());
    registry.serve(stdio()).await?.waiting().await?;

    Ok(())
}
