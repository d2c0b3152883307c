#![allow(dead_code)]

use serde::{Deserialize, Serialize};
use serde_json::Value;
use toolbridge::{CallContext, JsonObject, ToolArgs};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToolArgs)]
pub struct TestArgs {
    #[schema("required,description=Test name")]
    #[validate("required,min=3")]
    pub name: String,
    #[schema("required,minimum=0,maximum=120,description=Test age")]
    #[validate("required,gte=0,lte=120")]
    pub age: i64,
    #[schema("description=Optional email")]
    #[validate("omitempty,email")]
    pub email: String,
    #[schema("enum=A,enum=B,enum=C,description=Category")]
    #[validate("required,oneof=A B C")]
    pub category: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestResult {
    pub message: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToolArgs)]
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

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalculateResult {
    pub result: f64,
}

pub async fn calculate(_ctx: CallContext, args: CalculateArgs) -> Result<CalculateResult, String> {
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

pub fn args(value: Value) -> JsonObject {
    match value {
        Value::Object(map) => map,
        other => panic!("expected a JSON object, got {}", other),
    }
}
