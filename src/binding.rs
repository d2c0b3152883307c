//! Tool bindings: a derived schema, a validation rule set and a handler,
//! bound under one tool name.
//!
//! Every invocation runs the same linear pipeline:
//!
//! ```text
//! decode -> validate -> invoke -> encode
//! ```
//!
//! A failure at any stage ends the call with an [`InvocationResult::Failed`]
//! and the later stages never run. In particular the handler never sees
//! arguments that failed decoding or validation.

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use rmcp::model::{CallToolResult, Content, Tool};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{BindError, InvocationError};
use crate::options::SchemaOptions;
use crate::schema::{json_type, ArgumentDescriptor, JsonObject, Shape, ToolArgs};
use crate::tools::{CallContext, ToolHandler};
use crate::validate::RuleSet;

/// Outcome of one invocation, as reported to the caller.
///
/// Failures are ordinary results, not transport errors.
#[derive(Debug)]
pub enum InvocationResult {
    /// The handler's result encoded as a JSON object.
    Structured(JsonObject),
    /// The handler's result was a plain string.
    Text(String),
    Failed(InvocationError),
}

impl InvocationResult {
    pub fn is_error(&self) -> bool {
        matches!(self, InvocationResult::Failed(_))
    }

    pub fn error(&self) -> Option<&InvocationError> {
        match self {
            InvocationResult::Failed(error) => Some(error),
            _ => None,
        }
    }

    /// The failure message, e.g. `handler error: division by zero`.
    pub fn error_message(&self) -> Option<String> {
        self.error().map(ToString::to_string)
    }

    /// The `{ "message": ... }` payload sent for failures.
    pub fn error_payload(&self) -> Option<Value> {
        self.error_message().map(|message| json!({ "message": message }))
    }
}

impl From<InvocationResult> for CallToolResult {
    fn from(result: InvocationResult) -> Self {
        match result {
            InvocationResult::Structured(map) => {
                let structured = Value::Object(map);
                let mut call_result =
                    CallToolResult::success(vec![Content::text(structured.to_string())]);
                call_result.structured_content = Some(structured);
                call_result
            }
            InvocationResult::Text(text) => CallToolResult::success(vec![Content::text(text)]),
            InvocationResult::Failed(error) => {
                let message = error.to_string();
                let mut call_result = CallToolResult::error(vec![Content::text(message.clone())]);
                call_result.structured_content = Some(json!({ "message": message }));
                call_result
            }
        }
    }
}

/// Type-erased invocation pipeline of a single tool.
#[async_trait]
trait Invoke: Send + Sync {
    async fn invoke(&self, args: JsonObject, ctx: CallContext) -> InvocationResult;
}

struct Pipeline<A, H> {
    rules: RuleSet,
    handler: H,
    _args: PhantomData<fn() -> A>,
}

#[async_trait]
impl<A, H> Invoke for Pipeline<A, H>
where
    A: ToolArgs + Serialize + DeserializeOwned + Default + Send + 'static,
    H: ToolHandler<A> + 'static,
{
    async fn invoke(&self, args: JsonObject, ctx: CallContext) -> InvocationResult {
        let tool = ctx.tool().to_string();

        debug!("Decoding {} argument(s) for tool {}", args.len(), tool);
        let decoded = match decode::<A>(args) {
            Ok(decoded) => decoded,
            Err(e) => return failed(&tool, e),
        };

        debug!("Validating arguments for tool {}", tool);
        if let Err(errors) = self.rules.validate(&decoded) {
            return failed(&tool, errors.into());
        }

        debug!("Invoking handler for tool {}", tool);
        let output = match self.handler.call(ctx, decoded).await {
            Ok(output) => output,
            Err(e) => return failed(&tool, InvocationError::Handler(e.to_string())),
        };

        match encode(&output) {
            Ok(result) => {
                info!("Tool {} executed successfully", tool);
                result
            }
            Err(e) => failed(&tool, e),
        }
    }
}

fn failed(tool: &str, error: InvocationError) -> InvocationResult {
    warn!(stage = error.stage(), "Tool {} execution failed: {}", tool, error);
    InvocationResult::Failed(error)
}

/// Build a fresh `A` from its zero value overlaid with the caller's arguments.
///
/// Keys the caller leaves out keep their `Default` value. The defaults are
/// keyed by wire name, the same keys the caller uses.
pub fn decode<A>(args: JsonObject) -> Result<A, InvocationError>
where
    A: ToolArgs + Serialize + DeserializeOwned + Default,
{
    let mut merged = A::default().field_values().into_values();
    merged.extend(args);

    serde_json::from_value(Value::Object(merged)).map_err(|e| InvocationError::Decode(e.to_string()))
}

/// Encode a handler result: objects stay structured, strings become raw text.
pub fn encode<O: Serialize>(output: &O) -> Result<InvocationResult, InvocationError> {
    match serde_json::to_value(output) {
        Ok(Value::Object(map)) => Ok(InvocationResult::Structured(map)),
        Ok(Value::String(text)) => Ok(InvocationResult::Text(text)),
        Ok(other) => Err(InvocationError::Encode(format!(
            "expected an object or a string, got {}",
            json_type(&other)
        ))),
        Err(e) => Err(InvocationError::Encode(e.to_string())),
    }
}

/// A registered tool: name, description, schema and invocation pipeline.
///
/// Immutable once bound and cheap to clone. Safe to invoke concurrently.
#[derive(Clone)]
pub struct ToolBinding {
    name: String,
    description: String,
    descriptor: ArgumentDescriptor,
    schema: Arc<JsonObject>,
    invoker: Arc<dyn Invoke>,
}

impl ToolBinding {
    /// Bind a handler under `name`, deriving the schema from `A`.
    ///
    /// # Errors
    /// - [`BindError::MissingIdentifier`] if `name` is empty or blank.
    /// - [`BindError::SchemaDerivation`] if `A` is not a struct with named fields.
    pub fn bind<A, H>(
        name: impl Into<String>,
        description: impl Into<String>,
        handler: H,
    ) -> Result<Self, BindError>
    where
        A: ToolArgs + Serialize + DeserializeOwned + Default + Send + 'static,
        H: ToolHandler<A> + 'static,
    {
        Self::bind_with_options(name, description, handler, &SchemaOptions::default())
    }

    pub fn bind_with_options<A, H>(
        name: impl Into<String>,
        description: impl Into<String>,
        handler: H,
        options: &SchemaOptions,
    ) -> Result<Self, BindError>
    where
        A: ToolArgs + Serialize + DeserializeOwned + Default + Send + 'static,
        H: ToolHandler<A> + 'static,
    {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(BindError::MissingIdentifier);
        }

        let shape = A::shape();
        let rules = match &shape {
            Shape::Record(specs) => RuleSet::from_fields(specs),
            _ => RuleSet::default(),
        };
        for (field, rule) in rules.unknown_rules() {
            warn!(
                "Tool {} field {} uses unknown validation rule {}; every call will fail it",
                name, field, rule
            );
        }
        let descriptor = ArgumentDescriptor::from_shape(A::type_name(), shape, options)
            .map_err(|source| BindError::SchemaDerivation {
                tool: name.clone(),
                source,
            })?;
        let schema = Arc::new(descriptor.to_json_schema());

        let pipeline = Pipeline::<A, H> {
            rules,
            handler,
            _args: PhantomData,
        };

        Ok(Self {
            name,
            description: description.into(),
            descriptor,
            schema,
            invoker: Arc::new(pipeline),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn descriptor(&self) -> &ArgumentDescriptor {
        &self.descriptor
    }

    /// The input schema advertised to callers.
    pub fn schema(&self) -> &Arc<JsonObject> {
        &self.schema
    }

    /// MCP tool definition for `tools/list`.
    pub fn to_tool(&self) -> Tool {
        Tool::new(
            self.name.clone(),
            self.description.clone(),
            Arc::clone(&self.schema),
        )
    }

    /// Run the pipeline for one call.
    pub async fn invoke(&self, args: JsonObject, ct: CancellationToken) -> InvocationResult {
        self.invoke_with(args, CallContext::new(self.name.clone(), ct))
            .await
    }

    pub async fn invoke_with(&self, args: JsonObject, ctx: CallContext) -> InvocationResult {
        self.invoker.invoke(args, ctx).await
    }
}

impl fmt::Debug for ToolBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolBinding")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("schema", &self.schema)
            .finish_non_exhaustive()
    }
}
