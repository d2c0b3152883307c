//! # toolbridge - typed, validated MCP tools
//!
//! Turns an annotated Rust argument struct plus an async handler into an MCP
//! tool: the struct's annotations become the advertised input schema, and
//! every call is decoded, validated and only then handed to the handler.
//!
//! ## Architecture
//!
//! 1. **Schema derivation** ([`schema`]): `#[derive(ToolArgs)]` describes the
//!    struct's fields; [`ArgumentDescriptor`] turns `#[schema("...")]`
//!    annotations into a JSON object schema.
//! 2. **Validation** ([`validate`]): `#[validate("...")]` rules are checked
//!    against each decoded instance. Every violated rule is reported.
//! 3. **Binding** ([`binding`]): a [`ToolBinding`] owns the schema, the rules
//!    and the handler and runs decode → validate → invoke → encode per call.
//! 4. **Registry** ([`registry`]): a [`ToolRegistry`] is an `rmcp`
//!    `ServerHandler` and can be served on any `rmcp` transport.
//!
//! Decode, validation, handler and encode failures are returned to the
//! caller as error results (`is_error: true`), never as protocol errors.
//!
//! ## Example
//! ```ignore
//! use serde::{Deserialize, Serialize};
//! use toolbridge::{CallContext, ToolArgs, ToolRegistry};
//!
//! #[derive(Debug, Default, Serialize, Deserialize, ToolArgs)]
//! struct GreetArgs {
//!     #[schema("required,description=Name to greet")]
//!     #[validate("required,min=1")]
//!     name: String,
//! }
//!
//! async fn greet(_ctx: CallContext, args: GreetArgs) -> Result<String, String> {
//!     Ok(format!("Hey {}!", args.name))
//! }
//!
//! let mut registry = ToolRegistry::new();
//! registry.register("greet", "Greet someone by name", greet)?;
//! ```

pub mod binding;
pub mod command;
pub mod error;
pub mod options;
pub mod registry;
pub mod schema;
pub mod tools;
pub mod validate;

pub use binding::{InvocationResult, ToolBinding};
pub use command::{CommandInfo, CommandOutcome, CommandSource};
pub use error::{BindError, InvocationError, RegistryError, TypeShapeError};
pub use options::{RequiredDetection, SchemaOptions, ServerOptions};
pub use registry::ToolRegistry;
pub use schema::{
    ArgumentDescriptor, FieldDescriptor, FieldSpec, FieldValues, JsonObject, Kind, Shape,
};
pub use tools::{CallContext, NamedTool, ToolHandler};
pub use validate::{FieldViolation, RuleSet, ValidationErrors};

// Re-exported for code generated by the macros and for serving the registry.
pub use async_trait::async_trait;
pub use rmcp;
pub use tokio_util::sync::CancellationToken;

// The trait and its derive macro share a name, like serde's `Serialize`.
pub use schema::ToolArgs;
pub use toolbridge_macros::{tool, ToolArgs};
