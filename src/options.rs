//! Options for the MCP server identity and for schema derivation.

use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;

/// Identity the registry reports to MCP clients during initialization.
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerOptions {
    /// Server name (e.g., "calculator-tools").
    pub name: String,

    /// Server version. Defaults to this crate's version.
    pub version: String,

    /// Free-form usage instructions for the connecting client.
    pub instructions: Option<String>,

    /// How tool schemas are derived from argument types.
    #[serde(default)]
    pub schema: SchemaOptions,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            name: "toolbridge".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            instructions: None,
            schema: SchemaOptions::default(),
        }
    }
}

impl ServerOptions {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            ..Self::default()
        }
    }

    /// Set the instructions.
    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = Some(instructions.into());
        self
    }

    /// Set the schema derivation options.
    pub fn with_schema_options(mut self, schema: SchemaOptions) -> Self {
        self.schema = schema;
        self
    }
}

/// How a validation annotation marks a field as required in the schema.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequiredDetection {
    /// Any occurrence of the text `required`, even inside another rule such
    /// as `required_with`.
    #[default]
    Substring,
    /// Only a standalone `required` rule.
    Exact,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaOptions {
    #[serde(default)]
    pub required_detection: RequiredDetection,
}

impl SchemaOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_required_detection(mut self, detection: RequiredDetection) -> Self {
        self.required_detection = detection;
        self
    }
}
