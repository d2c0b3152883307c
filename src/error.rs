//! Error types for registration and invocation.
//!
//! Registration errors ([`TypeShapeError`], [`BindError`]) are returned to the
//! code doing the registering. Invocation errors ([`InvocationError`]) never
//! escape as faults: the binding folds them into an
//! [`InvocationResult`](crate::binding::InvocationResult).

use thiserror::Error;

use crate::validate::ValidationErrors;

/// The argument type handed to the schema deriver is not a struct with named fields.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("argument type {type_name} must be a struct, got {found}")]
pub struct TypeShapeError {
    pub type_name: String,
    pub found: String,
}

/// Errors that can occur while registering a tool.
#[derive(Debug, Error)]
pub enum BindError {
    #[error("failed to build schema for tool {tool}: {source}")]
    SchemaDerivation {
        tool: String,
        #[source]
        source: TypeShapeError,
    },

    #[error("tool must have a non-empty identifier")]
    MissingIdentifier,

    #[error("tool already registered: {0}")]
    DuplicateTool(String),
}

/// Routing errors raised by the registry itself rather than by a tool.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Tool not found: {0}")]
    ToolNotFound(String),
}

/// A failed invocation, tagged with the pipeline stage that stopped it.
#[derive(Debug, Error)]
pub enum InvocationError {
    #[error("failed to decode arguments: {0}")]
    Decode(String),

    #[error(transparent)]
    Validation(#[from] ValidationErrors),

    #[error("handler error: {0}")]
    Handler(String),

    #[error("failed to encode result: {0}")]
    Encode(String),
}

impl InvocationError {
    /// Name of the terminal pipeline state this error corresponds to.
    pub fn stage(&self) -> &'static str {
        match self {
            InvocationError::Decode(_) => "decode_failed",
            InvocationError::Validation(_) => "validation_failed",
            InvocationError::Handler(_) => "handler_failed",
            InvocationError::Encode(_) => "encode_failed",
        }
    }
}
