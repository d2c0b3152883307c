//! Handler traits for typed tool execution.

use std::fmt;
use std::future::Future;

use async_trait::async_trait;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

/// Per-call context handed to a tool handler.
///
/// Carries the caller's cancellation token as received from the MCP host.
/// The pipeline imposes no timeout of its own.
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    tool: String,
    ct: CancellationToken,
}

impl CallContext {
    pub fn new(tool: impl Into<String>, ct: CancellationToken) -> Self {
        Self {
            tool: tool.into(),
            ct,
        }
    }

    /// Name of the tool being invoked.
    pub fn tool(&self) -> &str {
        &self.tool
    }

    pub fn token(&self) -> &CancellationToken {
        &self.ct
    }

    pub fn is_cancelled(&self) -> bool {
        self.ct.is_cancelled()
    }

    /// Resolves once the caller cancels the request.
    pub async fn cancelled(&self) {
        self.ct.cancelled().await
    }
}

/// Business logic behind a tool, receiving already validated arguments.
///
/// Implemented for any `Fn(CallContext, A) -> impl Future<Output = Result<O, E>>`,
/// and generated for `impl` blocks annotated with `#[tool]`.
#[async_trait]
pub trait ToolHandler<A: Send + 'static>: Send + Sync {
    /// Success payload. Must serialize to a JSON object or a string.
    type Output: Serialize + Send + 'static;
    /// Failure reported back to the caller as `handler error: {error}`.
    type Error: fmt::Display + Send + 'static;

    async fn call(&self, ctx: CallContext, args: A) -> Result<Self::Output, Self::Error>;
}

#[async_trait]
impl<A, F, Fut, O, E> ToolHandler<A> for F
where
    A: Send + 'static,
    F: Fn(CallContext, A) -> Fut + Send + Sync,
    Fut: Future<Output = Result<O, E>> + Send + 'static,
    O: Serialize + Send + 'static,
    E: fmt::Display + Send + 'static,
{
    type Output = O;
    type Error = E;

    async fn call(&self, ctx: CallContext, args: A) -> Result<O, E> {
        (self)(ctx, args).await
    }
}

/// A handler that carries its own tool name and description.
pub trait NamedTool {
    const NAME: &'static str;
    const DESCRIPTION: &'static str;
}
