//! Tool registry and its MCP server integration.
//!
//! Tools are registered during setup (`&mut self`), after which the registry
//! is handed to `rmcp` and only read. Any `rmcp` transport works:
//!
//! ```ignore
//! use rmcp::{transport::stdio, ServiceExt};
//!
//! let mut registry = ToolRegistry::new();
//! registry.register("greet", "Greet someone by name", greet)?;
//! registry.serve(stdio()).await?.waiting().await?;
//! ```

use std::fmt;

use rmcp::model::{
    CallToolRequestParam, CallToolResult, ErrorData, Implementation, ListToolsResult,
    PaginatedRequestParam, ServerCapabilities, ServerInfo, Tool,
};
use rmcp::service::{RequestContext, RoleServer};
use rmcp::ServerHandler;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::binding::{InvocationResult, ToolBinding};
use crate::command::{CommandOutcome, CommandSource};
use crate::error::{BindError, RegistryError};
use crate::options::ServerOptions;
use crate::schema::{JsonObject, ToolArgs};
use crate::tools::{CallContext, NamedTool, ToolHandler};

/// The set of tools served to MCP clients.
pub struct ToolRegistry {
    tools: Vec<ToolBinding>,
    options: ServerOptions,
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::with_options(ServerOptions::default())
    }

    pub fn with_options(options: ServerOptions) -> Self {
        Self {
            tools: Vec::new(),
            options,
        }
    }

    pub fn options(&self) -> &ServerOptions {
        &self.options
    }

    /// Register `handler` as tool `name`, with a schema derived from `A`.
    pub fn register<A, H>(
        &mut self,
        name: impl Into<String>,
        description: impl Into<String>,
        handler: H,
    ) -> Result<(), BindError>
    where
        A: ToolArgs + Serialize + DeserializeOwned + Default + Send + 'static,
        H: ToolHandler<A> + 'static,
    {
        let binding =
            ToolBinding::bind_with_options(name, description, handler, &self.options.schema)?;
        self.add(binding)
    }

    /// Register a handler generated by `#[tool(name = ..., description = ...)]`.
    pub fn register_tool<A, T>(&mut self, tool: T) -> Result<(), BindError>
    where
        A: ToolArgs + Serialize + DeserializeOwned + Default + Send + 'static,
        T: NamedTool + ToolHandler<A> + 'static,
    {
        self.register::<A, T>(T::NAME, T::DESCRIPTION, tool)
    }

    /// Register a handler under the name and description of a command.
    ///
    /// Fails with [`BindError::MissingIdentifier`] when the command has no
    /// usable name; nothing is registered in that case.
    pub fn register_command<A, H, S>(&mut self, source: &S, handler: H) -> Result<(), BindError>
    where
        A: ToolArgs + Serialize + DeserializeOwned + Default + Send + 'static,
        H: ToolHandler<A> + 'static,
        S: CommandSource + ?Sized,
    {
        let (name, description) = source
            .tool_identity()
            .ok_or(BindError::MissingIdentifier)?;
        self.register::<A, H>(name, description, handler)
    }

    /// Register a command whose action takes the decoded arguments and
    /// reports only success or failure.
    ///
    /// The tool answers `{"success": true, "message": "Command <name> executed successfully"}`;
    /// an action error is reported as a handler error.
    pub fn register_command_runner<A, S, R, E>(&mut self, source: &S, run: R) -> Result<(), BindError>
    where
        A: ToolArgs + Serialize + DeserializeOwned + Default + Send + 'static,
        S: CommandSource + ?Sized,
        R: Fn(&A) -> Result<(), E> + Send + Sync + 'static,
        E: fmt::Display,
    {
        let (name, description) = source
            .tool_identity()
            .ok_or(BindError::MissingIdentifier)?;

        let command = name.clone();
        let handler = move |_ctx: CallContext, args: A| {
            let outcome = run(&args)
                .map(|()| CommandOutcome::succeeded(&command))
                .map_err(|e| e.to_string());
            async move { outcome }
        };
        self.register::<A, _>(name, description, handler)
    }

    /// Add an already bound tool. Tool names must be unique.
    pub fn add(&mut self, binding: ToolBinding) -> Result<(), BindError> {
        if self.get(binding.name()).is_some() {
            return Err(BindError::DuplicateTool(binding.name().to_string()));
        }
        info!("Registered tool {}", binding.name());
        debug!("Tool {} input schema: {:?}", binding.name(), binding.schema());
        self.tools.push(binding);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&ToolBinding> {
        self.tools.iter().find(|tool| tool.name() == name)
    }

    /// Bindings in registration order.
    pub fn tools(&self) -> &[ToolBinding] {
        &self.tools
    }

    /// MCP definitions of every registered tool, in registration order.
    pub fn definitions(&self) -> Vec<Tool> {
        self.tools.iter().map(ToolBinding::to_tool).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Route a call to the named tool.
    ///
    /// Only an unknown name is an error here; everything that goes wrong
    /// inside the tool comes back as a failed [`InvocationResult`].
    pub async fn call(
        &self,
        name: &str,
        args: JsonObject,
        ct: CancellationToken,
    ) -> Result<InvocationResult, RegistryError> {
        let tool = self
            .get(name)
            .ok_or_else(|| RegistryError::ToolNotFound(name.to_string()))?;
        debug!("Calling tool {}", name);
        Ok(tool.invoke(args, ct).await)
    }
}

impl ServerHandler for ToolRegistry {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: self.options.name.clone(),
                version: self.options.version.clone(),
                ..Default::default()
            },
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            instructions: self.options.instructions.clone(),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, ErrorData> {
        Ok(ListToolsResult::with_all_items(self.definitions()))
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParam,
        context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, ErrorData> {
        let args = request.arguments.unwrap_or_default();
        self.call(&request.name, args, context.ct)
            .await
            .map(CallToolResult::from)
            .map_err(|e| ErrorData::invalid_params(e.to_string(), None))
    }
}
