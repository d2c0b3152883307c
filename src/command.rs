//! Tool names and descriptions taken from command-line command definitions.
//!
//! Only three strings cross this boundary: the command's identifier and its
//! short and long descriptions. Flags, defaults and subcommands are ignored.

use serde::{Deserialize, Serialize};

/// Something that can name a tool: typically a `clap::Command`.
pub trait CommandSource {
    fn identifier(&self) -> Option<String>;
    fn short_description(&self) -> Option<String>;
    fn long_description(&self) -> Option<String>;

    /// Tool name and description, falling back from the short description to
    /// the long one and then to `Execute {name} command`.
    ///
    /// Returns `None` when the source has no usable identifier.
    fn tool_identity(&self) -> Option<(String, String)> {
        let name = non_blank(self.identifier())?;
        let description = non_blank(self.short_description())
            .or_else(|| non_blank(self.long_description()))
            .unwrap_or_else(|| format!("Execute {} command", name));
        Some((name, description))
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

impl CommandSource for clap::Command {
    fn identifier(&self) -> Option<String> {
        Some(self.get_name().to_string())
    }

    fn short_description(&self) -> Option<String> {
        self.get_about().map(ToString::to_string)
    }

    fn long_description(&self) -> Option<String> {
        self.get_long_about().map(ToString::to_string)
    }
}

/// A bare identifier/description triple, for sources that are not clap commands.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandInfo {
    pub name: Option<String>,
    pub short: Option<String>,
    pub long: Option<String>,
}

impl CommandInfo {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn with_short(mut self, short: impl Into<String>) -> Self {
        self.short = Some(short.into());
        self
    }

    pub fn with_long(mut self, long: impl Into<String>) -> Self {
        self.long = Some(long.into());
        self
    }
}

impl CommandSource for CommandInfo {
    fn identifier(&self) -> Option<String> {
        self.name.clone()
    }

    fn short_description(&self) -> Option<String> {
        self.short.clone()
    }

    fn long_description(&self) -> Option<String> {
        self.long.clone()
    }
}

/// Result payload of a command run through
/// [`ToolRegistry::register_command_runner`](crate::registry::ToolRegistry::register_command_runner).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandOutcome {
    pub success: bool,
    pub message: String,
}

impl CommandOutcome {
    pub fn succeeded(name: &str) -> Self {
        Self {
            success: true,
            message: format!("Command {} executed successfully", name),
        }
    }
}
