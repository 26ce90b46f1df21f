//! Tool execution seams
//!
//! The engine only sees two collaborators: a `ToolHost` that runs tools and a
//! `PermissionPolicy` that says which tools are enabled and which need a
//! human decision first. `ToolRegistry` and `ToolPolicy` are the in-process
//! implementations.

pub mod host;
pub mod implementations;
pub mod policy;
pub mod registry;

pub use host::{PermissionPolicy, ToolHost};
pub use implementations::{register_builtin_tools, ReadFileTool};
pub use policy::ToolPolicy;
pub use registry::{parse_params, Tool, ToolContext, ToolRegistry, ToolResult};
