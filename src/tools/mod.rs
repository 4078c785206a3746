//! Tool system for the agent
//!
//! This module provides:
//! - `Tool` trait - Interface for implementing tools
//! - `ToolResult` - Result type for tool execution
//! - `ToolRegistry` - Registry for managing available tools
//! - `common` - Built-in tools (calculator, current_time)

mod registry;
mod tool;

/// Common/built-in tools
pub mod common;

pub use registry::ToolRegistry;
pub use tool::{Tool, ToolResult};

pub use common::{CalculatorTool, CurrentTimeTool};
