// fabricgate-mcp/src/lib.rs
// ============================================================================
// Module: Fabricgate MCP Registry & Dispatcher
// Description: Registers MCP tool servers and gates every tool invocation.
// Purpose: The only place a capability token is exchanged for a live tool call.
// Dependencies: fabricgate-core, tokio
// ============================================================================

//! ## Overview
//! An MCP server is registered as a [`fabricgate_core::core::Resource`] of
//! type `mcp_server`; [`registry::McpRegistry`] holds the decoded
//! [`registry::McpServerConfig`] plus a per-server concurrency semaphore and
//! health counters. [`dispatch::call_tool`] is the single chokepoint a tool
//! invocation passes through: tenant check, capability check, tool
//! allowlist, semaphore acquisition, per-type parameter validation, then
//! dispatch through a pluggable [`dispatch::ToolExecutor`].

pub mod dispatch;
pub mod registry;

pub use dispatch::DispatchError;
pub use dispatch::NoopToolExecutor;
pub use dispatch::ToolCallOutcome;
pub use dispatch::ToolExecutor;
pub use dispatch::call_tool;
pub use registry::HealthStatus;
pub use registry::McpRegistry;
pub use registry::McpServerConfig;
pub use registry::McpServerType;
pub use registry::ServerHealth;
