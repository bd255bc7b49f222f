// fabricgate-cli/src/lib.rs
// ============================================================================
// Module: Fabricgate CLI Library
// Description: Shared modules for the Fabricgate command-line interface.
// Purpose: Let the binary and its tests share the tenant layout, serve loop,
//          and command implementations.
// Dependencies: fabricgate-config, fabricgate-core, fabricgate-mcp
// ============================================================================

//! ## Overview
//! The binary entry point (`src/main.rs`) owns argument parsing and exit
//! codes; everything it dispatches to lives here so integration tests can
//! exercise it directly.

/// `token`/`tenant`/`audit`/`config` subcommand implementations.
pub mod commands;

/// Per-tenant filesystem layout shared by every command.
pub mod layout;

/// The `serve` request loop.
pub mod serve;
