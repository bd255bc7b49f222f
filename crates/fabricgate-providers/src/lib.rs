// fabricgate-providers/src/lib.rs
// ============================================================================
// Module: Fabricgate Providers
// Description: The sandboxed outbound integration proxy and its registry.
// Purpose: The only crate in the workspace that makes outbound network calls.
// Dependencies: fabricgate-core, reqwest
// ============================================================================

//! ## Overview
//! This crate ships the integration proxy (`http`) and the in-memory
//! registry (`registry`) that looks up an integration's config before
//! dispatching through it. Every outbound call passes capability, rate
//! limit, and sandbox checks before any DNS resolution or socket I/O.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod http;
pub mod registry;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use http::AuthMethod;
pub use http::IntegrationConfig;
pub use http::ProxyError;
pub use http::ProxyRequest;
pub use http::ProxyResponse;
pub use http::SandboxLevel;
pub use http::execute_integration;
pub use registry::IntegrationRegistry;
pub use registry::RegistryError;

#[cfg(test)]
mod tests {
    //! Test-only lint relaxations for panic-based assertions and debug output.
    #![allow(
        clippy::panic,
        clippy::print_stdout,
        clippy::print_stderr,
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::use_debug,
        clippy::dbg_macro,
        clippy::panic_in_result_fn,
        clippy::unwrap_in_result,
        reason = "Test-only output and panic-based assertions are permitted."
    )]
}
