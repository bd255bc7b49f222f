// fabricgate-config/src/lib.rs
// ============================================================================
// Module: Fabricgate Config Library
// Description: Process configuration model, resolution, and the production
//              audit sink it wires up.
// Purpose: Single source of truth for control-plane.toml semantics.
// Dependencies: fabricgate-core, serde, toml
// ============================================================================

//! ## Overview
//! `fabricgate-config` loads and validates the process-start configuration
//! described in the control plane's ambient stack: server limits, signing
//! key source, per-scope rate-limit defaults, and audit sink settings. It
//! also supplies [`audit_sink::JsonlAuditSink`], the one production
//! [`fabricgate_core::AuditSink`] implementation, built on the same
//! atomic-append discipline as the rest of the filesystem store.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod audit_sink;
pub mod config;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use audit_sink::JsonlAuditSink;
pub use config::AppConfig;
pub use config::AuditConfig;
pub use config::CONFIG_ENV_VAR;
pub use config::ConfigError;
pub use config::RateLimitDefaults;
pub use config::RateLimitsConfig;
pub use config::SIGNING_KEY_ENV_VAR;
pub use config::ServerConfig;
pub use config::SigningConfig;
pub use config::SigningSource;
