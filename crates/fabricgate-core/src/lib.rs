// fabricgate-core/src/lib.rs
// ============================================================================
// Module: Fabricgate Core Library
// Description: Public API surface for the Fabricgate control-plane core.
// Purpose: Expose the data model, interfaces, and runtime services shared by
//          every surface (CLI, MCP dispatch, integration proxy).
// Dependencies: crate::{core, interfaces, runtime}
// ============================================================================

//! ## Overview
//! Fabricgate core provides multi-tenant resource isolation, capability-token
//! issuance and verification, access-group arbitration, API-key lifecycle
//! management, an event bus, and a bounded automation-chain executor. It is
//! backend-agnostic: filesystem persistence lives in [`runtime::store`], and
//! callers supply a [`interfaces::Clock`] and [`interfaces::AuditSink`]
//! rather than this crate reaching for the system clock or a logging
//! framework directly.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod core;
pub mod interfaces;
pub mod runtime;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use core::*;

pub use interfaces::AuditError;
pub use interfaces::AuditRecord;
pub use interfaces::AuditSink;
pub use interfaces::Clock;
pub use interfaces::FixedClock;
pub use interfaces::NoopAuditSink;
pub use interfaces::SystemClock;
pub use runtime::Decision;
pub use runtime::ExecutorError;
pub use runtime::RunGuard;
pub use runtime::StoreError;
pub use runtime::ValidationError as ApiKeyValidationError;
pub use runtime::append_jsonl;
pub use runtime::check_permission;
pub use runtime::ensure_dir;
pub use runtime::execute_chain;
pub use runtime::validate_api_key;
