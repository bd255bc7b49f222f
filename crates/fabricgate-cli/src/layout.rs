// fabricgate-cli/src/layout.rs
// ============================================================================
// Module: Fabricgate CLI Tenant Layout
// Description: Per-tenant filesystem paths the CLI reads and writes.
// Purpose: Keep the directory tree from 4.4 in one place for every command.
// Dependencies: fabricgate-core
// ============================================================================

//! ## Overview
//! The CLI never invents its own directory conventions; every path below
//! mirrors the per-tenant tree the rest of the control plane persists to,
//! so `tenant init` creates exactly the directories `serve`, `token`, and
//! `audit tail` later read from.

use std::path::Path;
use std::path::PathBuf;

use fabricgate_core::core::error::CoreError;
use fabricgate_core::core::tenant::TenantSegment;
use fabricgate_core::core::tenant::root_for;
use fabricgate_core::core::tenant::sanitize_tenant;

/// Every directory `tenant init` creates under a tenant's root.
pub const TENANT_SUBDIRECTORIES: &[&str] = &[
    "resources",
    "shares",
    "api_keys",
    "api_keys/usage",
    "api_keys/audit",
    "automations",
    "automations/executions",
    "events/store",
    "events/automations",
    "integrations/configs",
    "integrations/usage",
    "integrations/audit",
    "mcp/servers",
    "mcp/audit",
    "_audit",
];

/// Resolves and sanitizes `tenant`, then returns its root directory under
/// `data_root`.
///
/// # Errors
/// Returns [`CoreError`] if `tenant` fails sanitization.
pub fn tenant_root(tenant: &str, data_root: &Path) -> Result<PathBuf, CoreError> {
    let segment = sanitize_tenant(tenant)?;
    Ok(root_for(&segment, data_root))
}

/// Returns the sanitized tenant segment alone, for callers that only need
/// the canonical name rather than a path.
///
/// # Errors
/// Returns [`CoreError`] if `tenant` fails sanitization.
pub fn tenant_segment(tenant: &str) -> Result<TenantSegment, CoreError> {
    sanitize_tenant(tenant)
}

/// Path to one API key's record.
#[must_use]
pub fn api_key_path(tenant_root: &Path, key_id: &str) -> PathBuf {
    tenant_root.join("api_keys").join(format!("{key_id}.json"))
}

/// Path to one MCP server's record.
#[must_use]
pub fn mcp_server_path(tenant_root: &Path, server_id: &str) -> PathBuf {
    tenant_root.join("mcp").join("servers").join(format!("{server_id}.json"))
}

/// Path to one resource's record.
#[must_use]
pub fn resource_path(tenant_root: &Path, resource_id: &str) -> PathBuf {
    tenant_root.join("resources").join(format!("{resource_id}.json"))
}

/// Path to one resource's sharing record.
#[must_use]
pub fn share_path(tenant_root: &Path, resource_id: &str) -> PathBuf {
    tenant_root.join("shares").join(format!("{resource_id}.json"))
}

/// Directory audit JSONL files live under, matching
/// [`fabricgate_config::JsonlAuditSink`]'s layout.
#[must_use]
pub fn audit_dir(tenant_root: &Path) -> PathBuf {
    tenant_root.join("_audit")
}
