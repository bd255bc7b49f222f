// fabricgate-mcp/src/registry.rs
// ============================================================================
// Module: Fabricgate MCP Server Registry
// Description: Per-server config, concurrency semaphore, and health counters.
// Purpose: Hold the decoded form of an `mcp_server` resource for dispatch.
// Dependencies: fabricgate-core, tokio
// ============================================================================

//! ## Overview
//! A [`McpServerConfig`] is the decoded contents of a
//! [`fabricgate_core::core::Resource`] of type `mcp_server`; the registry
//! itself never touches the filesystem, mirroring
//! [`fabricgate_providers::registry::IntegrationRegistry`]'s split between
//! persisted config and in-memory dispatch state.

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::sync::Mutex;

use serde::Deserialize;
use serde::Serialize;
use tokio::sync::Semaphore;

use fabricgate_core::core::identifiers::McpServerId;
use fabricgate_core::core::identifiers::TenantDomain;

/// The kind of backend an MCP server fronts, determining which per-type
/// parameter validation applies to its tool calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum McpServerType {
    /// A filesystem-backed tool server.
    Filesystem,
    /// A web/HTTP-backed tool server.
    Web,
    /// A database-backed tool server.
    Database,
}

/// Health classification driven purely by cumulative error count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    /// Fewer than 10 cumulative errors.
    Healthy,
    /// More than 10 but at most 50 cumulative errors.
    Degraded,
    /// More than 50 cumulative errors.
    Unhealthy,
}

/// Returns the health status implied by `error_count`, per SPEC_FULL 4.10
/// step 7: `Degraded` above 10 errors, `Unhealthy` above 50.
#[must_use]
pub fn status_for_error_count(error_count: u64) -> HealthStatus {
    if error_count > 50 {
        HealthStatus::Unhealthy
    } else if error_count > 10 {
        HealthStatus::Degraded
    } else {
        HealthStatus::Healthy
    }
}

/// Cumulative request/error counters and the health status they imply.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ServerHealth {
    /// Total tool-call attempts that reached dispatch (passed every gate).
    pub total_requests: u64,
    /// Total tool-call attempts that failed at or after dispatch.
    pub error_count: u64,
}

impl ServerHealth {
    /// Returns the health status implied by the current error count.
    #[must_use]
    pub fn status(&self) -> HealthStatus {
        status_for_error_count(self.error_count)
    }
}

/// The decoded configuration of one registered MCP server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpServerConfig {
    /// Stable identifier, shared with the backing [`fabricgate_core::core::Resource`] id.
    pub id: McpServerId,
    /// Human-readable name; also the `<server_name>` segment of its
    /// capability strings (`mcp:<server_name>:<tool_name>`).
    pub name: String,
    /// Owning tenant.
    pub tenant_domain: TenantDomain,
    /// Backend kind, determining per-type parameter validation.
    pub server_type: McpServerType,
    /// Tool names this server exposes; a call for any other name is rejected
    /// before dispatch.
    #[serde(default)]
    pub available_tools: BTreeSet<String>,
    /// Size of the per-server concurrency semaphore.
    pub max_concurrent_requests: usize,
    /// Per-call wall-clock timeout.
    pub timeout_seconds: u64,
    /// When true, `web` tool calls reject localhost/RFC1918 targets.
    #[serde(default)]
    pub network_isolation: bool,
    /// Allowed file extensions for `filesystem` tool calls (no leading dot).
    #[serde(default)]
    pub allowed_extensions: BTreeSet<String>,
    /// Whether the server currently accepts calls.
    pub is_active: bool,
}

/// Registered state for one server: its config, concurrency semaphore, and
/// health counters.
pub struct ServerEntry {
    /// The server's decoded configuration.
    pub config: McpServerConfig,
    /// Bounds in-flight calls to `config.max_concurrent_requests`.
    pub semaphore: Semaphore,
    /// Cumulative request/error counters.
    pub health: Mutex<ServerHealth>,
}

impl ServerEntry {
    pub(crate) fn new(config: McpServerConfig) -> Self {
        let permits = config.max_concurrent_requests.max(1);
        Self { config, semaphore: Semaphore::new(permits), health: Mutex::new(ServerHealth::default()) }
    }

    /// Records one dispatch attempt and returns the resulting health
    /// snapshot.
    #[expect(clippy::unwrap_used, reason = "poisoned only if a prior holder panicked")]
    pub(crate) fn record_outcome(&self, succeeded: bool) -> ServerHealth {
        let mut health = self.health.lock().unwrap();
        health.total_requests += 1;
        if !succeeded {
            health.error_count += 1;
        }
        *health
    }

    /// Returns the current health snapshot without recording an attempt.
    #[must_use]
    #[expect(clippy::unwrap_used, reason = "poisoned only if a prior holder panicked")]
    pub fn health_snapshot(&self) -> ServerHealth {
        *self.health.lock().unwrap()
    }
}

/// An in-memory registry of MCP servers for one process.
#[derive(Default)]
pub struct McpRegistry {
    servers: Mutex<BTreeMap<McpServerId, std::sync::Arc<ServerEntry>>>,
}

impl McpRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers or replaces a server's configuration, resetting its
    /// semaphore and health counters.
    #[expect(clippy::unwrap_used, reason = "poisoned only if a prior holder panicked")]
    pub fn register(&self, config: McpServerConfig) {
        let mut servers = self.servers.lock().unwrap();
        servers.insert(config.id.clone(), std::sync::Arc::new(ServerEntry::new(config)));
    }

    /// Returns the registered entry for `id`, if any.
    #[must_use]
    #[expect(clippy::unwrap_used, reason = "poisoned only if a prior holder panicked")]
    pub fn get(&self, id: &McpServerId) -> Option<std::sync::Arc<ServerEntry>> {
        self.servers.lock().unwrap().get(id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(id: &str) -> McpServerConfig {
        McpServerConfig {
            id: McpServerId::new(id),
            name: "rag".to_string(),
            tenant_domain: TenantDomain::new("acme"),
            server_type: McpServerType::Filesystem,
            available_tools: BTreeSet::from(["search_datasets".to_string()]),
            max_concurrent_requests: 2,
            timeout_seconds: 5,
            network_isolation: true,
            allowed_extensions: BTreeSet::from(["txt".to_string()]),
            is_active: true,
        }
    }

    #[test]
    fn registered_server_is_retrievable() {
        let registry = McpRegistry::new();
        registry.register(config("s1"));
        assert!(registry.get(&McpServerId::new("s1")).is_some());
    }

    #[test]
    fn health_status_thresholds_match_spec() {
        assert_eq!(status_for_error_count(0), HealthStatus::Healthy);
        assert_eq!(status_for_error_count(10), HealthStatus::Healthy);
        assert_eq!(status_for_error_count(11), HealthStatus::Degraded);
        assert_eq!(status_for_error_count(50), HealthStatus::Degraded);
        assert_eq!(status_for_error_count(51), HealthStatus::Unhealthy);
    }

    #[test]
    fn record_outcome_accumulates_errors() {
        let entry = ServerEntry::new(config("s1"));
        entry.record_outcome(true);
        let health = entry.record_outcome(false);
        assert_eq!(health.total_requests, 2);
        assert_eq!(health.error_count, 1);
    }
}
