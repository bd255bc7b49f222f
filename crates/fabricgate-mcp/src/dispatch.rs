// fabricgate-mcp/src/dispatch.rs
// ============================================================================
// Module: Fabricgate MCP Tool Dispatcher
// Description: Validates and gates one `(resource_id, tool_name, params)` call.
// Purpose: The sole path by which a capability token reaches a live tool call.
// Dependencies: fabricgate-core, tokio
// ============================================================================

//! ## Overview
//! [`call_tool`] implements SPEC_FULL 4.10's seven-step pipeline: tenant
//! check, capability check, tool allowlist, semaphore acquisition, per-type
//! parameter validation, timeout-bounded dispatch, then health-counter
//! update. Actual tool execution is delegated to a [`ToolExecutor`]
//! implementation so this crate never itself speaks to a filesystem, an
//! HTTP endpoint, or a database — mirroring how
//! [`fabricgate_core::interfaces::AuditSink`] keeps the core decoupled from
//! any one audit backend.

use async_trait::async_trait;
use thiserror::Error;

use fabricgate_core::core::error::AsErrorKind;
use fabricgate_core::core::error::CoreErrorKind;
use fabricgate_core::core::token::TokenData;

use crate::registry::ServerEntry;

/// SQL keywords whose presence in a `database`-type tool call's `query`
/// parameter rejects the call before dispatch.
const BLOCKED_SQL_KEYWORDS: [&str; 10] =
    ["DROP", "DELETE", "UPDATE", "INSERT", "CREATE", "ALTER", "TRUNCATE", "EXEC", "EXECUTE", "XP_"];

/// Errors raised while validating or dispatching a tool call.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The token's tenant does not match the server's tenant.
    #[error("cross-tenant mcp access denied")]
    CrossTenant,
    /// The token lacks `mcp:<server>:<tool>` or `mcp:<server>:*`.
    #[error("missing capability for tool {0:?}")]
    PermissionDenied(String),
    /// The server is administratively inactive.
    #[error("mcp server is inactive")]
    ServerInactive,
    /// `tool_name` is not in the server's `available_tools`.
    #[error("tool not available: {0}")]
    ToolNotAvailable(String),
    /// The per-server concurrency semaphore had no free permit.
    #[error("mcp server at concurrency limit")]
    TooManyRequests,
    /// Per-type parameter validation rejected the call before dispatch.
    #[error("invalid tool parameters: {0}")]
    InvalidParams(String),
    /// The call exceeded the server's configured timeout.
    #[error("tool call timed out")]
    Timeout,
    /// The tool executor itself reported a failure.
    #[error("tool call failed: {0}")]
    Upstream(String),
}

impl AsErrorKind for DispatchError {
    fn kind(&self) -> CoreErrorKind {
        match self {
            Self::CrossTenant => CoreErrorKind::CrossTenant,
            Self::PermissionDenied(_) | Self::ServerInactive => CoreErrorKind::PermissionDenied,
            Self::ToolNotAvailable(_) => CoreErrorKind::NotFound,
            Self::TooManyRequests => CoreErrorKind::RateLimited,
            Self::InvalidParams(_) => CoreErrorKind::SandboxViolation,
            Self::Timeout => CoreErrorKind::Timeout,
            Self::Upstream(_) => CoreErrorKind::UpstreamFailure,
        }
    }
}

/// The result of a tool call that reached dispatch.
#[derive(Debug, Clone)]
pub struct ToolCallOutcome {
    /// Whether the executor reported success.
    pub success: bool,
    /// The executor's result payload, if successful.
    pub result: Option<serde_json::Value>,
    /// A human-readable failure reason, if unsuccessful.
    pub error_message: Option<String>,
}

/// Performs the external work of one tool call for a registered server.
///
/// Implementations own the transport (spawning a local process, calling a
/// remote MCP endpoint, ...); this crate only validates and gates the call.
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    /// Executes `tool_name` with `params` against `server`.
    ///
    /// # Errors
    /// Returns a human-readable error string on failure; this crate wraps it
    /// in [`DispatchError::Upstream`].
    async fn call(
        &self,
        server: &crate::registry::McpServerConfig,
        tool_name: &str,
        params: &serde_json::Value,
    ) -> Result<serde_json::Value, String>;
}

/// A [`ToolExecutor`] that always succeeds with an empty payload; used for
/// embedding contexts and tests that only exercise the gating pipeline.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopToolExecutor;

#[async_trait]
impl ToolExecutor for NoopToolExecutor {
    async fn call(
        &self,
        _server: &crate::registry::McpServerConfig,
        _tool_name: &str,
        _params: &serde_json::Value,
    ) -> Result<serde_json::Value, String> {
        Ok(serde_json::json!({}))
    }
}

/// Validates and dispatches a tool call against `entry`.
///
/// # Errors
/// Returns the first [`DispatchError`] encountered, checked in the order
/// SPEC_FULL 4.10 specifies: tenant, capability, tool allowlist, semaphore,
/// per-type parameter validation, then timeout/upstream failure.
pub async fn call_tool(
    entry: &ServerEntry,
    token: &TokenData,
    tool_name: &str,
    params: &serde_json::Value,
    executor: &dyn ToolExecutor,
) -> Result<ToolCallOutcome, DispatchError> {
    let config = &entry.config;

    if token.tenant_id != config.tenant_domain {
        return Err(DispatchError::CrossTenant);
    }
    if !config.is_active {
        return Err(DispatchError::ServerInactive);
    }

    let specific = format!("mcp:{}:{tool_name}", config.name);
    let wildcard = format!("mcp:{}:*", config.name);
    if !token.has_capability(&specific) && !token.has_capability(&wildcard) {
        return Err(DispatchError::PermissionDenied(tool_name.to_string()));
    }
    if !config.available_tools.contains(tool_name) {
        return Err(DispatchError::ToolNotAvailable(tool_name.to_string()));
    }

    let _permit = entry.semaphore.try_acquire().map_err(|_| DispatchError::TooManyRequests)?;

    validate_params(config, params).map_err(DispatchError::InvalidParams)?;

    let deadline = std::time::Duration::from_secs(config.timeout_seconds);
    let call_result = tokio::time::timeout(deadline, executor.call(config, tool_name, params)).await;

    let outcome = match call_result {
        Ok(Ok(result)) => Ok(ToolCallOutcome { success: true, result: Some(result), error_message: None }),
        Ok(Err(message)) => Err(DispatchError::Upstream(message)),
        Err(_elapsed) => Err(DispatchError::Timeout),
    };

    entry.record_outcome(outcome.is_ok());
    outcome
}

fn validate_params(
    config: &crate::registry::McpServerConfig,
    params: &serde_json::Value,
) -> Result<(), String> {
    match config.server_type {
        crate::registry::McpServerType::Filesystem => validate_filesystem_params(config, params),
        crate::registry::McpServerType::Web => validate_web_params(config, params),
        crate::registry::McpServerType::Database => validate_database_params(params),
    }
}

fn validate_filesystem_params(
    config: &crate::registry::McpServerConfig,
    params: &serde_json::Value,
) -> Result<(), String> {
    let path = params.get("path").and_then(serde_json::Value::as_str).ok_or("missing path parameter")?;
    let path = std::path::Path::new(path);
    if path.is_absolute() {
        return Err("path must be relative".to_string());
    }
    if path.components().any(|component| matches!(component, std::path::Component::ParentDir)) {
        return Err("path must not contain '..'".to_string());
    }
    if !config.allowed_extensions.is_empty() {
        let extension = path.extension().and_then(std::ffi::OsStr::to_str).unwrap_or_default();
        if !config.allowed_extensions.contains(extension) {
            return Err(format!("extension not permitted: {extension}"));
        }
    }
    Ok(())
}

fn validate_web_params(
    config: &crate::registry::McpServerConfig,
    params: &serde_json::Value,
) -> Result<(), String> {
    let raw_url = params.get("url").and_then(serde_json::Value::as_str).ok_or("missing url parameter")?;
    let url = url::Url::parse(raw_url).map_err(|err| format!("invalid url: {err}"))?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(format!("unsupported url scheme: {}", url.scheme()));
    }
    if config.network_isolation {
        let host = url.host_str().unwrap_or_default();
        if is_isolated_host(host) {
            return Err(format!("host not permitted under network isolation: {host}"));
        }
    }
    Ok(())
}

fn is_isolated_host(host: &str) -> bool {
    if host.eq_ignore_ascii_case("localhost") {
        return true;
    }
    if let Ok(ip) = host.parse::<std::net::IpAddr>() {
        return match ip {
            std::net::IpAddr::V4(v4) => {
                v4.is_loopback() || v4.is_private() || v4.is_link_local() || v4.is_unspecified()
            }
            std::net::IpAddr::V6(v6) => v6.is_loopback() || v6.is_unspecified(),
        };
    }
    false
}

fn validate_database_params(params: &serde_json::Value) -> Result<(), String> {
    let query = params.get("query").and_then(serde_json::Value::as_str).ok_or("missing query parameter")?;
    let upper = query.to_ascii_uppercase();
    for keyword in BLOCKED_SQL_KEYWORDS {
        if upper.contains(keyword) {
            return Err(format!("query contains blocked keyword: {keyword}"));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::collections::BTreeSet;

    use fabricgate_core::core::identifiers::McpServerId;
    use fabricgate_core::core::identifiers::TenantDomain;
    use fabricgate_core::core::identifiers::UserId;
    use fabricgate_core::core::token::Capability;

    use super::*;
    use crate::registry::McpServerConfig;
    use crate::registry::McpServerType;
    use crate::registry::ServerEntry;

    fn entry(server_type: McpServerType) -> ServerEntry {
        ServerEntry::new(McpServerConfig {
            id: McpServerId::new("rag"),
            name: "rag".to_string(),
            tenant_domain: TenantDomain::new("acme"),
            server_type,
            available_tools: BTreeSet::from(["search_datasets".to_string()]),
            max_concurrent_requests: 1,
            timeout_seconds: 5,
            network_isolation: true,
            allowed_extensions: BTreeSet::from(["txt".to_string()]),
            is_active: true,
        })
    }

    fn token_with(capability: &str) -> TokenData {
        TokenData {
            sub: UserId::new("alice"),
            tenant_id: TenantDomain::new("acme"),
            api_key_id: None,
            scope: "user".to_string(),
            capabilities: vec![Capability {
                resource: capability.to_string(),
                actions: vec!["*".to_string()],
                constraints: BTreeMap::new(),
            }],
            constraints: BTreeMap::new(),
            rate_limits: BTreeMap::new(),
            iat: 0,
            exp: i64::MAX,
        }
    }

    #[tokio::test]
    async fn cross_tenant_token_is_rejected_before_capability_check() {
        let entry = entry(McpServerType::Filesystem);
        let mut token = token_with("mcp:rag:*");
        token.tenant_id = TenantDomain::new("other");
        let result =
            call_tool(&entry, &token, "search_datasets", &serde_json::json!({}), &NoopToolExecutor).await;
        assert!(matches!(result, Err(DispatchError::CrossTenant)));
    }

    #[tokio::test]
    async fn missing_capability_is_rejected() {
        let entry = entry(McpServerType::Filesystem);
        let token = token_with("mcp:other:*");
        let result =
            call_tool(&entry, &token, "search_datasets", &serde_json::json!({}), &NoopToolExecutor).await;
        assert!(matches!(result, Err(DispatchError::PermissionDenied(_))));
    }

    #[tokio::test]
    async fn tool_outside_available_tools_is_rejected() {
        let entry = entry(McpServerType::Filesystem);
        let token = token_with("mcp:rag:*");
        let result =
            call_tool(&entry, &token, "delete_everything", &serde_json::json!({}), &NoopToolExecutor).await;
        assert!(matches!(result, Err(DispatchError::ToolNotAvailable(_))));
    }

    #[tokio::test]
    async fn filesystem_path_traversal_is_rejected() {
        let entry = entry(McpServerType::Filesystem);
        let token = token_with("mcp:rag:*");
        let params = serde_json::json!({"path": "../../etc/passwd"});
        let result = call_tool(&entry, &token, "search_datasets", &params, &NoopToolExecutor).await;
        assert!(matches!(result, Err(DispatchError::InvalidParams(_))));
    }

    #[tokio::test]
    async fn filesystem_call_with_allowed_extension_succeeds() {
        let entry = entry(McpServerType::Filesystem);
        let token = token_with("mcp:rag:*");
        let params = serde_json::json!({"path": "docs/readme.txt"});
        let result = call_tool(&entry, &token, "search_datasets", &params, &NoopToolExecutor).await;
        assert!(result.expect("should dispatch").success);
    }

    #[tokio::test]
    async fn web_call_blocks_private_host_under_network_isolation() {
        let entry = entry(McpServerType::Web);
        let token = token_with("mcp:rag:*");
        let params = serde_json::json!({"url": "http://127.0.0.1/internal"});
        let result = call_tool(&entry, &token, "search_datasets", &params, &NoopToolExecutor).await;
        assert!(matches!(result, Err(DispatchError::InvalidParams(_))));
    }

    #[tokio::test]
    async fn database_call_blocks_mutating_keywords() {
        let entry = entry(McpServerType::Database);
        let token = token_with("mcp:rag:*");
        let params = serde_json::json!({"query": "DROP TABLE users"});
        let result = call_tool(&entry, &token, "search_datasets", &params, &NoopToolExecutor).await;
        assert!(matches!(result, Err(DispatchError::InvalidParams(_))));
    }

    #[tokio::test]
    async fn second_concurrent_call_is_rejected_when_semaphore_is_exhausted() {
        let entry = entry(McpServerType::Filesystem);
        let token = token_with("mcp:rag:*");
        let params = serde_json::json!({"path": "docs/readme.txt"});
        let _permit = entry.semaphore.try_acquire().expect("acquire the only permit");
        let result = call_tool(&entry, &token, "search_datasets", &params, &NoopToolExecutor).await;
        assert!(matches!(result, Err(DispatchError::TooManyRequests)));
    }

    #[test]
    fn wildcard_in_blocked_keyword_list_catches_stored_procedure_prefix() {
        assert!(validate_database_params(&serde_json::json!({"query": "EXEC sp_configure"})).is_err());
    }
}
