// fabricgate-cli/src/serve.rs
// ============================================================================
// Module: Fabricgate CLI Serve Loop
// Description: Newline-delimited JSON-RPC-like dispatcher over stdin/stdout.
// Purpose: Expose validate_api_key, execute_mcp_tool, and check_permission
//          without the excluded HTTP edge.
// Dependencies: fabricgate-core, fabricgate-mcp, serde_json, tokio
// ============================================================================

//! ## Overview
//! Each stdin line is a JSON object `{"method": "...", ...}`; each response
//! is one JSON object written to stdout followed by a newline. A
//! collaborator that owns HTTP routing frames requests onto this same line
//! protocol instead of binding a socket itself.

use std::io::BufRead;
use std::io::Write as _;
use std::path::Path;
use std::sync::Arc;

use fabricgate_core::core::apikey::ApiKey;
use fabricgate_core::core::apikey::KeyScope;
use fabricgate_core::core::identifiers::McpServerId;
use fabricgate_core::core::identifiers::TenantDomain;
use fabricgate_core::core::identifiers::UserId;
use fabricgate_core::core::resource::Resource;
use fabricgate_core::core::resource::SharingRecord;
use fabricgate_core::core::token::Capability;
use fabricgate_core::core::token::SigningKey;
use fabricgate_core::core::token::mint;
use fabricgate_core::core::token::verify;
use fabricgate_core::runtime::access_controller::Action;
use fabricgate_core::runtime::apikey_service::hash_raw_key;
use fabricgate_core::runtime::apikey_service::hashes_match;
use fabricgate_core::runtime::check_permission;
use fabricgate_core::runtime::read_json_fault_tolerant;
use fabricgate_core::runtime::validate_api_key;
use fabricgate_mcp::McpRegistry;
use fabricgate_mcp::McpServerConfig;
use fabricgate_mcp::NoopToolExecutor;
use fabricgate_mcp::call_tool;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use serde_json::json;
use time::Duration;
use time::OffsetDateTime;

use crate::layout;

/// Runs the `serve` request loop until stdin closes.
///
/// # Errors
/// Returns an error if stdin cannot be read or stdout cannot be written to.
pub async fn run(data_root: &Path, signing_key: &SigningKey) -> std::io::Result<()> {
    let registry = Arc::new(McpRegistry::new());
    let stdin = std::io::stdin();
    let mut stdout = std::io::stdout();

    for line in stdin.lock().lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let response = handle_line(&line, data_root, signing_key, &registry).await;
        let rendered = serde_json::to_string(&response).unwrap_or_else(|_| {
            json!({"error": "failed to serialize response"}).to_string()
        });
        writeln!(stdout, "{rendered}")?;
        stdout.flush()?;
    }
    Ok(())
}

/// Parses one request line and dispatches it to the matching handler.
async fn handle_line(
    line: &str,
    data_root: &Path,
    signing_key: &SigningKey,
    registry: &Arc<McpRegistry>,
) -> Value {
    let request: Value = match serde_json::from_str(line) {
        Ok(value) => value,
        Err(err) => return json!({"error": format!("invalid request json: {err}")}),
    };
    let method = request.get("method").and_then(Value::as_str).unwrap_or_default();
    match method {
        "validate_api_key" => match serde_json::from_value::<ValidateApiKeyRequest>(request) {
            Ok(request) => serde_json::to_value(handle_validate_api_key(&request, data_root, signing_key))
                .unwrap_or_else(|_| json!({"valid": false, "error_message": "internal error"})),
            Err(err) => json!({"valid": false, "error_message": format!("malformed request: {err}")}),
        },
        "execute_mcp_tool" => match serde_json::from_value::<ExecuteMcpToolRequest>(request) {
            Ok(request) => {
                serde_json::to_value(handle_execute_mcp_tool(&request, data_root, signing_key, registry).await)
                    .unwrap_or_else(|_| json!({"success": false, "error_message": "internal error"}))
            }
            Err(err) => json!({"success": false, "error_message": format!("malformed request: {err}")}),
        },
        "check_permission" => match serde_json::from_value::<CheckPermissionRequest>(request) {
            Ok(request) => serde_json::to_value(handle_check_permission(&request, data_root, signing_key))
                .unwrap_or_else(|_| json!({"allowed": false, "reason": "internal error"})),
            Err(err) => json!({"allowed": false, "reason": format!("malformed request: {err}")}),
        },
        other => json!({"error": format!("unknown method: {other}")}),
    }
}

/// Input for the validate-api-key contract, extended with the `tenant_domain`
/// and `key_id` a hash-index lookup would otherwise resolve.
#[derive(Debug, Deserialize)]
struct ValidateApiKeyRequest {
    /// Owning tenant, used to resolve the key's file path.
    tenant_domain: String,
    /// Stand-in for the hash-index lookup a real deployment would do.
    key_id: String,
    /// Presented raw key, hashed and compared against the stored hash.
    raw_key: String,
    /// Endpoint the key is being used against.
    endpoint: String,
    /// Source IP of the caller.
    client_ip: String,
}

#[derive(Debug, Serialize)]
struct ValidateApiKeyResponse {
    /// Whether the key validated successfully.
    valid: bool,
    /// Present only when `valid` is `false`.
    #[serde(skip_serializing_if = "Option::is_none")]
    error_message: Option<String>,
    /// The minted capability token, present only on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    capability_token: Option<String>,
    /// Remaining requests in the current hourly window.
    #[serde(skip_serializing_if = "Option::is_none")]
    rate_limit_remaining: Option<u32>,
    /// Remaining requests in the current daily quota.
    #[serde(skip_serializing_if = "Option::is_none")]
    quota_remaining: Option<u32>,
}

/// Looks up the key by tenant and id, checks its raw-key hash, then
/// delegates to [`validate_api_key`] and mints a token on success.
fn handle_validate_api_key(
    request: &ValidateApiKeyRequest,
    data_root: &Path,
    signing_key: &SigningKey,
) -> ValidateApiKeyResponse {
    let deny = |message: &str| ValidateApiKeyResponse {
        valid: false,
        error_message: Some(message.to_string()),
        capability_token: None,
        rate_limit_remaining: None,
        quota_remaining: None,
    };

    let tenant_root = match layout::tenant_root(&request.tenant_domain, data_root) {
        Ok(root) => root,
        Err(err) => return deny(&err.to_string()),
    };
    let path = layout::api_key_path(&tenant_root, &request.key_id);
    let key = match read_json_fault_tolerant::<ApiKey>(&path) {
        Ok(Some(key)) => key,
        Ok(None) => return deny("invalid API key"),
        Err(err) => return deny(&err.to_string()),
    };

    if !hashes_match(&hash_raw_key(&request.raw_key), &key.key_hash) {
        return deny("invalid API key");
    }

    let now = OffsetDateTime::now_utc();
    let requests_in_window = u32::try_from(key.usage.requests_count).unwrap_or(u32::MAX);
    match validate_api_key(&key, &request.endpoint, &request.client_ip, requests_in_window, now) {
        Ok(_outcome) => {
            let tenant = TenantDomain::new(tenant_segment_str(&request.tenant_domain));
            let capabilities = apikey_capabilities(&key);
            let scope_label = match key.scope {
                KeyScope::User => "user",
                KeyScope::Tenant => "tenant",
                KeyScope::Admin => "admin",
            };
            let token = mint(
                signing_key,
                key.owner_id.clone(),
                tenant,
                scope_label,
                capabilities,
                key.tenant_constraints.clone(),
                Duration::hours(1),
                now,
            );
            ValidateApiKeyResponse {
                valid: true,
                error_message: None,
                capability_token: Some(token),
                rate_limit_remaining: Some(key.rate_limit_per_hour.saturating_sub(requests_in_window)),
                quota_remaining: Some(key.daily_quota.saturating_sub(requests_in_window)),
            }
        }
        Err(err) => deny(&err.to_string()),
    }
}

/// Returns the sanitized tenant segment as a string, falling back to the
/// raw input if sanitization fails (the caller surfaces the real error).
fn tenant_segment_str(tenant: &str) -> String {
    layout::tenant_segment(tenant).map_or_else(|_| tenant.to_string(), |segment| segment.as_str().to_string())
}

/// Input for the execute-MCP-tool contract, matching 6 verbatim.
#[derive(Debug, Deserialize)]
struct ExecuteMcpToolRequest {
    /// Registered MCP server identifier.
    server_id: String,
    /// Tool name within that server.
    tool_name: String,
    /// Tool call parameters, validated per server type.
    parameters: Value,
    /// Signed capability token authorizing the call.
    capability_token: String,
    /// Owning tenant.
    tenant_domain: String,
    /// Acting user; carried for audit parity with the external contract,
    /// not otherwise consulted by the dispatcher.
    #[serde(default)]
    #[allow(dead_code, reason = "carried for wire-contract parity with 6; gating uses the token alone")]
    user_id: Option<String>,
}

#[derive(Debug, Serialize)]
struct ExecuteMcpToolResponse {
    /// Whether the tool call succeeded.
    success: bool,
    /// The tool's result payload, present only on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    /// Present only when `success` is `false`.
    #[serde(skip_serializing_if = "Option::is_none")]
    error_message: Option<String>,
}

/// Verifies the capability token, rejects cross-tenant access, lazily
/// registers the target MCP server from disk if it isn't already cached,
/// and dispatches the tool call through [`call_tool`].
async fn handle_execute_mcp_tool(
    request: &ExecuteMcpToolRequest,
    data_root: &Path,
    signing_key: &SigningKey,
    registry: &Arc<McpRegistry>,
) -> ExecuteMcpToolResponse {
    let fail = |message: String| ExecuteMcpToolResponse { success: false, result: None, error_message: Some(message) };

    let now = OffsetDateTime::now_utc();
    let token = match verify(signing_key, &request.capability_token, now) {
        Ok(token) => token,
        Err(err) => return fail(err.to_string()),
    };
    if token.tenant_id.as_str() != tenant_segment_str(&request.tenant_domain) {
        return fail("cross-tenant mcp access denied".to_string());
    }

    let tenant_root = match layout::tenant_root(&request.tenant_domain, data_root) {
        Ok(root) => root,
        Err(err) => return fail(err.to_string()),
    };
    let server_id = McpServerId::new(request.server_id.clone());
    let entry = match registry.get(&server_id) {
        Some(entry) => entry,
        None => {
            let path = layout::mcp_server_path(&tenant_root, &request.server_id);
            let config: McpServerConfig = match read_json_fault_tolerant(&path) {
                Ok(Some(config)) => config,
                Ok(None) => return fail(format!("mcp server not found: {}", request.server_id)),
                Err(err) => return fail(err.to_string()),
            };
            registry.register(config);
            match registry.get(&server_id) {
                Some(entry) => entry,
                None => return fail("mcp server registration failed".to_string()),
            }
        }
    };

    match call_tool(&entry, &token, &request.tool_name, &request.parameters, &NoopToolExecutor).await {
        Ok(outcome) => ExecuteMcpToolResponse { success: outcome.success, result: outcome.result, error_message: None },
        Err(err) => fail(err.to_string()),
    }
}

/// Input for the operator `check_permission` command.
#[derive(Debug, Deserialize)]
struct CheckPermissionRequest {
    /// Owning tenant.
    tenant_domain: String,
    /// Acting user.
    user_id: String,
    /// Target resource.
    resource_id: String,
    /// One of `read`, `write`, `delete`, `admin`.
    action: String,
    /// Signed capability token for the acting user.
    capability_token: String,
}

#[derive(Debug, Serialize)]
struct CheckPermissionResponse {
    /// Whether the action is permitted.
    allowed: bool,
    /// Human-readable reason, matching the access controller's own strings.
    reason: String,
}

/// Verifies the capability token, loads the target resource and its sharing
/// record, and delegates the decision to the access controller.
fn handle_check_permission(
    request: &CheckPermissionRequest,
    data_root: &Path,
    signing_key: &SigningKey,
) -> CheckPermissionResponse {
    let deny = |reason: &str| CheckPermissionResponse { allowed: false, reason: reason.to_string() };

    let now = OffsetDateTime::now_utc();
    let token = match verify(signing_key, &request.capability_token, now) {
        Ok(token) => token,
        Err(err) => return deny(&err.to_string()),
    };
    let tenant_root = match layout::tenant_root(&request.tenant_domain, data_root) {
        Ok(root) => root,
        Err(err) => return deny(&err.to_string()),
    };
    let action = match parse_action(&request.action) {
        Some(action) => action,
        None => return deny("unknown action"),
    };
    let resource: Resource = match read_json_fault_tolerant(&layout::resource_path(&tenant_root, &request.resource_id)) {
        Ok(Some(resource)) => resource,
        Ok(None) => return deny("resource not found"),
        Err(err) => return deny(&err.to_string()),
    };
    let sharing: Option<SharingRecord> =
        read_json_fault_tolerant(&layout::share_path(&tenant_root, &request.resource_id)).unwrap_or(None);

    let user = UserId::new(request.user_id.clone());
    let decision = check_permission(&user, &token, &resource, sharing.as_ref(), action, now);
    match decision {
        fabricgate_core::runtime::Decision::Allow(reason) => {
            CheckPermissionResponse { allowed: true, reason: reason.to_string() }
        }
        fabricgate_core::runtime::Decision::Deny(reason) => {
            CheckPermissionResponse { allowed: false, reason: reason.to_string() }
        }
    }
}

/// Maps the wire action string to an [`Action`], rejecting anything else.
fn parse_action(raw: &str) -> Option<Action> {
    match raw {
        "read" => Some(Action::Read),
        "write" => Some(Action::Write),
        "delete" => Some(Action::Delete),
        "admin" => Some(Action::Admin),
        _ => None,
    }
}

/// Builds one [`Capability`] per capability string an API key exchanges
/// for, per the API-key service's rule: `actions = ["*"]`, constraints
/// drawn from the key's per-capability override table.
fn apikey_capabilities(key: &ApiKey) -> Vec<Capability> {
    key.capabilities
        .iter()
        .map(|resource| Capability {
            resource: resource.clone(),
            actions: vec!["*".to_string()],
            constraints: key
                .tenant_constraints
                .get(resource)
                .and_then(Value::as_object)
                .cloned()
                .unwrap_or_default()
                .into_iter()
                .collect(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_action_rejects_unknown_strings() {
        assert!(parse_action("teleport").is_none());
        assert_eq!(parse_action("read"), Some(Action::Read));
    }
}
