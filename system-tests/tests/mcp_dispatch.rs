// system-tests/tests/mcp_dispatch.rs
// ============================================================================
// Module: MCP Dispatch System Test
// Description: Exercises capability-token verification and MCP tool dispatch
//              end to end against a registered server.
// Purpose: Catch regressions between fabricgate-core's token codec and
//          fabricgate-mcp's gating pipeline.
// Dependencies: fabricgate-core, fabricgate-mcp, tokio
// ============================================================================

#![cfg(feature = "system-tests")]

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use fabricgate_core::core::identifiers::McpServerId;
use fabricgate_core::core::identifiers::TenantDomain;
use fabricgate_core::core::identifiers::UserId;
use fabricgate_core::core::token::Capability;
use fabricgate_core::core::token::SigningKey;
use fabricgate_core::core::token::mint;
use fabricgate_core::core::token::verify;
use fabricgate_mcp::DispatchError;
use fabricgate_mcp::McpRegistry;
use fabricgate_mcp::McpServerConfig;
use fabricgate_mcp::McpServerType;
use fabricgate_mcp::NoopToolExecutor;
use fabricgate_mcp::call_tool;
use time::Duration;
use time::OffsetDateTime;

fn server_config() -> McpServerConfig {
    McpServerConfig {
        id: McpServerId::new("rag-1"),
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

#[tokio::test]
async fn a_token_with_the_matching_capability_may_call_the_tool() {
    let registry = McpRegistry::new();
    registry.register(server_config());
    let entry = registry.get(&McpServerId::new("rag-1")).expect("server registered");

    let signing_key = SigningKey::new(b"system-test-signing-key".to_vec());
    let now = OffsetDateTime::now_utc();
    let token = mint(
        &signing_key,
        UserId::new("alice"),
        TenantDomain::new("acme"),
        "user",
        vec![Capability { resource: "mcp:rag:*".to_string(), actions: vec!["*".to_string()], constraints: BTreeMap::new() }],
        BTreeMap::new(),
        Duration::hours(1),
        now,
    );
    let data = verify(&signing_key, &token, now).expect("token verifies");

    let outcome = call_tool(
        &entry,
        &data,
        "search_datasets",
        &serde_json::json!({"path": "notes.txt"}),
        &NoopToolExecutor,
    )
    .await
    .expect("call succeeds");
    assert!(outcome.success);
}

#[tokio::test]
async fn a_token_without_the_capability_is_rejected_before_dispatch() {
    let registry = McpRegistry::new();
    registry.register(server_config());
    let entry = registry.get(&McpServerId::new("rag-1")).expect("server registered");

    let signing_key = SigningKey::new(b"system-test-signing-key".to_vec());
    let now = OffsetDateTime::now_utc();
    let token = mint(
        &signing_key,
        UserId::new("alice"),
        TenantDomain::new("acme"),
        "user",
        vec![Capability { resource: "mcp:other:*".to_string(), actions: vec!["*".to_string()], constraints: BTreeMap::new() }],
        BTreeMap::new(),
        Duration::hours(1),
        now,
    );
    let data = verify(&signing_key, &token, now).expect("token verifies");

    let outcome = call_tool(&entry, &data, "search_datasets", &serde_json::json!({}), &NoopToolExecutor).await;
    assert!(matches!(outcome, Err(DispatchError::PermissionDenied(_))));
}

#[tokio::test]
async fn an_unavailable_tool_name_is_rejected() {
    let registry = McpRegistry::new();
    registry.register(server_config());
    let entry = registry.get(&McpServerId::new("rag-1")).expect("server registered");

    let signing_key = SigningKey::new(b"system-test-signing-key".to_vec());
    let now = OffsetDateTime::now_utc();
    let token = mint(
        &signing_key,
        UserId::new("alice"),
        TenantDomain::new("acme"),
        "user",
        vec![Capability { resource: "mcp:rag:*".to_string(), actions: vec!["*".to_string()], constraints: BTreeMap::new() }],
        BTreeMap::new(),
        Duration::hours(1),
        now,
    );
    let data = verify(&signing_key, &token, now).expect("token verifies");

    let outcome = call_tool(&entry, &data, "delete_everything", &serde_json::json!({}), &NoopToolExecutor).await;
    assert!(matches!(outcome, Err(DispatchError::ToolNotAvailable(_))));
}
