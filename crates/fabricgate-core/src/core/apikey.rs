// fabricgate-core/src/core/apikey.rs
// ============================================================================
// Module: Fabricgate API Key Model
// Description: Persisted API-key record types and scope-default tables.
// Purpose: The data shape stored under api_keys/ in a tenant tree.
// Dependencies: serde, time
// ============================================================================

//! ## Overview
//! Persisted API-key record types and the scope-default tables used to
//! populate a newly minted key's allowed capabilities.

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use serde::Deserialize;
use serde::Serialize;
use time::OffsetDateTime;

use crate::core::identifiers::ApiKeyId;
use crate::core::identifiers::UserId;

/// Prefix every raw API key begins with.
pub const RAW_KEY_PREFIX: &str = "gt2";

/// Minimum number of random bytes (before base64url encoding) used for the
/// key secret portion, chosen so the encoded form is at least 44 characters.
pub const RAW_KEY_RANDOM_BYTES: usize = 32;

/// The scope a key operates at, determining its default limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyScope {
    /// A single user's key.
    User,
    /// A tenant-wide service key.
    Tenant,
    /// An administrative key with the highest defaults.
    Admin,
}

/// Default numeric limits applied to a newly created key of a given scope.
#[derive(Debug, Clone, Copy)]
pub struct ScopeDefaults {
    /// Requests permitted per rolling hour.
    pub rate_limit_per_hour: u32,
    /// Requests permitted per rolling day.
    pub daily_quota: u32,
    /// Spend cap, in integer cents.
    pub cost_limit_cents: u32,
}

impl KeyScope {
    /// Returns the scope defaults applied unless the caller overrides them.
    #[must_use]
    pub fn defaults(self) -> ScopeDefaults {
        match self {
            Self::User => ScopeDefaults {
                rate_limit_per_hour: 1_000,
                daily_quota: 10_000,
                cost_limit_cents: 1_000,
            },
            Self::Tenant => ScopeDefaults {
                rate_limit_per_hour: 5_000,
                daily_quota: 50_000,
                cost_limit_cents: 5_000,
            },
            Self::Admin => ScopeDefaults {
                rate_limit_per_hour: 10_000,
                daily_quota: 100_000,
                cost_limit_cents: 10_000,
            },
        }
    }
}

/// Default per-tenant constraint values carried into minted tokens unless
/// the caller overrides a specific key.
#[must_use]
pub fn default_tenant_constraints() -> BTreeMap<String, serde_json::Value> {
    let mut constraints = BTreeMap::new();
    constraints.insert("max_automation_chain_depth".to_string(), serde_json::json!(5));
    constraints.insert("mcp_max_memory_mb".to_string(), serde_json::json!(512));
    constraints.insert("mcp_timeout_seconds".to_string(), serde_json::json!(30));
    constraints.insert("max_file_size_bytes".to_string(), serde_json::json!(10 * 1024 * 1024));
    constraints.insert(
        "allowed_file_types".to_string(),
        serde_json::json!(["pdf", "txt", "md", "json", "csv"]),
    );
    constraints
}

/// Key lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyStatus {
    /// Usable.
    Active,
    /// Administratively disabled, may be reactivated.
    Suspended,
    /// Past its `expires_at`.
    Expired,
    /// Permanently disabled.
    Revoked,
}

/// Usage counters tracked on a key.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KeyUsage {
    /// Total successful validations.
    #[serde(default)]
    pub requests_count: u64,
    /// Count of requests rejected for exceeding the rate limit.
    #[serde(default)]
    pub rate_limit_hits: u64,
    /// Timestamp of the most recent successful validation.
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub last_used: Option<OffsetDateTime>,
}

/// A persisted API key configuration. The raw key material is never stored;
/// only its SHA-256 hash.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiKey {
    /// Stable identifier.
    pub id: ApiKeyId,
    /// Human-readable label.
    pub name: String,
    /// Owning user.
    pub owner_id: UserId,
    /// SHA-256 hash of the raw key, hex-encoded.
    pub key_hash: String,
    /// Capability strings this key exchanges for at validation time.
    #[serde(default)]
    pub capabilities: Vec<String>,
    /// Scope, determining default limits.
    pub scope: KeyScope,
    /// Per-capability constraint overrides.
    #[serde(default)]
    pub tenant_constraints: BTreeMap<String, serde_json::Value>,
    /// Requests permitted per rolling hour.
    pub rate_limit_per_hour: u32,
    /// Requests permitted per rolling day.
    pub daily_quota: u32,
    /// Spend cap, in integer cents. Carried but never debited by the core.
    pub cost_limit_cents: u32,
    /// Maximum tokens permitted in a single downstream request.
    #[serde(default)]
    pub max_tokens_per_request: Option<u32>,
    /// If non-empty, only these endpoint strings validate successfully.
    #[serde(default)]
    pub allowed_endpoints: BTreeSet<String>,
    /// Endpoint strings that always reject, even if also allowed.
    #[serde(default)]
    pub blocked_endpoints: BTreeSet<String>,
    /// If non-empty, only these source IPs validate successfully.
    #[serde(default)]
    pub allowed_ips: BTreeSet<String>,
    /// Lifecycle state.
    pub status: KeyStatus,
    /// Creation timestamp.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    /// Optional expiration.
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub expires_at: Option<OffsetDateTime>,
    /// Timestamp of the most recent rotation, if any.
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub last_rotated: Option<OffsetDateTime>,
    /// Usage counters.
    #[serde(default)]
    pub usage: KeyUsage,
}

impl ApiKey {
    /// Returns whether `endpoint` is permitted by this key's allow/block
    /// lists. Matching is plain string equality (see open-question
    /// decision: no wildcard semantics in the source).
    #[must_use]
    pub fn endpoint_allowed(&self, endpoint: &str) -> bool {
        if self.blocked_endpoints.contains(endpoint) {
            return false;
        }
        self.allowed_endpoints.is_empty() || self.allowed_endpoints.contains(endpoint)
    }

    /// Returns whether `ip` is permitted by this key's IP allowlist.
    #[must_use]
    pub fn ip_allowed(&self, ip: &str) -> bool {
        self.allowed_ips.is_empty() || self.allowed_ips.contains(ip)
    }
}
