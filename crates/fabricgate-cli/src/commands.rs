// fabricgate-cli/src/commands.rs
// ============================================================================
// Module: Fabricgate CLI Commands
// Description: token/tenant/audit/config subcommand implementations.
// Purpose: Give operators direct access to the same primitives the serve
//          loop uses, without going through the request protocol.
// Dependencies: fabricgate-config, fabricgate-core, serde_json
// ============================================================================

//! ## Overview
//! Each function here takes already-parsed arguments and returns a rendered
//! string (or an error); `main.rs` owns exit-code mapping and where the
//! string is written.

use std::path::Path;

use fabricgate_config::AppConfig;
use fabricgate_core::core::identifiers::TenantDomain;
use fabricgate_core::core::identifiers::UserId;
use fabricgate_core::core::token::Capability;
use fabricgate_core::core::token::SigningKey;
use fabricgate_core::core::token::mint;
use fabricgate_core::core::token::verify;
use fabricgate_core::interfaces::AuditRecord;
use fabricgate_core::runtime::ensure_dir;
use fabricgate_core::runtime::read_jsonl_fault_tolerant;
use time::Duration;
use time::OffsetDateTime;

use crate::layout;

/// Errors raised by CLI command implementations.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    /// Configuration failed to load or validate.
    #[error("config error: {0}")]
    Config(#[from] fabricgate_config::ConfigError),
    /// Tenant sanitization or filesystem access failed.
    #[error("{0}")]
    Core(String),
    /// The supplied capability token failed to verify.
    #[error("token error: {0}")]
    Token(#[from] fabricgate_core::core::token::TokenError),
}

/// Loads configuration and resolves the signing key it names.
fn resolve_signing_key(config_path: Option<&Path>) -> Result<(AppConfig, SigningKey), CommandError> {
    let config = AppConfig::load(config_path)?;
    let key_bytes = config.signing.resolve_key()?;
    Ok((config, SigningKey::new(key_bytes)))
}

/// Mints a capability token for `user`/`tenant`, granting one wildcard-action
/// [`Capability`] per entry in `resources`, and returns the encoded token.
///
/// # Errors
/// Returns [`CommandError`] if configuration fails to load or the signing
/// key cannot be resolved.
pub fn token_mint(
    config_path: Option<&Path>,
    user: &str,
    tenant: &str,
    scope: &str,
    resources: &[String],
    ttl_seconds: i64,
) -> Result<String, CommandError> {
    let (_config, signing_key) = resolve_signing_key(config_path)?;
    let capabilities = resources
        .iter()
        .map(|resource| Capability {
            resource: resource.clone(),
            actions: vec!["*".to_string()],
            constraints: std::collections::BTreeMap::new(),
        })
        .collect();
    let now = OffsetDateTime::now_utc();
    let token = mint(
        &signing_key,
        UserId::new(user),
        TenantDomain::new(tenant),
        scope,
        capabilities,
        std::collections::BTreeMap::new(),
        Duration::seconds(ttl_seconds),
        now,
    );
    Ok(token)
}

/// Verifies `token` and returns its decoded contents as pretty-printed JSON.
///
/// # Errors
/// Returns [`CommandError`] if configuration fails to load, the signing key
/// cannot be resolved, or the token fails to verify.
pub fn token_inspect(config_path: Option<&Path>, token: &str) -> Result<String, CommandError> {
    let (_config, signing_key) = resolve_signing_key(config_path)?;
    let data = verify(&signing_key, token, OffsetDateTime::now_utc())?;
    serde_json::to_string_pretty(&data).map_err(|err| CommandError::Core(err.to_string()))
}

/// Creates `tenant`'s root directory and every subdirectory the control
/// plane expects to find under it.
///
/// # Errors
/// Returns [`CommandError`] if `tenant` fails sanitization or a directory
/// cannot be created.
pub fn tenant_init(data_root: &Path, tenant: &str) -> Result<String, CommandError> {
    let root = layout::tenant_root(tenant, data_root).map_err(|err| CommandError::Core(err.to_string()))?;
    ensure_dir(&root).map_err(|err| CommandError::Core(err.to_string()))?;
    for subdirectory in layout::TENANT_SUBDIRECTORIES {
        ensure_dir(&root.join(subdirectory)).map_err(|err| CommandError::Core(err.to_string()))?;
    }
    Ok(format!("initialized tenant at {}", root.display()))
}

/// Reads every `_audit/audit_*.jsonl` file under `tenant`'s root, in
/// filename order, and renders each record as one pretty-printed JSON line,
/// keeping only the last `limit` records if given.
///
/// # Errors
/// Returns [`CommandError`] if `tenant` fails sanitization or the audit
/// directory cannot be listed.
pub fn audit_tail(data_root: &Path, tenant: &str, limit: Option<usize>) -> Result<String, CommandError> {
    let root = layout::tenant_root(tenant, data_root).map_err(|err| CommandError::Core(err.to_string()))?;
    let audit_dir = layout::audit_dir(&root);

    let mut files = match std::fs::read_dir(&audit_dir) {
        Ok(entries) => entries
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| path.extension().is_some_and(|ext| ext == "jsonl"))
            .collect::<Vec<_>>(),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Vec::new(),
        Err(err) => return Err(CommandError::Core(err.to_string())),
    };
    files.sort();

    let mut records = Vec::new();
    for file in files {
        let mut page: Vec<AuditRecord> =
            read_jsonl_fault_tolerant(&file).map_err(|err| CommandError::Core(err.to_string()))?;
        records.append(&mut page);
    }
    if let Some(limit) = limit {
        let skip = records.len().saturating_sub(limit);
        records.drain(..skip);
    }

    records
        .iter()
        .map(|record| serde_json::to_string(record).map_err(|err| CommandError::Core(err.to_string())))
        .collect::<Result<Vec<_>, _>>()
        .map(|lines| lines.join("\n"))
}

/// Loads and validates configuration at `config_path`, returning the
/// resolved configuration as pretty-printed JSON.
///
/// # Errors
/// Returns [`CommandError`] if the file is missing (when given explicitly),
/// fails to parse, or fails validation.
pub fn config_check(config_path: Option<&Path>) -> Result<String, CommandError> {
    let config = AppConfig::load(config_path)?;
    serde_json::to_string_pretty(&ResolvedConfig::from(&config))
        .map_err(|err| CommandError::Core(err.to_string()))
}

/// A JSON-friendly projection of [`AppConfig`]; the signing key source is
/// shown but never the resolved key material.
#[derive(serde::Serialize)]
struct ResolvedConfig {
    /// Tenant data root.
    data_root: std::path::PathBuf,
    /// Maximum accepted request body size, in bytes.
    max_body_bytes: usize,
    /// Maximum in-flight requests.
    max_inflight: usize,
    /// Whether audit recording is enabled.
    audit_enabled: bool,
}

impl From<&AppConfig> for ResolvedConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            data_root: config.server.data_root.clone(),
            max_body_bytes: config.server.max_body_bytes,
            max_inflight: config.server.max_inflight,
            audit_enabled: config.audit.enabled,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_mint_then_inspect_round_trips_through_the_env_signing_source() {
        #[allow(unsafe_code, reason = "test sets a process env var before single-threaded test body runs")]
        // SAFETY: no other thread reads/writes this env var during the test.
        unsafe {
            std::env::set_var(fabricgate_config::SIGNING_KEY_ENV_VAR, "cli-test-signing-key");
        }
        let dir = tempfile::tempdir().expect("tempdir");
        let config_path = dir.path().join("control-plane.toml");
        std::fs::write(&config_path, "").expect("write empty config");

        let token = token_mint(
            Some(&config_path),
            "alice",
            "acme",
            "user",
            &["mcp:rag:*".to_string()],
            3600,
        )
        .expect("mint succeeds");
        let rendered = token_inspect(Some(&config_path), &token).expect("inspect succeeds");
        assert!(rendered.contains("\"sub\": \"alice\""));
        #[allow(unsafe_code, reason = "test clears the process env var it set above")]
        // SAFETY: no other thread reads/writes this env var during the test.
        unsafe {
            std::env::remove_var(fabricgate_config::SIGNING_KEY_ENV_VAR);
        }
    }

    #[test]
    fn tenant_init_creates_every_subdirectory() {
        let dir = tempfile::tempdir().expect("tempdir");
        tenant_init(dir.path(), "acme").expect("init succeeds");
        for subdirectory in layout::TENANT_SUBDIRECTORIES {
            assert!(dir.path().join("acme").join(subdirectory).exists());
        }
    }

    #[test]
    fn audit_tail_returns_empty_string_for_uninitialized_tenant() {
        let dir = tempfile::tempdir().expect("tempdir");
        let rendered = audit_tail(dir.path(), "acme", None).expect("tail succeeds");
        assert!(rendered.is_empty());
    }

    #[test]
    fn config_check_rejects_an_explicit_missing_path() {
        let missing = Path::new("/nonexistent/control-plane.toml");
        assert!(config_check(Some(missing)).is_err());
    }
}
