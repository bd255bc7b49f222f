// fabricgate-config/src/config.rs
// ============================================================================
// Module: Fabricgate Process Configuration
// Description: TOML-backed process configuration, resolution, and validation.
// Purpose: Provide strict, fail-closed config loading before any tenant
//          directory is touched.
// Dependencies: fabricgate-core, serde, toml
// ============================================================================

//! ## Overview
//! Configuration is loaded from a single TOML file with a hard byte-size
//! cap, parsed with `toml`, then validated section by section through one
//! `validate()` method per section. An absent section is legal: every field
//! carries a `serde(default = "fn")` so a minimal or empty file loads
//! successfully.

use std::env;
use std::fs;
use std::path::Path;
use std::path::PathBuf;

#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use fabricgate_core::core::apikey::KeyScope;
use fabricgate_core::core::error::AsErrorKind;
use fabricgate_core::core::error::CoreErrorKind;

/// Default configuration filename when no path is specified.
const DEFAULT_CONFIG_NAME: &str = "control-plane.toml";
/// Environment variable used to override the config path.
pub const CONFIG_ENV_VAR: &str = "CONTROL_PLANE_CONFIG";
/// Environment variable used to override `server.max_body_bytes`.
pub const MAX_BODY_BYTES_ENV_VAR: &str = "MAX_BODY_BYTES";
/// Environment variable read for `signing.type = "env"`.
pub const SIGNING_KEY_ENV_VAR: &str = "SIGNING_KEY";
/// Maximum configuration file size in bytes.
const MAX_CONFIG_FILE_SIZE: u64 = 1024 * 1024;

fn default_max_body_bytes() -> usize {
    env::var(MAX_BODY_BYTES_ENV_VAR).ok().and_then(|value| value.parse().ok()).unwrap_or(1024 * 1024)
}

const fn default_max_inflight() -> usize {
    256
}

const fn default_audit_enabled() -> bool {
    true
}

fn default_integration_window_seconds() -> u64 {
    3600
}

fn default_mcp_sandbox_window_seconds() -> u64 {
    3600
}

fn scope_defaults(scope: KeyScope) -> RateLimitDefaults {
    let defaults = scope.defaults();
    RateLimitDefaults {
        rate_limit_per_hour: defaults.rate_limit_per_hour,
        daily_quota: defaults.daily_quota,
        cost_limit_cents: defaults.cost_limit_cents,
    }
}

fn default_user_rate_limits() -> RateLimitDefaults {
    scope_defaults(KeyScope::User)
}

fn default_tenant_rate_limits() -> RateLimitDefaults {
    scope_defaults(KeyScope::Tenant)
}

fn default_admin_rate_limits() -> RateLimitDefaults {
    scope_defaults(KeyScope::Admin)
}

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O failure while reading configuration.
    #[error("config io error: {0}")]
    Io(String),
    /// TOML parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Invalid configuration data.
    #[error("invalid config: {0}")]
    Invalid(String),
}

impl AsErrorKind for ConfigError {
    fn kind(&self) -> CoreErrorKind {
        CoreErrorKind::InvalidInput
    }
}

/// The full process-start configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Server-wide resource limits and the tenant data root.
    #[serde(default)]
    pub server: ServerConfig,
    /// Capability-token signing key source.
    #[serde(default)]
    pub signing: SigningConfig,
    /// Per-scope and per-surface rate-limit defaults.
    #[serde(default)]
    pub rate_limits: RateLimitsConfig,
    /// Audit sink configuration.
    #[serde(default)]
    pub audit: AuditConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            signing: SigningConfig::default(),
            rate_limits: RateLimitsConfig::default(),
            audit: AuditConfig::default(),
        }
    }
}

impl AppConfig {
    /// Loads configuration using the standard resolution order: an explicit
    /// `--config` path, else [`CONFIG_ENV_VAR`], else [`DEFAULT_CONFIG_NAME`]
    /// in the current directory. A missing file is only an error when the
    /// path was given explicitly (flag or env); otherwise the defaults
    /// apply.
    ///
    /// # Errors
    /// Returns [`ConfigError`] if the file cannot be read (and was
    /// explicitly requested), fails to parse, or fails validation.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self, ConfigError> {
        let (path, was_explicit) = resolve_path(explicit_path);
        let config = match fs::metadata(&path) {
            Ok(_) => Self::load_from_path(&path)?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound && !was_explicit => {
                Self::default()
            }
            Err(err) => return Err(ConfigError::Io(err.to_string())),
        };
        config.validate()?;
        Ok(config)
    }

    fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let metadata = fs::metadata(path).map_err(|err| ConfigError::Io(err.to_string()))?;
        if metadata.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let content = fs::read_to_string(path).map_err(|err| ConfigError::Io(err.to_string()))?;
        toml::from_str(&content).map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Validates every section for internal consistency.
    ///
    /// # Errors
    /// Returns the first [`ConfigError::Invalid`] a section reports.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server.validate()?;
        self.signing.validate()?;
        self.rate_limits.validate()?;
        self.audit.validate()?;
        Ok(())
    }
}

fn resolve_path(explicit_path: Option<&Path>) -> (PathBuf, bool) {
    if let Some(path) = explicit_path {
        return (path.to_path_buf(), true);
    }
    if let Ok(env_path) = env::var(CONFIG_ENV_VAR) {
        return (PathBuf::from(env_path), true);
    }
    (PathBuf::from(DEFAULT_CONFIG_NAME), false)
}

/// Server-wide resource limits and the tenant data root.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Filesystem root every tenant's directory is nested under.
    #[serde(default = "default_data_root")]
    pub data_root: PathBuf,
    /// Maximum accepted request body size, in bytes.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
    /// Maximum number of in-flight requests the process will accept.
    #[serde(default = "default_max_inflight")]
    pub max_inflight: usize,
}

fn default_data_root() -> PathBuf {
    PathBuf::from("./data")
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            data_root: default_data_root(),
            max_body_bytes: default_max_body_bytes(),
            max_inflight: default_max_inflight(),
        }
    }
}

impl ServerConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_body_bytes == 0 {
            return Err(ConfigError::Invalid("server.max_body_bytes must be > 0".to_string()));
        }
        if self.max_inflight == 0 {
            return Err(ConfigError::Invalid("server.max_inflight must be > 0".to_string()));
        }
        Ok(())
    }
}

/// The source a capability-token signing key is read from.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SigningSource {
    /// Read the key from [`SIGNING_KEY_ENV_VAR`].
    #[default]
    Env,
    /// Read the key from a file, rejecting world-readable permissions on
    /// Unix.
    File {
        /// Path to the key file.
        path: PathBuf,
    },
}

/// Capability-token signing key configuration.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct SigningConfig {
    /// Where to read the signing key from.
    #[serde(flatten)]
    pub source: SigningSource,
}

impl SigningConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if let SigningSource::File { path } = &self.source {
            if path.as_os_str().is_empty() {
                return Err(ConfigError::Invalid("signing.path must be non-empty".to_string()));
            }
        }
        Ok(())
    }

    /// Resolves the signing key bytes per the configured source.
    ///
    /// # Errors
    /// Returns [`ConfigError::Invalid`] if the environment variable is
    /// unset, or if the key file is missing, unreadable, or world-readable
    /// on Unix.
    pub fn resolve_key(&self) -> Result<Vec<u8>, ConfigError> {
        match &self.source {
            SigningSource::Env => env::var(SIGNING_KEY_ENV_VAR)
                .map(String::into_bytes)
                .map_err(|_| ConfigError::Invalid(format!("{SIGNING_KEY_ENV_VAR} is not set"))),
            SigningSource::File { path } => {
                #[cfg(unix)]
                {
                    let metadata =
                        fs::metadata(path).map_err(|err| ConfigError::Io(err.to_string()))?;
                    if metadata.permissions().mode() & 0o044 != 0 {
                        return Err(ConfigError::Invalid(
                            "signing key file must not be world- or group-readable".to_string(),
                        ));
                    }
                }
                fs::read(path).map_err(|err| ConfigError::Io(err.to_string()))
            }
        }
    }
}

/// Numeric rate-limit defaults for one API-key scope.
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct RateLimitDefaults {
    /// Requests permitted per rolling hour.
    pub rate_limit_per_hour: u32,
    /// Requests permitted per rolling day.
    pub daily_quota: u32,
    /// Spend cap, in integer cents.
    pub cost_limit_cents: u32,
}

/// Per-scope API-key defaults plus integration/MCP sandbox windows.
#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitsConfig {
    /// Defaults applied to newly created `User`-scope keys.
    #[serde(default = "default_user_rate_limits")]
    pub user: RateLimitDefaults,
    /// Defaults applied to newly created `Tenant`-scope keys.
    #[serde(default = "default_tenant_rate_limits")]
    pub tenant: RateLimitDefaults,
    /// Defaults applied to newly created `Admin`-scope keys.
    #[serde(default = "default_admin_rate_limits")]
    pub admin: RateLimitDefaults,
    /// Sliding window, in seconds, for integration-proxy rate limiting.
    #[serde(default = "default_integration_window_seconds")]
    pub integration_window_seconds: u64,
    /// Sliding window, in seconds, for MCP sandbox rate limiting.
    #[serde(default = "default_mcp_sandbox_window_seconds")]
    pub mcp_sandbox_window_seconds: u64,
}

impl Default for RateLimitsConfig {
    fn default() -> Self {
        Self {
            user: default_user_rate_limits(),
            tenant: default_tenant_rate_limits(),
            admin: default_admin_rate_limits(),
            integration_window_seconds: default_integration_window_seconds(),
            mcp_sandbox_window_seconds: default_mcp_sandbox_window_seconds(),
        }
    }
}

impl RateLimitsConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.integration_window_seconds == 0 {
            return Err(ConfigError::Invalid(
                "rate_limits.integration_window_seconds must be > 0".to_string(),
            ));
        }
        if self.mcp_sandbox_window_seconds == 0 {
            return Err(ConfigError::Invalid(
                "rate_limits.mcp_sandbox_window_seconds must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Audit sink configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AuditConfig {
    /// Whether audit records are written at all.
    #[serde(default = "default_audit_enabled")]
    pub enabled: bool,
    /// Directory audit logs are written under; defaults to
    /// `<data_root>/_audit` when unset.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self { enabled: default_audit_enabled(), path: None }
    }
}

impl AuditConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if let Some(path) = &self.path
            && path.as_os_str().is_empty()
        {
            return Err(ConfigError::Invalid("audit.path must be non-empty if set".to_string()));
        }
        Ok(())
    }

    /// Resolves the directory audit logs are written under, falling back to
    /// `<data_root>/_audit` when `path` is unset.
    #[must_use]
    pub fn resolved_dir(&self, data_root: &Path) -> PathBuf {
        self.path.clone().unwrap_or_else(|| data_root.join("_audit"))
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn default_config_validates() {
        let config = AppConfig::default();
        config.validate().expect("defaults must validate");
    }

    #[test]
    fn empty_toml_document_loads_with_defaults() {
        let config: AppConfig = toml::from_str("").expect("empty document parses");
        config.validate().expect("defaults must validate");
        assert_eq!(
            config.rate_limits.user.rate_limit_per_hour,
            KeyScope::User.defaults().rate_limit_per_hour
        );
    }

    #[test]
    fn missing_default_path_falls_back_to_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let original = std::env::current_dir().expect("cwd");
        std::env::set_current_dir(dir.path()).expect("chdir");
        #[allow(unsafe_code, reason = "test clears a process env var before a single-threaded check")]
        // SAFETY: no other thread reads/writes this env var during the test.
        unsafe {
            std::env::remove_var(CONFIG_ENV_VAR);
        }
        let result = AppConfig::load(None);
        std::env::set_current_dir(original).expect("restore cwd");
        assert!(result.is_ok());
    }

    #[test]
    fn missing_explicit_path_is_an_error() {
        let missing = Path::new("/nonexistent/control-plane.toml");
        let result = AppConfig::load(Some(missing));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn zero_max_inflight_fails_validation() {
        let mut config = AppConfig::default();
        config.server.max_inflight = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn signing_env_source_reads_the_environment_variable() {
        #[allow(unsafe_code, reason = "test sets a process env var before single-threaded test body runs")]
        // SAFETY: no other thread reads/writes this env var during the test.
        unsafe {
            std::env::set_var(SIGNING_KEY_ENV_VAR, "test-key-material");
        }
        let config = SigningConfig { source: SigningSource::Env };
        let key = config.resolve_key().expect("env key resolves");
        assert_eq!(key, b"test-key-material");
        #[allow(unsafe_code, reason = "test clears the process env var it set above")]
        // SAFETY: no other thread reads/writes this env var during the test.
        unsafe {
            std::env::remove_var(SIGNING_KEY_ENV_VAR);
        }
    }

    #[cfg(unix)]
    #[test]
    fn signing_file_source_rejects_world_readable_permissions() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("signing.key");
        let mut file = fs::File::create(&path).expect("create key file");
        file.write_all(b"secret").expect("write key");
        fs::set_permissions(&path, fs::Permissions::from_mode(0o644)).expect("chmod");
        let config = SigningConfig { source: SigningSource::File { path: path.clone() } };
        assert!(matches!(config.resolve_key(), Err(ConfigError::Invalid(_))));
        fs::set_permissions(&path, fs::Permissions::from_mode(0o600)).expect("chmod");
        assert!(config.resolve_key().is_ok());
    }
}
