// system-tests/src/config/env.rs
// ============================================================================
// Module: System Test Environment
// Description: Environment-backed configuration for system tests.
// Purpose: Centralize env parsing with strict UTF-8 validation.
// Dependencies: std
// ============================================================================

//! ## Overview
//! Environment values are parsed with strict UTF-8 enforcement to avoid silent
//! misconfiguration. Invalid UTF-8 fails closed.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::PathBuf;
use std::time::Duration;

// ============================================================================
// SECTION: Environment Constants
// ============================================================================

/// Environment keys for system test configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemTestEnv {
    /// Optional fixed data root, for inspecting a run's on-disk state by hand.
    DataRoot,
    /// Optional timeout override (seconds) for async scenarios.
    TimeoutSeconds,
    /// Allow reusing an existing data root instead of a fresh temp directory.
    AllowOverwrite,
}

impl SystemTestEnv {
    /// Returns the canonical environment variable name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::DataRoot => "FABRICGATE_SYSTEM_TEST_DATA_ROOT",
            Self::TimeoutSeconds => "FABRICGATE_SYSTEM_TEST_TIMEOUT_SEC",
            Self::AllowOverwrite => "FABRICGATE_SYSTEM_TEST_ALLOW_OVERWRITE",
        }
    }
}

// ============================================================================
// SECTION: Config Types
// ============================================================================

/// Typed system test configuration derived from environment variables.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SystemTestConfig {
    /// Optional fixed data root override.
    pub data_root: Option<PathBuf>,
    /// Optional timeout override for async scenarios.
    pub timeout: Option<Duration>,
    /// Allow reusing an existing data root.
    pub allow_overwrite: bool,
}

impl SystemTestConfig {
    /// Loads configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error when an environment value is not valid UTF-8.
    pub fn load() -> Result<Self, String> {
        let data_root = read_env_strict(SystemTestEnv::DataRoot.as_str())?.map(PathBuf::from);
        let timeout = read_env_strict(SystemTestEnv::TimeoutSeconds.as_str())?
            .and_then(|value| value.parse::<u64>().ok())
            .map(Duration::from_secs);
        let allow_overwrite = read_env_strict(SystemTestEnv::AllowOverwrite.as_str())?
            .is_some_and(|value| value == "1" || value.eq_ignore_ascii_case("true"));
        Ok(Self { data_root, timeout, allow_overwrite })
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Reads an environment variable and enforces UTF-8 validity.
///
/// # Errors
///
/// Returns an error when the environment variable contains invalid UTF-8.
pub fn read_env_strict(name: &str) -> Result<Option<String>, String> {
    std::env::var_os(name).map_or(Ok(None), |raw| {
        raw.into_string().map(Some).map_err(|_| format!("{name} must be valid UTF-8"))
    })
}
