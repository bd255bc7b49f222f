// system-tests/tests/config_resolution.rs
// ============================================================================
// Module: Config Resolution System Test
// Description: Exercises AppConfig's path-resolution order against a real
//              filesystem, including the CONTROL_PLANE_CONFIG env override.
// Purpose: Catch regressions in the precedence CLI operators rely on.
// Dependencies: fabricgate-config
// ============================================================================

#![cfg(feature = "system-tests")]

use std::sync::Mutex;
use std::sync::OnceLock;

use fabricgate_config::AppConfig;
use fabricgate_config::CONFIG_ENV_VAR;

mod env_mut {
    #![allow(unsafe_code, reason = "Tests mutate process env vars in a controlled scope.")]

    pub fn set_var(key: &str, value: &str) {
        // SAFETY: Tests serialize environment mutation via a global lock.
        unsafe {
            std::env::set_var(key, value);
        }
    }

    pub fn remove_var(key: &str) {
        // SAFETY: Tests serialize environment mutation via a global lock.
        unsafe {
            std::env::remove_var(key);
        }
    }
}

fn env_lock() -> std::sync::MutexGuard<'static, ()> {
    static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    LOCK.get_or_init(|| Mutex::new(())).lock().expect("env lock poisoned")
}

#[test]
fn a_missing_default_path_with_no_override_loads_defaults() {
    let _lock = env_lock();
    env_mut::remove_var(CONFIG_ENV_VAR);
    let original_dir = std::env::current_dir().expect("cwd");
    let dir = tempfile::tempdir().expect("tempdir");
    std::env::set_current_dir(dir.path()).expect("chdir into empty tempdir");

    let result = AppConfig::load(None);

    std::env::set_current_dir(original_dir).expect("restore cwd");
    let config = result.expect("defaults load without a file");
    assert_eq!(config.server.max_inflight, 256);
}

#[test]
fn an_explicit_missing_path_is_an_error() {
    let missing = std::path::Path::new("/nonexistent/control-plane.toml");
    assert!(AppConfig::load(Some(missing)).is_err());
}

#[test]
fn the_env_override_is_used_when_no_explicit_path_is_given() {
    let _lock = env_lock();
    let dir = tempfile::tempdir().expect("tempdir");
    let config_path = dir.path().join("custom.toml");
    std::fs::write(&config_path, "[server]\nmax_inflight = 42\n").expect("write config");

    env_mut::set_var(CONFIG_ENV_VAR, config_path.to_str().expect("utf8 path"));
    let config = AppConfig::load(None).expect("config loads via env override");
    env_mut::remove_var(CONFIG_ENV_VAR);

    assert_eq!(config.server.max_inflight, 42);
}

#[test]
fn an_explicit_path_takes_precedence_over_the_env_override() {
    let _lock = env_lock();
    let dir = tempfile::tempdir().expect("tempdir");
    let env_path = dir.path().join("env.toml");
    let explicit_path = dir.path().join("explicit.toml");
    std::fs::write(&env_path, "[server]\nmax_inflight = 1\n").expect("write env config");
    std::fs::write(&explicit_path, "[server]\nmax_inflight = 2\n").expect("write explicit config");

    env_mut::set_var(CONFIG_ENV_VAR, env_path.to_str().expect("utf8 path"));
    let config = AppConfig::load(Some(&explicit_path)).expect("config loads via explicit path");
    env_mut::remove_var(CONFIG_ENV_VAR);

    assert_eq!(config.server.max_inflight, 2);
}
