//! Shared test utilities for integration tests
//!
//! Centralized setup for store directories and environment isolation.

use contextstore::ContextStore;
use std::path::PathBuf;
use std::sync::Mutex;
use tempfile::TempDir;

/// Serializes environment variable access across tests running in parallel
static ENV_MUTEX: Mutex<()> = Mutex::new(());

const ISOLATED_VARS: &[&str] = &["HOME", "XDG_CONFIG_HOME", "DOCKER_CONFIG"];

/// Fresh store in its own temporary directory. Keep the `TempDir` alive for the
/// duration of the test.
pub fn temp_store() -> (TempDir, ContextStore) {
    let temp_dir = TempDir::new().unwrap();
    let store = ContextStore::open(temp_dir.path().join("contexts")).unwrap();
    (temp_dir, store)
}

/// Run `f` with HOME and XDG_CONFIG_HOME pointing into `test_dir` and
/// DOCKER_CONFIG unset; the original environment is restored afterwards.
pub fn with_isolated_env<F, R>(test_dir: &TempDir, f: F) -> R
where
    F: FnOnce() -> R,
{
    let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    let saved: Vec<(&str, Option<String>)> = ISOLATED_VARS
        .iter()
        .map(|k| (*k, std::env::var(k).ok()))
        .collect();

    let home = test_dir.path().join("home");
    let config_home = test_dir.path().join("config");
    std::fs::create_dir_all(&home).unwrap();
    std::fs::create_dir_all(&config_home).unwrap();
    std::env::set_var("HOME", &home);
    std::env::set_var("XDG_CONFIG_HOME", &config_home);
    std::env::remove_var("DOCKER_CONFIG");

    let result = f();

    for (key, value) in saved {
        match value {
            Some(v) => std::env::set_var(key, v),
            None => std::env::remove_var(key),
        }
    }
    result
}

/// Path of the global config file inside an isolated environment
pub fn global_config_file(test_dir: &TempDir) -> PathBuf {
    test_dir
        .path()
        .join("config")
        .join("contextstore")
        .join("config.toml")
}
