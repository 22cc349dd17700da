//! Integration tests for the configuration system

use super::test_utils::{global_config_file, with_isolated_env};
use contextstore::config::{global_config_path, ConfigLoader};
use contextstore::{ContextMetadata, ContextStore, Store};
use std::path::PathBuf;
use tempfile::TempDir;

#[test]
fn test_global_config_is_loaded() {
    let test_dir = TempDir::new().unwrap();
    let store_dir = test_dir.path().join("store");
    with_isolated_env(&test_dir, || {
        let path = global_config_file(&test_dir);
        assert_eq!(global_config_path(), Some(path.clone()));
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(
            &path,
            format!(
                "[storage]\ndir = {:?}\n\n[logging]\nlevel = \"warn\"\n",
                store_dir.to_str().unwrap()
            ),
        )
        .unwrap();

        let config = ConfigLoader::load().unwrap();
        assert_eq!(config.storage.dir, Some(store_dir.clone()));
        assert_eq!(config.logging.level, "warn");
        assert_eq!(config.logging.format, "text");
    });
}

#[test]
fn test_explicit_file_overrides_global() {
    let test_dir = TempDir::new().unwrap();
    with_isolated_env(&test_dir, || {
        let global = global_config_file(&test_dir);
        std::fs::create_dir_all(global.parent().unwrap()).unwrap();
        std::fs::write(&global, "[logging]\nlevel = \"warn\"\nformat = \"json\"\n").unwrap();

        let explicit = test_dir.path().join("explicit.toml");
        std::fs::write(&explicit, "[logging]\nlevel = \"trace\"\n").unwrap();

        let config = ConfigLoader::load_from_file(&explicit).unwrap();
        assert_eq!(config.logging.level, "trace");
        // untouched keys still come from the global file
        assert_eq!(config.logging.format, "json");
    });
}

#[test]
fn test_store_dir_defaults_under_home() {
    let test_dir = TempDir::new().unwrap();
    with_isolated_env(&test_dir, || {
        let config = ConfigLoader::load().unwrap();
        let dir = config.store_dir().unwrap();
        assert_eq!(
            dir,
            test_dir.path().join("home").join(".docker").join("contexts")
        );
    });
}

#[test]
fn test_open_store_from_config() {
    let test_dir = TempDir::new().unwrap();
    let mut config = ConfigLoader::default();
    config.storage.dir = Some(test_dir.path().join("ctx-store"));

    let store = ContextStore::open_with_config(&config).unwrap();
    store.create_or_update("one", &ContextMetadata::new()).unwrap();
    assert_eq!(store.root(), test_dir.path().join("ctx-store"));
    assert!(PathBuf::from(store.root()).join("config.json").exists());
    assert_eq!(store.list().unwrap().len(), 1);
}
