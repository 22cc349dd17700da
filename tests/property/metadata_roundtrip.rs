//! Property-based tests for record fidelity

use contextstore::store::name::validate_context_name;
use contextstore::{ContextMetadata, ContextSettings, ContextStore, Metadata, Orchestrator, Store};
use proptest::prelude::*;
use serde_json::Value;
use tempfile::TempDir;

fn json_leaf() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::from),
        any::<i64>().prop_map(Value::from),
        "[a-zA-Z0-9 :/._-]{0,24}".prop_map(Value::from),
    ]
}

fn metadata() -> impl Strategy<Value = Metadata> {
    prop::collection::btree_map("[a-zA-Z][a-zA-Z0-9]{0,11}", json_leaf(), 0..6)
        .prop_map(|m| m.into_iter().collect())
}

fn context_metadata() -> impl Strategy<Value = ContextMetadata> {
    (
        prop::collection::btree_map("[a-z]{1,10}", metadata(), 0..3),
        metadata(),
    )
        .prop_map(|(endpoints, metadata)| ContextMetadata { endpoints, metadata })
}

/// Whatever is written is read back unchanged, unknown keys and value types included
#[test]
fn test_record_roundtrip_property() {
    let temp_dir = TempDir::new().unwrap();
    let store = ContextStore::open(temp_dir.path()).unwrap();
    let mut runner = proptest::test_runner::TestRunner::new(ProptestConfig::with_cases(64));

    runner
        .run(&context_metadata(), |meta| {
            store.create_or_update("prop", &meta).unwrap();
            prop_assert_eq!(store.get("prop").unwrap(), meta);
            Ok(())
        })
        .unwrap();
}

/// Export then import reproduces the record exactly
#[test]
fn test_archive_roundtrip_property() {
    let temp_dir = TempDir::new().unwrap();
    let store = ContextStore::open(temp_dir.path()).unwrap();
    let mut runner = proptest::test_runner::TestRunner::new(ProptestConfig::with_cases(32));

    runner
        .run(&context_metadata(), |meta| {
            store.create_or_update("src", &meta).unwrap();
            let archive = store.export("src", Vec::new()).unwrap();
            store.import("dst", archive.as_slice()).unwrap();
            prop_assert_eq!(store.get("dst").unwrap(), meta);
            Ok(())
        })
        .unwrap();
}

/// Settings survive encode/decode, and merging leaves unrelated keys alone
#[test]
fn test_settings_merge_keeps_foreign_keys() {
    let orchestrator = prop_oneof![
        Just(Orchestrator::Unset),
        Just(Orchestrator::Swarm),
        Just(Orchestrator::Kubernetes),
        Just(Orchestrator::All),
    ];
    let mut runner = proptest::test_runner::TestRunner::default();

    runner
        .run(
            &("[a-z ]{0,16}", orchestrator, metadata()),
            |(description, orchestrator, foreign)| {
                let settings = ContextSettings {
                    description,
                    orchestrator,
                    ..ContextSettings::default()
                };
                prop_assert_eq!(ContextSettings::decode(&settings.encode()).unwrap(), settings.clone());

                let mut merged = foreign.clone();
                settings.merge_into(&mut merged);
                for (key, value) in foreign.iter() {
                    if !["description", "defaultOrchestrator", "defaultStackOrchestrator", "helperHost"]
                        .contains(&key.as_str())
                    {
                        prop_assert_eq!(merged.get(key), Some(value));
                    }
                }
                Ok(())
            },
        )
        .unwrap();
}

/// Generated names made of safe segments always validate
#[test]
fn test_safe_names_validate() {
    let mut runner = proptest::test_runner::TestRunner::default();
    runner
        .run(
            &prop::collection::vec("[a-zA-Z0-9_][a-zA-Z0-9_.-]{0,8}", 1..4),
            |segments| {
                prop_assume!(segments.iter().all(|s| s != "." && s != ".." && s != "meta.json"));
                let name = segments.join("/");
                prop_assert!(validate_context_name(&name).is_ok());
                Ok(())
            },
        )
        .unwrap();
}
