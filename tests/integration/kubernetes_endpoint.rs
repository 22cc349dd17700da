//! Integration tests for the cluster endpoint codec: raw endpoints, kubeconfig
//! references and embedded kubeconfig contexts

use super::test_utils::temp_store;
use contextstore::endpoint::kubernetes::config_for_context;
use contextstore::endpoint::{
    EndpointMeta, KubeconfigReference, KubernetesEndpoint, KubernetesEndpointMeta, RawClusterMeta,
};
use contextstore::kubeconfig;
use contextstore::{ContextMetadata, ResolvedContext, Store, TlsData};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const KUBECONFIG: &str = r#"
apiVersion: v1
kind: Config
clusters:
- name: cluster1
  cluster:
    server: https://server1
    insecure-skip-tls-verify: true
- name: cluster2
  cluster:
    server: https://server2
    certificate-authority-data: Y2E=
users:
- name: user
  user:
    client-certificate-data: Y2VydA==
    client-key-data: a2V5
contexts:
- name: context1
  context:
    cluster: cluster1
    user: user
    namespace: namespace1
- name: context2
  context:
    cluster: cluster2
    user: user
    namespace: namespace2
current-context: context1
"#;

fn write_kubeconfig(dir: &TempDir) -> PathBuf {
    let path = dir.path().join("kubeconfig");
    std::fs::write(&path, KUBECONFIG).unwrap();
    path
}

fn raw(context: &str, skip_verify: bool, tls: Option<TlsData>) -> KubernetesEndpoint {
    KubernetesEndpoint::Raw {
        meta: RawClusterMeta {
            base: EndpointMeta::new(context, Some("https://test".into()), skip_verify),
            default_namespace: Some("test".into()),
        },
        tls,
    }
}

fn reference(
    context: &str,
    path: &Path,
    kube_context: Option<&str>,
    namespace: Option<&str>,
) -> KubernetesEndpoint {
    let meta = KubernetesEndpointMeta::from_kubeconfig(context, path, kube_context, namespace)
        .unwrap();
    match meta {
        KubernetesEndpointMeta::Reference(reference) => KubernetesEndpoint::Reference(reference),
        other => panic!("expected a reference, got {:?}", other),
    }
}

/// Each save/load variant: (context, endpoint, expected host, namespace, ca, insecure)
#[test]
fn test_save_load_contexts() {
    let (dir, store) = temp_store();
    let kubeconfig = write_kubeconfig(&dir);

    let cases: Vec<(&str, KubernetesEndpoint, &str, &str, Option<&[u8]>, bool)> = vec![
        ("raw-notls", raw("raw-notls", false, None), "https://test", "test", None, false),
        ("raw-notls-skip", raw("raw-notls-skip", true, None), "https://test", "test", None, true),
        (
            "raw-tls",
            raw(
                "raw-tls",
                false,
                Some(TlsData {
                    ca: Some(b"ca".to_vec()),
                    cert: Some(b"cert".to_vec()),
                    key: Some(b"key".to_vec()),
                }),
            ),
            "https://test",
            "test",
            Some(b"ca"),
            false,
        ),
        (
            "embed-default-context",
            KubernetesEndpoint::embed_from_kubeconfig("embed-default-context", &kubeconfig, None, None)
                .unwrap(),
            "https://server1",
            "namespace1",
            None,
            true,
        ),
        (
            "embed-context2",
            KubernetesEndpoint::embed_from_kubeconfig(
                "embed-context2",
                &kubeconfig,
                Some("context2"),
                None,
            )
            .unwrap(),
            "https://server2",
            "namespace2",
            Some(b"ca"),
            false,
        ),
        (
            "external-default-context",
            reference("external-default-context", &kubeconfig, None, None),
            "https://server1",
            "namespace1",
            None,
            true,
        ),
        (
            "external-context2",
            reference("external-context2", &kubeconfig, Some("context2"), Some("namespace-override")),
            "https://server2",
            "namespace-override",
            Some(b"ca"),
            false,
        ),
    ];

    for (name, endpoint, ..) in &cases {
        endpoint.save(&store).unwrap_or_else(|e| panic!("save {}: {}", name, e));
    }

    for (name, endpoint, host, namespace, ca, insecure) in cases {
        let loaded = KubernetesEndpoint::load(&store, name).unwrap().unwrap();
        assert_eq!(loaded, endpoint, "{}", name);

        let client = loaded.client_config().unwrap();
        let rest = client.rest_config().unwrap();
        assert_eq!(rest.host, host, "{}", name);
        assert_eq!(client.namespace().unwrap(), namespace, "{}", name);
        assert_eq!(rest.ca_data.as_deref(), ca, "{}", name);
        assert_eq!(rest.insecure, insecure, "{}", name);
    }
}

/// Embedded endpoints carry the client identity and no longer need the file
#[test]
fn test_embed_is_independent_of_file() {
    let (dir, store) = temp_store();
    let kubeconfig = write_kubeconfig(&dir);
    KubernetesEndpoint::embed_from_kubeconfig("embedded", &kubeconfig, Some("context2"), Some("ns"))
        .unwrap()
        .save(&store)
        .unwrap();
    std::fs::remove_file(&kubeconfig).unwrap();

    let loaded = KubernetesEndpoint::load(&store, "embedded").unwrap().unwrap();
    let client = loaded.client_config().unwrap();
    let rest = client.rest_config().unwrap();
    assert_eq!(rest.host, "https://server2");
    assert_eq!(rest.cert_data.as_deref(), Some(&b"cert"[..]));
    assert_eq!(rest.key_data.as_deref(), Some(&b"key"[..]));
    assert_eq!(client.namespace().unwrap(), "ns");
}

/// A reference to a context the file lacks is refused up front
#[test]
fn test_reference_to_unknown_context() {
    let dir = TempDir::new().unwrap();
    let kubeconfig = write_kubeconfig(&dir);
    let err = KubernetesEndpointMeta::from_kubeconfig("ctx", &kubeconfig, Some("missing"), None)
        .unwrap_err();
    assert_eq!(err.kind(), contextstore::ErrorKind::NotFound);
}

/// References are stored as a pointer, not as copied material
#[test]
fn test_reference_stores_pointer_only() {
    let (dir, store) = temp_store();
    let kubeconfig = write_kubeconfig(&dir);
    reference("ext", &kubeconfig, Some("context2"), None)
        .save(&store)
        .unwrap();

    let stored = store.get("ext").unwrap();
    let ep = &stored.endpoints["kubernetes"];
    assert_eq!(ep.get_str("kubeconfigFile"), kubeconfig.to_str());
    assert_eq!(ep.get_str("kubeconfigContext"), Some("context2"));
    assert!(!ep.contains_key("host"));
    assert!(store.list_tls_files("ext").unwrap().is_empty());
}

/// Flattened output is a standalone kubeconfig with one context
#[test]
fn test_flatten_reference() {
    let (dir, _store) = temp_store();
    let kubeconfig = write_kubeconfig(&dir);
    let client = reference("ext", &kubeconfig, Some("context2"), Some("override"))
        .client_config()
        .unwrap();

    let mut out = Vec::new();
    client.write_to(&mut out).unwrap();
    let flat = kubeconfig::parse(std::str::from_utf8(&out).unwrap()).unwrap();
    assert_eq!(flat.contexts.len(), 1);
    assert_eq!(flat.clusters.len(), 1);
    let rest = kubeconfig::rest_config(&flat, None, None).unwrap();
    assert_eq!(rest.host, "https://server2");
    assert_eq!(rest.cert_data.as_deref(), Some(&b"cert"[..]));
    assert_eq!(
        kubeconfig::namespace(&flat, None).unwrap().as_deref(),
        Some("override")
    );
}

/// Resolution falls back to the default kubeconfig for a context without a
/// cluster endpoint and for the implicit DOCKER_HOST context
#[test]
fn test_config_for_context_fallbacks() {
    let (dir, store) = temp_store();
    let kubeconfig = write_kubeconfig(&dir);
    let env_path = kubeconfig.to_string_lossy().into_owned();
    let env = |k: &str| (k == "KUBECONFIG").then(|| env_path.clone());

    store.create_or_update("bare", &ContextMetadata::new()).unwrap();
    let named = ResolvedContext::Named("bare".into());
    let client = config_for_context(&store, &named, None, env).unwrap();
    assert_eq!(client.rest_config().unwrap().host, "https://server1");

    let client = config_for_context(&store, &ResolvedContext::DockerHost, None, env).unwrap();
    assert_eq!(client.namespace().unwrap(), "namespace1");

    raw("with-cluster", false, None).save(&store).unwrap();
    let named = ResolvedContext::Named("with-cluster".into());
    let client = config_for_context(&store, &named, None, env).unwrap();
    assert_eq!(client.rest_config().unwrap().host, "https://test");

    // an explicit path beats the stored endpoint
    let client = config_for_context(&store, &named, Some(&kubeconfig), |_| None).unwrap();
    assert_eq!(client.rest_config().unwrap().host, "https://server1");
}

/// A stored reference whose context was later removed from the file fails when the
/// client configuration is built
#[test]
fn test_reference_outlived_by_file_context() {
    let (dir, store) = temp_store();
    let kubeconfig = write_kubeconfig(&dir);
    reference("ext", &kubeconfig, Some("context2"), None)
        .save(&store)
        .unwrap();
    std::fs::write(&kubeconfig, KUBECONFIG.replace("name: context2", "name: renamed")).unwrap();

    let loaded = KubernetesEndpoint::load(&store, "ext").unwrap().unwrap();
    let err = loaded.client_config().unwrap_err();
    assert_eq!(err.kind(), contextstore::ErrorKind::NotFound);
}

/// A hand-built reference round-trips through the store without reading the file
#[test]
fn test_manual_reference_roundtrip() {
    let (_dir, store) = temp_store();
    let ep = KubernetesEndpoint::Reference(KubeconfigReference {
        context_name: "manual".into(),
        path: PathBuf::from("/etc/kube/config"),
        context: None,
        namespace_override: None,
    });
    ep.save(&store).unwrap();
    assert_eq!(KubernetesEndpoint::load(&store, "manual").unwrap(), Some(ep));
}
