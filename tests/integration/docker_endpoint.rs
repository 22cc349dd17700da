//! Integration tests for the engine endpoint codec

use super::test_utils::temp_store;
use contextstore::endpoint::docker::ENV_API_VERSION;
use contextstore::endpoint::{DockerEndpoint, DockerEndpointMeta, EndpointMeta};
use contextstore::{ContextMetadata, ContextSettings, ErrorKind, Orchestrator, Store, TlsData};
use tempfile::TempDir;

struct Identity {
    cert_pem: String,
    key_pem: String,
}

fn self_signed() -> Identity {
    let cert = rcgen::generate_simple_self_signed(vec!["localhost".to_string()]).unwrap();
    Identity {
        cert_pem: cert.serialize_pem().unwrap(),
        key_pem: cert.serialize_private_key_pem(),
    }
}

fn endpoint(context: &str, host: &str, tls: Option<TlsData>) -> DockerEndpoint {
    DockerEndpoint {
        meta: DockerEndpointMeta {
            base: EndpointMeta::new(context, Some(host.to_string()), false),
            api_version: None,
        },
        tls,
        tls_password: None,
    }
}

/// TLS files read from disk survive a save/load cycle and produce a client identity
#[test]
fn test_tls_from_files_roundtrip() {
    let (dir, store) = temp_store();
    let identity = self_signed();
    let ca_path = dir.path().join("ca.pem");
    let cert_path = dir.path().join("cert.pem");
    let key_path = dir.path().join("key.pem");
    std::fs::write(&ca_path, &identity.cert_pem).unwrap();
    std::fs::write(&cert_path, &identity.cert_pem).unwrap();
    std::fs::write(&key_path, &identity.key_pem).unwrap();

    let tls = TlsData::from_files(Some(&ca_path), Some(&cert_path), Some(&key_path)).unwrap();
    endpoint("remote", "tcp://remote:2376", tls).save(&store).unwrap();

    let loaded = DockerEndpoint::load(&store, "remote").unwrap();
    let tls = loaded.tls.as_ref().unwrap();
    assert_eq!(tls.ca.as_deref(), Some(identity.cert_pem.as_bytes()));
    assert_eq!(tls.key.as_deref(), Some(identity.key_pem.as_bytes()));

    let client = loaded.tls_config().unwrap().unwrap();
    assert!(client.has_client_identity);
    assert!(!client.insecure_skip_verify);
    assert_eq!(client.custom_roots, 1);
}

/// Missing TLS source files fail with an I/O error naming the path
#[test]
fn test_tls_from_missing_file() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("absent.pem");
    let err = TlsData::from_files(Some(&missing), None, None).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Io);
}

/// Plain endpoint: no TLS, no client TLS configuration
#[test]
fn test_plaintext_endpoint() {
    let (_dir, store) = temp_store();
    endpoint("local", "unix:///var/run/docker.sock", None)
        .save(&store)
        .unwrap();
    let loaded = DockerEndpoint::load(&store, "local").unwrap();
    assert_eq!(loaded.tls, None);
    let config = loaded.client_config(|_| None).unwrap();
    assert_eq!(config.host.as_deref(), Some("unix:///var/run/docker.sock"));
    assert!(config.tls.is_none());
}

/// Skip-verify without material still yields a TLS configuration
#[test]
fn test_skip_verify_without_material() {
    let mut ep = endpoint("insecure", "tcp://h:2376", None);
    ep.meta.base.skip_tls_verify = true;
    let client = ep.tls_config().unwrap().unwrap();
    assert!(client.insecure_skip_verify);
    assert!(!client.has_client_identity);
}

/// Saving one endpoint keeps the rest of the record intact
#[test]
fn test_save_preserves_metadata_and_other_endpoints() {
    let (_dir, store) = temp_store();
    let mut ctx = ContextMetadata::new();
    ctx.metadata = ContextSettings {
        description: "shared".into(),
        orchestrator: Orchestrator::Swarm,
        ..ContextSettings::default()
    }
    .encode();
    ctx.endpoints.insert(
        "kubernetes".into(),
        [("host", "https://k8s")].into_iter().collect(),
    );
    store.create_or_update("ctx", &ctx).unwrap();

    endpoint("ctx", "tcp://engine:2375", None).save(&store).unwrap();

    let stored = store.get("ctx").unwrap();
    assert_eq!(stored.metadata, ctx.metadata);
    assert_eq!(stored.endpoints["kubernetes"], ctx.endpoints["kubernetes"]);
    assert_eq!(
        stored.endpoints["docker"].get_str("host"),
        Some("tcp://engine:2375")
    );
}

/// Re-saving without TLS drops the previously stored blobs
#[test]
fn test_resave_without_tls_clears_blobs() {
    let (_dir, store) = temp_store();
    let identity = self_signed();
    let tls = TlsData {
        ca: Some(identity.cert_pem.into_bytes()),
        ..TlsData::default()
    };
    endpoint("ctx", "tcp://h:2376", Some(tls)).save(&store).unwrap();
    assert!(!store.list_tls_files("ctx").unwrap().is_empty());

    endpoint("ctx", "tcp://h:2376", None).save(&store).unwrap();
    assert!(store.list_tls_files("ctx").unwrap().is_empty());
    assert_eq!(DockerEndpoint::load(&store, "ctx").unwrap().tls, None);
}

/// Loading from a context without an engine endpoint is NotFound
#[test]
fn test_load_without_engine_endpoint() {
    let (_dir, store) = temp_store();
    store.create_or_update("bare", &ContextMetadata::new()).unwrap();
    let err = DockerEndpoint::load(&store, "bare").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

/// The API version environment variable wins over the stored one
#[test]
fn test_api_version_override() {
    let mut ep = endpoint("ctx", "tcp://h:2375", None);
    ep.meta.api_version = Some("1.40".into());

    let stored = ep.client_config(|_| None).unwrap();
    assert_eq!(stored.api_version.as_deref(), Some("1.40"));

    let overridden = ep
        .client_config(|k| (k == ENV_API_VERSION).then(|| "1.43".to_string()))
        .unwrap();
    assert_eq!(overridden.api_version.as_deref(), Some("1.43"));

    let empty = ep
        .client_config(|k| (k == ENV_API_VERSION).then(String::new))
        .unwrap();
    assert_eq!(empty.api_version.as_deref(), Some("1.40"));
}
