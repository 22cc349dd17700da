//! Typed endpoint codecs
//!
//! Endpoints are stored as flat key/value maps inside a context record. The codecs in
//! this module parse those maps into typed descriptions, attach TLS material from the
//! blob store, and write them back.

pub mod docker;
pub mod kubernetes;
pub mod tls;

use std::fs;
use std::path::Path;

use serde_json::Value;
use tracing::debug;

use crate::error::EndpointError;
use crate::store::Store;
use crate::types::{EndpointTlsData, Metadata};

pub use docker::{DockerEndpoint, DockerEndpointMeta, EngineClientConfig};
pub use kubernetes::{
    KubeconfigReference, KubernetesClientConfig, KubernetesEndpoint, KubernetesEndpointMeta,
    RawClusterMeta,
};
pub use tls::ClientTls;

pub const KEY_HOST: &str = "host";
pub const KEY_SKIP_TLS_VERIFY: &str = "skipTLSVerify";

pub const CA_FILE: &str = "ca.pem";
pub const CERT_FILE: &str = "cert.pem";
pub const KEY_FILE: &str = "key.pem";

/// Fields common to every endpoint kind
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EndpointMeta {
    pub context_name: String,
    pub host: Option<String>,
    pub skip_tls_verify: bool,
}

impl EndpointMeta {
    pub fn new(context_name: impl Into<String>, host: Option<String>, skip_tls_verify: bool) -> Self {
        Self {
            context_name: context_name.into(),
            host,
            skip_tls_verify,
        }
    }

    pub(crate) fn from_endpoint_map(context_name: &str, ep: &Metadata) -> Result<Self, EndpointError> {
        Ok(Self {
            context_name: context_name.to_string(),
            host: read_string(ep, KEY_HOST)?.filter(|h| !h.is_empty()),
            skip_tls_verify: read_bool(ep, KEY_SKIP_TLS_VERIFY)?.unwrap_or(false),
        })
    }

    pub(crate) fn write_to(&self, ep: &mut Metadata) {
        if let Some(host) = &self.host {
            ep.insert(KEY_HOST, host.as_str());
        }
        ep.insert(KEY_SKIP_TLS_VERIFY, self.skip_tls_verify);
    }
}

/// String field of an endpoint map. Absent and `null` read as `None`; any other
/// non-string value is rejected.
pub(crate) fn read_string(ep: &Metadata, field: &str) -> Result<Option<String>, EndpointError> {
    match ep.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(other) => Err(EndpointError::InvalidValue {
            field: field.to_string(),
            value: other.to_string(),
        }),
    }
}

pub(crate) fn read_bool(ep: &Metadata, field: &str) -> Result<Option<bool>, EndpointError> {
    match ep.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Bool(b)) => Ok(Some(*b)),
        Some(other) => Err(EndpointError::InvalidValue {
            field: field.to_string(),
            value: other.to_string(),
        }),
    }
}

/// PEM material attached to an endpoint
#[derive(Clone, Default, PartialEq, Eq)]
pub struct TlsData {
    pub ca: Option<Vec<u8>>,
    pub cert: Option<Vec<u8>>,
    pub key: Option<Vec<u8>>,
}

impl std::fmt::Debug for TlsData {
    // key material stays out of logs
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TlsData")
            .field("ca", &self.ca.as_ref().map(Vec::len))
            .field("cert", &self.cert.as_ref().map(Vec::len))
            .field("key", &self.key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl TlsData {
    pub fn is_empty(&self) -> bool {
        self.ca.is_none() && self.cert.is_none() && self.key.is_none()
    }

    pub fn has_client_identity(&self) -> bool {
        self.cert.is_some() && self.key.is_some()
    }

    /// Read PEM files from local paths. `None` when no path was given.
    pub fn from_files(
        ca: Option<&Path>,
        cert: Option<&Path>,
        key: Option<&Path>,
    ) -> Result<Option<Self>, EndpointError> {
        let data = Self {
            ca: read_optional(ca)?,
            cert: read_optional(cert)?,
            key: read_optional(key)?,
        };
        Ok((!data.is_empty()).then_some(data))
    }

    /// Load the canonical files of one endpoint. Missing files are omitted; `None` when
    /// the endpoint has none of them.
    pub fn load(store: &dyn Store, context: &str, endpoint: &str) -> Result<Option<Self>, EndpointError> {
        let data = Self {
            ca: load_optional(store, context, endpoint, CA_FILE)?,
            cert: load_optional(store, context, endpoint, CERT_FILE)?,
            key: load_optional(store, context, endpoint, KEY_FILE)?,
        };
        if data.is_empty() {
            return Ok(None);
        }
        debug!(
            context = %context,
            endpoint = %endpoint,
            ca = data.ca.is_some(),
            cert = data.cert.is_some(),
            key = data.key.is_some(),
            "loaded endpoint TLS material"
        );
        Ok(Some(data))
    }

    /// Blob-store form, with absent entries left out. `None` when everything is absent.
    pub fn to_store_data(&self) -> Option<EndpointTlsData> {
        let mut data = EndpointTlsData::new();
        for (name, bytes) in [(CA_FILE, &self.ca), (CERT_FILE, &self.cert), (KEY_FILE, &self.key)] {
            if let Some(bytes) = bytes {
                data.files.insert(name.to_string(), bytes.clone());
            }
        }
        (!data.files.is_empty()).then_some(data)
    }
}

fn read_optional(path: Option<&Path>) -> Result<Option<Vec<u8>>, EndpointError> {
    let Some(path) = path else {
        return Ok(None);
    };
    fs::read(path)
        .map(Some)
        .map_err(|source| EndpointError::TlsFile {
            path: path.to_path_buf(),
            source,
        })
}

fn load_optional(
    store: &dyn Store,
    context: &str,
    endpoint: &str,
    file: &str,
) -> Result<Option<Vec<u8>>, EndpointError> {
    match store.tls_file(context, endpoint, file) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(e.into()),
    }
}
