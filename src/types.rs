//! Core data types shared by the stores and the endpoint codecs.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Endpoint kind key of the container engine endpoint
pub const DOCKER_ENDPOINT: &str = "docker";
/// Endpoint kind key of the orchestration cluster endpoint
pub const KUBERNETES_ENDPOINT: &str = "kubernetes";

/// Flat string-keyed bag of JSON values.
///
/// Used both for endpoint maps and for free-form context metadata. Values keep their
/// JSON type across a write/read cycle and unknown keys are never dropped.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Metadata(BTreeMap<String, Value>);

impl Metadata {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// String value for `key`; `None` when absent or not a string.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    /// Boolean value for `key`; `None` when absent or not a boolean.
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.0.get(key).and_then(Value::as_bool)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(key.into(), value.into())
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Metadata {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// Persisted record of one context: endpoint maps keyed by endpoint kind plus
/// free-form context-level metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContextMetadata {
    #[serde(default)]
    pub endpoints: BTreeMap<String, Metadata>,
    #[serde(default)]
    pub metadata: Metadata,
}

impl ContextMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn endpoint(&self, kind: &EndpointKind) -> Option<&Metadata> {
        self.endpoints.get(kind.as_str())
    }

    pub fn set_endpoint(&mut self, kind: &EndpointKind, meta: Metadata) {
        self.endpoints.insert(kind.as_str().to_string(), meta);
    }

    /// Endpoint kinds present in this record, known kinds first-class and anything
    /// else passed through as `Other`.
    pub fn endpoint_kinds(&self) -> Vec<EndpointKind> {
        self.endpoints
            .keys()
            .map(|k| EndpointKind::from(k.as_str()))
            .collect()
    }
}

/// Known endpoint kinds, with a pass-through for kinds this crate does not understand.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EndpointKind {
    Docker,
    Kubernetes,
    Other(String),
}

impl EndpointKind {
    pub fn as_str(&self) -> &str {
        match self {
            EndpointKind::Docker => DOCKER_ENDPOINT,
            EndpointKind::Kubernetes => KUBERNETES_ENDPOINT,
            EndpointKind::Other(name) => name,
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, EndpointKind::Other(_))
    }
}

impl From<&str> for EndpointKind {
    fn from(value: &str) -> Self {
        match value {
            DOCKER_ENDPOINT => EndpointKind::Docker,
            KUBERNETES_ENDPOINT => EndpointKind::Kubernetes,
            other => EndpointKind::Other(other.to_string()),
        }
    }
}

impl fmt::Display for EndpointKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// TLS blobs of one endpoint, keyed by file name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EndpointTlsData {
    pub files: BTreeMap<String, Vec<u8>>,
}

impl EndpointTlsData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, name: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        self.files.insert(name.into(), data.into());
        self
    }
}

/// TLS blobs of a whole context, keyed by endpoint name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContextTlsData {
    pub endpoints: BTreeMap<String, EndpointTlsData>,
}

/// File names stored for one endpoint, sorted
pub type EndpointFiles = Vec<String>;
