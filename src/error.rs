//! Error types for the context store and the endpoint codecs layered on top of it.

use std::path::PathBuf;
use thiserror::Error;

/// Coarse classification shared by every error in the crate.
///
/// Callers branch on this instead of matching individual variants, e.g. to decide
/// create-vs-update on `NotFound` or to prompt for a passphrase and retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    AlreadyExists,
    InvalidValue,
    EncryptedKeyNeedsPassphrase,
    Io,
    Other,
}

/// Storage-related errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("context {0:?} does not exist")]
    ContextNotFound(String),

    #[error("TLS file {file:?} not found for endpoint {endpoint:?} of context {context:?}")]
    TlsFileNotFound {
        context: String,
        endpoint: String,
        file: String,
    },

    #[error("context {0:?} already exists")]
    AlreadyExists(String),

    #[error("invalid name {name:?}: {reason}")]
    InvalidName { name: String, reason: String },

    #[error("invalid context archive: {0}")]
    InvalidArchive(String),

    #[error("failed to (de)serialize {what}: {source}")]
    Serialization {
        what: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Storage I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl StoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StoreError::ContextNotFound(_) | StoreError::TlsFileNotFound { .. } => {
                ErrorKind::NotFound
            }
            StoreError::AlreadyExists(_) => ErrorKind::AlreadyExists,
            StoreError::InvalidName { .. } | StoreError::InvalidArchive(_) => {
                ErrorKind::InvalidValue
            }
            StoreError::Serialization { .. } => ErrorKind::Other,
            StoreError::IoError(_) => ErrorKind::Io,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }

    pub(crate) fn invalid_name(name: &str, reason: impl Into<String>) -> Self {
        StoreError::InvalidName {
            name: name.to_string(),
            reason: reason.into(),
        }
    }
}

/// Errors raised while turning stored TLS material into a client configuration
#[derive(Debug, Error)]
pub enum TlsError {
    #[error("private key is encrypted, a passphrase is required to decrypt it")]
    EncryptedKeyNeedsPassphrase,

    #[error("failed to retrieve context tls info: ca.pem seems invalid: {0}")]
    InvalidCa(String),

    #[error("no valid private key found: {0}")]
    InvalidKey(String),

    #[error("no valid client certificate found: {0}")]
    InvalidCertificate(String),

    #[error("private key is encrypted, but could not decrypt it: {0}")]
    Decrypt(String),

    #[error("private key uses legacy PEM encryption, convert it to encrypted PKCS#8")]
    UnsupportedKeyEncryption,

    #[error("failed to retrieve context tls info: {0}")]
    Rustls(#[from] rustls::Error),
}

impl TlsError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TlsError::EncryptedKeyNeedsPassphrase => ErrorKind::EncryptedKeyNeedsPassphrase,
            TlsError::InvalidCa(_)
            | TlsError::InvalidKey(_)
            | TlsError::InvalidCertificate(_)
            | TlsError::UnsupportedKeyEncryption => ErrorKind::InvalidValue,
            TlsError::Decrypt(_) | TlsError::Rustls(_) => ErrorKind::Other,
        }
    }
}

/// Errors reading or resolving an external kubeconfig file
#[derive(Debug, Error)]
pub enum KubeconfigError {
    #[error("failed to read kubeconfig {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to load kubeconfig {path:?}: {source}")]
    Load {
        path: PathBuf,
        #[source]
        source: kube::config::KubeconfigError,
    },

    #[error("invalid kubeconfig: {0}")]
    Invalid(#[from] kube::config::KubeconfigError),

    #[error("kubeconfig has no current context and none was requested")]
    NoCurrentContext,

    #[error("context {context:?} does not exist in kubeconfig")]
    ContextNotFound { context: String },

    #[error("cluster {cluster:?} referenced by context {context:?} does not exist in kubeconfig")]
    ClusterNotFound { context: String, cluster: String },

    #[error("user {user:?} referenced by context {context:?} does not exist in kubeconfig")]
    UserNotFound { context: String, user: String },

    #[error("invalid {field} in kubeconfig: {reason}")]
    InvalidData { field: String, reason: String },

    #[error("failed to build kubeconfig: {0}")]
    Synthesize(#[source] serde_json::Error),

    #[error("failed to write kubeconfig YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl KubeconfigError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            KubeconfigError::Read { source, .. }
                if source.kind() == std::io::ErrorKind::NotFound =>
            {
                ErrorKind::NotFound
            }
            KubeconfigError::Read { .. } => ErrorKind::Io,
            KubeconfigError::ContextNotFound { .. }
            | KubeconfigError::ClusterNotFound { .. }
            | KubeconfigError::UserNotFound { .. } => ErrorKind::NotFound,
            KubeconfigError::Load { .. }
            | KubeconfigError::Invalid(_)
            | KubeconfigError::NoCurrentContext
            | KubeconfigError::InvalidData { .. }
            | KubeconfigError::Synthesize(_)
            | KubeconfigError::Yaml(_) => ErrorKind::InvalidValue,
        }
    }
}

/// Errors decoding the free-form context metadata
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MetadataError {
    #[error("specified orchestrator {0:?} is invalid, please use either kubernetes, swarm or all")]
    InvalidOrchestrator(String),
}

impl MetadataError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::InvalidValue
    }
}

/// Errors from the typed endpoint codecs
#[derive(Debug, Error)]
pub enum EndpointError {
    #[error("cannot find {kind} endpoint in context {context:?}")]
    NotFound { context: String, kind: String },

    #[error("invalid value {value:?} for endpoint field {field}")]
    InvalidValue { field: String, value: String },

    #[error("failed to read TLS material from {path:?}: {source}")]
    TlsFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Tls(#[from] TlsError),

    #[error(transparent)]
    Kubeconfig(#[from] KubeconfigError),

    #[error(transparent)]
    Metadata(#[from] MetadataError),
}

impl EndpointError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EndpointError::NotFound { .. } => ErrorKind::NotFound,
            EndpointError::InvalidValue { .. } => ErrorKind::InvalidValue,
            EndpointError::TlsFile { .. } => ErrorKind::Io,
            EndpointError::Store(e) => e.kind(),
            EndpointError::Tls(e) => e.kind(),
            EndpointError::Kubeconfig(e) => e.kind(),
            EndpointError::Metadata(e) => e.kind(),
        }
    }
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error("could not determine the home directory")]
    NoHomeDirectory,
}
