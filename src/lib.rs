//! Contextstore: Named Connection Contexts
//!
//! A file-backed store of named contexts. Each context bundles the connection
//! settings of a container engine endpoint and an orchestration cluster endpoint,
//! their TLS material and free-form metadata. Contexts can be exported to and
//! imported from a single tar stream.

pub mod config;
pub mod context_meta;
pub mod endpoint;
pub mod error;
pub mod kubeconfig;
pub mod logging;
pub mod orchestrator;
pub mod resolve;
pub mod store;
pub mod summary;
pub mod types;

pub use context_meta::ContextSettings;
pub use endpoint::{DockerEndpoint, KubernetesEndpoint, TlsData};
pub use error::{ConfigError, EndpointError, ErrorKind, StoreError};
pub use orchestrator::Orchestrator;
pub use resolve::{resolve_context, ResolveOptions, ResolvedContext};
pub use store::{ContextStore, Store};
pub use types::{ContextMetadata, ContextTlsData, EndpointTlsData, Metadata};
