//! Orchestration cluster endpoint codec (`kubernetes` endpoint kind).
//!
//! An endpoint is either a raw cluster description (server, namespace, TLS blobs in
//! the store) or a reference to a context inside an external kubeconfig file. The
//! two are separate variants; a reference never carries stored TLS material.

use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{EndpointError, KubeconfigError, StoreError};
use crate::kubeconfig::{self, Kubeconfig, RestConfig, DEFAULT_NAMESPACE};
use crate::resolve::ResolvedContext;
use crate::store::Store;
use crate::types::{ContextMetadata, Metadata, KUBERNETES_ENDPOINT};

use super::{read_string, EndpointMeta, TlsData};

pub const KEY_DEFAULT_NAMESPACE: &str = "defaultNamespace";
pub const KEY_KUBECONFIG_FILE: &str = "kubeconfigFile";
pub const KEY_KUBECONFIG_CONTEXT: &str = "kubeconfigContext";

/// Raw cluster description
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawClusterMeta {
    pub base: EndpointMeta,
    pub default_namespace: Option<String>,
}

/// Pointer to a context of an external kubeconfig file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KubeconfigReference {
    pub context_name: String,
    pub path: PathBuf,
    /// Context inside the file; the file's current context when `None`.
    pub context: Option<String>,
    pub namespace_override: Option<String>,
}

impl KubeconfigReference {
    fn base_dir(&self) -> Option<&Path> {
        self.path.parent().filter(|p| !p.as_os_str().is_empty())
    }
}

/// Cluster endpoint as stored, without TLS material
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KubernetesEndpointMeta {
    Raw(RawClusterMeta),
    Reference(KubeconfigReference),
}

impl KubernetesEndpointMeta {
    /// Parse the `kubernetes` endpoint of a context record; `None` when the context
    /// has no cluster endpoint.
    pub fn parse(context_name: &str, meta: &ContextMetadata) -> Result<Option<Self>, EndpointError> {
        let Some(ep) = meta.endpoints.get(KUBERNETES_ENDPOINT) else {
            return Ok(None);
        };
        let namespace = read_string(ep, KEY_DEFAULT_NAMESPACE)?.filter(|n| !n.is_empty());
        let file = read_string(ep, KEY_KUBECONFIG_FILE)?.filter(|f| !f.is_empty());
        let parsed = match file {
            Some(file) => Self::Reference(KubeconfigReference {
                context_name: context_name.to_string(),
                path: PathBuf::from(file),
                context: read_string(ep, KEY_KUBECONFIG_CONTEXT)?.filter(|c| !c.is_empty()),
                namespace_override: namespace,
            }),
            None => Self::Raw(RawClusterMeta {
                base: EndpointMeta::from_endpoint_map(context_name, ep)?,
                default_namespace: namespace,
            }),
        };
        Ok(Some(parsed))
    }

    /// Reference to `kube_context` (or the current context) of the kubeconfig at
    /// `path`. The file is read once to check the reference resolves.
    pub fn from_kubeconfig(
        context_name: &str,
        path: &Path,
        kube_context: Option<&str>,
        namespace_override: Option<&str>,
    ) -> Result<Self, EndpointError> {
        let reference = KubeconfigReference {
            context_name: context_name.to_string(),
            path: path.to_path_buf(),
            context: kube_context.filter(|c| !c.is_empty()).map(str::to_string),
            namespace_override: namespace_override.filter(|n| !n.is_empty()).map(str::to_string),
        };
        let config = kubeconfig::read(&reference.path)?;
        kubeconfig::rest_config(&config, reference.context.as_deref(), reference.base_dir())?;
        Ok(Self::Reference(reference))
    }

    pub fn context_name(&self) -> &str {
        match self {
            Self::Raw(raw) => &raw.base.context_name,
            Self::Reference(reference) => &reference.context_name,
        }
    }

    pub fn to_metadata(&self) -> Metadata {
        let mut ep = Metadata::new();
        match self {
            Self::Raw(raw) => {
                raw.base.write_to(&mut ep);
                if let Some(ns) = &raw.default_namespace {
                    ep.insert(KEY_DEFAULT_NAMESPACE, ns.as_str());
                }
            }
            Self::Reference(reference) => {
                ep.insert(KEY_KUBECONFIG_FILE, reference.path.to_string_lossy().into_owned());
                if let Some(context) = &reference.context {
                    ep.insert(KEY_KUBECONFIG_CONTEXT, context.as_str());
                }
                if let Some(ns) = &reference.namespace_override {
                    ep.insert(KEY_DEFAULT_NAMESPACE, ns.as_str());
                }
            }
        }
        ep
    }

    /// Attach stored TLS material. Only raw endpoints have any.
    pub fn with_tls_data(self, store: &dyn Store) -> Result<KubernetesEndpoint, EndpointError> {
        match self {
            Self::Raw(meta) => {
                let tls = TlsData::load(store, &meta.base.context_name, KUBERNETES_ENDPOINT)?;
                Ok(KubernetesEndpoint::Raw { meta, tls })
            }
            Self::Reference(reference) => Ok(KubernetesEndpoint::Reference(reference)),
        }
    }
}

/// Cluster endpoint with its TLS material
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KubernetesEndpoint {
    Raw {
        meta: RawClusterMeta,
        tls: Option<TlsData>,
    },
    Reference(KubeconfigReference),
}

impl KubernetesEndpoint {
    /// Raw endpoint built by copying host, namespace and TLS material out of a
    /// kubeconfig context. The result no longer depends on the file.
    pub fn embed_from_kubeconfig(
        context_name: &str,
        path: &Path,
        kube_context: Option<&str>,
        namespace_override: Option<&str>,
    ) -> Result<Self, EndpointError> {
        let config = kubeconfig::read(path)?;
        let base_dir = path.parent().filter(|p| !p.as_os_str().is_empty());
        let kube_context = kube_context.filter(|c| !c.is_empty());
        let rest = kubeconfig::rest_config(&config, kube_context, base_dir)?;
        let namespace = match namespace_override.filter(|n| !n.is_empty()) {
            Some(ns) => Some(ns.to_string()),
            None => kubeconfig::namespace(&config, kube_context)?,
        };
        let tls = TlsData {
            ca: rest.ca_data,
            cert: rest.cert_data,
            key: rest.key_data,
        };
        debug!(
            context = %context_name,
            kubeconfig = %path.display(),
            "embedding kubeconfig context"
        );
        Ok(Self::Raw {
            meta: RawClusterMeta {
                base: EndpointMeta::new(context_name, Some(rest.host).filter(|h| !h.is_empty()), rest.insecure),
                default_namespace: namespace,
            },
            tls: (!tls.is_empty()).then_some(tls),
        })
    }

    /// Load the cluster endpoint of a context; `None` when it has none.
    pub fn load(store: &dyn Store, context_name: &str) -> Result<Option<Self>, EndpointError> {
        let meta = store.get(context_name)?;
        KubernetesEndpointMeta::parse(context_name, &meta)?
            .map(|ep| ep.with_tls_data(store))
            .transpose()
    }

    pub fn context_name(&self) -> &str {
        match self {
            Self::Raw { meta, .. } => &meta.base.context_name,
            Self::Reference(reference) => &reference.context_name,
        }
    }

    pub fn meta(&self) -> KubernetesEndpointMeta {
        match self {
            Self::Raw { meta, .. } => KubernetesEndpointMeta::Raw(meta.clone()),
            Self::Reference(reference) => KubernetesEndpointMeta::Reference(reference.clone()),
        }
    }

    /// Store the endpoint with the same read-modify-write as the engine codec.
    /// Saving a reference clears any TLS blobs left from an earlier raw endpoint.
    pub fn save(&self, store: &dyn Store) -> Result<(), EndpointError> {
        let name = self.context_name();
        let mut ctx = match store.get(name) {
            Ok(ctx) => ctx,
            Err(StoreError::ContextNotFound(_)) => ContextMetadata::new(),
            Err(e) => return Err(e.into()),
        };
        ctx.endpoints
            .insert(KUBERNETES_ENDPOINT.to_string(), self.meta().to_metadata());
        store.create_or_update(name, &ctx)?;
        let tls = match self {
            Self::Raw { tls, .. } => tls.as_ref().and_then(TlsData::to_store_data),
            Self::Reference(_) => None,
        };
        store.reset_endpoint_tls(name, KUBERNETES_ENDPOINT, tls.as_ref())?;
        debug!(context = %name, with_tls = tls.is_some(), "saved cluster endpoint");
        Ok(())
    }

    /// Client configuration: synthesized for a raw endpoint, loaded from the file
    /// for a reference.
    pub fn client_config(&self) -> Result<KubernetesClientConfig, EndpointError> {
        match self {
            Self::Raw { meta, tls } => {
                let tls = tls.clone().unwrap_or_default();
                let rest = RestConfig {
                    host: meta.base.host.clone().unwrap_or_default(),
                    ca_data: tls.ca,
                    cert_data: tls.cert,
                    key_data: tls.key,
                    bearer_token: None,
                    insecure: meta.base.skip_tls_verify,
                };
                let config = kubeconfig::synthesize(&rest, meta.default_namespace.as_deref())?;
                Ok(KubernetesClientConfig {
                    config,
                    context: None,
                    namespace_override: None,
                    base_dir: None,
                })
            }
            Self::Reference(reference) => Ok(KubernetesClientConfig::from_file(
                &reference.path,
                reference.context.as_deref(),
                reference.namespace_override.as_deref(),
            )?),
        }
    }
}

/// Client configuration for a cluster: a kubeconfig plus the selected context and
/// namespace override.
#[derive(Debug, Clone)]
pub struct KubernetesClientConfig {
    config: Kubeconfig,
    context: Option<String>,
    namespace_override: Option<String>,
    base_dir: Option<PathBuf>,
}

impl KubernetesClientConfig {
    /// Load the kubeconfig at `path`. The selected context (`context`, else the
    /// file's current context) must exist in the file.
    pub fn from_file(
        path: &Path,
        context: Option<&str>,
        namespace_override: Option<&str>,
    ) -> Result<Self, KubeconfigError> {
        let config = kubeconfig::read(path)?;
        let context = context.filter(|c| !c.is_empty());
        let selected = kubeconfig::select_context(&config, context)?;
        kubeconfig::context(&config, selected)?;
        Ok(Self {
            context: context.map(str::to_string),
            config,
            namespace_override: namespace_override.filter(|n| !n.is_empty()).map(str::to_string),
            base_dir: path.parent().filter(|p| !p.as_os_str().is_empty()).map(Path::to_path_buf),
        })
    }

    pub fn raw_config(&self) -> &Kubeconfig {
        &self.config
    }

    /// Effective namespace: the override, else the context's, else `default`.
    pub fn namespace(&self) -> Result<String, EndpointError> {
        if let Some(ns) = &self.namespace_override {
            return Ok(ns.clone());
        }
        Ok(kubeconfig::namespace(&self.config, self.context.as_deref())?
            .unwrap_or_else(|| DEFAULT_NAMESPACE.to_string()))
    }

    pub fn rest_config(&self) -> Result<RestConfig, EndpointError> {
        Ok(kubeconfig::rest_config(
            &self.config,
            self.context.as_deref(),
            self.base_dir.as_deref(),
        )?)
    }

    /// Standalone single-context kubeconfig with everything inlined.
    pub fn flatten(&self) -> Result<Kubeconfig, EndpointError> {
        Ok(kubeconfig::flatten(
            &self.config,
            self.context.as_deref(),
            self.base_dir.as_deref(),
            self.namespace_override.as_deref(),
        )?)
    }

    /// Write the flattened config as YAML.
    pub fn write_to<W: Write>(&self, writer: W) -> Result<(), EndpointError> {
        Ok(kubeconfig::write_to(&self.flatten()?, writer)?)
    }
}

/// Cluster client configuration for a resolved context.
///
/// An explicit kubeconfig path, or the implicit `<DOCKER_HOST>` context, loads a
/// kubeconfig file (`override_path`, else `KUBECONFIG`, else `~/.kube/config`).
/// Otherwise the context's cluster endpoint is used, falling back to the default
/// kubeconfig when the context has none.
pub fn config_for_context<F>(
    store: &dyn Store,
    resolved: &ResolvedContext,
    override_path: Option<&Path>,
    env: F,
) -> Result<KubernetesClientConfig, EndpointError>
where
    F: Fn(&str) -> Option<String>,
{
    if override_path.is_none() {
        if let ResolvedContext::Named(name) = resolved {
            if let Some(endpoint) = KubernetesEndpoint::load(store, name)? {
                return endpoint.client_config();
            }
            debug!(context = %name, "context has no cluster endpoint, using default kubeconfig");
        }
    }
    let path = match override_path {
        Some(path) => path.to_path_buf(),
        None => kubeconfig::default_path(env).ok_or_else(|| EndpointError::InvalidValue {
            field: kubeconfig::ENV_KUBECONFIG.to_string(),
            value: String::new(),
        })?,
    };
    Ok(KubernetesClientConfig::from_file(&path, None, None)?)
}
