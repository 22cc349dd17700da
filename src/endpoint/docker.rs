//! Container engine endpoint codec (`docker` endpoint kind).

use tracing::debug;

use crate::error::{EndpointError, StoreError};
use crate::store::Store;
use crate::types::{ContextMetadata, Metadata, DOCKER_ENDPOINT};

use super::tls::{client_tls, ClientTls};
use super::{read_string, EndpointMeta, TlsData};

pub const KEY_API_VERSION: &str = "apiVersion";
/// Environment override for the negotiated API version
pub const ENV_API_VERSION: &str = "DOCKER_API_VERSION";

/// Engine endpoint as stored, without TLS material
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DockerEndpointMeta {
    pub base: EndpointMeta,
    pub api_version: Option<String>,
}

impl DockerEndpointMeta {
    /// Parse the `docker` endpoint of a context record.
    ///
    /// Fails with [`EndpointError::NotFound`] when the record has no engine endpoint.
    pub fn parse(context_name: &str, meta: &ContextMetadata) -> Result<Self, EndpointError> {
        let ep = meta
            .endpoints
            .get(DOCKER_ENDPOINT)
            .ok_or_else(|| EndpointError::NotFound {
                context: context_name.to_string(),
                kind: DOCKER_ENDPOINT.to_string(),
            })?;
        Ok(Self {
            base: EndpointMeta::from_endpoint_map(context_name, ep)?,
            api_version: read_string(ep, KEY_API_VERSION)?.filter(|v| !v.is_empty()),
        })
    }

    pub fn to_metadata(&self) -> Metadata {
        let mut ep = Metadata::new();
        self.base.write_to(&mut ep);
        if let Some(version) = &self.api_version {
            ep.insert(KEY_API_VERSION, version.as_str());
        }
        ep
    }

    /// Attach the endpoint's stored TLS material.
    pub fn with_tls_data(self, store: &dyn Store) -> Result<DockerEndpoint, EndpointError> {
        let tls = TlsData::load(store, &self.base.context_name, DOCKER_ENDPOINT)?;
        Ok(DockerEndpoint {
            meta: self,
            tls,
            tls_password: None,
        })
    }
}

/// Engine endpoint with its TLS material
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DockerEndpoint {
    pub meta: DockerEndpointMeta,
    pub tls: Option<TlsData>,
    /// Key passphrase; held in memory only, never persisted.
    pub tls_password: Option<String>,
}

/// What a client needs to reach the engine
#[derive(Debug, Clone)]
pub struct EngineClientConfig {
    pub host: Option<String>,
    pub api_version: Option<String>,
    pub tls: Option<ClientTls>,
}

impl DockerEndpoint {
    pub fn context_name(&self) -> &str {
        &self.meta.base.context_name
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.tls_password = Some(password.into());
        self
    }

    /// Load the engine endpoint of a context, TLS material included.
    pub fn load(store: &dyn Store, context_name: &str) -> Result<Self, EndpointError> {
        let meta = store.get(context_name)?;
        DockerEndpointMeta::parse(context_name, &meta)?.with_tls_data(store)
    }

    /// Store the endpoint: read-modify-write of the context record (other endpoints
    /// and metadata are kept), then a wholesale reset of the endpoint's TLS blobs.
    ///
    /// A context that does not exist yet is created.
    pub fn save(&self, store: &dyn Store) -> Result<(), EndpointError> {
        let name = self.context_name();
        let mut ctx = match store.get(name) {
            Ok(ctx) => ctx,
            Err(StoreError::ContextNotFound(_)) => ContextMetadata::new(),
            Err(e) => return Err(e.into()),
        };
        ctx.endpoints
            .insert(DOCKER_ENDPOINT.to_string(), self.meta.to_metadata());
        store.create_or_update(name, &ctx)?;
        let tls = self.tls.as_ref().and_then(TlsData::to_store_data);
        store.reset_endpoint_tls(name, DOCKER_ENDPOINT, tls.as_ref())?;
        debug!(context = %name, with_tls = tls.is_some(), "saved engine endpoint");
        Ok(())
    }

    /// Transport TLS settings; `None` for a plaintext endpoint.
    pub fn tls_config(&self) -> Result<Option<ClientTls>, EndpointError> {
        Ok(client_tls(
            self.tls.as_ref(),
            self.meta.base.skip_tls_verify,
            self.tls_password.as_deref(),
        )?)
    }

    /// Everything needed to build an engine client. A non-empty
    /// `DOCKER_API_VERSION` from `env` takes precedence over the stored version.
    pub fn client_config<F>(&self, env: F) -> Result<EngineClientConfig, EndpointError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_version = env(ENV_API_VERSION)
            .filter(|v| !v.is_empty())
            .or_else(|| self.meta.api_version.clone());
        Ok(EngineClientConfig {
            host: self.meta.base.host.clone(),
            api_version,
            tls: self.tls_config()?,
        })
    }
}
