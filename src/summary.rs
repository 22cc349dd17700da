//! One display row per stored context.

use crate::context_meta::ContextSettings;
use crate::endpoint::{DockerEndpointMeta, KubernetesEndpointMeta};
use crate::error::EndpointError;
use crate::orchestrator::Orchestrator;
use crate::store::Store;
use crate::types::DOCKER_ENDPOINT;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextSummary {
    pub name: String,
    pub current: bool,
    pub description: String,
    pub docker_endpoint: Option<String>,
    /// `"<server> (<namespace>)"` or `"<kubeconfig> (<context>)"`
    pub kubernetes_endpoint: Option<String>,
    pub orchestrator: Orchestrator,
    pub stack_orchestrator: Orchestrator,
}

/// Summaries of every context, sorted by name.
pub fn list_summaries(store: &dyn Store) -> Result<Vec<ContextSummary>, EndpointError> {
    let current = store.current_context();
    let mut rows = Vec::new();
    for (name, meta) in store.list()? {
        let settings = ContextSettings::decode(&meta.metadata)?;
        let docker_endpoint = if meta.endpoints.contains_key(DOCKER_ENDPOINT) {
            DockerEndpointMeta::parse(&name, &meta)?.base.host
        } else {
            None
        };
        let kubernetes_endpoint =
            KubernetesEndpointMeta::parse(&name, &meta)?.map(|ep| match ep {
                KubernetesEndpointMeta::Raw(raw) => format!(
                    "{} ({})",
                    raw.base.host.unwrap_or_default(),
                    raw.default_namespace.unwrap_or_default()
                ),
                KubernetesEndpointMeta::Reference(reference) => format!(
                    "{} ({})",
                    reference.path.display(),
                    reference.context.unwrap_or_default()
                ),
            });
        rows.push(ContextSummary {
            current: name == current,
            name,
            description: settings.description,
            docker_endpoint,
            kubernetes_endpoint,
            orchestrator: settings.orchestrator,
            stack_orchestrator: settings.stack_orchestrator,
        });
    }
    rows.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(rows)
}
