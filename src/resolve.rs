//! Selection of the active context.

use std::fmt;

use tracing::debug;

use crate::store::Store;

/// Pseudo-context name for "connect using DOCKER_HOST / the default socket"
pub const DOCKER_HOST_CONTEXT: &str = "<DOCKER_HOST>";
pub const ENV_DOCKER_HOST: &str = "DOCKER_HOST";
pub const ENV_DOCKER_CONTEXT: &str = "DOCKER_CONTEXT";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedContext {
    /// No stored context; the implicit default connection
    DockerHost,
    Named(String),
}

impl ResolvedContext {
    pub fn name(&self) -> &str {
        match self {
            ResolvedContext::DockerHost => DOCKER_HOST_CONTEXT,
            ResolvedContext::Named(name) => name,
        }
    }

    pub fn is_docker_host(&self) -> bool {
        matches!(self, ResolvedContext::DockerHost)
    }
}

impl fmt::Display for ResolvedContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Caller-supplied selection inputs
#[derive(Debug, Clone, Copy, Default)]
pub struct ResolveOptions<'a> {
    /// Context named explicitly by the caller
    pub explicit: Option<&'a str>,
    /// Engine hosts given explicitly by the caller
    pub hosts: &'a [String],
}

/// Pick the context to use, in order: the explicit name, `<DOCKER_HOST>` when hosts
/// were given or `DOCKER_HOST` is set, a non-empty `DOCKER_CONTEXT`, the store's
/// current context, and finally `<DOCKER_HOST>`.
///
/// The chosen name is not checked against the store.
pub fn resolve_context<F>(options: ResolveOptions<'_>, store: &dyn Store, env: F) -> ResolvedContext
where
    F: Fn(&str) -> Option<String>,
{
    let resolved = if let Some(name) = options.explicit.filter(|n| !n.is_empty()) {
        named(name)
    } else if !options.hosts.is_empty() || env(ENV_DOCKER_HOST).is_some() {
        ResolvedContext::DockerHost
    } else if let Some(name) = env(ENV_DOCKER_CONTEXT).filter(|n| !n.is_empty()) {
        named(&name)
    } else {
        let current = store.current_context();
        if current.is_empty() {
            ResolvedContext::DockerHost
        } else {
            named(&current)
        }
    };
    debug!(context = %resolved, "resolved active context");
    resolved
}

fn named(name: &str) -> ResolvedContext {
    if name == DOCKER_HOST_CONTEXT {
        ResolvedContext::DockerHost
    } else {
        ResolvedContext::Named(name.to_string())
    }
}
