//! Kubeconfig access for the cluster endpoint.
//!
//! Files are parsed with `kube::config::Kubeconfig`. This module adds the lookups the
//! endpoint needs on top of it: context selection, inlining of TLS material, and
//! synthesis of single-context configs.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use kube::config::{AuthInfo, Cluster, Context};
use secrecy::ExposeSecret;
use serde_json::json;
use tracing::debug;

use crate::error::KubeconfigError;

pub use kube::config::Kubeconfig;

/// Environment variable naming the kubeconfig file
pub const ENV_KUBECONFIG: &str = "KUBECONFIG";
pub const DEFAULT_NAMESPACE: &str = "default";

/// Entry names used when synthesizing a single-cluster config
pub const SYNTHETIC_CLUSTER: &str = "cluster";
pub const SYNTHETIC_USER: &str = "authInfo";
pub const SYNTHETIC_CONTEXT: &str = "context";

/// Connection parameters of one kubeconfig context, with all TLS material inlined.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct RestConfig {
    pub host: String,
    pub ca_data: Option<Vec<u8>>,
    pub cert_data: Option<Vec<u8>>,
    pub key_data: Option<Vec<u8>>,
    pub bearer_token: Option<String>,
    pub insecure: bool,
}

impl std::fmt::Debug for RestConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestConfig")
            .field("host", &self.host)
            .field("ca_data", &self.ca_data.as_ref().map(Vec::len))
            .field("cert_data", &self.cert_data.as_ref().map(Vec::len))
            .field("key_data", &self.key_data.as_ref().map(|_| "<redacted>"))
            .field("bearer_token", &self.bearer_token.as_ref().map(|_| "<redacted>"))
            .field("insecure", &self.insecure)
            .finish()
    }
}

/// Read the kubeconfig at `path`.
///
/// A missing or unreadable file is [`KubeconfigError::Read`]; a file kube cannot
/// load is [`KubeconfigError::Load`].
pub fn read(path: &Path) -> Result<Kubeconfig, KubeconfigError> {
    fs::metadata(path).map_err(|source| KubeconfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let config = Kubeconfig::read_from(path).map_err(|source| KubeconfigError::Load {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(
        path = %path.display(),
        contexts = config.contexts.len(),
        "read kubeconfig"
    );
    Ok(config)
}

pub fn parse(text: &str) -> Result<Kubeconfig, KubeconfigError> {
    Ok(Kubeconfig::from_yaml(text)?)
}

pub fn to_yaml(config: &Kubeconfig) -> Result<String, KubeconfigError> {
    Ok(serde_yaml::to_string(config)?)
}

pub fn write_to<W: Write>(config: &Kubeconfig, writer: W) -> Result<(), KubeconfigError> {
    serde_yaml::to_writer(writer, config)?;
    Ok(())
}

/// Single cluster, single user, single context config with data inlined.
pub fn synthesize(rest: &RestConfig, namespace: Option<&str>) -> Result<Kubeconfig, KubeconfigError> {
    let mut cluster = json!({ "server": rest.host });
    if let Some(ca) = &rest.ca_data {
        cluster["certificate-authority-data"] = json!(STANDARD.encode(ca));
    }
    if rest.insecure {
        cluster["insecure-skip-tls-verify"] = json!(true);
    }

    let mut user = json!({});
    if let Some(cert) = &rest.cert_data {
        user["client-certificate-data"] = json!(STANDARD.encode(cert));
    }
    if let Some(key) = &rest.key_data {
        user["client-key-data"] = json!(STANDARD.encode(key));
    }
    if let Some(token) = &rest.bearer_token {
        user["token"] = json!(token);
    }

    let mut context = json!({ "cluster": SYNTHETIC_CLUSTER, "user": SYNTHETIC_USER });
    if let Some(ns) = namespace.filter(|n| !n.is_empty()) {
        context["namespace"] = json!(ns);
    }

    let document = json!({
        "apiVersion": "v1",
        "kind": "Config",
        "clusters": [{ "name": SYNTHETIC_CLUSTER, "cluster": cluster }],
        "users": [{ "name": SYNTHETIC_USER, "user": user }],
        "contexts": [{ "name": SYNTHETIC_CONTEXT, "context": context }],
        "current-context": SYNTHETIC_CONTEXT,
    });
    serde_json::from_value(document).map_err(KubeconfigError::Synthesize)
}

/// Name of the context to use: `requested` when given, else the file's current context.
pub fn select_context<'a>(
    config: &'a Kubeconfig,
    requested: Option<&'a str>,
) -> Result<&'a str, KubeconfigError> {
    requested
        .filter(|c| !c.is_empty())
        .or(config.current_context.as_deref().filter(|c| !c.is_empty()))
        .ok_or(KubeconfigError::NoCurrentContext)
}

pub fn context<'a>(config: &'a Kubeconfig, name: &str) -> Result<&'a Context, KubeconfigError> {
    config
        .contexts
        .iter()
        .find(|c| c.name == name)
        .and_then(|c| c.context.as_ref())
        .ok_or_else(|| KubeconfigError::ContextNotFound {
            context: name.to_string(),
        })
}

fn cluster_for<'a>(
    config: &'a Kubeconfig,
    context: &str,
    entry: &Context,
) -> Result<&'a Cluster, KubeconfigError> {
    config
        .clusters
        .iter()
        .find(|c| c.name == entry.cluster)
        .and_then(|c| c.cluster.as_ref())
        .ok_or_else(|| KubeconfigError::ClusterNotFound {
            context: context.to_string(),
            cluster: entry.cluster.clone(),
        })
}

fn user_for<'a>(
    config: &'a Kubeconfig,
    context: &str,
    entry: &Context,
) -> Result<Option<&'a AuthInfo>, KubeconfigError> {
    // contexts without a user authenticate anonymously
    let Some(user) = entry.user.as_deref().filter(|u| !u.is_empty()) else {
        return Ok(None);
    };
    config
        .auth_infos
        .iter()
        .find(|u| u.name == user)
        .map(|u| u.auth_info.as_ref())
        .ok_or_else(|| KubeconfigError::UserNotFound {
            context: context.to_string(),
            user: user.to_string(),
        })
}

/// Resolve the connection parameters of `context` (or the current context).
///
/// File references are resolved relative to `base_dir`. Configs loaded with [`read`]
/// already carry absolute paths.
pub fn rest_config(
    config: &Kubeconfig,
    context: Option<&str>,
    base_dir: Option<&Path>,
) -> Result<RestConfig, KubeconfigError> {
    let name = select_context(config, context)?;
    let entry = self::context(config, name)?;
    let cluster = cluster_for(config, name, entry)?;
    let user = user_for(config, name, entry)?;

    let (cert_data, key_data, bearer_token) = match user {
        Some(user) => (
            inline(
                "client-certificate",
                user.client_certificate_data.as_deref(),
                user.client_certificate.as_deref(),
                base_dir,
            )?,
            inline(
                "client-key",
                user.client_key_data.as_ref().map(|k| k.expose_secret()),
                user.client_key.as_deref(),
                base_dir,
            )?,
            bearer_token(user, base_dir)?,
        ),
        None => (None, None, None),
    };

    Ok(RestConfig {
        host: cluster.server.clone().unwrap_or_default(),
        ca_data: inline(
            "certificate-authority",
            cluster.certificate_authority_data.as_deref(),
            cluster.certificate_authority.as_deref(),
            base_dir,
        )?,
        cert_data,
        key_data,
        bearer_token,
        insecure: cluster.insecure_skip_tls_verify.unwrap_or(false),
    })
}

fn bearer_token(user: &AuthInfo, base_dir: Option<&Path>) -> Result<Option<String>, KubeconfigError> {
    if let Some(token) = user.token.as_ref() {
        return Ok(Some(token.expose_secret().to_string()));
    }
    let Some(file) = user.token_file.as_deref().filter(|f| !f.is_empty()) else {
        return Ok(None);
    };
    let path = relative_to(file, base_dir);
    let token = fs::read_to_string(&path).map_err(|source| KubeconfigError::Read { path, source })?;
    Ok(Some(token.trim().to_string()))
}

/// Namespace of `context` (or the current context); `None` when it sets none.
pub fn namespace(config: &Kubeconfig, context: Option<&str>) -> Result<Option<String>, KubeconfigError> {
    let name = select_context(config, context)?;
    Ok(self::context(config, name)?
        .namespace
        .clone()
        .filter(|n| !n.is_empty()))
}

/// Standalone config holding only the selected context, with file references
/// inlined and `namespace_override` applied.
pub fn flatten(
    config: &Kubeconfig,
    context: Option<&str>,
    base_dir: Option<&Path>,
    namespace_override: Option<&str>,
) -> Result<Kubeconfig, KubeconfigError> {
    let rest = rest_config(config, context, base_dir)?;
    let namespace = match namespace_override.filter(|n| !n.is_empty()) {
        Some(ns) => Some(ns.to_string()),
        None => namespace(config, context)?,
    };
    synthesize(&rest, namespace.as_deref())
}

// kube keeps its own base64-or-file loaders private, so `*-data` fields are
// decoded here.
fn inline(
    field: &str,
    data: Option<&str>,
    file: Option<&str>,
    base_dir: Option<&Path>,
) -> Result<Option<Vec<u8>>, KubeconfigError> {
    if let Some(data) = data.filter(|d| !d.is_empty()) {
        let compact: String = data.split_whitespace().collect();
        return STANDARD
            .decode(compact)
            .map(Some)
            .map_err(|e| KubeconfigError::InvalidData {
                field: format!("{}-data", field),
                reason: e.to_string(),
            });
    }
    let Some(file) = file.filter(|f| !f.is_empty()) else {
        return Ok(None);
    };
    let path = relative_to(file, base_dir);
    fs::read(&path)
        .map(Some)
        .map_err(|source| KubeconfigError::Read { path, source })
}

fn relative_to(file: &str, base_dir: Option<&Path>) -> PathBuf {
    match base_dir {
        Some(dir) if Path::new(file).is_relative() => dir.join(file),
        _ => PathBuf::from(file),
    }
}

/// Location of the user's kubeconfig: `KUBECONFIG` (first entry) from `env`, else
/// `~/.kube/config`.
pub fn default_path<F>(env: F) -> Option<PathBuf>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(value) = env(ENV_KUBECONFIG).filter(|v| !v.is_empty()) {
        if let Some(first) = std::env::split_paths(&value).find(|p| !p.as_os_str().is_empty()) {
            return Some(first);
        }
    }
    directories::BaseDirs::new().map(|dirs| dirs.home_dir().join(".kube").join("config"))
}
