//! Typed view over the free-form metadata of a context.
//!
//! `encode` produces a complete replacement map. To update settings without losing
//! keys this view does not know about, decode the stored map and write back with
//! [`ContextSettings::merge_into`].

use serde_json::Value;

use crate::error::MetadataError;
use crate::orchestrator::{normalize, Orchestrator};
use crate::types::Metadata;

pub const KEY_DESCRIPTION: &str = "description";
pub const KEY_ORCHESTRATOR: &str = "defaultOrchestrator";
pub const KEY_STACK_ORCHESTRATOR: &str = "defaultStackOrchestrator";
pub const KEY_HELPER_HOST: &str = "helperHost";

/// Context-level settings understood by this crate
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContextSettings {
    pub description: String,
    pub orchestrator: Orchestrator,
    pub stack_orchestrator: Orchestrator,
    /// Host of the helper-enabled engine, when one is configured
    pub helper_host: Option<String>,
}

impl ContextSettings {
    /// Read the known keys. Values of the wrong type read as absent; orchestrator
    /// values are normalized and an unknown orchestrator is an error.
    pub fn decode(meta: &Metadata) -> Result<Self, MetadataError> {
        Ok(Self {
            description: meta.get_str(KEY_DESCRIPTION).unwrap_or_default().to_string(),
            orchestrator: normalize(meta.get_str(KEY_ORCHESTRATOR).unwrap_or_default())?,
            stack_orchestrator: normalize(
                meta.get_str(KEY_STACK_ORCHESTRATOR).unwrap_or_default(),
            )?,
            helper_host: meta
                .get_str(KEY_HELPER_HOST)
                .filter(|h| !h.is_empty())
                .map(str::to_string),
        })
    }

    /// Replacement metadata map holding only the known keys.
    pub fn encode(&self) -> Metadata {
        let mut meta = Metadata::new();
        self.merge_into(&mut meta);
        meta
    }

    /// Write the known keys into `meta`, keeping every other key. Unset values
    /// remove their key.
    pub fn merge_into(&self, meta: &mut Metadata) {
        meta.insert(KEY_DESCRIPTION, self.description.as_str());
        set_orchestrator(meta, KEY_ORCHESTRATOR, self.orchestrator);
        set_orchestrator(meta, KEY_STACK_ORCHESTRATOR, self.stack_orchestrator);
        match &self.helper_host {
            Some(host) => {
                meta.insert(KEY_HELPER_HOST, Value::String(host.clone()));
            }
            None => {
                meta.remove(KEY_HELPER_HOST);
            }
        }
    }
}

fn set_orchestrator(meta: &mut Metadata, key: &str, value: Orchestrator) {
    if value.is_unset() {
        meta.remove(key);
    } else {
        meta.insert(key, value.as_str());
    }
}
