//! Orchestrator preference recorded on a context.

use std::fmt;
use std::str::FromStr;

use crate::error::MetadataError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Orchestrator {
    Kubernetes,
    Swarm,
    All,
    /// No preference recorded
    #[default]
    Unset,
}

impl Orchestrator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Orchestrator::Kubernetes => "kubernetes",
            Orchestrator::Swarm => "swarm",
            Orchestrator::All => "all",
            Orchestrator::Unset => "unset",
        }
    }

    pub fn has_kubernetes(&self) -> bool {
        matches!(self, Orchestrator::Kubernetes | Orchestrator::All)
    }

    pub fn has_swarm(&self) -> bool {
        matches!(self, Orchestrator::Swarm | Orchestrator::All)
    }

    pub fn has_all(&self) -> bool {
        *self == Orchestrator::All
    }

    pub fn is_unset(&self) -> bool {
        *self == Orchestrator::Unset
    }
}

/// Parse a raw orchestrator value. `""` and `"unset"` both mean no preference; any
/// other value outside the known set is rejected with the offending string.
pub fn normalize(value: &str) -> Result<Orchestrator, MetadataError> {
    match value {
        "kubernetes" => Ok(Orchestrator::Kubernetes),
        "swarm" => Ok(Orchestrator::Swarm),
        "all" => Ok(Orchestrator::All),
        "" | "unset" => Ok(Orchestrator::Unset),
        other => Err(MetadataError::InvalidOrchestrator(other.to_string())),
    }
}

impl FromStr for Orchestrator {
    type Err = MetadataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        normalize(s)
    }
}

impl fmt::Display for Orchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
