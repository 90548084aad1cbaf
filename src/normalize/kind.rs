//! Supported resource kinds

use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::str::FromStr;

/// A resource kind. Every name the normalizer has no decoder for maps to
/// `Other`, which is served by the pass-through normalizer. Names are
/// case-insensitive and `Other` keeps them lower-cased.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Kind {
    Namespace,
    Deployment,
    Pod,
    Service,
    ReplicaSet,
    StatefulSet,
    Ingress,
    Other(String),
}

impl Kind {
    /// All kinds with a dedicated decoder.
    pub const KNOWN: [Kind; 7] = [
        Kind::Namespace,
        Kind::Deployment,
        Kind::Pod,
        Kind::Service,
        Kind::ReplicaSet,
        Kind::StatefulSet,
        Kind::Ingress,
    ];

    /// Name stored in the entity's `objtype` attribute.
    pub fn as_str(&self) -> &str {
        match self {
            Kind::Namespace => "namespace",
            Kind::Deployment => "deployment",
            Kind::Pod => "pod",
            Kind::Service => "service",
            Kind::ReplicaSet => "replicaset",
            Kind::StatefulSet => "statefulset",
            Kind::Ingress => "ingress",
            Kind::Other(name) => name,
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, Kind::Other(_))
    }
}

impl FromStr for Kind {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_ascii_lowercase();
        Ok(match lowered.as_str() {
            "namespace" => Kind::Namespace,
            "deployment" => Kind::Deployment,
            "pod" => Kind::Pod,
            "service" => Kind::Service,
            "replicaset" => Kind::ReplicaSet,
            "statefulset" => Kind::StatefulSet,
            "ingress" => Kind::Ingress,
            _ => Kind::Other(lowered),
        })
    }
}

impl From<String> for Kind {
    fn from(s: String) -> Self {
        match s.parse() {
            Ok(kind) => kind,
            Err(never) => match never {},
        }
    }
}

impl From<&str> for Kind {
    fn from(s: &str) -> Self {
        Kind::from(s.to_string())
    }
}

impl From<Kind> for String {
    fn from(kind: Kind) -> Self {
        kind.as_str().to_string()
    }
}

impl std::fmt::Display for Kind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
