//! Canonical entity representation
//!
//! Every resource, whatever its source kind, is stored as an `Entity`: an
//! ordered attribute map with a handful of mandatory keys. Ordering is what
//! makes two normalizations of the same payload serialize identically.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Canonical attribute names.
pub mod attr {
    pub const UID: &str = "uid";
    pub const OBJTYPE: &str = "objtype";
    pub const NAME: &str = "name";
    pub const NAMESPACE: &str = "namespace";
    pub const CLUSTER: &str = "cluster";
    pub const RESOURCE_ID: &str = "resourceid";
    pub const CREATION_TIME: &str = "creationTime";
    pub const RESOURCE_VERSION: &str = "resourceVersion";
    pub const LABELS: &str = "labels";
    pub const K8S_OBJ: &str = "k8sobj";

    // Derived by the normalizer
    pub const OWNER: &str = "owner";
    pub const OWNER_TYPE: &str = "ownerType";
    pub const APPLICATION: &str = "application";
    pub const ASSET: &str = "asset";

    // Kind-specific
    pub const NUM_REPLICAS: &str = "numReplicas";
    pub const AVAILABLE_REPLICAS: &str = "availableReplicas";
    pub const STRATEGY: &str = "strategy";
    pub const PHASE: &str = "phase";
    pub const NODE_NAME: &str = "nodeName";
    pub const IP: &str = "ip";
    pub const CONTAINERS: &str = "containers";
    pub const VOLUMES: &str = "volumes";
    pub const START_TIME: &str = "startTime";
    pub const POD_SPEC: &str = "podSpec";
    pub const SELECTOR: &str = "selector";
    pub const CLUSTER_IP: &str = "clusterIp";
    pub const SERVICE_TYPE: &str = "serviceType";
    pub const PORTS: &str = "ports";
    pub const DEFAULT_BACKEND: &str = "defaultBackend";
    pub const TLS: &str = "tls";
    pub const RULES: &str = "rules";
}

/// Marker stored in `k8sobj` for entities produced by a known-kind normalizer.
pub const K8S_OBJ_MARKER: &str = "K8sObj";

/// Store-assigned entity identifier
///
/// Opaque to callers. Serializes as a plain string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Uid(String);

impl Uid {
    /// Mint a fresh identifier. Only stores should call this.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Uid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Uid {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for Uid {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// A canonical entity: attribute name to JSON value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Entity {
    attributes: Map<String, Value>,
}

impl Entity {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(attributes: Map<String, Value>) -> Self {
        Self { attributes }
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.attributes
    }

    pub fn attributes(&self) -> &Map<String, Value> {
        &self.attributes
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    /// String value of an attribute, if it is a string.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).and_then(Value::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.attributes.contains_key(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.attributes.insert(key.into(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.attributes.remove(key)
    }

    /// Builder-style insert
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    /// Top-level merge: every supplied key replaces the existing value.
    pub fn merge(&mut self, partial: Map<String, Value>) {
        for (key, value) in partial {
            self.attributes.insert(key, value);
        }
    }

    pub fn uid(&self) -> Option<Uid> {
        self.get_str(attr::UID).map(Uid::from)
    }

    pub fn objtype(&self) -> Option<&str> {
        self.get_str(attr::OBJTYPE)
    }

    pub fn resource_id(&self) -> Option<&str> {
        self.get_str(attr::RESOURCE_ID)
    }

    /// The identity used by delete and sync: `objtype:cluster[:namespace]:name`.
    ///
    /// Returns `None` when the entity lacks the attributes to build one.
    pub fn derive_resource_id(&self) -> Option<String> {
        let objtype = self.objtype()?;
        let name = self.get_str(attr::NAME)?;
        let cluster = self.get_str(attr::CLUSTER).unwrap_or_default();
        Some(match self.get_str(attr::NAMESPACE).filter(|ns| !ns.is_empty()) {
            Some(ns) => format!("{}:{}:{}:{}", objtype, cluster, ns, name),
            None => format!("{}:{}:{}", objtype, cluster, name),
        })
    }
}

impl From<Map<String, Value>> for Entity {
    fn from(attributes: Map<String, Value>) -> Self {
        Self { attributes }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn merge_replaces_top_level_keys() {
        let mut entity = Entity::new()
            .with(attr::NAME, "web")
            .with(attr::LABELS, json!({"app": "a", "tier": "fe"}));

        let partial = json!({"labels": {"app": "b"}, "phase": "Running"});
        entity.merge(partial.as_object().unwrap().clone());

        assert_eq!(entity.get(attr::LABELS), Some(&json!({"app": "b"})));
        assert_eq!(entity.get_str("phase"), Some("Running"));
        assert_eq!(entity.get_str(attr::NAME), Some("web"));
    }

    #[test]
    fn resource_id_includes_namespace_when_present() {
        let pod = Entity::new()
            .with(attr::OBJTYPE, "pod")
            .with(attr::NAME, "web-1")
            .with(attr::NAMESPACE, "default")
            .with(attr::CLUSTER, "c1");
        assert_eq!(pod.derive_resource_id().as_deref(), Some("pod:c1:default:web-1"));

        let ns = Entity::new()
            .with(attr::OBJTYPE, "namespace")
            .with(attr::NAME, "default")
            .with(attr::CLUSTER, "c1");
        assert_eq!(ns.derive_resource_id().as_deref(), Some("namespace:c1:default"));
    }

    #[test]
    fn resource_id_needs_name() {
        let e = Entity::new().with(attr::OBJTYPE, "pod");
        assert!(e.derive_resource_id().is_none());
    }

    #[test]
    fn serializes_as_plain_object_in_key_order() {
        let e = Entity::new().with("b", 1).with("a", 2);
        assert_eq!(serde_json::to_string(&e).unwrap(), r#"{"a":2,"b":1}"#);
    }
}
