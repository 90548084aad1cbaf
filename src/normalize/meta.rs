//! Object metadata shared by every known kind, and the derivations built on it

use serde::Deserialize;
use std::collections::BTreeMap;

/// Label carrying the general application name.
pub const APP_LABEL: &str = "app";
/// Label carrying the platform add-on application name.
pub const K8S_APP_LABEL: &str = "k8s-app";

/// Object metadata common to all cluster resources.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ObjectMeta {
    pub name: String,
    pub namespace: String,
    pub creation_timestamp: Option<String>,
    pub resource_version: String,
    pub labels: BTreeMap<String, String>,
    pub annotations: BTreeMap<String, String>,
    pub owner_references: Vec<OwnerReference>,
}

/// Reference to an owning object.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OwnerReference {
    pub api_version: String,
    pub kind: String,
    pub name: String,
    pub uid: String,
}

/// Capability: exposes object metadata, and with it labels and annotations.
///
/// Every decoded kind implements this, so derivations are written once.
pub trait HasObjectMeta {
    fn object_meta(&self) -> &ObjectMeta;

    fn labels(&self) -> &BTreeMap<String, String> {
        &self.object_meta().labels
    }

    fn annotations(&self) -> &BTreeMap<String, String> {
        &self.object_meta().annotations
    }

    /// Label value, or "" when absent.
    fn label(&self, key: &str) -> &str {
        self.labels().get(key).map(String::as_str).unwrap_or("")
    }

    /// Annotation value, or "" when absent.
    fn annotation(&self, key: &str) -> &str {
        self.annotations().get(key).map(String::as_str).unwrap_or("")
    }
}

impl HasObjectMeta for ObjectMeta {
    fn object_meta(&self) -> &ObjectMeta {
        self
    }
}

/// Asset tag from the given annotation; `None` when absent or empty.
pub fn derive_asset(object: &dyn HasObjectMeta, annotation_key: &str) -> Option<String> {
    let value = object.annotation(annotation_key);
    (!value.is_empty()).then(|| value.to_string())
}

/// Application names from the `app` and `k8s-app` labels, in that order,
/// without duplicates. Empty when neither label is set.
pub fn derive_applications(object: &dyn HasObjectMeta) -> Vec<String> {
    let mut apps: Vec<String> = Vec::with_capacity(2);
    for key in [APP_LABEL, K8S_APP_LABEL] {
        let value = object.label(key);
        if !value.is_empty() && !apps.iter().any(|a| a == value) {
            apps.push(value.to_string());
        }
    }
    apps
}

/// Name and lower-cased kind of the first owner reference.
///
/// Only the first owner is modeled. Objects with several owners keep just
/// the first one.
pub fn derive_owner(object: &dyn HasObjectMeta) -> Option<(String, String)> {
    object
        .object_meta()
        .owner_references
        .first()
        .map(|owner| (owner.name.clone(), owner.kind.to_lowercase()))
}
