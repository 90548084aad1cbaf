//! Decoders and projections for each known kind
//!
//! Each kind decodes only the parts of the object it projects. Nested
//! structures that are carried through untouched (containers, ports, rules)
//! stay as JSON values.

use super::kind::Kind;
use super::meta::{derive_owner, HasObjectMeta, ObjectMeta};
use super::registry::KindNormalizer;
use crate::entity::{attr, Entity};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

fn opt<T: Into<Value>>(value: Option<T>) -> Value {
    value.map(Into::into).unwrap_or(Value::Null)
}

fn opt_list(value: &Option<Vec<Value>>) -> Value {
    value.clone().map(Value::Array).unwrap_or(Value::Null)
}

fn opt_object(value: &Option<Map<String, Value>>) -> Value {
    value.clone().map(Value::Object).unwrap_or(Value::Null)
}

fn set_owner(object: &dyn HasObjectMeta, entity: &mut Entity) {
    if let Some((name, kind)) = derive_owner(object) {
        entity.insert(attr::OWNER, name);
        entity.insert(attr::OWNER_TYPE, kind);
    }
}

macro_rules! impl_has_object_meta {
    ($($ty:ty),* $(,)?) => {
        $(impl HasObjectMeta for $ty {
            fn object_meta(&self) -> &ObjectMeta {
                &self.metadata
            }
        })*
    };
}

// --- namespace ---

#[derive(Debug, Deserialize)]
pub struct NamespaceObject {
    pub metadata: ObjectMeta,
}

pub struct NamespaceNormalizer;

impl KindNormalizer for NamespaceNormalizer {
    type Object = NamespaceObject;
    const KIND: Kind = Kind::Namespace;
    const NAMESPACED: bool = false;

    fn project(_object: &Self::Object, _entity: &mut Entity) {}
}

// --- deployment ---

#[derive(Debug, Deserialize)]
pub struct DeploymentObject {
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: DeploymentSpec,
    #[serde(default)]
    pub status: DeploymentStatus,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DeploymentSpec {
    pub replicas: Option<i64>,
    pub strategy: DeploymentStrategy,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct DeploymentStrategy {
    #[serde(rename = "type")]
    pub strategy_type: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DeploymentStatus {
    pub available_replicas: i64,
}

pub struct DeploymentNormalizer;

impl KindNormalizer for DeploymentNormalizer {
    type Object = DeploymentObject;
    const KIND: Kind = Kind::Deployment;

    fn project(object: &Self::Object, entity: &mut Entity) {
        entity.insert(attr::NUM_REPLICAS, opt(object.spec.replicas));
        entity.insert(attr::AVAILABLE_REPLICAS, object.status.available_replicas);
        entity.insert(attr::STRATEGY, object.spec.strategy.strategy_type.clone());
    }
}

// --- pod ---

#[derive(Debug, Deserialize)]
pub struct PodObject {
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: PodSpec,
    #[serde(default)]
    pub status: PodStatus,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PodSpec {
    pub node_name: String,
    pub containers: Option<Vec<Value>>,
    pub volumes: Option<Vec<Value>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PodStatus {
    pub phase: String,
    #[serde(rename = "podIP")]
    pub pod_ip: String,
    pub start_time: Option<String>,
}

pub struct PodNormalizer;

impl KindNormalizer for PodNormalizer {
    type Object = PodObject;
    const KIND: Kind = Kind::Pod;

    fn project(object: &Self::Object, entity: &mut Entity) {
        entity.insert(attr::PHASE, object.status.phase.clone());
        entity.insert(attr::NODE_NAME, object.spec.node_name.clone());
        entity.insert(attr::IP, object.status.pod_ip.clone());
        entity.insert(attr::CONTAINERS, opt_list(&object.spec.containers));
        entity.insert(attr::VOLUMES, opt_list(&object.spec.volumes));
        entity.insert(attr::START_TIME, opt(object.status.start_time.clone()));
        set_owner(object, entity);
    }
}

// --- replica set ---

#[derive(Debug, Deserialize)]
pub struct ReplicaSetObject {
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: ReplicaSetSpec,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ReplicaSetSpec {
    pub replicas: Option<i64>,
    pub template: PodTemplate,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct PodTemplate {
    pub spec: Option<Map<String, Value>>,
}

pub struct ReplicaSetNormalizer;

impl KindNormalizer for ReplicaSetNormalizer {
    type Object = ReplicaSetObject;
    const KIND: Kind = Kind::ReplicaSet;

    fn project(object: &Self::Object, entity: &mut Entity) {
        entity.insert(attr::NUM_REPLICAS, opt(object.spec.replicas));
        entity.insert(attr::POD_SPEC, opt_object(&object.spec.template.spec));
        set_owner(object, entity);
    }
}

// --- service ---

#[derive(Debug, Deserialize)]
pub struct ServiceObject {
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: ServiceSpec,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ServiceSpec {
    pub selector: Option<BTreeMap<String, String>>,
    #[serde(rename = "clusterIP")]
    pub cluster_ip: String,
    #[serde(rename = "type")]
    pub service_type: String,
    pub ports: Option<Vec<Value>>,
}

pub struct ServiceNormalizer;

impl KindNormalizer for ServiceNormalizer {
    type Object = ServiceObject;
    const KIND: Kind = Kind::Service;

    fn project(object: &Self::Object, entity: &mut Entity) {
        let selector = object.spec.selector.as_ref().map(|s| {
            Value::Object(
                s.iter()
                    .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                    .collect(),
            )
        });
        entity.insert(attr::SELECTOR, opt(selector));
        entity.insert(attr::CLUSTER_IP, object.spec.cluster_ip.clone());
        entity.insert(attr::SERVICE_TYPE, object.spec.service_type.clone());
        entity.insert(attr::PORTS, opt_list(&object.spec.ports));
    }
}

// --- stateful set ---

#[derive(Debug, Deserialize)]
pub struct StatefulSetObject {
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: StatefulSetSpec,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct StatefulSetSpec {
    pub replicas: Option<i64>,
}

pub struct StatefulSetNormalizer;

impl KindNormalizer for StatefulSetNormalizer {
    type Object = StatefulSetObject;
    const KIND: Kind = Kind::StatefulSet;

    fn project(object: &Self::Object, entity: &mut Entity) {
        entity.insert(attr::NUM_REPLICAS, opt(object.spec.replicas));
    }
}

// --- ingress ---

#[derive(Debug, Deserialize)]
pub struct IngressObject {
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: IngressSpec,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct IngressSpec {
    #[serde(alias = "defaultBackend")]
    pub backend: Option<Map<String, Value>>,
    pub tls: Option<Vec<Value>>,
    pub rules: Option<Vec<Value>>,
}

pub struct IngressNormalizer;

impl KindNormalizer for IngressNormalizer {
    type Object = IngressObject;
    const KIND: Kind = Kind::Ingress;

    fn project(object: &Self::Object, entity: &mut Entity) {
        entity.insert(attr::DEFAULT_BACKEND, opt_object(&object.spec.backend));
        entity.insert(attr::TLS, opt_list(&object.spec.tls));
        entity.insert(attr::RULES, opt_list(&object.spec.rules));
    }
}

impl_has_object_meta!(
    NamespaceObject,
    DeploymentObject,
    PodObject,
    ReplicaSetObject,
    ServiceObject,
    StatefulSetObject,
    IngressObject,
);
