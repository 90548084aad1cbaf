//! Kind registry: maps each kind to the normalizer that understands it
//!
//! Known kinds decode into typed objects and project the canonical fields.
//! Anything else goes through `PassThrough`, which keeps the payload as a
//! flat attribute map.

use super::kind::Kind;
use super::kinds::{
    DeploymentNormalizer, IngressNormalizer, NamespaceNormalizer, PodNormalizer,
    ReplicaSetNormalizer, ServiceNormalizer, StatefulSetNormalizer,
};
use super::meta::{derive_applications, derive_asset, HasObjectMeta};
use crate::entity::{attr, Entity, K8S_OBJ_MARKER};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;
use thiserror::Error;

/// Default annotation key holding an object's asset tag.
pub const DEFAULT_ASSET_ANNOTATION: &str = "assetId";

/// Errors raised when a payload does not have the shape its kind expects.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("payload is not valid JSON: {0}")]
    Json(#[source] serde_json::Error),

    #[error("malformed {kind} payload: {source}")]
    Malformed {
        kind: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("expected a list of {kind} objects")]
    ExpectedList { kind: String },

    #[error("expected a single {kind} object")]
    ExpectedObject { kind: String },

    #[error("element {index}: {source}")]
    Element {
        index: usize,
        #[source]
        source: Box<DecodeError>,
    },

    #[error("{0}")]
    Invalid(String),
}

/// Per-call inputs that are not part of the payload.
#[derive(Debug, Clone, Copy)]
pub struct NormalizeContext<'a> {
    /// Cluster the payload was collected from (caller context).
    pub cluster: &'a str,
    /// Annotation key looked up for the `asset` attribute.
    pub asset_annotation: &'a str,
}

/// One normalization capability: a JSON value in, a canonical entity out.
pub trait Normalize: Send + Sync {
    fn normalize_value(&self, ctx: &NormalizeContext<'_>, value: Value) -> Result<Entity, DecodeError>;
}

/// A kind with a typed decoder.
///
/// Implementors only describe the kind-specific projection; decoding, the
/// common fields and the derived attributes are shared.
pub trait KindNormalizer: Send + Sync + 'static {
    type Object: DeserializeOwned + HasObjectMeta;

    const KIND: Kind;

    /// Whether the kind lives inside a namespace (adds `namespace`).
    const NAMESPACED: bool = true;

    /// Copy kind-specific attributes into the entity.
    fn project(object: &Self::Object, entity: &mut Entity);
}

/// Adapts a `KindNormalizer` into a `Normalize` trait object.
pub struct Typed<N>(PhantomData<fn() -> N>);

impl<N: KindNormalizer> Typed<N> {
    pub fn new() -> Self {
        Self(PhantomData)
    }
}

impl<N: KindNormalizer> Default for Typed<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<N: KindNormalizer> Normalize for Typed<N> {
    fn normalize_value(&self, ctx: &NormalizeContext<'_>, value: Value) -> Result<Entity, DecodeError> {
        let kind = N::KIND;
        if !value.is_object() {
            return Err(DecodeError::ExpectedObject {
                kind: kind.to_string(),
            });
        }
        let object: N::Object =
            serde_json::from_value(value).map_err(|source| DecodeError::Malformed {
                kind: kind.to_string(),
                source,
            })?;

        let meta = object.object_meta();
        let labels: serde_json::Map<String, Value> = meta
            .labels
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect();

        let mut entity = Entity::new()
            .with(attr::OBJTYPE, kind.as_str())
            .with(attr::NAME, meta.name.clone())
            .with(attr::CLUSTER, ctx.cluster)
            .with(
                attr::CREATION_TIME,
                meta.creation_timestamp.clone().map(Value::String).unwrap_or(Value::Null),
            )
            .with(attr::RESOURCE_VERSION, meta.resource_version.clone())
            .with(attr::LABELS, Value::Object(labels))
            .with(attr::K8S_OBJ, K8S_OBJ_MARKER);

        if N::NAMESPACED {
            entity.insert(attr::NAMESPACE, meta.namespace.clone());
        }
        if let Some(asset) = derive_asset(&object, ctx.asset_annotation) {
            entity.insert(attr::ASSET, asset);
        }
        let apps = derive_applications(&object);
        if !apps.is_empty() {
            entity.insert(attr::APPLICATION, apps);
        }

        N::project(&object, &mut entity);
        Ok(entity)
    }
}

/// Default policy for unknown kinds: the payload already is the entity.
pub struct PassThrough;

impl Normalize for PassThrough {
    fn normalize_value(&self, _ctx: &NormalizeContext<'_>, value: Value) -> Result<Entity, DecodeError> {
        match value {
            Value::Object(map) => Ok(Entity::from_map(map)),
            _ => Err(DecodeError::ExpectedObject {
                kind: "attribute map".to_string(),
            }),
        }
    }
}

/// Result of normalizing a raw payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Normalized {
    One(Entity),
    Many(Vec<Entity>),
}

impl Normalized {
    pub fn into_vec(self) -> Vec<Entity> {
        match self {
            Normalized::One(e) => vec![e],
            Normalized::Many(list) => list,
        }
    }

    pub fn into_one(self) -> Option<Entity> {
        match self {
            Normalized::One(e) => Some(e),
            Normalized::Many(_) => None,
        }
    }
}

/// Maps kinds to normalizers.
pub struct NormalizerRegistry {
    normalizers: HashMap<Kind, Arc<dyn Normalize>>,
    fallback: Arc<dyn Normalize>,
    asset_annotation: String,
}

impl NormalizerRegistry {
    /// Registry with no kinds registered; everything passes through.
    pub fn empty(asset_annotation: impl Into<String>) -> Self {
        Self {
            normalizers: HashMap::new(),
            fallback: Arc::new(PassThrough),
            asset_annotation: asset_annotation.into(),
        }
    }

    /// Registry with every built-in kind registered.
    pub fn with_defaults(asset_annotation: impl Into<String>) -> Self {
        let mut registry = Self::empty(asset_annotation);
        registry.register_kind::<NamespaceNormalizer>();
        registry.register_kind::<DeploymentNormalizer>();
        registry.register_kind::<PodNormalizer>();
        registry.register_kind::<ServiceNormalizer>();
        registry.register_kind::<ReplicaSetNormalizer>();
        registry.register_kind::<StatefulSetNormalizer>();
        registry.register_kind::<IngressNormalizer>();
        registry
    }

    /// Register (or replace) the normalizer for a kind.
    pub fn register(&mut self, kind: Kind, normalizer: Arc<dyn Normalize>) {
        self.normalizers.insert(kind, normalizer);
    }

    pub fn register_kind<N: KindNormalizer>(&mut self) {
        self.register(N::KIND, Arc::new(Typed::<N>::new()));
    }

    pub fn is_registered(&self, kind: &Kind) -> bool {
        self.normalizers.contains_key(kind)
    }

    pub fn asset_annotation(&self) -> &str {
        &self.asset_annotation
    }

    fn resolve(&self, kind: &Kind) -> &dyn Normalize {
        self.normalizers
            .get(kind)
            .map(|n| n.as_ref())
            .unwrap_or(self.fallback.as_ref())
    }

    fn context<'a>(&'a self, cluster: &'a str) -> NormalizeContext<'a> {
        NormalizeContext {
            cluster,
            asset_annotation: &self.asset_annotation,
        }
    }

    /// Normalize one already-parsed value.
    pub fn normalize_value(&self, cluster: &str, kind: &str, value: Value) -> Result<Entity, DecodeError> {
        let kind = Kind::from(kind);
        self.resolve(&kind).normalize_value(&self.context(cluster), value)
    }

    /// Normalize a raw payload: a single object, or a list when `is_array`.
    ///
    /// Lists are all-or-nothing: the first failing element fails the call.
    pub fn normalize(
        &self,
        cluster: &str,
        kind: &str,
        raw: &[u8],
        is_array: bool,
    ) -> Result<Normalized, DecodeError> {
        let value: Value = serde_json::from_slice(raw).map_err(DecodeError::Json)?;
        let kind = Kind::from(kind);
        let normalizer = self.resolve(&kind);
        let ctx = self.context(cluster);

        if !is_array {
            if value.is_array() {
                return Err(DecodeError::ExpectedObject {
                    kind: kind.to_string(),
                });
            }
            return normalizer.normalize_value(&ctx, value).map(Normalized::One);
        }

        let Value::Array(items) = value else {
            return Err(DecodeError::ExpectedList {
                kind: kind.to_string(),
            });
        };
        items
            .into_iter()
            .enumerate()
            .map(|(index, item)| {
                normalizer
                    .normalize_value(&ctx, item)
                    .map_err(|e| DecodeError::Element {
                        index,
                        source: Box::new(e),
                    })
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Normalized::Many)
    }
}

impl Default for NormalizerRegistry {
    fn default() -> Self {
        Self::with_defaults(DEFAULT_ASSET_ANNOTATION)
    }
}
