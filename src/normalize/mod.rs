//! Normalization of heterogeneous resource payloads into canonical entities
//!
//! One normalizer per supported kind, registered in a `NormalizerRegistry`
//! keyed by `Kind`. Unknown kinds fall back to a pass-through normalizer.
//! Derived attributes (`asset`, `application`, `owner`) are computed through
//! the `HasObjectMeta` capability that every decoded kind implements.

mod kind;
mod kinds;
mod meta;
mod registry;


pub use kind::Kind;
pub use kinds::{
    DeploymentNormalizer, IngressNormalizer, NamespaceNormalizer, PodNormalizer,
    ReplicaSetNormalizer, ServiceNormalizer, StatefulSetNormalizer,
};
pub use meta::{
    derive_applications, derive_asset, derive_owner, HasObjectMeta, ObjectMeta, OwnerReference,
    APP_LABEL, K8S_APP_LABEL,
};
pub use registry::{
    DecodeError, KindNormalizer, Normalize, NormalizeContext, Normalized, NormalizerRegistry,
    PassThrough, Typed, DEFAULT_ASSET_ANNOTATION,
};
