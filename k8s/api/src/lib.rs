#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod cluster;
pub mod cluster_version;
pub mod policy;
pub mod report;

pub use k8s_openapi::{
    api::core::v1::{ConfigMap, ObjectReference, Secret},
    NamespaceResourceScope,
};
pub use kube::{
    api::{Api, DeleteParams, ListParams, ObjectMeta, Patch, PatchParams, PostParams, Resource, ResourceExt},
    error::ErrorResponse,
    Client, Error,
};
