use cdi_common::clone_strategy::CloneStrategy;
use cdi_common::proxy::ImportProxy;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Cluster-wide configuration singleton: default storage class, resource limits applied to
/// worker pods, and the outbound proxy settings propagated into every import (spec.md §3, §4.7).
/// A cluster expects exactly one object named `config`.
#[derive(CustomResource, Deserialize, Serialize, Clone, Debug, Default, JsonSchema)]
#[kube(
    group = "cdi.kubevirt.io",
    version = "v1beta1",
    kind = "CDIConfig",
    struct = "CdiConfig",
    status = "CdiConfigStatus",
    shortname = "cdiconfig"
)]
#[serde(rename_all = "camelCase")]
pub struct CdiConfigSpec {
    /// overrides the cluster's default `StorageClass` for DataVolumes that don't request one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scratch_space_storage_class: Option<String>,
    /// fractional filesystem overhead used by [`cdi_common::sizing::get_required_space`], keyed
    /// by storage class name; `"default"` applies when a class has no specific entry
    #[serde(default)]
    pub filesystem_overhead: Option<FilesystemOverhead>,
    /// cluster-wide clone strategy override, highest precedence in [`cdi_common::clone_strategy::resolve`]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clone_strategy_override: Option<CloneStrategy>,
    /// proxy settings to use when the cluster has no OpenShift `Proxy` object
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub import_proxy: Option<ImportProxy>,
    /// default TTL, in seconds, a terminal DataVolume is kept around before garbage collection;
    /// unset disables the sweep entirely (spec.md §3, "TTL for completed DVs")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_volume_ttl_seconds: Option<u64>,
    /// named feature gates this cluster has opted into (spec.md §3, "feature gates")
    #[serde(default)]
    pub feature_gates: Vec<String>,
}

/// Per-storage-class filesystem overhead table (spec.md §4.4, §8 invariant 8)
#[derive(Deserialize, Serialize, Clone, Debug, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FilesystemOverhead {
    /// applies to storage classes with no specific entry below
    pub global: f64,
    /// per-storage-class overrides
    #[serde(default)]
    pub storage_class: std::collections::BTreeMap<String, f64>,
}

/// Observed/effective configuration, after merging the OpenShift `Proxy` object (if present)
/// over `spec.import_proxy` (spec.md §4.7)
#[derive(Deserialize, Serialize, Clone, Debug, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CdiConfigStatus {
    /// effective default storage class, mirrored from the cluster for convenience
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_storage_class: Option<String>,
    /// effective proxy configuration, after merging the cluster-wide `Proxy` object
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub import_proxy: Option<ImportProxy>,
}
