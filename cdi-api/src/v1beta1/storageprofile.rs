use cdi_common::clone_strategy::CloneStrategy;
use cdi_common::registry::ClaimPropertySet;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Per-`StorageClass` capability and preference profile (spec.md §3, §4.4). Named to match the
/// `StorageClass` it describes, cluster-scoped since a storage class is cluster-scoped.
#[derive(CustomResource, Deserialize, Serialize, Clone, Debug, Default, JsonSchema)]
#[kube(
    group = "cdi.kubevirt.io",
    version = "v1beta1",
    kind = "StorageProfile",
    struct = "StorageProfile",
    status = "StorageProfileStatus",
    shortname = "sp"
)]
#[serde(rename_all = "camelCase")]
pub struct StorageProfileSpec {
    /// explicit capability override, takes precedence over anything the resolver would derive
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claim_property_sets: Option<Vec<ClaimPropertySet>>,
    /// explicit clone strategy override for PVCs provisioned through this storage class
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clone_strategy: Option<CloneStrategy>,
}

/// Resolver output: what the resolver actually decided to use, after falling back through the
/// static capability table and live PV enumeration (spec.md §4.4)
#[derive(Deserialize, Serialize, Clone, Debug, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct StorageProfileStatus {
    /// the storage class this profile mirrors
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_class: Option<String>,
    /// the CSI/in-tree provisioner backing the storage class
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provisioner: Option<String>,
    /// the resolved, ordered list of usable `{accessModes, volumeMode}` combinations
    #[serde(default)]
    pub claim_property_sets: Vec<ClaimPropertySet>,
}

/// Convenience alias matching the field name used elsewhere, kept distinct from the spec's
/// `claimPropertySets` field so call sites read naturally (`status.claim_property_sets`)
pub type StorageProfileClaimPropertySets = Vec<ClaimPropertySet>;
