use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Cluster-scoped handoff record driving a cross-namespace PVC move (spec.md §4.3, "cross
/// namespace ObjectTransfer protocol"). Cluster-scoped because the source and target live in
/// different namespaces.
#[derive(CustomResource, Deserialize, Serialize, Clone, Debug, JsonSchema)]
#[kube(
    group = "cdi.kubevirt.io",
    version = "v1beta1",
    kind = "ObjectTransfer",
    struct = "ObjectTransfer",
    status = "ObjectTransferStatus",
    shortname = "ot"
)]
#[serde(rename_all = "camelCase")]
pub struct ObjectTransferSpec {
    /// the PVC to move
    pub source: ObjectTransferSource,
    /// where it should end up
    pub target: ObjectTransferTarget,
    /// whether the transfer, once complete, should delete the source side
    #[serde(default)]
    pub delete_after_copy: bool,
}

/// The PVC being moved
#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ObjectTransferSource {
    /// kind of the source object, currently always `PersistentVolumeClaim`
    pub kind: String,
    /// source namespace
    pub namespace: String,
    /// source name
    pub name: String,
}

/// Where the moved PVC should land
#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ObjectTransferTarget {
    /// destination namespace
    pub namespace: String,
    /// destination name, defaults to the source name when omitted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Lifecycle phase of the transfer, driven by the clone orchestrator
#[derive(Deserialize, Serialize, Clone, Debug, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ObjectTransferStatus {
    /// current phase string, e.g. `PendingTransfer`, `RenameTargetPending`, `Complete`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<String>,
}
