use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Hand-written mirror of the external-CSI `snapshot.storage.k8s.io/v1` `VolumeSnapshot` type.
/// Kept minimal: only the fields the clone orchestrator reads (spec.md §4.3). Not owned by this
/// engine's CRD group, so it carries an explicit group/version rather than `cdi.kubevirt.io`.
#[derive(CustomResource, Deserialize, Serialize, Clone, Debug, JsonSchema)]
#[kube(
    group = "snapshot.storage.k8s.io",
    version = "v1",
    kind = "VolumeSnapshot",
    struct = "VolumeSnapshot",
    namespaced,
    status = "VolumeSnapshotStatus"
)]
#[serde(rename_all = "camelCase")]
pub struct VolumeSnapshotSpec {
    /// the PVC this snapshot was (or should be) taken of
    pub source: VolumeSnapshotSource,
    /// the `VolumeSnapshotClass` to use when creating the snapshot
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume_snapshot_class_name: Option<String>,
}

/// Either a live PVC to snapshot, or a pre-existing snapshot content to bind to
#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct VolumeSnapshotSource {
    /// PVC to snapshot
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persistent_volume_claim_name: Option<String>,
    /// pre-existing snapshot content to bind to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume_snapshot_content_name: Option<String>,
}

/// `VolumeSnapshot.status`: the clone orchestrator polls `ready_to_use` before proceeding to
/// restore (spec.md §4.3)
#[derive(Deserialize, Serialize, Clone, Debug, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct VolumeSnapshotStatus {
    /// true once the snapshot content is fully materialized and safe to restore from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ready_to_use: Option<bool>,
    /// size of the underlying PVC, in bytes, at the moment it was snapshotted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restore_size: Option<String>,
    /// set if snapshot creation failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<VolumeSnapshotError>,
}

/// Failure detail surfaced by the external snapshot controller
#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct VolumeSnapshotError {
    /// human-readable failure message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Bare owner-reference-style identity, used by the non-recreation guard (spec.md §4.3: "the
/// orchestrator must not recreate a `VolumeSnapshot` it does not own") without pulling in the
/// full object
#[must_use]
pub fn owned_by(snapshot_meta: &ObjectMeta, owner_uid: &str) -> bool {
    snapshot_meta
        .owner_references
        .as_ref()
        .is_some_and(|refs| refs.iter().any(|r| r.uid == owner_uid))
}
