use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Named, reusable pointer to a `DataVolume` source, resolved by a `DataVolume`'s
/// `spec.source.sourceRef` (SPEC_FULL.md §3 supplement: spec.md names the `sourceRef` variant
/// but leaves its target undefined)
#[derive(CustomResource, Deserialize, Serialize, Clone, Debug, JsonSchema)]
#[kube(
    group = "cdi.kubevirt.io",
    version = "v1beta1",
    kind = "DataSource",
    struct = "DataSource",
    namespaced,
    status = "DataSourceStatus",
    shortname = "das"
)]
#[serde(rename_all = "camelCase")]
pub struct DataSourceSpec {
    /// the source this `DataSource` points at
    pub source: DataSourceSource,
}

/// What a `DataSource` resolves to: another PVC, or a snapshot to clone from. Kept distinct
/// from `DataVolumeSource` since a `DataSource` only ever names clone-able targets.
#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum DataSourceSource {
    /// points at an existing PVC
    Pvc {
        /// namespace of the referenced PVC
        namespace: String,
        /// name of the referenced PVC
        name: String,
    },
    /// points at an existing `VolumeSnapshot`
    Snapshot {
        /// namespace of the referenced snapshot
        namespace: String,
        /// name of the referenced snapshot
        name: String,
    },
}

/// Whether the referenced object currently exists and is ready to clone from
#[derive(Deserialize, Serialize, Clone, Debug, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DataSourceStatus {
    /// conditions mirroring the resolved target's readiness, reusing the `DataVolume` condition
    /// shape since both describe "is there a ready clone source"
    #[serde(default)]
    pub conditions: Vec<super::datavolume::DataVolumeCondition>,
}
