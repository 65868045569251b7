// The `JsonSchema` and `CustomResource` macro generates code that does not pass the clippy lint.
#![allow(clippy::str_to_string)]
#![allow(clippy::missing_docs_in_private_items)]

use cdi_common::registry::{AccessMode, VolumeMode};
use garde::Validate;
use k8s_openapi::api::core::v1::ResourceRequirements;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use k8s_openapi::serde::{Deserialize, Serialize};
use kube::CustomResource;
use schemars::JsonSchema;

/// A populated, ready-to-mount volume request: declares where the bytes come from and how big
/// the resulting PVC should be (spec.md §3 DataVolume)
#[derive(CustomResource, Deserialize, Serialize, Clone, Debug, JsonSchema, Validate)]
#[kube(
    group = "cdi.kubevirt.io",
    version = "v1beta1",
    kind = "DataVolume",
    singular = "datavolume",
    plural = "datavolumes",
    struct = "DataVolume",
    namespaced,
    status = "DataVolumeStatus",
    shortname = "dv",
    printcolumn = r#"{"name":"Phase", "type":"string", "description":"The phase of the DataVolume", "jsonPath":".status.phase"}"#,
    printcolumn = r#"{"name":"Progress", "type":"string", "description":"Import progress", "jsonPath":".status.progress"}"#,
    printcolumn = r#"{"name":"Restarts", "type":"integer", "description":"Worker pod restart count", "jsonPath":".status.restartCount"}"#,
    printcolumn = r#"{"name":"Age", "type":"date", "description":"The DataVolume age", "jsonPath":".metadata.creationTimestamp"}"#
)]
#[schemars(rename_all = "camelCase")]
#[garde(allow_unvalidated)]
#[serde(rename_all = "camelCase")]
pub struct DataVolumeSpec {
    /// where the volume's contents come from
    #[garde(dive)]
    pub source: DataVolumeSource,
    /// legacy PVC spec; mutually exclusive in practice with `storage`, validated by the reconciler
    #[garde(skip)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pvc: Option<LegacyPvcSpec>,
    /// access modes, volume mode, size and storage class for the managed PVC
    #[garde(dive)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage: Option<StorageSpec>,
    /// whether the payload is a disk image (`KubeVirt`) or a tarball to unpack (`Archive`)
    #[garde(skip)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<DataVolumeContentType>,
    /// ordered list of incremental deltas for a multi-stage import (spec.md §4.2)
    #[garde(dive)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checkpoints: Option<Vec<DataVolumeCheckpoint>>,
    /// whether the last entry in `checkpoints` is the final one to copy
    #[garde(skip)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_checkpoint: Option<bool>,
    /// priority class hint propagated to the worker pod
    #[garde(skip)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority_class_name: Option<String>,
    /// whether the worker pod should preallocate the full requested size up front
    #[garde(skip)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preallocation: Option<bool>,
}

/// Where a `DataVolume`'s contents come from (spec.md §3: "a source discriminator"). A tagged
/// enum, not runtime-inspected fields, per REDESIGN FLAGS ("Per-source dispatch").
#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema, Validate)]
#[serde(rename_all = "camelCase", tag = "type")]
pub enum DataVolumeSource {
    /// import from an HTTP(S) endpoint
    Http {
        /// source URL
        #[garde(pattern("^https?://"))]
        #[schemars(regex(pattern = "^https?://"))]
        url: String,
        /// basic-auth credential secret name
        #[garde(skip)]
        #[serde(skip_serializing_if = "Option::is_none")]
        secret_ref: Option<String>,
        /// TLS trust bundle config map name
        #[garde(skip)]
        #[serde(skip_serializing_if = "Option::is_none")]
        cert_config_map: Option<String>,
        /// additional HTTP headers, `key: value` encoded
        #[garde(skip)]
        #[serde(skip_serializing_if = "Option::is_none")]
        extra_headers: Option<Vec<String>>,
    },
    /// import from an S3-compatible object store
    S3 {
        /// `s3://bucket/key` source URL
        #[garde(skip)]
        url: String,
        /// access-key/secret-key credential secret name
        #[garde(skip)]
        #[serde(skip_serializing_if = "Option::is_none")]
        secret_ref: Option<String>,
        /// TLS trust bundle config map name
        #[garde(skip)]
        #[serde(skip_serializing_if = "Option::is_none")]
        cert_config_map: Option<String>,
    },
    /// import a disk image from a container registry
    Registry {
        /// OCI image URL, mutually exclusive with `image_stream`
        #[garde(skip)]
        #[serde(skip_serializing_if = "Option::is_none")]
        url: Option<String>,
        /// OpenShift ImageStream reference, mutually exclusive with `url`
        #[garde(skip)]
        #[serde(skip_serializing_if = "Option::is_none")]
        image_stream: Option<String>,
        /// pull-secret name
        #[garde(skip)]
        #[serde(skip_serializing_if = "Option::is_none")]
        secret_ref: Option<String>,
        /// TLS trust bundle config map name
        #[garde(skip)]
        #[serde(skip_serializing_if = "Option::is_none")]
        cert_config_map: Option<String>,
    },
    /// clone an existing PVC, possibly across namespaces
    Pvc {
        /// source PVC's namespace
        #[garde(skip)]
        namespace: String,
        /// source PVC's name
        #[garde(skip)]
        name: String,
    },
    /// wait for a client to stream bytes via the upload proxy
    Upload {},
    /// a zero-filled image of the requested size
    Blank {},
    /// import from a VMware VM disk via VDDK
    Vddk {
        /// vCenter/ESX URL
        #[garde(skip)]
        url: String,
        /// VM UUID
        #[garde(skip)]
        #[serde(skip_serializing_if = "Option::is_none")]
        uuid: Option<String>,
        /// VMDK backing file path inside the VM
        #[garde(skip)]
        #[serde(skip_serializing_if = "Option::is_none")]
        backing_file: Option<String>,
        /// host certificate thumbprint
        #[garde(skip)]
        #[serde(skip_serializing_if = "Option::is_none")]
        thumbprint: Option<String>,
        /// vCenter credential secret name
        #[garde(skip)]
        #[serde(skip_serializing_if = "Option::is_none")]
        secret_ref: Option<String>,
        /// image carrying the (non-redistributable) VDDK library
        #[garde(skip)]
        #[serde(skip_serializing_if = "Option::is_none")]
        init_image_url: Option<String>,
    },
    /// import from an oVirt/RHV disk via imageio
    Imageio {
        /// imageio endpoint URL
        #[garde(skip)]
        url: String,
        /// disk id on the imageio endpoint
        #[garde(skip)]
        disk_id: String,
        /// credential secret name
        #[garde(skip)]
        #[serde(skip_serializing_if = "Option::is_none")]
        secret_ref: Option<String>,
        /// TLS trust bundle config map name
        #[garde(skip)]
        #[serde(skip_serializing_if = "Option::is_none")]
        cert_config_map: Option<String>,
    },
    /// indirection through a `DataSource` object, resolved at reconcile time (SPEC_FULL.md §3)
    SourceRef {
        /// the kind of object referenced, currently always `DataSource`
        #[garde(skip)]
        kind: String,
        /// defaults to the DataVolume's own namespace when absent
        #[garde(skip)]
        #[serde(skip_serializing_if = "Option::is_none")]
        namespace: Option<String>,
        /// name of the referenced `DataSource`
        #[garde(skip)]
        name: String,
    },
}

impl DataVolumeSource {
    /// the `source=` annotation tag written onto the managed PVC (spec.md §4.1 invariant 5)
    #[must_use]
    pub fn tag(&self) -> &'static str {
        match *self {
            Self::Http { .. } => "http",
            Self::S3 { .. } => "s3",
            Self::Registry { .. } => "registry",
            Self::Pvc { .. } => "pvc",
            Self::Upload {} => "upload",
            Self::Blank {} => "blank",
            Self::Vddk { .. } => "vddk",
            Self::Imageio { .. } => "imageio",
            Self::SourceRef { .. } => "source-ref",
        }
    }

    /// whether this source variant is a PVC clone (host-assisted, snapshot, or CSI)
    #[must_use]
    pub fn is_clone(&self) -> bool {
        matches!(*self, Self::Pvc { .. })
    }
}

/// Legacy `spec.pvc`: a bare `PersistentVolumeClaimSpec`-shaped request, superseded by
/// `spec.storage` but still accepted for backward compatibility
#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct LegacyPvcSpec {
    /// allowed access modes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_modes: Option<Vec<AccessMode>>,
    /// requested resources (notably `requests.storage`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourceRequirements>,
    /// explicit storage class, falls back to the cluster default
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_class_name: Option<String>,
}

/// `spec.storage`: the preferred way to request access modes, volume mode, size, and storage
/// class (spec.md §3, §4.4)
#[derive(Deserialize, Serialize, Clone, Debug, Default, JsonSchema, Validate)]
#[serde(rename_all = "camelCase")]
#[garde(allow_unvalidated)]
pub struct StorageSpec {
    /// allowed access modes; when omitted, derived from the `StorageProfile`
    #[garde(skip)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_modes: Option<Vec<AccessMode>>,
    /// filesystem or block; when omitted, derived from the `StorageProfile`
    #[garde(skip)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume_mode: Option<VolumeMode>,
    /// requested resources; `requests.storage` is mandatory (spec.md §4.4 rule 5)
    #[garde(skip)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourceRequirements>,
    /// explicit storage class, falls back to the cluster default
    #[garde(skip)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_class_name: Option<String>,
}

/// Whether the payload is a disk image or a tarball to unpack onto a filesystem
#[derive(Copy, Clone, Deserialize, Serialize, Debug, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "PascalCase")]
pub enum DataVolumeContentType {
    /// a virtual-machine disk image, possibly requiring format conversion
    KubeVirt,
    /// a tarball to unpack onto a filesystem volume
    Archive,
}

/// One incremental delta in a multi-stage import (spec.md §4.2)
#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema, Validate)]
#[garde(allow_unvalidated)]
pub struct DataVolumeCheckpoint {
    /// the checkpoint to diff from, empty string for the very first checkpoint
    #[garde(skip)]
    pub previous: String,
    /// the checkpoint to diff to
    #[garde(skip)]
    pub current: String,
}

/// Observed reconciliation state of a `DataVolume` (spec.md §3, §4.1)
#[derive(Deserialize, Serialize, Clone, Debug, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DataVolumeStatus {
    /// current lifecycle phase
    #[serde(default)]
    pub phase: DataVolumePhase,
    /// worker pod restart count, mirrored from the PVC's `podRestarts` annotation
    #[serde(default)]
    pub restart_count: i32,
    /// `"N/A"` or `"X.YZ%"`
    #[serde(default = "default_progress")]
    pub progress: String,
    /// `Bound`/`Running`/`Ready` conditions
    #[serde(default)]
    pub conditions: Vec<DataVolumeCondition>,
    /// name of the bound PVC, once known (SPEC_FULL.md §3 addition)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub claim_name: Option<String>,
}

fn default_progress() -> String {
    "N/A".to_owned()
}

/// `DataVolume.status.phase` (spec.md §4.1)
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "PascalCase")]
pub enum DataVolumePhase {
    /// no phase observed yet
    #[default]
    Unset,
    /// no PVC exists yet, or the PVC is pending
    Pending,
    /// waiting for a first consumer pod before binding (storage class is `WaitForFirstConsumer`)
    WaitForFirstConsumer,
    /// PVC is bound
    PvcBound,
    /// import worker pod requested, not yet running
    ImportScheduled,
    /// import worker pod running
    ImportInProgress,
    /// upload worker pod requested, not yet ready
    UploadScheduled,
    /// upload worker pod ready, waiting for a client to stream bytes
    UploadReady,
    /// host-assisted clone worker pod requested, not yet running
    CloneScheduled,
    /// host-assisted clone worker pod running
    CloneInProgress,
    /// snapshot clone: snapshot requested, not yet `ReadyToUse`
    SnapshotForSmartCloneInProgress,
    /// snapshot clone: target PVC created from the snapshot, not yet bound
    SmartClonePvcInProgress,
    /// CSI-native clone worker in progress
    CsiCloneInProgress,
    /// target PVC is being moved across namespaces
    NamespaceTransferInProgress,
    /// target PVC capacity is being expanded post-clone
    ExpansionInProgress,
    /// a multi-stage import has copied the current checkpoint and awaits the next one
    Paused,
    /// terminal success
    Succeeded,
    /// terminal failure
    Failed,
}

/// The kind of condition reported on a `DataVolume` (spec.md §4.1)
#[derive(Copy, Clone, Debug, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "PascalCase")]
pub enum DataVolumeConditionType {
    /// true iff the managed PVC is bound
    Bound,
    /// true iff the worker pod is running
    Running,
    /// true iff the phase is `Succeeded`
    Ready,
}

/// tri-state condition status, matching the Kubernetes condition convention
#[derive(Copy, Clone, Debug, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "PascalCase")]
pub enum ConditionStatus {
    /// condition holds
    True,
    /// condition does not hold
    False,
    /// condition could not be evaluated
    Unknown,
}

/// One entry in `DataVolume.status.conditions`
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DataVolumeCondition {
    /// which condition this is
    #[serde(rename = "type")]
    pub type_: DataVolumeConditionType,
    /// current status
    pub status: ConditionStatus,
    /// machine-readable reason for the current status
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// human-readable message for the current status
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// when the condition last changed status
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<Time>,
}

impl DataVolumeCondition {
    /// Build or refresh a condition, only stamping `last_transition_time` when the status
    /// actually changes
    #[must_use]
    pub fn upsert(
        existing: &[Self],
        type_: DataVolumeConditionType,
        status: ConditionStatus,
        reason: impl Into<String>,
        message: impl Into<String>,
        now: Time,
    ) -> Self {
        let prev = existing.iter().find(|c| c.type_ == type_);
        let last_transition_time = match prev {
            Some(prev) if prev.status == status => prev.last_transition_time.clone(),
            _ => Some(now),
        };
        Self {
            type_,
            status,
            reason: Some(reason.into()),
            message: Some(message.into()),
            last_transition_time,
        }
    }
}

#[cfg(test)]
mod test {
    use super::{DataVolumeContentType, DataVolumeSource, DataVolumeSpec};
    use garde::Validate;

    fn http_spec(url: &str) -> DataVolumeSpec {
        DataVolumeSpec {
            source: DataVolumeSource::Http {
                url: url.to_owned(),
                secret_ref: None,
                cert_config_map: None,
                extra_headers: None,
            },
            pvc: None,
            storage: None,
            content_type: Some(DataVolumeContentType::KubeVirt),
            checkpoints: None,
            final_checkpoint: None,
            priority_class_name: None,
            preallocation: None,
        }
    }

    #[test]
    fn validation_ok() {
        let dv = http_spec("https://example.com/disk.img");
        assert!(Validate::validate(&dv, &()).is_ok());
    }

    #[test]
    fn validation_bad_url_scheme() {
        let dv = http_spec("ftp://example.com/disk.img");
        assert!(Validate::validate(&dv, &())
            .unwrap_err()
            .to_string()
            .contains("source"));
    }

    #[test]
    fn source_tag_matches_variant() {
        assert_eq!(http_spec("https://x").source.tag(), "http");
        assert!(!http_spec("https://x").source.is_clone());
        let clone_source = DataVolumeSource::Pvc {
            namespace: "ns".to_owned(),
            name: "src".to_owned(),
        };
        assert_eq!(clone_source.tag(), "pvc");
        assert!(clone_source.is_clone());
    }
}
