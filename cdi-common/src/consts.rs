use std::collections::BTreeMap;

/// Reserved annotation namespace; DV annotations under this prefix are never copied verbatim
/// onto the managed PVC (spec.md §4.1 invariant 3)
pub const RESERVED_ANNOTATION_PREFIX: &str = "cdi.kubevirt.io/storage.";

/// Label attached to every subresource the reconciler owns, naming the owning `DataVolume`
pub const LABEL_OWNED_BY_DATAVOLUME: &str = "cdi.kubevirt.io/storage.owned-by";
/// Label set on the worker pod so Prometheus picks up its metrics endpoint
pub const LABEL_PROMETHEUS_SCRAPE: &str = "cdi.kubevirt.io/storage.prometheus-scrape";
/// Label set on a clone-source worker pod, value is `<target-pvc-uid>-source-pod`
pub const LABEL_CLONE_UNIQUE_ID: &str = "cdi.kubevirt.io/storage.clone-unique-id";
/// Label set on objects discoverable as belonging to one logical import/clone, used on
/// `VolumeSnapshot`s created by the clone orchestrator (spec.md §3, VolumeSnapshot)
pub const LABEL_APP_PART_OF: &str = "app.kubernetes.io/part-of";

/// Field manager identifier used on every server-side-apply write this engine performs
pub const FIELD_MANAGER: &str = "cdi.kubevirt.io/datavolume-controller";

/// Curated annotation keys that drive the worker-pod lifecycle protocol (spec.md §4.1 table,
/// §4.2). All reads and writes of PVC/DV annotations go through these, never a bare string
/// literal, so a typo in a key name is a compile error rather than a silent no-op.
#[non_exhaustive]
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AnnotationKey {
    /// source URL
    Endpoint,
    /// `http`/`s3`/`registry`/... source tag
    Source,
    /// TLS trust bundle config map name
    CertConfigMap,
    /// basic-auth / S3 credential secret name
    SecretRef,
    /// `kubevirt` (disk image) or `archive` (tarball onto FS)
    ContentType,
    /// presence requests an importer pod
    ImportPod,
    /// presence requests an uploader pod
    UploadRequest,
    /// presence requests a cloner pod
    CloneRequest,
    /// mirror of the worker pod's phase
    PodPhase,
    /// worker pod restart count, mirrored to `DataVolume.status.restartCount`
    PodRestarts,
    /// set by the worker pod once preallocation has been applied
    PreallocationApplied,
    /// current checkpoint name (multi-stage import)
    CurrentCheckpoint,
    /// previous checkpoint name (multi-stage import)
    PreviousCheckpoint,
    /// whether `currentCheckpoint` is the last one to copy
    FinalCheckpoint,
    /// uid of the pod currently processing `currentCheckpoint`
    CurrentPodId,
    /// final annotation, set once the whole multi-stage import has completed
    MultiStageImportDone,
    /// marks a PVC as pre-populated by an external process for the named `DataVolume`
    PopulatedFor,
    /// set on the `DataVolume` once it has adopted a pre-populated PVC
    PrePopulated,
    /// debug opt-in: keep the worker pod around after it completes
    PodRetainAfterCompletion,
    /// VDDK: the ESX/vCenter host connection used for the import
    VddkHostConnection,
    /// VDDK: library version used for the import
    VddkVersion,
    /// VDDK: init image carrying the VDDK library
    VddkInitImageUrl,
    /// priority class propagated from the DV (or defaulted per-source)
    PriorityClassName,
    /// set by the clone orchestrator once the target PVC has bound from a snapshot/CSI source
    CloneOf,
    /// user-authoritative override of the TTL garbage collector (spec.md §9 open question)
    DeleteAfterCompletion,
}

impl AnnotationKey {
    /// The fully-qualified annotation key string
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Endpoint => "cdi.kubevirt.io/storage.import.endpoint",
            Self::Source => "cdi.kubevirt.io/storage.import.source",
            Self::CertConfigMap => "cdi.kubevirt.io/storage.import.certConfigMap",
            Self::SecretRef => "cdi.kubevirt.io/storage.import.secretRef",
            Self::ContentType => "cdi.kubevirt.io/storage.contentType",
            Self::ImportPod => "cdi.kubevirt.io/storage.import.importPodName",
            Self::UploadRequest => "cdi.kubevirt.io/storage.upload.target",
            Self::CloneRequest => "cdi.kubevirt.io/storage.clone.target",
            Self::PodPhase => "cdi.kubevirt.io/storage.pod.phase",
            Self::PodRestarts => "cdi.kubevirt.io/storage.pod.restarts",
            Self::PreallocationApplied => "cdi.kubevirt.io/storage.preallocation",
            Self::CurrentCheckpoint => "cdi.kubevirt.io/storage.checkpoint.current",
            Self::PreviousCheckpoint => "cdi.kubevirt.io/storage.checkpoint.previous",
            Self::FinalCheckpoint => "cdi.kubevirt.io/storage.checkpoint.final",
            Self::CurrentPodId => "cdi.kubevirt.io/storage.checkpoint.podId",
            Self::MultiStageImportDone => "cdi.kubevirt.io/storage.multiStageImportDone",
            Self::PopulatedFor => "cdi.kubevirt.io/storage.populatedFor",
            Self::PrePopulated => "cdi.kubevirt.io/storage.prePopulated",
            Self::PodRetainAfterCompletion => "cdi.kubevirt.io/storage.pod.retainAfterCompletion",
            Self::VddkHostConnection => "cdi.kubevirt.io/storage.vddk.hostConnection",
            Self::VddkVersion => "cdi.kubevirt.io/storage.vddk.version",
            Self::VddkInitImageUrl => "cdi.kubevirt.io/storage.vddk.initImageURL",
            Self::PriorityClassName => "cdi.kubevirt.io/storage.priorityClassName",
            Self::CloneOf => "cdi.kubevirt.io/storage.clone.cloneOf",
            Self::DeleteAfterCompletion => "cdi.kubevirt.io/storage.deleteAfterCompletion",
        }
    }

    /// Read this key out of an annotation map
    #[must_use]
    pub fn get(self, annotations: &BTreeMap<String, String>) -> Option<String> {
        annotations.get(self.as_str()).cloned()
    }

    /// Write this key into an annotation map, returning the previous value if any
    pub fn set(self, annotations: &mut BTreeMap<String, String>, value: impl Into<String>) {
        let _prev = annotations.insert(self.as_str().to_owned(), value.into());
    }

    /// Remove this key from an annotation map
    pub fn remove(self, annotations: &mut BTreeMap<String, String>) {
        let _prev = annotations.remove(self.as_str());
    }
}

/// Per-checkpoint annotation key `checkpointsCopied.<name>` (spec.md §4.1 table). Unlike the
/// other keys this one is parameterized, so it lives outside `AnnotationKey`.
#[must_use]
pub fn checkpoints_copied_key(checkpoint: &str) -> String {
    format!("cdi.kubevirt.io/storage.checkpointsCopied.{checkpoint}")
}

/// Whether an annotation key falls under the reserved namespace and must not be copied
/// verbatim from the DV onto the managed PVC
#[must_use]
pub fn is_reserved_annotation(key: &str) -> bool {
    key.starts_with(RESERVED_ANNOTATION_PREFIX)
}
