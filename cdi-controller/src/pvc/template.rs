use std::collections::BTreeMap;

use cdi_api::v1beta1::{CdiConfig, DataVolume, DataVolumeSource};
use cdi_common::consts::{AnnotationKey, LABEL_OWNED_BY_DATAVOLUME, LABEL_PROMETHEUS_SCRAPE};
use cdi_common::registry::ClaimPropertySet;
use k8s_openapi::api::core::v1::{
    Container, ContainerPort, EnvVar as KubeEnvVar, PersistentVolumeClaim,
    PersistentVolumeClaimSpec, Pod, PodSpec,
};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
use kube::{Resource, ResourceExt};

use crate::datavolume::source as env;

/// Importer/uploader/cloner image, one per source tag (spec.md §6: "a per-source worker image").
/// Kept as a lookup rather than a per-variant field since the image tag tracks the CDI release,
/// not the DV spec.
fn worker_image(source: &DataVolumeSource) -> &'static str {
    match *source {
        DataVolumeSource::Http { .. }
        | DataVolumeSource::S3 { .. }
        | DataVolumeSource::Registry { .. }
        | DataVolumeSource::Blank {}
        | DataVolumeSource::SourceRef { .. } => "quay.io/kubevirt/cdi-importer:latest",
        DataVolumeSource::Pvc { .. } => "quay.io/kubevirt/cdi-cloner:latest",
        DataVolumeSource::Upload {} => "quay.io/kubevirt/cdi-uploadserver:latest",
        DataVolumeSource::Vddk { .. } => "quay.io/kubevirt/cdi-importer:latest",
        DataVolumeSource::Imageio { .. } => "quay.io/kubevirt/cdi-importer:latest",
    }
}

/// Build a new, unbound PVC for `dv` (spec.md §4.1: "the reconciler creates the managed PVC").
/// `claim_property_set` and `requested_bytes` are the storage-profile resolver's output (spec.md
/// §4.4) rather than `dv.spec.storage` read verbatim, so a profile-resolved access mode/volume
/// mode and a filesystem-overhead-adjusted size always win over whatever the DV asked for
/// directly. Annotations are filled in by the caller via `initial_pvc_annotations`.
#[must_use]
pub(crate) fn empty_pvc(dv: &DataVolume, claim_property_set: &ClaimPropertySet, requested_bytes: i64) -> PersistentVolumeClaim {
    let name = dv.name_any();
    let namespace = dv.namespace();

    let storage_class_name = dv.spec.storage.as_ref().and_then(|s| s.storage_class_name.clone());
    let mut labels = BTreeMap::new();
    let _prev = labels.insert(LABEL_OWNED_BY_DATAVOLUME.to_owned(), name.clone());

    let mut requests = BTreeMap::new();
    let _prev = requests.insert("storage".to_owned(), Quantity(requested_bytes.to_string()));

    PersistentVolumeClaim {
        metadata: ObjectMeta {
            name: Some(name),
            namespace,
            labels: Some(labels),
            owner_references: Some(vec![owner_reference(dv)]),
            ..ObjectMeta::default()
        },
        spec: Some(PersistentVolumeClaimSpec {
            access_modes: Some(
                claim_property_set
                    .access_modes
                    .iter()
                    .map(|mode| format!("{mode:?}"))
                    .collect(),
            ),
            volume_mode: claim_property_set.volume_mode.map(|mode| format!("{mode:?}")),
            storage_class_name,
            resources: Some(k8s_openapi::api::core::v1::ResourceRequirements {
                requests: Some(requests),
                ..Default::default()
            }),
            ..PersistentVolumeClaimSpec::default()
        }),
        status: None,
    }
}

/// Build an `OwnerReference` pointing back at `dv`, so the PVC is garbage collected with its DV
#[must_use]
pub(crate) fn owner_reference(dv: &DataVolume) -> OwnerReference {
    OwnerReference {
        api_version: "cdi.kubevirt.io/v1beta1".to_owned(),
        kind: "DataVolume".to_owned(),
        name: dv.name_any(),
        uid: dv.uid().unwrap_or_default(),
        controller: Some(true),
        block_owner_deletion: Some(true),
    }
}

/// Build an `OwnerReference` pointing back at `pvc`, so the worker pod is garbage collected
/// following the PVC's own deletion rather than the DV's (spec.md §4.5: "sets owner reference to
/// PVC (not DV — so pod cleanup follows PVC)"; §3: "Worker Pod … Owned by the PVC").
#[must_use]
fn owner_reference_from_pvc(pvc: &PersistentVolumeClaim) -> OwnerReference {
    OwnerReference {
        api_version: "v1".to_owned(),
        kind: "PersistentVolumeClaim".to_owned(),
        name: pvc.name_any(),
        uid: pvc.uid().unwrap_or_default(),
        controller: Some(true),
        block_owner_deletion: Some(true),
    }
}

/// Whether `pvc` already carries an owner reference back to `dv` (spec.md §4.1 invariant 1: a
/// pre-existing PVC with no such reference belongs to someone else, or to nobody).
#[must_use]
pub(crate) fn is_owned_by(pvc: &PersistentVolumeClaim, dv: &DataVolume) -> bool {
    let dv_uid = dv.uid().unwrap_or_default();
    pvc.metadata
        .owner_references
        .as_ref()
        .is_some_and(|refs| refs.iter().any(|r| r.uid == dv_uid))
}

/// Build the worker pod that will populate `pvc` for `dv` (spec.md §6: per-source pod template +
/// environment projection). `source` is the *effective* source — `dv.spec.source` resolved
/// through a `DataSource` when it names a `sourceRef` — never `dv.spec.source` directly, so a
/// `sourceRef` DV gets the same `IMPORTER_ENDPOINT`/image as the concrete source it points at.
/// The pod name is deterministic (`super::worker_pod_name`), so re-running this after a crash is
/// idempotent: the store layer reports `AlreadyExists` and the caller treats that the same as a
/// successful create.
#[must_use]
pub(crate) fn worker_pod(dv: &DataVolume, pvc: &PersistentVolumeClaim, cdi_config: &CdiConfig, source: &DataVolumeSource) -> Pod {
    let name = super::worker_pod_name(&dv.name_any());
    let mut labels = BTreeMap::new();
    let _prev = labels.insert(LABEL_OWNED_BY_DATAVOLUME.to_owned(), dv.name_any());
    let _prev = labels.insert(LABEL_PROMETHEUS_SCRAPE.to_owned(), "true".to_owned());

    let pvc_annotations = pvc.metadata.annotations.clone().unwrap_or_default();
    let content_type_tag = AnnotationKey::ContentType
        .get(&pvc_annotations)
        .unwrap_or_else(|| "kubevirt".to_owned());

    let owner_uid = dv.uid().unwrap_or_default();
    let proxy = cdi_config.status.import_proxy.as_ref();
    let mut env_vars: Vec<KubeEnvVar> = env::project_env(&owner_uid, source, &content_type_tag, proxy)
        .into_iter()
        .map(|var| KubeEnvVar {
            name: var.name.to_owned(),
            value: Some(var.value),
            value_from: None,
        })
        .collect();

    // multi-stage checkpoint import: the current/previous/final checkpoint names live on the
    // PVC's annotations (spec.md §4.1 table), set by `checkpoint::apply` ahead of each worker pod
    if let Some(current) = AnnotationKey::CurrentCheckpoint.get(&pvc_annotations) {
        let previous = AnnotationKey::PreviousCheckpoint.get(&pvc_annotations).unwrap_or_default();
        let final_checkpoint = AnnotationKey::FinalCheckpoint.get(&pvc_annotations).as_deref() == Some("true");
        env_vars.extend(
            env::checkpoint_env(&previous, &current, final_checkpoint)
                .into_iter()
                .map(|var| KubeEnvVar {
                    name: var.name.to_owned(),
                    value: Some(var.value),
                    value_from: None,
                }),
        );
    }

    Pod {
        metadata: ObjectMeta {
            name: Some(name),
            namespace: dv.namespace(),
            labels: Some(labels),
            owner_references: Some(vec![owner_reference_from_pvc(pvc)]),
            ..ObjectMeta::default()
        },
        spec: Some(PodSpec {
            restart_policy: Some("OnFailure".to_owned()),
            containers: vec![Container {
                name: "cdi-worker".to_owned(),
                image: Some(worker_image(source).to_owned()),
                env: Some(env_vars),
                ports: Some(vec![ContainerPort {
                    name: Some(crate::consts::WORKER_METRICS_PORT_NAME.to_owned()),
                    container_port: crate::consts::WORKER_METRICS_PORT,
                    ..ContainerPort::default()
                }]),
                ..Container::default()
            }],
            ..PodSpec::default()
        }),
        status: None,
    }
}
