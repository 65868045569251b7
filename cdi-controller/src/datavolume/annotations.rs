use std::collections::BTreeMap;

use cdi_api::v1beta1::{DataVolume, DataVolumeSource};
use cdi_common::consts::{is_reserved_annotation, AnnotationKey};
use kube::ResourceExt;

use crate::datavolume::source;
use crate::pvc;

/// Annotations that propagate verbatim from the DV to the managed PVC regardless of the reserved
/// namespace check (spec.md §4.1 invariant 4)
const PROPAGATED_PASSTHROUGH: &[&str] = &[
    "k8s.v1.cni.cncf.io/networks",
    "cdi.kubevirt.io/storage.pod.network",
    "sidecar.istio.io/inject",
];

/// Compute the annotations the reconciler should write onto a freshly created PVC (spec.md §4.1
/// invariants 3, 4, 5). Annotations already present on `existing_pvc_annotations` are left
/// untouched — this function only ever describes the *initial* annotation set at PVC creation.
/// `source` is the effective source (`dv.spec.source` resolved through a `DataSource` when it
/// names a `sourceRef`), so the recorded source tag and default priority class always describe
/// what will actually populate the PVC.
#[must_use]
pub(crate) fn initial_pvc_annotations(dv: &DataVolume, source: &DataVolumeSource) -> BTreeMap<String, String> {
    let mut annotations = BTreeMap::new();

    for (key, value) in dv.metadata.annotations.iter().flatten() {
        if is_reserved_annotation(key) && !PROPAGATED_PASSTHROUGH.contains(&key.as_str()) {
            continue;
        }
        let _prev = annotations.insert(key.clone(), value.clone());
    }

    AnnotationKey::Source.set(&mut annotations, source.tag());

    if let Some(endpoint) = source::endpoint(source) {
        AnnotationKey::Endpoint.set(&mut annotations, endpoint);
    }
    if let Some(cert_config_map) = source::cert_config_map(source) {
        AnnotationKey::CertConfigMap.set(&mut annotations, cert_config_map);
    }
    if let Some(secret_ref) = source::secret_ref(source) {
        AnnotationKey::SecretRef.set(&mut annotations, secret_ref);
    }

    let worker_pod_name = pvc::worker_pod_name(&dv.name_any());
    match *source {
        DataVolumeSource::Upload {} => AnnotationKey::UploadRequest.set(&mut annotations, worker_pod_name),
        DataVolumeSource::Pvc { .. } => AnnotationKey::CloneRequest.set(&mut annotations, worker_pod_name),
        _ => AnnotationKey::ImportPod.set(&mut annotations, worker_pod_name),
    }

    if let Some(ref priority_class) = dv.spec.priority_class_name {
        AnnotationKey::PriorityClassName.set(&mut annotations, priority_class.clone());
    } else if let Some(default) = default_priority_class(source) {
        AnnotationKey::PriorityClassName.set(&mut annotations, default);
    }

    if let Some(content_type) = dv.spec.content_type {
        AnnotationKey::ContentType.set(&mut annotations, content_type_tag(content_type));
    }

    annotations
}

/// Per-source default priority class (spec.md §4.1 invariant 5: "a per-source default priority
/// class flow[s] into the PVC"). `None` sources fall back to the cluster default scheduler
/// behavior.
#[must_use]
fn default_priority_class(source: &DataVolumeSource) -> Option<String> {
    match *source {
        DataVolumeSource::Upload {} => Some("kubevirt-cluster-critical".to_owned()),
        _ => None,
    }
}

fn content_type_tag(content_type: cdi_api::v1beta1::DataVolumeContentType) -> &'static str {
    match content_type {
        cdi_api::v1beta1::DataVolumeContentType::KubeVirt => "kubevirt",
        cdi_api::v1beta1::DataVolumeContentType::Archive => "archive",
    }
}

/// Whether this pre-existing PVC was left for the reconciler by an external populator (spec.md
/// §4.1 invariant 1): annotated `populatedFor=<dv-name>`.
#[must_use]
pub(crate) fn is_pre_populated_for(pvc_annotations: &BTreeMap<String, String>, dv_name: &str) -> bool {
    AnnotationKey::PopulatedFor.get(pvc_annotations).as_deref() == Some(dv_name)
}
