use cdi_common::consts::{AnnotationKey, LABEL_CLONE_UNIQUE_ID};
use k8s_openapi::api::core::v1::Pod;

use crate::datavolume::phase::PodPhase;

/// Whether `pod` is owned by the PVC named `pvc_uid` (spec.md §4.5: the worker pod's owner
/// reference points at the PVC, not the DV, so this is how the reconciler finds its own worker
/// pod back given only the PVC)
#[must_use]
fn owned_by_pvc(pod: &Pod, pvc_uid: &str) -> bool {
    pod.metadata
        .owner_references
        .as_ref()
        .is_some_and(|refs| refs.iter().any(|r| r.kind == "PersistentVolumeClaim" && r.uid == pvc_uid))
}

pub(crate) mod progress;
pub(crate) mod template;

/// The worker pod name for a given DV name. Deterministic so creating it twice in a row (e.g.
/// after a crash between create and status update) is naturally idempotent.
#[must_use]
pub(crate) fn worker_pod_name(dv_name: &str) -> String {
    format!("cdi-worker-{dv_name}")
}

/// Reduce a fetched worker `Pod` into the coarse [`PodPhase`] the phase table needs
#[must_use]
pub(crate) fn pod_phase(pod: Option<&Pod>) -> Option<PodPhase> {
    let phase = pod?.status.as_ref()?.phase.as_deref()?;
    Some(match phase {
        "Running" => PodPhase::Running,
        "Succeeded" => PodPhase::Succeeded,
        "Failed" => PodPhase::Failed,
        _ => PodPhase::Pending,
    })
}

/// Whether a debug opt-in annotation asks the reconciler to leave the completed worker pod in
/// place instead of deleting it (spec.md §4.1, `podRetainAfterCompletion`)
#[must_use]
pub(crate) fn is_retained(pvc_annotations: &std::collections::BTreeMap<String, String>) -> bool {
    AnnotationKey::PodRetainAfterCompletion.get(pvc_annotations).as_deref() == Some("true")
}

/// The clone-source pod's deterministic name for a given target PVC UID (spec.md §4.3: a
/// source-side pod the clone orchestrator also has to find across reconciles). Falls back to a
/// UID-keyed label match (`LABEL_CLONE_UNIQUE_ID`) when the pod was created by an older
/// reconciler generation with a different naming scheme.
#[must_use]
pub(crate) fn clone_source_pod_label_value(target_pvc_uid: &str) -> String {
    format!("{target_pvc_uid}-source-pod")
}

/// Find a clone-source pod among `candidates` by its `LABEL_CLONE_UNIQUE_ID` label, independent
/// of its name
#[must_use]
pub(crate) fn find_clone_source_pod<'a>(candidates: &'a [Pod], target_pvc_uid: &str) -> Option<&'a Pod> {
    let expected = clone_source_pod_label_value(target_pvc_uid);
    candidates.iter().find(|pod| {
        pod.metadata
            .labels
            .as_ref()
            .and_then(|labels| labels.get(LABEL_CLONE_UNIQUE_ID))
            .is_some_and(|value| value == &expected)
    })
}

/// Find the worker pod for a PVC among `candidates` (spec.md §4.5): matches either the PVC's
/// owner reference or the `CloneUniqueID = <pvcUID>-source-pod` label, and excludes a completed
/// pod the operator asked to retain (`podRetainAfterCompletion=true`) so a retained pod from a
/// previous run is never mistaken for the current one.
#[must_use]
pub(crate) fn find_worker_pod<'a>(candidates: &'a [Pod], pvc_uid: &str, pvc_annotations: &std::collections::BTreeMap<String, String>) -> Option<&'a Pod> {
    candidates
        .iter()
        .filter(|pod| !(is_retained(pvc_annotations) && matches!(pod_phase(Some(pod)), Some(PodPhase::Succeeded) | Some(PodPhase::Failed))))
        .find(|pod| owned_by_pvc(pod, pvc_uid) || find_clone_source_pod(std::slice::from_ref(pod), pvc_uid).is_some())
}

#[cfg(test)]
mod test {
    use super::{find_clone_source_pod, find_worker_pod, is_retained, pod_phase};
    use cdi_common::consts::{AnnotationKey, LABEL_CLONE_UNIQUE_ID};
    use k8s_openapi::api::core::v1::{Pod, PodStatus};
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
    use std::collections::BTreeMap;

    #[test]
    fn pod_phase_maps_known_strings() {
        let mut pod = Pod::default();
        pod.status = Some(PodStatus {
            phase: Some("Running".to_owned()),
            ..PodStatus::default()
        });
        assert!(matches!(pod_phase(Some(&pod)), Some(super::PodPhase::Running)));
    }

    #[test]
    fn pod_phase_absent_pod_is_none() {
        assert!(pod_phase(None).is_none());
    }

    #[test]
    fn retained_annotation_is_honored() {
        let mut annotations = BTreeMap::new();
        AnnotationKey::PodRetainAfterCompletion.set(&mut annotations, "true");
        assert!(is_retained(&annotations));
        assert!(!is_retained(&BTreeMap::new()));
    }

    #[test]
    fn finds_clone_source_pod_by_label_not_name() {
        let mut labels = BTreeMap::new();
        let _prev = labels.insert(LABEL_CLONE_UNIQUE_ID.to_owned(), "uid-123-source-pod".to_owned());
        let pod = Pod {
            metadata: ObjectMeta {
                name: Some("some-unrelated-name".to_owned()),
                labels: Some(labels),
                ..ObjectMeta::default()
            },
            ..Pod::default()
        };
        let found = find_clone_source_pod(std::slice::from_ref(&pod), "uid-123");
        assert!(found.is_some());
        assert!(find_clone_source_pod(std::slice::from_ref(&pod), "uid-456").is_none());
    }

    fn owned_pod(name: &str, pvc_uid: &str) -> Pod {
        Pod {
            metadata: ObjectMeta {
                name: Some(name.to_owned()),
                owner_references: Some(vec![OwnerReference {
                    api_version: "v1".to_owned(),
                    kind: "PersistentVolumeClaim".to_owned(),
                    name: "pvc".to_owned(),
                    uid: pvc_uid.to_owned(),
                    controller: Some(true),
                    block_owner_deletion: Some(true),
                }]),
                ..ObjectMeta::default()
            },
            ..Pod::default()
        }
    }

    #[test]
    fn finds_worker_pod_by_pvc_owner_reference() {
        let pod = owned_pod("cdi-worker-test-dv", "pvc-uid-1");
        let found = find_worker_pod(std::slice::from_ref(&pod), "pvc-uid-1", &BTreeMap::new());
        assert!(found.is_some());
        assert!(find_worker_pod(std::slice::from_ref(&pod), "pvc-uid-2", &BTreeMap::new()).is_none());
    }

    #[test]
    fn excludes_retained_completed_pod() {
        let mut pod = owned_pod("cdi-worker-test-dv", "pvc-uid-1");
        pod.status = Some(PodStatus {
            phase: Some("Succeeded".to_owned()),
            ..PodStatus::default()
        });
        let mut annotations = BTreeMap::new();
        AnnotationKey::PodRetainAfterCompletion.set(&mut annotations, "true");

        assert!(find_worker_pod(std::slice::from_ref(&pod), "pvc-uid-1", &annotations).is_none());
        assert!(find_worker_pod(std::slice::from_ref(&pod), "pvc-uid-1", &BTreeMap::new()).is_some());
    }
}
