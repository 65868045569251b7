use std::collections::BTreeMap;

use cdi_api::snapshot::{VolumeSnapshot, VolumeSnapshotSource, VolumeSnapshotSpec};
use cdi_api::v1beta1::{
    CdiConfig, DataVolume, DataVolumePhase, DataVolumeSource, ObjectTransfer, ObjectTransferSource,
    ObjectTransferSpec, ObjectTransferTarget, StorageProfile,
};
use cdi_common::clone_strategy::CloneStrategy;
use k8s_openapi::api::core::v1::{
    PersistentVolumeClaim, PersistentVolumeClaimSpec, Pod, ResourceRequirements, TypedLocalObjectReference,
};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::runtime::controller::Action;
use kube::ResourceExt;

use crate::consts::SOURCE_IN_USE_REQUEUE_DURATION;
use crate::events::EventSink;
use crate::store::Store;

/// The four states a PVC-clone `DataVolume` walks through once its strategy resolves to
/// `Snapshot` or `CsiClone` (spec.md §4.3, "S0 through S3"). Host-assisted clones skip this
/// machine entirely and are driven by the ordinary worker-pod phase table instead.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum CloneState {
    /// nothing has happened yet; waiting on the source-in-use guard
    S0Pending,
    /// snapshot (or CSI volume-data-source) has been requested, not yet ready
    S1Preparing,
    /// snapshot/source is ready; target PVC has been requested from it
    S2Restoring,
    /// source and target are in different namespaces; an `ObjectTransfer` is in flight
    S3NamespaceTransfer,
    /// target PVC is bound and usable
    Done,
}

/// Compute the next [`CloneState`] from the current one and what has been observed this
/// reconcile. Pure: the orchestrator reduces `VolumeSnapshot`/`ObjectTransfer`/target-PVC status
/// down to these booleans before calling in, the same way [`crate::datavolume::phase`] reduces
/// PVC/Pod state (spec.md §9 REDESIGN FLAGS).
#[must_use]
pub(crate) fn next_clone_state(
    current: CloneState,
    cross_namespace: bool,
    intermediate_ready: bool,
    target_bound: bool,
    transfer_complete: bool,
) -> CloneState {
    if target_bound && (!cross_namespace || transfer_complete) {
        return CloneState::Done;
    }
    match current {
        CloneState::Done => CloneState::Done,
        CloneState::S0Pending => CloneState::S1Preparing,
        CloneState::S1Preparing => {
            if intermediate_ready {
                CloneState::S2Restoring
            } else {
                CloneState::S1Preparing
            }
        }
        CloneState::S2Restoring => {
            if target_bound && cross_namespace {
                CloneState::S3NamespaceTransfer
            } else {
                CloneState::S2Restoring
            }
        }
        CloneState::S3NamespaceTransfer => CloneState::S3NamespaceTransfer,
    }
}

/// Whether a previously-created `VolumeSnapshot`/restore object may be reused as-is, or must be
/// left alone because this reconciler does not own it (spec.md §4.3: "must not recreate a
/// `VolumeSnapshot` it does not own"). `existing_owner_uid` is `None` when no such object exists
/// yet, in which case creating one is always safe.
#[must_use]
pub(crate) fn may_manage(existing_owner_uid: Option<&str>, this_dv_uid: &str) -> bool {
    existing_owner_uid.is_none_or(|owner| owner == this_dv_uid)
}

/// Outcome of [`orchestrate`]: either the ordinary reconcile should continue (`requeue: None`),
/// or clone-specific handling has already decided the `Action` to return (e.g. a source-in-use
/// backoff)
pub(crate) struct CloneOutcome {
    pub(crate) requeue: Option<Action>,
}

/// Errors the clone orchestrator can raise (spec.md §7 error taxonomy)
#[derive(Debug, thiserror::Error)]
pub(crate) enum Error {
    /// any Kubernetes API call failure
    #[error("kubernetes api error: {0}")]
    Kube(#[from] kube::Error),
}

impl Error {
    /// Every clone-orchestrator failure is transient: the guard state lives in annotations and
    /// another reconcile will observe it correctly (spec.md §7)
    pub(crate) fn retry_policy(&self) -> crate::error::RetryPolicy {
        crate::error::RetryPolicy::Retry(crate::consts::DEFAULT_REQUEUE_DURATION)
    }
}

/// Whether `pod` mounts the PVC named `pvc_name` via `volumes[].persistentVolumeClaim`,
/// read-write or read-only (spec.md §4.3: "If any pod in the source namespace mounts the source
/// PVC read-write (or read-only; both block the snapshot)")
#[must_use]
fn mounts_pvc(pod: &Pod, pvc_name: &str) -> bool {
    pod.spec
        .as_ref()
        .and_then(|spec| spec.volumes.as_ref())
        .is_some_and(|volumes| {
            volumes
                .iter()
                .any(|volume| volume.persistent_volume_claim.as_ref().is_some_and(|claim| claim.claim_name == pvc_name))
        })
}

/// Run the source-in-use concurrency guard for a PVC-clone `DataVolume` (spec.md §4.3, invariant
/// 7, scenario 6): if any pod in the source namespace mounts the source PVC, the snapshot must
/// not be created this reconcile. `source_store` and `source_pod_store` must already be scoped to
/// the source PVC's namespace.
pub(crate) async fn orchestrate(
    dv: &DataVolume,
    source_store: &dyn Store<PersistentVolumeClaim>,
    source_pod_store: &dyn Store<Pod>,
    events: &dyn EventSink,
) -> Result<CloneOutcome, Error> {
    let DataVolumeSource::Pvc { ref name, .. } = dv.spec.source else {
        return Ok(CloneOutcome { requeue: None });
    };

    if source_store.get(name).await?.is_none() {
        // source doesn't exist (yet); let the ordinary reconcile proceed and report it via the
        // normal missing-dependency path
        return Ok(CloneOutcome { requeue: None });
    }

    let source_pods = source_pod_store.list().await?;
    if source_pods.iter().any(|pod| mounts_pvc(pod, name)) {
        events
            .warning("SmartCloneSourceInUse", format!("source PVC {name} is mounted by a pod, refusing to snapshot it"))
            .await;
        return Ok(CloneOutcome {
            requeue: Some(Action::requeue(SOURCE_IN_USE_REQUEUE_DURATION)),
        });
    }

    Ok(CloneOutcome { requeue: None })
}

/// Resolve the effective [`CloneStrategy`] for a clone DV (spec.md §4.3: cluster override on
/// `CdiConfig`, else the target `StorageProfile`'s preference, else the default `Snapshot`).
pub(crate) async fn resolve_strategy(
    storage_class: Option<&str>,
    cdi_config: &CdiConfig,
    storage_profile_store: &dyn Store<StorageProfile>,
) -> Result<CloneStrategy, Error> {
    let profile_preference = match storage_class {
        Some(name) => storage_profile_store.get(name).await?.and_then(|profile| profile.spec.clone_strategy),
        None => None,
    };
    Ok(cdi_common::clone_strategy::resolve(
        cdi_config.spec.clone_strategy_override,
        profile_preference,
    ))
}

/// Map a previously-recorded `DataVolumePhase` back onto the [`CloneState`] it was derived from.
/// No separate clone state is persisted anywhere; every reconcile re-derives it from
/// `status.phase`, the same way the rest of this engine treats phase as the single source of
/// truth. `CsiCloneInProgress` is reused for both S1 and S2 since a CSI clone has no intermediate
/// snapshot phase of its own to distinguish them.
const fn clone_state_from_phase(phase: DataVolumePhase) -> CloneState {
    match phase {
        DataVolumePhase::SnapshotForSmartCloneInProgress | DataVolumePhase::CsiCloneInProgress => CloneState::S1Preparing,
        DataVolumePhase::SmartClonePvcInProgress => CloneState::S2Restoring,
        DataVolumePhase::NamespaceTransferInProgress => CloneState::S3NamespaceTransfer,
        DataVolumePhase::ExpansionInProgress | DataVolumePhase::Succeeded => CloneState::Done,
        _ => CloneState::S0Pending,
    }
}

/// Map a [`CloneState`] forward onto the `DataVolumePhase` to report for it
const fn phase_from_clone_state(state: CloneState, strategy: CloneStrategy) -> DataVolumePhase {
    match state {
        CloneState::S0Pending | CloneState::S1Preparing => {
            if matches!(strategy, CloneStrategy::CsiClone) {
                DataVolumePhase::CsiCloneInProgress
            } else {
                DataVolumePhase::SnapshotForSmartCloneInProgress
            }
        }
        CloneState::S2Restoring => {
            if matches!(strategy, CloneStrategy::CsiClone) {
                DataVolumePhase::CsiCloneInProgress
            } else {
                DataVolumePhase::SmartClonePvcInProgress
            }
        }
        CloneState::S3NamespaceTransfer => DataVolumePhase::NamespaceTransferInProgress,
        CloneState::Done => DataVolumePhase::Succeeded,
    }
}

/// What driving the smart/CSI clone state machine one step decided
pub(crate) struct CloneStepOutcome {
    /// the `DataVolumePhase` to report for this reconcile
    pub(crate) phase: DataVolumePhase,
}

fn is_bound(pvc: &PersistentVolumeClaim) -> bool {
    pvc.status.as_ref().and_then(|s| s.phase.as_deref()) == Some("Bound")
}

fn bound_capacity_bytes(pvc: &PersistentVolumeClaim) -> Option<i64> {
    pvc.status
        .as_ref()?
        .capacity
        .as_ref()?
        .get("storage")
        .and_then(|q| cdi_common::sizing::parse_quantity(&q.0))
}

fn requested_storage_bytes(dv: &DataVolume) -> i64 {
    dv.spec
        .storage
        .as_ref()
        .and_then(|s| s.resources.as_ref())
        .and_then(|r| r.requests.as_ref())
        .and_then(|r| r.get("storage"))
        .and_then(|q| cdi_common::sizing::parse_quantity(&q.0))
        .unwrap_or(0)
}

/// Fetch the PVC named after `dv` from `store`, creating it with `data_source` if absent
/// (spec.md §4.3: "create target PVC with dataSource=..."). Idempotent: a PVC that already
/// exists, however it got there, is returned as-is.
async fn ensure_pvc_from_data_source(
    store: &dyn Store<PersistentVolumeClaim>,
    name: &str,
    dv: &DataVolume,
    requested_bytes: i64,
    data_source: TypedLocalObjectReference,
) -> Result<PersistentVolumeClaim, Error> {
    if let Some(existing) = store.get(name).await? {
        return Ok(existing);
    }
    let mut requests = BTreeMap::new();
    let _prev = requests.insert("storage".to_owned(), Quantity(requested_bytes.to_string()));
    let pvc = PersistentVolumeClaim {
        metadata: ObjectMeta {
            name: Some(name.to_owned()),
            owner_references: Some(vec![crate::pvc::template::owner_reference(dv)]),
            ..ObjectMeta::default()
        },
        spec: Some(PersistentVolumeClaimSpec {
            data_source: Some(data_source),
            resources: Some(ResourceRequirements {
                requests: Some(requests),
                ..ResourceRequirements::default()
            }),
            ..PersistentVolumeClaimSpec::default()
        }),
        status: None,
    };
    store.create(pvc).await
}

/// Resolve `state` to a terminal outcome once the target PVC is bound: if the bound capacity
/// falls short of the requested size, expand it and report `ExpansionInProgress`; otherwise
/// `Succeeded` (spec.md §4.3, expansion handling shared by both the snapshot and CSI-clone
/// sequences).
async fn finish(
    state: CloneState,
    strategy: CloneStrategy,
    pvc: &PersistentVolumeClaim,
    requested_bytes: i64,
    store: &dyn Store<PersistentVolumeClaim>,
    name: &str,
) -> Result<CloneStepOutcome, Error> {
    if !matches!(state, CloneState::Done) {
        return Ok(CloneStepOutcome {
            phase: phase_from_clone_state(state, strategy),
        });
    }
    if bound_capacity_bytes(pvc).is_some_and(|bound| bound < requested_bytes) {
        let mut patch = pvc.clone();
        if let Some(ref mut spec) = patch.spec {
            let resources = spec.resources.get_or_insert_with(ResourceRequirements::default);
            let requests = resources.requests.get_or_insert_with(BTreeMap::new);
            let _prev = requests.insert("storage".to_owned(), Quantity(requested_bytes.to_string()));
        }
        let _pvc = store.patch(name, &patch).await?;
        return Ok(CloneStepOutcome {
            phase: DataVolumePhase::ExpansionInProgress,
        });
    }
    Ok(CloneStepOutcome {
        phase: DataVolumePhase::Succeeded,
    })
}

/// Drive a PVC-clone `DataVolume` through the snapshot/CSI-clone state machine once its strategy
/// has resolved away from `HostAssisted` (spec.md §4.3). Bypasses the ordinary worker-pod path
/// entirely: the snapshot/CSI driver populates the target PVC directly, never a worker pod.
#[allow(clippy::too_many_arguments)]
pub(crate) async fn reconcile_smart_clone(
    dv: &DataVolume,
    strategy: CloneStrategy,
    current_phase: DataVolumePhase,
    source_namespace: String,
    source_name: String,
    target_namespace: String,
    target_pvc_store: &dyn Store<PersistentVolumeClaim>,
    source_side_pvc_store: &dyn Store<PersistentVolumeClaim>,
    snapshot_store: &dyn Store<VolumeSnapshot>,
    transfer_store: &dyn Store<ObjectTransfer>,
    events: &dyn EventSink,
) -> Result<CloneStepOutcome, Error> {
    let name = dv.name_any();
    let owner_uid = dv.uid().unwrap_or_default();
    let requested_bytes = requested_storage_bytes(dv);
    let cross_namespace = source_namespace != target_namespace;

    // CSI clone: the target PVC's dataSource points straight at the source PVC, always within
    // the same namespace as the source (spec.md §4.3, "CSI clone sequence").
    if matches!(strategy, CloneStrategy::CsiClone) {
        let data_source = TypedLocalObjectReference {
            api_group: None,
            kind: "PersistentVolumeClaim".to_owned(),
            name: source_name.clone(),
        };
        let target = ensure_pvc_from_data_source(target_pvc_store, &name, dv, requested_bytes, data_source).await?;
        let target_bound = is_bound(&target);
        if target.status.as_ref().and_then(|s| s.phase.as_deref()) == Some("Lost") {
            return Ok(CloneStepOutcome {
                phase: DataVolumePhase::Failed,
            });
        }
        let state = next_clone_state(clone_state_from_phase(current_phase), false, true, target_bound, false);
        return finish(state, strategy, &target, requested_bytes, target_pvc_store, &name).await;
    }

    // Snapshot strategy. The snapshot (and, cross-namespace, the PVC restored from it) lives
    // wherever the source PVC lives, since a PVC's dataSource must be same-namespace as the
    // snapshot it references.
    let intermediate_store = if cross_namespace { source_side_pvc_store } else { target_pvc_store };

    // Recovery (spec.md §4.3): if the snapshot is gone but the intermediate PVC already exists
    // and is ours, the snapshot was legitimately cleaned up post-clone; never recreate it.
    let intermediate = intermediate_store.get(&name).await?;
    let already_restoring = intermediate
        .as_ref()
        .is_some_and(|pvc| pvc.metadata.owner_references.as_ref().is_some_and(|refs| refs.iter().any(|r| r.uid == owner_uid)));

    let snapshot = snapshot_store.get(&name).await?;
    let intermediate_ready = if already_restoring {
        true
    } else {
        match snapshot {
            Some(ref snap) => {
                let snapshot_owner = snap
                    .metadata
                    .owner_references
                    .as_ref()
                    .and_then(|refs| refs.first())
                    .map(|owner| owner.uid.clone());
                if may_manage(snapshot_owner.as_deref(), &owner_uid) {
                    snap.status.as_ref().and_then(|s| s.ready_to_use).unwrap_or(false)
                } else {
                    false
                }
            }
            None => {
                let mut new_snapshot = VolumeSnapshot::new(
                    &name,
                    VolumeSnapshotSpec {
                        source: VolumeSnapshotSource {
                            persistent_volume_claim_name: Some(source_name.clone()),
                            volume_snapshot_content_name: None,
                        },
                        volume_snapshot_class_name: None,
                    },
                );
                if !cross_namespace {
                    new_snapshot.metadata.owner_references = Some(vec![crate::pvc::template::owner_reference(dv)]);
                }
                let _snapshot = snapshot_store.create(new_snapshot).await?;
                events.normal("SnapshotCreated", format!("created VolumeSnapshot {name} for clone")).await;
                false
            }
        }
    };

    if !intermediate_ready {
        let state = next_clone_state(clone_state_from_phase(current_phase), cross_namespace, false, false, false);
        return Ok(CloneStepOutcome {
            phase: phase_from_clone_state(state, strategy),
        });
    }

    let data_source = TypedLocalObjectReference {
        api_group: Some("snapshot.storage.k8s.io".to_owned()),
        kind: "VolumeSnapshot".to_owned(),
        name: name.clone(),
    };
    let intermediate_pvc = ensure_pvc_from_data_source(intermediate_store, &name, dv, requested_bytes, data_source).await?;
    let intermediate_bound = is_bound(&intermediate_pvc);

    if !cross_namespace {
        let state = next_clone_state(clone_state_from_phase(current_phase), false, true, intermediate_bound, false);
        let outcome = finish(state, strategy, &intermediate_pvc, requested_bytes, intermediate_store, &name).await?;
        if outcome.phase == DataVolumePhase::Succeeded {
            snapshot_store.delete(&name).await?;
        }
        return Ok(outcome);
    }

    if !intermediate_bound {
        let state = next_clone_state(clone_state_from_phase(current_phase), true, true, false, false);
        return Ok(CloneStepOutcome {
            phase: phase_from_clone_state(state, strategy),
        });
    }

    // Cross-namespace: the intermediate PVC is bound in the source namespace; move it.
    if let Some(target) = target_pvc_store.get(&name).await? {
        // already observed in the target namespace: the transfer has completed, do not retry it
        let target_bound = is_bound(&target);
        let state = next_clone_state(clone_state_from_phase(current_phase), true, true, target_bound, true);
        let outcome = finish(state, strategy, &target, requested_bytes, target_pvc_store, &name).await?;
        if outcome.phase == DataVolumePhase::Succeeded {
            snapshot_store.delete(&name).await?;
        }
        return Ok(outcome);
    }

    let transfer_name = format!("{target_namespace}-{name}");
    if transfer_store.get(&transfer_name).await?.is_none() {
        let new_transfer = ObjectTransfer::new(
            &transfer_name,
            ObjectTransferSpec {
                source: ObjectTransferSource {
                    kind: "PersistentVolumeClaim".to_owned(),
                    namespace: source_namespace,
                    name: name.clone(),
                },
                target: ObjectTransferTarget {
                    namespace: target_namespace.clone(),
                    name: Some(name.clone()),
                },
                delete_after_copy: true,
            },
        );
        let _transfer = transfer_store.create(new_transfer).await?;
        events
            .normal("NamespaceTransferStarted", format!("moving clone PVC {name} into {target_namespace}"))
            .await;
    }

    let state = next_clone_state(clone_state_from_phase(current_phase), true, true, intermediate_bound, false);
    Ok(CloneStepOutcome {
        phase: phase_from_clone_state(state, strategy),
    })
}

#[cfg(test)]
mod test {
    use super::{
        clone_state_from_phase, may_manage, next_clone_state, orchestrate, phase_from_clone_state,
        reconcile_smart_clone, resolve_strategy, CloneState,
    };
    use crate::events::EventSink;
    use crate::store::{FakeStore, Store};
    use async_trait::async_trait;
    use cdi_api::snapshot::VolumeSnapshot;
    use cdi_api::v1beta1::{
        CdiConfig, DataVolume, DataVolumePhase, DataVolumeSource, DataVolumeSpec, ObjectTransfer,
        StorageProfile, StorageProfileSpec,
    };
    use cdi_common::clone_strategy::CloneStrategy;
    use k8s_openapi::api::core::v1::{
        PersistentVolumeClaim, PersistentVolumeClaimVolumeSource, Pod, PodSpec, Volume,
    };
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingEvents {
        warnings: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl EventSink for RecordingEvents {
        async fn normal(&self, _reason: &str, _note: impl Into<String> + Send) {}
        async fn warning(&self, reason: &str, note: impl Into<String> + Send) {
            self.warnings
                .lock()
                .unwrap()
                .push(format!("{reason}: {}", note.into()));
        }
    }

    fn clone_dv(name: &str, target_ns: &str, source_pvc: &str) -> DataVolume {
        let mut dv = DataVolume::new(
            name,
            DataVolumeSpec {
                source: DataVolumeSource::Pvc {
                    namespace: "src-ns".to_owned(),
                    name: source_pvc.to_owned(),
                },
                pvc: None,
                storage: None,
                content_type: None,
                checkpoints: None,
                final_checkpoint: None,
                priority_class_name: None,
                preallocation: None,
            },
        );
        dv.metadata.namespace = Some(target_ns.to_owned());
        dv
    }

    fn source_pvc(name: &str) -> PersistentVolumeClaim {
        let mut pvc = PersistentVolumeClaim::default();
        pvc.metadata.name = Some(name.to_owned());
        pvc.metadata.namespace = Some("src-ns".to_owned());
        pvc
    }

    fn pod_mounting(name: &str, pvc_name: &str) -> Pod {
        Pod {
            metadata: ObjectMeta {
                name: Some(name.to_owned()),
                namespace: Some("src-ns".to_owned()),
                ..ObjectMeta::default()
            },
            spec: Some(PodSpec {
                volumes: Some(vec![Volume {
                    name: "disk".to_owned(),
                    persistent_volume_claim: Some(PersistentVolumeClaimVolumeSource {
                        claim_name: pvc_name.to_owned(),
                        read_only: None,
                    }),
                    ..Volume::default()
                }]),
                ..PodSpec::default()
            }),
            status: None,
        }
    }

    #[tokio::test]
    async fn unmounted_source_proceeds_without_a_warning() {
        let pvcs: FakeStore<PersistentVolumeClaim> = FakeStore::default();
        pvcs.seed("src-pvc", source_pvc("src-pvc"));
        let pods: FakeStore<Pod> = FakeStore::default();
        let events = RecordingEvents::default();
        let dv = clone_dv("dv-1", "dst-ns", "src-pvc");

        let outcome = orchestrate(&dv, &pvcs, &pods, &events).await.unwrap();
        assert!(outcome.requeue.is_none());
        assert!(events.warnings.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn source_mounted_read_only_blocks_the_snapshot() {
        let pvcs: FakeStore<PersistentVolumeClaim> = FakeStore::default();
        pvcs.seed("src-pvc", source_pvc("src-pvc"));
        let pods: FakeStore<Pod> = FakeStore::default();
        pods.seed("reader", pod_mounting("reader", "src-pvc"));
        let events = RecordingEvents::default();
        let dv = clone_dv("dv-1", "dst-ns", "src-pvc");

        let outcome = orchestrate(&dv, &pvcs, &pods, &events).await.unwrap();
        assert!(outcome.requeue.is_some());
        assert_eq!(events.warnings.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn unrelated_pod_in_the_namespace_does_not_block() {
        let pvcs: FakeStore<PersistentVolumeClaim> = FakeStore::default();
        pvcs.seed("src-pvc", source_pvc("src-pvc"));
        let pods: FakeStore<Pod> = FakeStore::default();
        pods.seed("other", pod_mounting("other", "some-other-pvc"));
        let events = RecordingEvents::default();
        let dv = clone_dv("dv-1", "dst-ns", "src-pvc");

        let outcome = orchestrate(&dv, &pvcs, &pods, &events).await.unwrap();
        assert!(outcome.requeue.is_none());
        assert!(events.warnings.lock().unwrap().is_empty());
    }

    #[test]
    fn state_machine_waits_for_intermediate_readiness() {
        assert_eq!(
            next_clone_state(CloneState::S1Preparing, false, false, false, false),
            CloneState::S1Preparing
        );
        assert_eq!(
            next_clone_state(CloneState::S1Preparing, false, true, false, false),
            CloneState::S2Restoring
        );
    }

    #[test]
    fn state_machine_requires_transfer_complete_when_cross_namespace() {
        assert_eq!(
            next_clone_state(CloneState::S2Restoring, true, true, true, false),
            CloneState::S3NamespaceTransfer
        );
        assert_eq!(
            next_clone_state(CloneState::S3NamespaceTransfer, true, true, true, true),
            CloneState::Done
        );
    }

    #[test]
    fn same_namespace_clone_skips_transfer_state() {
        assert_eq!(
            next_clone_state(CloneState::S2Restoring, false, true, true, false),
            CloneState::Done
        );
    }

    #[test]
    fn may_manage_refuses_objects_owned_by_someone_else() {
        assert!(may_manage(None, "uid-1"));
        assert!(may_manage(Some("uid-1"), "uid-1"));
        assert!(!may_manage(Some("uid-2"), "uid-1"));
    }

    #[tokio::test]
    async fn strategy_override_on_cdi_config_wins_over_storage_profile() {
        let mut spec = cdi_api::v1beta1::CdiConfigSpec::default();
        spec.clone_strategy_override = Some(CloneStrategy::CsiClone);
        let cdi_config = CdiConfig::new("config", spec);
        let profiles: FakeStore<StorageProfile> = FakeStore::default();
        let mut profile = StorageProfile::new("thin", StorageProfileSpec::default());
        profile.spec.clone_strategy = Some(CloneStrategy::Snapshot);
        profiles.seed("thin", profile);

        let resolved = resolve_strategy(Some("thin"), &cdi_config, &profiles).await.unwrap();
        assert_eq!(resolved, CloneStrategy::CsiClone);
    }

    #[tokio::test]
    async fn strategy_falls_back_to_storage_profile_preference() {
        let cdi_config = CdiConfig::new("config", cdi_api::v1beta1::CdiConfigSpec::default());
        let profiles: FakeStore<StorageProfile> = FakeStore::default();
        let mut profile = StorageProfile::new("thin", StorageProfileSpec::default());
        profile.spec.clone_strategy = Some(CloneStrategy::CsiClone);
        profiles.seed("thin", profile);

        let resolved = resolve_strategy(Some("thin"), &cdi_config, &profiles).await.unwrap();
        assert_eq!(resolved, CloneStrategy::CsiClone);
    }

    #[test]
    fn clone_state_phase_mapping_round_trips_through_snapshot_strategy() {
        for phase in [
            DataVolumePhase::SnapshotForSmartCloneInProgress,
            DataVolumePhase::SmartClonePvcInProgress,
            DataVolumePhase::NamespaceTransferInProgress,
            DataVolumePhase::Succeeded,
        ] {
            let state = clone_state_from_phase(phase);
            assert_eq!(phase_from_clone_state(state, CloneStrategy::Snapshot), phase);
        }
    }

    fn bound_pvc(name: &str, namespace: &str, capacity: &str) -> PersistentVolumeClaim {
        let mut pvc = PersistentVolumeClaim::default();
        pvc.metadata.name = Some(name.to_owned());
        pvc.metadata.namespace = Some(namespace.to_owned());
        let mut capacity_map = std::collections::BTreeMap::new();
        let _prev = capacity_map.insert("storage".to_owned(), k8s_openapi::apimachinery::pkg::api::resource::Quantity(capacity.to_owned()));
        pvc.status = Some(k8s_openapi::api::core::v1::PersistentVolumeClaimStatus {
            phase: Some("Bound".to_owned()),
            capacity: Some(capacity_map),
            ..Default::default()
        });
        pvc
    }

    #[tokio::test]
    async fn csi_clone_creates_target_pvc_with_pvc_data_source_then_succeeds() {
        let dv = clone_dv("dv-1", "dst-ns", "src-pvc");
        let targets: FakeStore<PersistentVolumeClaim> = FakeStore::default();
        let sources: FakeStore<PersistentVolumeClaim> = FakeStore::default();
        let snapshots: FakeStore<VolumeSnapshot> = FakeStore::default();
        let transfers: FakeStore<ObjectTransfer> = FakeStore::default();
        let events = RecordingEvents::default();

        let first = reconcile_smart_clone(
            &dv,
            CloneStrategy::CsiClone,
            DataVolumePhase::Unset,
            "dst-ns".to_owned(),
            "src-pvc".to_owned(),
            "dst-ns".to_owned(),
            &targets,
            &sources,
            &snapshots,
            &transfers,
            &events,
        )
        .await
        .unwrap();
        assert_eq!(first.phase, DataVolumePhase::CsiCloneInProgress);
        let target = targets.get("dv-1").await.unwrap().unwrap();
        assert_eq!(
            target.spec.as_ref().and_then(|s| s.data_source.as_ref()).map(|d| d.name.clone()),
            Some("src-pvc".to_owned())
        );

        targets.seed("dv-1", bound_pvc("dv-1", "dst-ns", "10Gi"));
        let second = reconcile_smart_clone(
            &dv,
            CloneStrategy::CsiClone,
            DataVolumePhase::CsiCloneInProgress,
            "dst-ns".to_owned(),
            "src-pvc".to_owned(),
            "dst-ns".to_owned(),
            &targets,
            &sources,
            &snapshots,
            &transfers,
            &events,
        )
        .await
        .unwrap();
        assert_eq!(second.phase, DataVolumePhase::Succeeded);
    }

    #[tokio::test]
    async fn same_namespace_snapshot_clone_progresses_once_snapshot_is_ready() {
        let dv = clone_dv("dv-1", "dst-ns", "src-pvc");
        let targets: FakeStore<PersistentVolumeClaim> = FakeStore::default();
        let sources: FakeStore<PersistentVolumeClaim> = FakeStore::default();
        let snapshots: FakeStore<VolumeSnapshot> = FakeStore::default();
        let transfers: FakeStore<ObjectTransfer> = FakeStore::default();
        let events = RecordingEvents::default();

        let first = reconcile_smart_clone(
            &dv,
            CloneStrategy::Snapshot,
            DataVolumePhase::Unset,
            "dst-ns".to_owned(),
            "src-pvc".to_owned(),
            "dst-ns".to_owned(),
            &targets,
            &sources,
            &snapshots,
            &transfers,
            &events,
        )
        .await
        .unwrap();
        assert_eq!(first.phase, DataVolumePhase::SnapshotForSmartCloneInProgress);
        assert!(snapshots.get("dv-1").await.unwrap().is_some());

        let mut ready_snapshot = snapshots.get("dv-1").await.unwrap().unwrap();
        ready_snapshot.status = Some(cdi_api::snapshot::VolumeSnapshotStatus {
            ready_to_use: Some(true),
            ..Default::default()
        });
        snapshots.seed("dv-1", ready_snapshot);

        let second = reconcile_smart_clone(
            &dv,
            CloneStrategy::Snapshot,
            DataVolumePhase::SnapshotForSmartCloneInProgress,
            "dst-ns".to_owned(),
            "src-pvc".to_owned(),
            "dst-ns".to_owned(),
            &targets,
            &sources,
            &snapshots,
            &transfers,
            &events,
        )
        .await
        .unwrap();
        assert_eq!(second.phase, DataVolumePhase::SmartClonePvcInProgress);
        assert!(targets.get("dv-1").await.unwrap().is_some());

        targets.seed("dv-1", bound_pvc("dv-1", "dst-ns", "10Gi"));
        let third = reconcile_smart_clone(
            &dv,
            CloneStrategy::Snapshot,
            DataVolumePhase::SmartClonePvcInProgress,
            "dst-ns".to_owned(),
            "src-pvc".to_owned(),
            "dst-ns".to_owned(),
            &targets,
            &sources,
            &snapshots,
            &transfers,
            &events,
        )
        .await
        .unwrap();
        assert_eq!(third.phase, DataVolumePhase::Succeeded);
        assert!(snapshots.get("dv-1").await.unwrap().is_none());
    }
}
