use std::sync::Arc;

use cdi_api::snapshot::VolumeSnapshot;
use cdi_api::v1beta1::{
    CdiConfig, DataSource, DataVolume, DataVolumeContentType, DataVolumePhase, DataVolumeSource, ObjectTransfer,
    StorageProfile,
};
use cdi_common::clone_strategy::CloneStrategy;
use cdi_common::consts::AnnotationKey;
use cdi_common::registry::ClaimPropertySet;
use k8s_openapi::api::core::v1::{PersistentVolumeClaim, Pod};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use kube::runtime::controller::Action;
use kube::ResourceExt;

use crate::clone;
use crate::context::Context;
use crate::datavolume::annotations::{self, initial_pvc_annotations};
use crate::datavolume::checkpoint::{self, CheckpointAction};
use crate::datavolume::phase::{self, ObservedState, PodPhase};
use crate::datavolume::source;
use crate::datavolume::Error;
use crate::events::EventSink;
use crate::pvc;
use crate::store::Store;
use crate::storageprofile;

/// Run one level-triggered reconcile of a single `DataVolume` (spec.md §4.1). Generic over the
/// `Store`/`EventSink` abstractions so the whole orchestration can be exercised against
/// [`crate::store::FakeStore`] in tests, with no live API server (spec.md §9 REDESIGN FLAGS).
#[allow(clippy::too_many_arguments)]
pub(crate) async fn reconcile_once(
    dv: &DataVolume,
    dv_store: &dyn Store<DataVolume>,
    pvc_store: &dyn Store<PersistentVolumeClaim>,
    clone_source_store: &dyn Store<PersistentVolumeClaim>,
    clone_source_pod_store: &dyn Store<Pod>,
    pod_store: &dyn Store<Pod>,
    data_source_store: &dyn Store<DataSource>,
    storage_profile_store: &dyn Store<StorageProfile>,
    snapshot_store: &dyn Store<VolumeSnapshot>,
    transfer_store: &dyn Store<ObjectTransfer>,
    cdi_config: &CdiConfig,
    events: &dyn EventSink,
    honor_wait_for_first_consumer: bool,
) -> Result<Action, Error> {
    let name = dv.name_any();
    let namespace = dv.namespace().unwrap_or_default();
    let current_phase = dv.status.as_ref().map_or(DataVolumePhase::Unset, |s| s.phase);

    if matches!(current_phase, DataVolumePhase::Succeeded | DataVolumePhase::Failed) {
        return Ok(Action::await_change());
    }

    let effective_source = resolve_effective_source(dv, data_source_store).await?;

    let existing_pvc = pvc_store.get(&name).await.map_err(Error::Kube)?;

    if let Some(ref pvc) = existing_pvc {
        if !pvc::template::is_owned_by(pvc, dv) {
            let pvc_annotations = pvc.metadata.annotations.clone().unwrap_or_default();
            if annotations::is_pre_populated_for(&pvc_annotations, &name) {
                return adopt_pre_populated_pvc(dv, pvc, dv_store, pvc_store, events).await;
            }
            events
                .warning("AlreadyExists", "Resource already exists and is not managed by DataVolume")
                .await;
            return Err(Error::AlreadyExists(name));
        }
    }

    if effective_source.is_clone() {
        let outcome = clone::orchestrate(dv, clone_source_store, clone_source_pod_store, events).await?;
        if let Some(action) = outcome.requeue {
            return Ok(action);
        }

        let storage_class = dv.spec.storage.as_ref().and_then(|s| s.storage_class_name.as_deref());
        let strategy = clone::resolve_strategy(storage_class, cdi_config, storage_profile_store).await?;

        if !matches!(strategy, CloneStrategy::HostAssisted) {
            let DataVolumeSource::Pvc {
                namespace: ref source_namespace,
                name: ref source_name,
            } = effective_source
            else {
                unreachable!("is_clone() only ever holds for the Pvc variant")
            };
            let source_namespace = if source_namespace.is_empty() {
                namespace.clone()
            } else {
                source_namespace.clone()
            };

            let outcome = clone::reconcile_smart_clone(
                dv,
                strategy,
                current_phase,
                source_namespace,
                source_name.clone(),
                namespace.clone(),
                pvc_store,
                clone_source_store,
                snapshot_store,
                transfer_store,
                events,
            )
            .await?;

            if outcome.phase != current_phase {
                let mut updated = dv.clone();
                let status = updated.status.get_or_insert_with(Default::default);
                status.phase = outcome.phase;
                status.claim_name = Some(name.clone());
                let _dv = dv_store.patch(&name, &updated).await.map_err(Error::Kube)?;
                events
                    .normal("PhaseChanged", format!("{name} is now {:?}", outcome.phase))
                    .await;
            }

            if matches!(outcome.phase, DataVolumePhase::Succeeded | DataVolumePhase::Failed) {
                return Ok(Action::await_change());
            }
            return Ok(Action::requeue(crate::consts::DEFAULT_REQUEUE_DURATION));
        }
    }

    let pvc = match existing_pvc {
        Some(pvc) => pvc,
        None => {
            let (claim_property_set, requested_bytes) = resolve_storage_shape(dv, cdi_config, storage_profile_store).await?;
            let mut pvc = pvc::template::empty_pvc(dv, &claim_property_set, requested_bytes);
            pvc.metadata.annotations = Some(initial_pvc_annotations(dv, &effective_source));
            let created = pvc_store.create(pvc).await.map_err(Error::Kube)?;
            events.normal("PVCCreated", format!("Created PVC {name}")).await;
            created
        }
    };

    let pvc_uid = pvc.uid().unwrap_or_default();
    let pvc_annotations = pvc.metadata.annotations.clone().unwrap_or_default();
    let candidate_pods = pod_store.list().await.map_err(Error::Kube)?;
    let pod = pvc::find_worker_pod(&candidate_pods, &pvc_uid, &pvc_annotations).cloned();

    if let Some(checkpoints) = dv.spec.checkpoints.as_ref().filter(|c| !c.is_empty()) {
        let pvc_annotations = pvc.metadata.annotations.clone().unwrap_or_default();
        let pod_succeeded = matches!(pvc::pod_phase(pod.as_ref()), Some(PodPhase::Succeeded));
        let action = checkpoint::decide(
            checkpoints,
            dv.spec.final_checkpoint.unwrap_or(false),
            &pvc_annotations,
            pod_succeeded,
        );
        if !matches!(action, CheckpointAction::NoOp) {
            let current_pod_id = pod.as_ref().map(kube::ResourceExt::name_any).unwrap_or_default();
            let updated = checkpoint::apply(&action, pvc_annotations, &current_pod_id);
            let mut patch = pvc.clone();
            patch.metadata.annotations = Some(updated);
            let _pvc = pvc_store.patch(&name, &patch).await.map_err(Error::Kube)?;
        }
    }

    let observed = observe(dv, &pvc, pod.as_ref(), honor_wait_for_first_consumer, &effective_source);
    let next = phase::next_phase(current_phase, &effective_source, observed);

    if matches!(next, DataVolumePhase::ImportScheduled | DataVolumePhase::CloneScheduled | DataVolumePhase::UploadScheduled)
        && pod.is_none()
    {
        let worker_pod = pvc::template::worker_pod(dv, &pvc, cdi_config, &effective_source);
        let _pod = pod_store.create(worker_pod).await.map_err(Error::Kube)?;
        events
            .normal("WorkerPodCreated", format!("Created worker pod for {name}"))
            .await;
    }

    if next != current_phase {
        let mut updated = dv.clone();
        let status = updated.status.get_or_insert_with(Default::default);
        status.phase = next;
        status.conditions = phase::conditions(&status.conditions, next, observed, now());
        status.claim_name = Some(name.clone());
        let _dv = dv_store.patch(&name, &updated).await.map_err(Error::Kube)?;
        events
            .normal("PhaseChanged", format!("{name} is now {next:?}"))
            .await;
    }

    if matches!(next, DataVolumePhase::Succeeded | DataVolumePhase::Failed) {
        return Ok(Action::await_change());
    }
    Ok(Action::requeue(crate::consts::DEFAULT_REQUEUE_DURATION))
}

/// Resolve `dv.spec.source` into the concrete source the worker pod/clone orchestrator should
/// actually act on (spec.md §4.1/§6, SPEC_FULL.md §3 `DataSource` supplement): a `SourceRef`
/// resolves against a fetched `DataSource`, everything else passes through unchanged.
/// `data_source_store` is assumed pre-scoped to the `sourceRef`'s namespace by the caller.
async fn resolve_effective_source(dv: &DataVolume, data_source_store: &dyn Store<DataSource>) -> Result<DataVolumeSource, Error> {
    let DataVolumeSource::SourceRef { ref name, .. } = dv.spec.source else {
        return Ok(dv.spec.source.clone());
    };
    let data_source = data_source_store
        .get(name)
        .await
        .map_err(Error::Kube)?
        .ok_or_else(|| Error::MissingReference(format!("DataSource/{name}")))?;
    Ok(source::resolve_source_ref(&data_source))
}

/// Adopt a pre-existing PVC an external populator left behind (spec.md §4.1 invariant 1): add our
/// owner reference, annotate the DV `prePopulated=<dv-name>`, and short-circuit straight to
/// `Succeeded` with `progress="N/A"` since there is nothing left for this reconciler to populate.
async fn adopt_pre_populated_pvc(
    dv: &DataVolume,
    pvc: &PersistentVolumeClaim,
    dv_store: &dyn Store<DataVolume>,
    pvc_store: &dyn Store<PersistentVolumeClaim>,
    events: &dyn EventSink,
) -> Result<Action, Error> {
    let name = dv.name_any();

    let mut patched_pvc = pvc.clone();
    patched_pvc.metadata.owner_references = Some(vec![pvc::template::owner_reference(dv)]);
    let _pvc = pvc_store.patch(&name, &patched_pvc).await.map_err(Error::Kube)?;

    let mut updated = dv.clone();
    let mut dv_annotations = updated.metadata.annotations.clone().unwrap_or_default();
    AnnotationKey::PrePopulated.set(&mut dv_annotations, name.clone());
    updated.metadata.annotations = Some(dv_annotations);
    let status = updated.status.get_or_insert_with(Default::default);
    status.phase = DataVolumePhase::Succeeded;
    status.progress = "N/A".to_owned();
    status.claim_name = Some(name.clone());
    let _dv = dv_store.patch(&name, &updated).await.map_err(Error::Kube)?;

    events
        .normal("PVCAdopted", format!("adopted pre-populated PVC {name}"))
        .await;
    Ok(Action::await_change())
}

/// Resolve the `ClaimPropertySet`/size a freshly created PVC should use (spec.md §4.4 steps
/// 1-5, §8 invariant 8): an explicit `accessModes`+`volumeMode` on the DV wins outright, else the
/// resolver falls through the `StorageProfile` named by the DV's storage class (or the cluster
/// default), and the requested size is widened by the storage class's filesystem overhead.
async fn resolve_storage_shape(
    dv: &DataVolume,
    cdi_config: &CdiConfig,
    storage_profile_store: &dyn Store<StorageProfile>,
) -> Result<(ClaimPropertySet, i64), Error> {
    let storage = dv.spec.storage.as_ref();

    if !storageprofile::has_requested_size(storage) {
        return Err(Error::StorageProfile(storageprofile::Error::MissingSize));
    }
    let requested_raw = storage
        .and_then(|s| s.resources.as_ref())
        .and_then(|r| r.requests.as_ref())
        .and_then(|r| r.get("storage"))
        .and_then(|q| cdi_common::sizing::parse_quantity(&q.0))
        .ok_or(Error::StorageProfile(storageprofile::Error::MissingSize))?;

    let explicit = storage.and_then(|s| s.access_modes.clone()).zip(storage.and_then(|s| s.volume_mode));
    let storage_class_name = storage
        .and_then(|s| s.storage_class_name.clone())
        .or_else(|| cdi_config.status.default_storage_class.clone());

    let claim_property_set = match explicit {
        Some((access_modes, volume_mode)) => ClaimPropertySet {
            access_modes,
            volume_mode: Some(volume_mode),
        },
        None => {
            let storage_class_name =
                storage_class_name.clone().ok_or(Error::StorageProfile(storageprofile::Error::MissingStorageClass))?;
            let profile = storage_profile_store.get(&storage_class_name).await.map_err(Error::Kube)?;
            match profile {
                Some(profile) => {
                    let sets = storageprofile::resolve_claim_property_sets(
                        &profile.spec,
                        profile.status.provisioner.as_deref(),
                        &profile.status.claim_property_sets,
                    );
                    if sets.is_empty() {
                        storageprofile::default_claim_property_set()
                    } else {
                        let requested_access_mode =
                            storage.and_then(|s| s.access_modes.as_ref()).and_then(|modes| modes.first().copied());
                        let requested_volume_mode = storage.and_then(|s| s.volume_mode);
                        storageprofile::pick(&sets, dv.spec.content_type, requested_access_mode, requested_volume_mode)
                            .map_err(Error::StorageProfile)?
                    }
                }
                None => storageprofile::default_claim_property_set(),
            }
        }
    };

    if matches!(dv.spec.content_type, Some(DataVolumeContentType::Archive))
        && claim_property_set.volume_mode == Some(cdi_common::registry::VolumeMode::Block)
    {
        return Err(Error::StorageProfile(storageprofile::Error::ArchiveRequiresFilesystem));
    }

    let overhead = cdi_config.spec.filesystem_overhead.as_ref().map_or(0.0, |fo| {
        storage_class_name
            .as_deref()
            .and_then(|class| fo.storage_class.get(class))
            .copied()
            .unwrap_or(fo.global)
    });
    let sized_bytes = cdi_common::sizing::get_required_space(overhead, requested_raw);

    Ok((claim_property_set, sized_bytes))
}

/// Reduce the fetched PVC/Pod into the narrow [`ObservedState`] the phase table consumes
fn observe(
    dv: &DataVolume,
    pvc: &PersistentVolumeClaim,
    pod: Option<&Pod>,
    honor_wait_for_first_consumer: bool,
    effective_source: &DataVolumeSource,
) -> ObservedState {
    let pvc_bound = pvc
        .status
        .as_ref()
        .and_then(|s| s.phase.as_deref())
        .map(|phase| phase == "Bound");
    let awaiting_first_consumer = honor_wait_for_first_consumer
        && pvc_bound == Some(false)
        && pvc
            .status
            .as_ref()
            .and_then(|s| s.phase.as_deref())
            .map_or(false, |phase| phase == "Pending");

    ObservedState {
        pvc_bound,
        awaiting_first_consumer,
        pod_phase: pvc::pod_phase(pod),
        checkpoint_paused: matches!(
            dv.status.as_ref().map_or(DataVolumePhase::Unset, |s| s.phase),
            DataVolumePhase::Paused
        ),
        fully_copied: pvc
            .metadata
            .annotations
            .as_ref()
            .map_or(false, |a| cdi_common::consts::AnnotationKey::MultiStageImportDone.get(a).as_deref() == Some("true"))
            || dv.spec.checkpoints.is_none(),
        clone_succeeded: matches!(pvc::pod_phase(pod), Some(PodPhase::Succeeded)) && effective_source.is_clone(),
        pvc_lost: false,
    }
}

fn now() -> Time {
    Time(chrono::Utc::now())
}

/// Called by `kube::runtime::Controller::run`'s error-policy callback
pub(crate) fn error_policy(_dv: Arc<DataVolume>, err: &Error, _ctx: Arc<Context>) -> Action {
    err.retry_policy().into_action()
}

#[cfg(test)]
mod test {
    use super::{adopt_pre_populated_pvc, reconcile_once, resolve_effective_source, resolve_storage_shape};
    use crate::events::EventSink;
    use crate::store::{FakeStore, Store};
    use async_trait::async_trait;
    use cdi_api::snapshot::VolumeSnapshot;
    use cdi_api::v1beta1::{
        CdiConfig, CdiConfigSpec, DataSource, DataSourceSource, DataSourceSpec, DataVolume, DataVolumePhase,
        DataVolumeSource, DataVolumeSpec, FilesystemOverhead, ObjectTransfer, StorageProfile, StorageSpec,
    };
    use k8s_openapi::api::core::v1::{PersistentVolumeClaim, Pod, ResourceRequirements};
    use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingEvents {
        warnings: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl EventSink for RecordingEvents {
        async fn normal(&self, _reason: &str, _note: impl Into<String> + Send) {}
        async fn warning(&self, reason: &str, note: impl Into<String> + Send) {
            self.warnings.lock().unwrap().push(format!("{reason}: {}", note.into()));
        }
    }

    fn dv(name: &str) -> DataVolume {
        let mut dv = DataVolume::new(
            name,
            DataVolumeSpec {
                source: DataVolumeSource::Blank {},
                pvc: None,
                storage: None,
                content_type: None,
                checkpoints: None,
                final_checkpoint: None,
                priority_class_name: None,
                preallocation: None,
            },
        );
        dv.metadata.namespace = Some("default".to_owned());
        dv.metadata.uid = Some("dv-uid".to_owned());
        dv
    }

    fn unowned_pvc(name: &str, annotations: BTreeMap<String, String>) -> PersistentVolumeClaim {
        PersistentVolumeClaim {
            metadata: ObjectMeta {
                name: Some(name.to_owned()),
                namespace: Some("default".to_owned()),
                annotations: Some(annotations),
                ..ObjectMeta::default()
            },
            ..PersistentVolumeClaim::default()
        }
    }

    #[tokio::test]
    async fn pre_populated_pvc_is_adopted_and_dv_succeeds() {
        let dv = dv("test-dv");
        let mut annotations = BTreeMap::new();
        cdi_common::consts::AnnotationKey::PopulatedFor.set(&mut annotations, "test-dv");
        let pvc = unowned_pvc("test-dv", annotations);

        let dv_store: FakeStore<DataVolume> = FakeStore::default();
        dv_store.seed("test-dv", dv.clone());
        let pvc_store: FakeStore<PersistentVolumeClaim> = FakeStore::default();
        let events = RecordingEvents::default();

        let _action = adopt_pre_populated_pvc(&dv, &pvc, &dv_store, &pvc_store, &events).await.unwrap();

        let updated_dv = dv_store.get("test-dv").await.unwrap().unwrap();
        let status = updated_dv.status.unwrap();
        assert_eq!(status.phase, DataVolumePhase::Succeeded);
        assert_eq!(status.progress, "N/A");
        assert_eq!(
            cdi_common::consts::AnnotationKey::PrePopulated.get(&updated_dv.metadata.annotations.unwrap_or_default()),
            Some("test-dv".to_owned())
        );
    }

    #[tokio::test]
    async fn unowned_unannotated_pvc_is_rejected() {
        let dv = dv("test-dv");
        let pvc = unowned_pvc("test-dv", BTreeMap::new());

        let dv_store: FakeStore<DataVolume> = FakeStore::default();
        dv_store.seed("test-dv", dv.clone());
        let pvc_store: FakeStore<PersistentVolumeClaim> = FakeStore::default();
        pvc_store.seed("test-dv", pvc);
        let clone_source_store: FakeStore<PersistentVolumeClaim> = FakeStore::default();
        let clone_source_pod_store: FakeStore<Pod> = FakeStore::default();
        let pod_store: FakeStore<Pod> = FakeStore::default();
        let data_source_store: FakeStore<DataSource> = FakeStore::default();
        let storage_profile_store: FakeStore<StorageProfile> = FakeStore::default();
        let snapshot_store: FakeStore<VolumeSnapshot> = FakeStore::default();
        let transfer_store: FakeStore<ObjectTransfer> = FakeStore::default();
        let cdi_config = CdiConfig::new("config", CdiConfigSpec::default());
        let events = RecordingEvents::default();

        let result = reconcile_once(
            &dv,
            &dv_store,
            &pvc_store,
            &clone_source_store,
            &clone_source_pod_store,
            &pod_store,
            &data_source_store,
            &storage_profile_store,
            &snapshot_store,
            &transfer_store,
            &cdi_config,
            &events,
            false,
        )
        .await;

        assert!(matches!(result, Err(super::Error::AlreadyExists(ref name)) if name == "test-dv"));
        assert_eq!(events.warnings.lock().unwrap().len(), 1);
    }

    fn bound_pvc(name: &str, uid: &str) -> PersistentVolumeClaim {
        PersistentVolumeClaim {
            metadata: ObjectMeta {
                name: Some(name.to_owned()),
                namespace: Some("default".to_owned()),
                uid: Some(uid.to_owned()),
                owner_references: Some(vec![crate::pvc::template::owner_reference(&dv(name))]),
                ..ObjectMeta::default()
            },
            status: Some(k8s_openapi::api::core::v1::PersistentVolumeClaimStatus {
                phase: Some("Bound".to_owned()),
                ..Default::default()
            }),
            ..PersistentVolumeClaim::default()
        }
    }

    fn pod_owned_by_pvc(pvc_uid: &str, phase: &str) -> Pod {
        Pod {
            metadata: ObjectMeta {
                name: Some("cdi-worker-test-dv".to_owned()),
                namespace: Some("default".to_owned()),
                owner_references: Some(vec![k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference {
                    api_version: "v1".to_owned(),
                    kind: "PersistentVolumeClaim".to_owned(),
                    name: "test-dv".to_owned(),
                    uid: pvc_uid.to_owned(),
                    controller: Some(true),
                    block_owner_deletion: Some(true),
                }]),
                ..ObjectMeta::default()
            },
            status: Some(k8s_openapi::api::core::v1::PodStatus {
                phase: Some(phase.to_owned()),
                ..Default::default()
            }),
            ..Pod::default()
        }
    }

    #[tokio::test]
    async fn worker_pod_is_discovered_by_pvc_owner_reference_not_by_name() {
        let dv = dv("test-dv");
        let pvc = bound_pvc("test-dv", "pvc-uid-1");
        let pod = pod_owned_by_pvc("pvc-uid-1", "Running");

        let dv_store: FakeStore<DataVolume> = FakeStore::default();
        dv_store.seed("test-dv", dv.clone());
        let pvc_store: FakeStore<PersistentVolumeClaim> = FakeStore::default();
        pvc_store.seed("test-dv", pvc);
        let clone_source_store: FakeStore<PersistentVolumeClaim> = FakeStore::default();
        let clone_source_pod_store: FakeStore<Pod> = FakeStore::default();
        let pod_store: FakeStore<Pod> = FakeStore::default();
        // seeded under a name that does not match the deterministic worker-pod name, so a
        // name-keyed lookup would miss it entirely
        pod_store.seed("some-other-pod-name", pod);
        let data_source_store: FakeStore<DataSource> = FakeStore::default();
        let storage_profile_store: FakeStore<StorageProfile> = FakeStore::default();
        let snapshot_store: FakeStore<VolumeSnapshot> = FakeStore::default();
        let transfer_store: FakeStore<ObjectTransfer> = FakeStore::default();
        let cdi_config = CdiConfig::new("config", CdiConfigSpec::default());
        let events = RecordingEvents::default();

        let _action = reconcile_once(
            &dv,
            &dv_store,
            &pvc_store,
            &clone_source_store,
            &clone_source_pod_store,
            &pod_store,
            &data_source_store,
            &storage_profile_store,
            &snapshot_store,
            &transfer_store,
            &cdi_config,
            &events,
            false,
        )
        .await
        .unwrap();

        // a running worker pod was found, so the reconciler reports progress rather than
        // creating a second worker pod for the same DV
        let updated_dv = dv_store.get("test-dv").await.unwrap().unwrap();
        assert_eq!(updated_dv.status.unwrap().phase, DataVolumePhase::ImportInProgress);
        assert_eq!(pod_store.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn source_ref_resolves_via_data_source_store() {
        let mut dv = dv("test-dv");
        dv.spec.source = DataVolumeSource::SourceRef {
            kind: "DataSource".to_owned(),
            namespace: None,
            name: "golden-image".to_owned(),
        };
        let data_source_store: FakeStore<DataSource> = FakeStore::default();
        data_source_store.seed(
            "golden-image",
            DataSource::new(
                "golden-image",
                DataSourceSpec {
                    source: DataSourceSource::Pvc {
                        namespace: "images".to_owned(),
                        name: "golden".to_owned(),
                    },
                },
            ),
        );

        let resolved = resolve_effective_source(&dv, &data_source_store).await.unwrap();
        assert!(matches!(
            resolved,
            DataVolumeSource::Pvc { ref namespace, ref name } if namespace == "images" && name == "golden"
        ));
    }

    fn storage(size: &str, storage_class: Option<&str>) -> StorageSpec {
        let mut requests = BTreeMap::new();
        let _prev = requests.insert("storage".to_owned(), Quantity(size.to_owned()));
        StorageSpec {
            access_modes: None,
            volume_mode: None,
            resources: Some(ResourceRequirements {
                requests: Some(requests),
                ..ResourceRequirements::default()
            }),
            storage_class_name: storage_class.map(str::to_owned),
        }
    }

    #[tokio::test]
    async fn missing_size_is_a_terminal_error() {
        let dv = dv("test-dv");
        let cdi_config = CdiConfig::new("config", CdiConfigSpec::default());
        let storage_profile_store: FakeStore<StorageProfile> = FakeStore::default();

        let result = resolve_storage_shape(&dv, &cdi_config, &storage_profile_store).await;
        assert!(matches!(result, Err(super::Error::StorageProfile(super::storageprofile::Error::MissingSize))));
    }

    #[tokio::test]
    async fn no_storage_class_and_no_cluster_default_is_a_terminal_error() {
        let mut dv = dv("test-dv");
        dv.spec.storage = Some(storage("1Gi", None));
        let cdi_config = CdiConfig::new("config", CdiConfigSpec::default());
        let storage_profile_store: FakeStore<StorageProfile> = FakeStore::default();

        let result = resolve_storage_shape(&dv, &cdi_config, &storage_profile_store).await;
        assert!(matches!(
            result,
            Err(super::Error::StorageProfile(super::storageprofile::Error::MissingStorageClass))
        ));
    }

    #[tokio::test]
    async fn filesystem_overhead_widens_the_requested_size() {
        let mut dv = dv("test-dv");
        dv.spec.storage = Some(storage("1Gi", Some("thin")));
        let mut spec = CdiConfigSpec::default();
        spec.filesystem_overhead = Some(FilesystemOverhead {
            global: 0.1,
            storage_class: BTreeMap::new(),
        });
        let cdi_config = CdiConfig::new("config", spec);
        let storage_profile_store: FakeStore<StorageProfile> = FakeStore::default();

        let (_claim_property_set, sized_bytes) = resolve_storage_shape(&dv, &cdi_config, &storage_profile_store)
            .await
            .unwrap();
        let one_gib = 1024 * 1024 * 1024;
        assert!(sized_bytes > one_gib);
    }

    #[tokio::test]
    async fn explicit_access_modes_and_volume_mode_skip_profile_resolution() {
        let mut dv = dv("test-dv");
        let mut spec = storage("1Gi", None);
        spec.access_modes = Some(vec![cdi_common::registry::AccessMode::ReadWriteMany]);
        spec.volume_mode = Some(cdi_common::registry::VolumeMode::Block);
        dv.spec.storage = Some(spec);
        let cdi_config = CdiConfig::new("config", CdiConfigSpec::default());
        let storage_profile_store: FakeStore<StorageProfile> = FakeStore::default();

        let (claim_property_set, _sized_bytes) = resolve_storage_shape(&dv, &cdi_config, &storage_profile_store)
            .await
            .unwrap();
        assert_eq!(claim_property_set.access_modes, vec![cdi_common::registry::AccessMode::ReadWriteMany]);
        assert_eq!(claim_property_set.volume_mode, Some(cdi_common::registry::VolumeMode::Block));
    }
}
