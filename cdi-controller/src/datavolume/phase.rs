use cdi_api::v1beta1::{
    ConditionStatus, DataVolumeCondition, DataVolumeConditionType, DataVolumePhase,
    DataVolumeSource,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;

/// Observed state of the managed PVC and worker pod, reduced to exactly what the phase table
/// (spec.md §4.1) needs. Keeping this narrow (rather than passing the full PVC/Pod objects) is
/// what makes [`next_phase`] a pure function testable without any Kubernetes types at all.
#[derive(Copy, Clone, Debug, Default)]
pub(crate) struct ObservedState {
    /// `None` if the PVC does not exist yet
    pub(crate) pvc_bound: Option<bool>,
    /// resolved storage class binding mode is `WaitForFirstConsumer` and the DV has no consumer yet
    pub(crate) awaiting_first_consumer: bool,
    /// `None` if no worker pod exists yet
    pub(crate) pod_phase: Option<PodPhase>,
    /// true once the multi-stage checkpoint engine reports a paused, non-final checkpoint
    pub(crate) checkpoint_paused: bool,
    /// true once every checkpoint (or the sole checkpoint-free import) has copied successfully
    pub(crate) fully_copied: bool,
    /// true once the clone orchestrator reports its sequence has reached its own `Succeeded`
    pub(crate) clone_succeeded: bool,
    /// true if the PVC that used to back this DV has disappeared
    pub(crate) pvc_lost: bool,
}

/// Coarse worker-pod phase, mirroring `v1.PodPhase` without pulling in the full type
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum PodPhase {
    Pending,
    Running,
    Succeeded,
    Failed,
}

/// Compute the next `DataVolumePhase` from the current phase, the DV's source, and the observed
/// PVC/pod state (spec.md §4.1 transition rules). Level-triggered: calling this twice with the
/// same inputs always returns the same phase.
#[must_use]
pub(crate) fn next_phase(
    current: DataVolumePhase,
    source: &DataVolumeSource,
    observed: ObservedState,
) -> DataVolumePhase {
    if observed.pvc_lost {
        return DataVolumePhase::Failed;
    }
    if matches!(current, DataVolumePhase::Succeeded | DataVolumePhase::Failed) {
        return current;
    }
    if matches!(observed.pod_phase, Some(PodPhase::Failed)) {
        return DataVolumePhase::Failed;
    }

    match observed.pvc_bound {
        None => return DataVolumePhase::Pending,
        Some(false) if observed.awaiting_first_consumer => {
            return DataVolumePhase::WaitForFirstConsumer
        }
        Some(false) => return DataVolumePhase::Pending,
        Some(true) => {}
    }

    if source.is_clone() {
        return next_clone_phase(current, observed);
    }

    match *source {
        DataVolumeSource::Upload {} => next_upload_phase(observed),
        _ => next_import_phase(observed),
    }
}

fn next_import_phase(observed: ObservedState) -> DataVolumePhase {
    match observed.pod_phase {
        None => DataVolumePhase::ImportScheduled,
        Some(PodPhase::Pending) => DataVolumePhase::ImportScheduled,
        Some(PodPhase::Running) => DataVolumePhase::ImportInProgress,
        Some(PodPhase::Succeeded) => {
            if observed.fully_copied {
                DataVolumePhase::Succeeded
            } else if observed.checkpoint_paused {
                DataVolumePhase::Paused
            } else {
                DataVolumePhase::ImportInProgress
            }
        }
        Some(PodPhase::Failed) => DataVolumePhase::Failed,
    }
}

fn next_upload_phase(observed: ObservedState) -> DataVolumePhase {
    match observed.pod_phase {
        None | Some(PodPhase::Pending) => DataVolumePhase::UploadScheduled,
        Some(PodPhase::Running) => DataVolumePhase::UploadReady,
        Some(PodPhase::Succeeded) => DataVolumePhase::Succeeded,
        Some(PodPhase::Failed) => DataVolumePhase::Failed,
    }
}

fn next_clone_phase(current: DataVolumePhase, observed: ObservedState) -> DataVolumePhase {
    if observed.clone_succeeded {
        return DataVolumePhase::Succeeded;
    }
    match current {
        DataVolumePhase::SnapshotForSmartCloneInProgress
        | DataVolumePhase::SmartClonePvcInProgress
        | DataVolumePhase::NamespaceTransferInProgress
        | DataVolumePhase::ExpansionInProgress
        | DataVolumePhase::CsiCloneInProgress => current,
        _ => match observed.pod_phase {
            None | Some(PodPhase::Pending) => DataVolumePhase::CloneScheduled,
            Some(PodPhase::Running) => DataVolumePhase::CloneInProgress,
            Some(PodPhase::Succeeded) => DataVolumePhase::Succeeded,
            Some(PodPhase::Failed) => DataVolumePhase::Failed,
        },
    }
}

/// Recompute the three standard conditions (`Bound`, `Running`, `Ready`) from the phase and
/// observed state, preserving `last_transition_time` for conditions whose status didn't change
/// (spec.md §4.1: "Each carries the most recent reason/message")
#[must_use]
pub(crate) fn conditions(
    existing: &[DataVolumeCondition],
    phase: DataVolumePhase,
    observed: ObservedState,
    now: Time,
) -> Vec<DataVolumeCondition> {
    let bound = observed.pvc_bound.unwrap_or(false);
    let running = matches!(observed.pod_phase, Some(PodPhase::Running));
    let ready = matches!(phase, DataVolumePhase::Succeeded);

    vec![
        DataVolumeCondition::upsert(
            existing,
            DataVolumeConditionType::Bound,
            bool_status(bound),
            if bound { "Bound" } else { "NotBound" },
            if bound {
                "PVC Bound"
            } else {
                "PVC is not bound"
            },
            now.clone(),
        ),
        DataVolumeCondition::upsert(
            existing,
            DataVolumeConditionType::Running,
            bool_status(running),
            if running { "Running" } else { "NotRunning" },
            if running {
                "Import is progressing"
            } else {
                "No worker pod running"
            },
            now.clone(),
        ),
        DataVolumeCondition::upsert(
            existing,
            DataVolumeConditionType::Ready,
            bool_status(ready),
            if ready { "Succeeded" } else { "NotReady" },
            if ready {
                "The DataVolume is ready"
            } else {
                "The DataVolume is not ready"
            },
            now,
        ),
    ]
}

const fn bool_status(value: bool) -> ConditionStatus {
    if value {
        ConditionStatus::True
    } else {
        ConditionStatus::False
    }
}

#[cfg(test)]
mod test {
    use super::{next_phase, ObservedState, PodPhase};
    use cdi_api::v1beta1::{DataVolumePhase, DataVolumeSource};

    fn http_source() -> DataVolumeSource {
        DataVolumeSource::Http {
            url: "https://example.com/disk.img".to_owned(),
            secret_ref: None,
            cert_config_map: None,
            extra_headers: None,
        }
    }

    #[test]
    fn unset_with_no_pvc_goes_pending() {
        let phase = next_phase(DataVolumePhase::Unset, &http_source(), ObservedState::default());
        assert_eq!(phase, DataVolumePhase::Pending);
    }

    #[test]
    fn bound_with_no_pod_schedules_import() {
        let observed = ObservedState {
            pvc_bound: Some(true),
            ..ObservedState::default()
        };
        assert_eq!(
            next_phase(DataVolumePhase::Pending, &http_source(), observed),
            DataVolumePhase::ImportScheduled
        );
    }

    #[test]
    fn running_pod_moves_to_in_progress() {
        let observed = ObservedState {
            pvc_bound: Some(true),
            pod_phase: Some(PodPhase::Running),
            ..ObservedState::default()
        };
        assert_eq!(
            next_phase(DataVolumePhase::ImportScheduled, &http_source(), observed),
            DataVolumePhase::ImportInProgress
        );
    }

    #[test]
    fn succeeded_pod_with_remaining_checkpoint_pauses() {
        let observed = ObservedState {
            pvc_bound: Some(true),
            pod_phase: Some(PodPhase::Succeeded),
            checkpoint_paused: true,
            fully_copied: false,
            ..ObservedState::default()
        };
        assert_eq!(
            next_phase(DataVolumePhase::ImportInProgress, &http_source(), observed),
            DataVolumePhase::Paused
        );
    }

    #[test]
    fn succeeded_pod_fully_copied_succeeds() {
        let observed = ObservedState {
            pvc_bound: Some(true),
            pod_phase: Some(PodPhase::Succeeded),
            fully_copied: true,
            ..ObservedState::default()
        };
        assert_eq!(
            next_phase(DataVolumePhase::ImportInProgress, &http_source(), observed),
            DataVolumePhase::Succeeded
        );
    }

    #[test]
    fn terminal_phases_are_sticky() {
        let observed = ObservedState {
            pvc_bound: Some(true),
            pod_phase: Some(PodPhase::Running),
            ..ObservedState::default()
        };
        assert_eq!(
            next_phase(DataVolumePhase::Succeeded, &http_source(), observed),
            DataVolumePhase::Succeeded
        );
    }

    #[test]
    fn pvc_lost_fails_from_any_phase() {
        let observed = ObservedState {
            pvc_lost: true,
            ..ObservedState::default()
        };
        assert_eq!(
            next_phase(DataVolumePhase::ImportInProgress, &http_source(), observed),
            DataVolumePhase::Failed
        );
    }

    #[test]
    fn wait_for_first_consumer_holds_until_consumer_appears() {
        let observed = ObservedState {
            pvc_bound: Some(false),
            awaiting_first_consumer: true,
            ..ObservedState::default()
        };
        assert_eq!(
            next_phase(DataVolumePhase::Pending, &http_source(), observed),
            DataVolumePhase::WaitForFirstConsumer
        );
    }

    #[test]
    fn clone_source_progresses_through_host_assisted_phases() {
        let clone_source = DataVolumeSource::Pvc {
            namespace: "ns".to_owned(),
            name: "src".to_owned(),
        };
        let scheduled = ObservedState {
            pvc_bound: Some(true),
            ..ObservedState::default()
        };
        assert_eq!(
            next_phase(DataVolumePhase::Pending, &clone_source, scheduled),
            DataVolumePhase::CloneScheduled
        );
        let in_progress = ObservedState {
            pvc_bound: Some(true),
            pod_phase: Some(PodPhase::Running),
            ..ObservedState::default()
        };
        assert_eq!(
            next_phase(DataVolumePhase::CloneScheduled, &clone_source, in_progress),
            DataVolumePhase::CloneInProgress
        );
    }

    #[test]
    fn clone_in_snapshot_states_stays_until_orchestrator_reports_done() {
        let clone_source = DataVolumeSource::Pvc {
            namespace: "ns".to_owned(),
            name: "src".to_owned(),
        };
        let observed = ObservedState {
            pvc_bound: Some(true),
            ..ObservedState::default()
        };
        assert_eq!(
            next_phase(
                DataVolumePhase::SmartClonePvcInProgress,
                &clone_source,
                observed
            ),
            DataVolumePhase::SmartClonePvcInProgress
        );
    }
}
