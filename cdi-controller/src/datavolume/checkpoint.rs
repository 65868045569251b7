use std::collections::BTreeMap;

use cdi_api::v1beta1::DataVolumeCheckpoint;
use cdi_common::consts::{checkpoints_copied_key, AnnotationKey};

/// What the reconciler should do after observing the worker pod's state, for a DV whose source
/// declares `spec.checkpoints` (spec.md §4.2)
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum CheckpointAction {
    /// no checkpoint work needed this reconcile (not a multi-stage import, or already advanced)
    NoOp,
    /// first reconcile after PVC bound: stamp the head checkpoint onto the PVC (step 1)
    Start {
        previous: String,
        current: String,
        final_checkpoint: bool,
    },
    /// worker pod succeeded on a non-final checkpoint: advance to the next one (step 3, non-final)
    Advance {
        previous: String,
        current: String,
        final_checkpoint: bool,
    },
    /// worker pod succeeded on the final checkpoint: clear annotations, mark done (step 3, final)
    Finish,
}

/// Decide what checkpoint action to take, given the DV's declared checkpoint list and the
/// current PVC annotations. Pure and idempotent: re-running with the same inputs always yields
/// the same action, and `Start`/`Advance` never fire once their target annotation is already
/// present (spec.md §4.2 step 4: "MUST NOT overwrite checkpoint annotations that already exist").
#[must_use]
pub(crate) fn decide(
    checkpoints: &[DataVolumeCheckpoint],
    final_checkpoint_flag: bool,
    pvc_annotations: &BTreeMap<String, String>,
    pod_succeeded: bool,
) -> CheckpointAction {
    let Some(head) = checkpoints.first() else {
        return CheckpointAction::NoOp;
    };

    let current_annotation = AnnotationKey::CurrentCheckpoint.get(pvc_annotations);

    if current_annotation.is_none() {
        return CheckpointAction::Start {
            previous: head.previous.clone(),
            current: head.current.clone(),
            final_checkpoint: checkpoints.len() == 1 && final_checkpoint_flag,
        };
    }

    let current = current_annotation.unwrap_or_default();
    let copied_key = checkpoints_copied_key(&current);
    if !pod_succeeded || !pvc_annotations.contains_key(&copied_key) {
        // worker pod has not yet recorded success copying the current checkpoint
        return CheckpointAction::NoOp;
    }

    let is_final = AnnotationKey::FinalCheckpoint
        .get(pvc_annotations)
        .as_deref()
        == Some("true");

    if is_final {
        return CheckpointAction::Finish;
    }

    let position = checkpoints.iter().position(|c| c.current == current);
    let Some(next) = position.and_then(|i| checkpoints.get(i + 1)) else {
        // no further checkpoint declared; treat as final even if the flag was never set
        return CheckpointAction::Finish;
    };
    CheckpointAction::Advance {
        previous: next.previous.clone(),
        current: next.current.clone(),
        final_checkpoint: position.map(|i| i + 2) == Some(checkpoints.len()) && final_checkpoint_flag,
    }
}

/// Apply a [`CheckpointAction`] onto a PVC's annotation map, returning the updated map
#[must_use]
pub(crate) fn apply(
    action: &CheckpointAction,
    mut pvc_annotations: BTreeMap<String, String>,
    current_pod_id: &str,
) -> BTreeMap<String, String> {
    match *action {
        CheckpointAction::NoOp => {}
        CheckpointAction::Start {
            ref previous,
            ref current,
            final_checkpoint,
        }
        | CheckpointAction::Advance {
            ref previous,
            ref current,
            final_checkpoint,
        } => {
            AnnotationKey::PreviousCheckpoint.set(&mut pvc_annotations, previous.clone());
            AnnotationKey::CurrentCheckpoint.set(&mut pvc_annotations, current.clone());
            AnnotationKey::FinalCheckpoint.set(&mut pvc_annotations, final_checkpoint.to_string());
            AnnotationKey::CurrentPodId.set(&mut pvc_annotations, current_pod_id);
        }
        CheckpointAction::Finish => {
            if let Some(current) = AnnotationKey::CurrentCheckpoint.get(&pvc_annotations) {
                let _prev = pvc_annotations.remove(&checkpoints_copied_key(&current));
            }
            AnnotationKey::PreviousCheckpoint.remove(&mut pvc_annotations);
            AnnotationKey::CurrentCheckpoint.remove(&mut pvc_annotations);
            AnnotationKey::FinalCheckpoint.remove(&mut pvc_annotations);
            AnnotationKey::CurrentPodId.remove(&mut pvc_annotations);
            AnnotationKey::MultiStageImportDone.set(&mut pvc_annotations, "true");
        }
    }
    pvc_annotations
}
