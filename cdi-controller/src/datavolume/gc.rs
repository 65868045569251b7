use cdi_api::v1beta1::{CdiConfig, ConditionStatus, DataVolume, DataVolumePhase};
use cdi_common::consts::AnnotationKey;
use chrono::{DateTime, Utc};
use kube::api::ListParams;
use kube::{Api, Client, ResourceExt};
use tracing::{debug, warn};

/// Whether a terminal DV past its TTL should be deleted now (spec.md §3, "TTL for completed
/// DVs"). A DV the user has annotated `deleteAfterCompletion=false` is left untouched even past
/// its TTL — spec.md §9's Open Question resolves that annotation as user-authoritative (the
/// mismatch is surfaced as a Warning event, not silently overridden).
#[must_use]
pub(crate) fn should_delete(
    phase: DataVolumePhase,
    completed_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    ttl: std::time::Duration,
    delete_after_completion: Option<&str>,
) -> bool {
    if delete_after_completion == Some("false") {
        return false;
    }
    if !matches!(phase, DataVolumePhase::Succeeded | DataVolumePhase::Failed) {
        return false;
    }
    let Some(completed_at) = completed_at else {
        return false;
    };
    now.signed_duration_since(completed_at)
        .to_std()
        .is_ok_and(|elapsed| elapsed >= ttl)
}

/// The moment a DV most recently became terminal, taken as the latest `lastTransitionTime` among
/// its conditions (spec.md §4.1: conditions are the only place a transition timestamp lives)
#[must_use]
fn completion_time(dv: &DataVolume) -> Option<DateTime<Utc>> {
    dv.status
        .as_ref()?
        .conditions
        .iter()
        .filter(|c| c.status == ConditionStatus::True)
        .filter_map(|c| c.last_transition_time.as_ref())
        .map(|time| time.0)
        .max()
}

/// Periodically delete terminal `DataVolume`s whose TTL (`CdiConfig.spec.dataVolumeTtlSeconds`)
/// has elapsed. A no-op sweep whenever the cluster has no TTL configured (spec.md §4.1: GC is an
/// opt-in ambient concern, not a default reconcile behavior).
pub(crate) async fn run(client: Client) {
    let mut ticker = tokio::time::interval(crate::consts::GC_SWEEP_INTERVAL);
    loop {
        ticker.tick().await;
        sweep_once(&client).await;
    }
}

async fn sweep_once(client: &Client) {
    let cdi_config_api: Api<CdiConfig> = Api::all(client.clone());
    let Ok(cdi_config) = cdi_config_api.get("config").await else {
        return;
    };
    let Some(ttl_seconds) = cdi_config.spec.data_volume_ttl_seconds else {
        return;
    };
    let ttl = std::time::Duration::from_secs(ttl_seconds);

    let dvs: Api<DataVolume> = Api::all(client.clone());
    let list = match dvs.list(&ListParams::default()).await {
        Ok(list) => list.items,
        Err(err) => {
            warn!("gc sweep failed to list DataVolumes: {err}");
            return;
        }
    };

    let now = Utc::now();
    for dv in list {
        let phase = dv.status.as_ref().map_or(DataVolumePhase::Unset, |s| s.phase);
        let annotations = dv.metadata.annotations.clone().unwrap_or_default();
        let delete_after_completion = AnnotationKey::DeleteAfterCompletion.get(&annotations);

        if !should_delete(phase, completion_time(&dv), now, ttl, delete_after_completion.as_deref()) {
            continue;
        }

        let namespace = dv.namespace().unwrap_or_default();
        let namespaced: Api<DataVolume> = Api::namespaced(client.clone(), &namespace);
        match namespaced.delete(&dv.name_any(), &Default::default()).await {
            Ok(_) => debug!("gc deleted terminal DataVolume {}/{}", namespace, dv.name_any()),
            Err(err) => warn!("gc sweep failed to delete {}/{}: {err}", namespace, dv.name_any()),
        }
    }
}
