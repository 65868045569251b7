use std::sync::Arc;

use cdi_api::v1beta1::{StorageProfile, StorageProfileSpec, StorageProfileStatus};
use cdi_common::registry::{AccessMode, ClaimPropertySet, VolumeMode};
use futures::StreamExt;
use k8s_openapi::api::core::v1::PersistentVolume;
use k8s_openapi::api::storage::v1::StorageClass;
use kube::runtime::controller::Action;
use kube::runtime::{watcher, Controller};
use kube::{Api, Client, ResourceExt};
use tracing::{error, info};

use crate::consts::DEFAULT_REQUEUE_DURATION;
use crate::context::Context;
use crate::metrics::INCOMPLETE_PROFILE_GAUGE;
use crate::store::{KubeStore, Store};

use super::{count_incomplete, resolve_claim_property_sets, Error};

/// Start the `StorageProfile` controller loop (spec.md §4.4): one `StorageProfile` per
/// `StorageClass`, self-provisioned and kept in sync with the resolved capability set.
pub(crate) async fn run(client: Client, ctx: Arc<Context>) {
    let classes: Api<StorageClass> = Api::all(client);

    Controller::new(classes, watcher::Config::default())
        .run(reconcile, error_policy, ctx)
        .for_each(|result| async move {
            match result {
                Ok((object, _action)) => info!("reconciled StorageProfile for {}", object.name),
                Err(err) => error!("StorageProfile reconcile failed: {err}"),
            }
        })
        .await;
}

async fn reconcile(storage_class: Arc<StorageClass>, ctx: Arc<Context>) -> Result<Action, Error> {
    let client = ctx.client.clone();
    let name = storage_class.name_any();

    let profile_store = KubeStore::new(Api::<StorageProfile>::all(client.clone()), cdi_common::consts::FIELD_MANAGER);
    let pv_api: Api<PersistentVolume> = Api::all(client);

    let provisioner = storage_class.provisioner.clone();
    let observed = if provisioner.is_empty() {
        enumerate_from_bound_pvs(&pv_api, &name).await
    } else {
        Vec::new()
    };

    let existing = profile_store.get(&name).await.map_err(Error::Kube)?;
    let spec = existing
        .as_ref()
        .map(|profile| profile.spec.clone())
        .unwrap_or_default();

    let resolved = resolve_claim_property_sets(
        &spec,
        (!provisioner.is_empty()).then_some(provisioner.as_str()),
        &observed,
    );
    let resolved = if resolved.is_empty() {
        vec![super::default_claim_property_set()]
    } else {
        resolved
    };

    INCOMPLETE_PROFILE_GAUGE.set(incomplete_gauge_delta(&resolved) as f64);

    let mut profile = StorageProfile::new(&name, spec);
    profile.status = Some(StorageProfileStatus {
        storage_class: Some(name.clone()),
        provisioner: (!provisioner.is_empty()).then_some(provisioner),
        claim_property_sets: resolved,
    });

    let _profile = profile_store.patch(&name, &profile).await.map_err(Error::Kube)?;
    Ok(Action::requeue(DEFAULT_REQUEUE_DURATION))
}

fn incomplete_gauge_delta(sets: &[ClaimPropertySet]) -> usize {
    count_incomplete(sets)
}

/// Fallback for storage classes with no recognized provisioner (e.g. local or static
/// provisioning): derive the usable `{accessModes, volumeMode}` combinations from PVs actually
/// bound through this class (spec.md §4.4 step 3)
async fn enumerate_from_bound_pvs(pv_api: &Api<PersistentVolume>, storage_class: &str) -> Vec<ClaimPropertySet> {
    let pvs = match pv_api.list(&Default::default()).await {
        Ok(list) => list.items,
        Err(err) => {
            error!("failed to enumerate PVs for storage class {storage_class}: {err}");
            return Vec::new();
        }
    };

    let mut sets = Vec::new();
    for pv in pvs {
        let Some(ref spec) = pv.spec else { continue };
        if spec.storage_class_name.as_deref() != Some(storage_class) {
            continue;
        }
        let volume_mode = match spec.volume_mode.as_deref() {
            Some("Block") => Some(VolumeMode::Block),
            _ => Some(VolumeMode::Filesystem),
        };
        let access_modes = spec
            .access_modes
            .clone()
            .unwrap_or_default()
            .into_iter()
            .filter_map(|mode| match mode.as_str() {
                "ReadWriteOnce" => Some(AccessMode::ReadWriteOnce),
                "ReadWriteMany" => Some(AccessMode::ReadWriteMany),
                "ReadOnlyMany" => Some(AccessMode::ReadOnlyMany),
                "ReadWriteOncePod" => Some(AccessMode::ReadWriteOncePod),
                _ => None,
            })
            .collect();
        let set = ClaimPropertySet {
            access_modes,
            volume_mode,
        };
        if !sets.contains(&set) {
            sets.push(set);
        }
    }
    sets
}

fn error_policy(_storage_class: Arc<StorageClass>, err: &Error, _ctx: Arc<Context>) -> Action {
    err.retry_policy().into_action()
}
