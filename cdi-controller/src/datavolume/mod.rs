use std::sync::Arc;

use cdi_api::snapshot::VolumeSnapshot;
use cdi_api::v1beta1::{CdiConfig, DataSource, DataVolume, ObjectTransfer, StorageProfile};
use futures::StreamExt;
use k8s_openapi::api::core::v1::{PersistentVolumeClaim, Pod};
use kube::runtime::controller::Action;
use kube::runtime::events::Recorder;
use kube::runtime::{watcher, Controller};
use kube::{Api, Client, ResourceExt};
use tracing::{error, info};

use crate::consts::DEFAULT_REQUEUE_DURATION;
use crate::context::Context;
use crate::events::KubeEvents;
use crate::store::KubeStore;

pub(crate) mod annotations;
pub(crate) mod checkpoint;
pub(crate) mod gc;
pub(crate) mod phase;
mod reconciler;
mod source;

pub(crate) use reconciler::reconcile_once;

/// Errors a DataVolume reconcile can raise (spec.md §7 error taxonomy)
#[derive(Debug, thiserror::Error)]
pub(crate) enum Error {
    /// any Kubernetes API call failure
    #[error("kubernetes api error: {0}")]
    Kube(#[from] kube::Error),
    /// the DataVolume references a `CdiConfig`/`DataSource` that does not exist
    #[error("referenced object not found: {0}")]
    MissingReference(String),
    /// the clone orchestrator failed
    #[error(transparent)]
    Clone(#[from] crate::clone::Error),
    /// storage-profile resolution failed (spec.md §4.4, invoked before the PVC is created)
    #[error(transparent)]
    StorageProfile(#[from] crate::storageprofile::Error),
    /// a PVC named after this DV already exists, is not annotated `populatedFor`, and is not
    /// owned by this DV (spec.md §4.1 invariant 1)
    #[error("PVC {0} already exists and is not managed by this DataVolume")]
    AlreadyExists(String),
}

impl Error {
    /// Classify this error per spec.md §7: `NotFound` on a transient dependent (CDIConfig not
    /// yet reconciled) retries on the default backoff; a pre-existing unmanaged PVC needs
    /// operator intervention and does not self-heal by retrying
    pub(crate) fn retry_policy(&self) -> crate::error::RetryPolicy {
        match *self {
            Self::Clone(ref err) => err.retry_policy(),
            Self::StorageProfile(ref err) => err.retry_policy(),
            Self::Kube(_) | Self::MissingReference(_) => {
                crate::error::RetryPolicy::Retry(DEFAULT_REQUEUE_DURATION)
            }
            Self::AlreadyExists(_) => crate::error::RetryPolicy::NoRetry,
        }
    }
}

/// Start the `DataVolume` controller loop (spec.md §4.1). Watches `DataVolume`, owned `PVC`s and
/// `Pod`s, re-running [`reconcile_once`] whenever any of them change.
pub(crate) async fn run(client: Client, ctx: Arc<Context>) {
    let dvs: Api<DataVolume> = Api::all(client.clone());
    let pvcs: Api<PersistentVolumeClaim> = Api::all(client.clone());
    let pods: Api<Pod> = Api::all(client.clone());

    Controller::new(dvs, watcher::Config::default())
        .owns(pvcs, watcher::Config::default())
        .owns(pods, watcher::Config::default())
        .run(reconcile, error_policy, ctx)
        .for_each(|result| async move {
            match result {
                Ok((object, _action)) => info!("reconciled DataVolume {}", object.name),
                Err(err) => error!("DataVolume reconcile failed: {err}"),
            }
        })
        .await;
}

async fn reconcile(dv: Arc<DataVolume>, ctx: Arc<Context>) -> Result<Action, Error> {
    let namespace = dv.namespace().unwrap_or_default();
    let client = ctx.client.clone();

    let dv_store = KubeStore::new(Api::<DataVolume>::namespaced(client.clone(), &namespace), cdi_common::consts::FIELD_MANAGER);
    let pvc_store = KubeStore::new(
        Api::<PersistentVolumeClaim>::namespaced(client.clone(), &namespace),
        cdi_common::consts::FIELD_MANAGER,
    );
    let pod_store = KubeStore::new(Api::<Pod>::namespaced(client.clone(), &namespace), cdi_common::consts::FIELD_MANAGER);
    let events = KubeEvents::new(Recorder::new(
        client.clone(),
        "cdi-datavolume-controller".into(),
        dv.object_ref(&()),
    ));

    // the clone-source guard reads/writes the PVC in whatever namespace the source lives in,
    // which may differ from the target DV's own namespace
    let source_namespace = match dv.spec.source {
        cdi_api::v1beta1::DataVolumeSource::Pvc { ref namespace, .. } => namespace.clone(),
        _ => namespace.clone(),
    };
    let clone_source_store = KubeStore::new(
        Api::<PersistentVolumeClaim>::namespaced(client.clone(), &source_namespace),
        cdi_common::consts::FIELD_MANAGER,
    );
    let clone_source_pod_store = KubeStore::new(
        Api::<Pod>::namespaced(client.clone(), &source_namespace),
        cdi_common::consts::FIELD_MANAGER,
    );
    let snapshot_store = KubeStore::new(
        Api::<VolumeSnapshot>::namespaced(client.clone(), &source_namespace),
        cdi_common::consts::FIELD_MANAGER,
    );

    // a `sourceRef` may default to the DV's own namespace, or may name one explicitly
    let source_ref_namespace = match dv.spec.source {
        cdi_api::v1beta1::DataVolumeSource::SourceRef { namespace: ref ns, .. } => {
            source::source_ref_namespace(ns.as_deref(), &namespace).to_owned()
        }
        _ => namespace.clone(),
    };
    let data_source_store = KubeStore::new(
        Api::<DataSource>::namespaced(client.clone(), &source_ref_namespace),
        cdi_common::consts::FIELD_MANAGER,
    );

    let storage_profile_store = KubeStore::new(Api::<StorageProfile>::all(client.clone()), cdi_common::consts::FIELD_MANAGER);
    let transfer_store = KubeStore::new(Api::<ObjectTransfer>::all(client.clone()), cdi_common::consts::FIELD_MANAGER);

    let cdi_config_api: Api<CdiConfig> = Api::all(client);
    let cdi_config = cdi_config_api
        .get("config")
        .await
        .map_err(|_| Error::MissingReference("CdiConfig/config".to_owned()))?;

    reconciler::reconcile_once(
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
        ctx.config.honor_wait_for_first_consumer,
    )
    .await
}

fn error_policy(dv: Arc<DataVolume>, err: &Error, ctx: Arc<Context>) -> Action {
    error!("reconcile of {} failed: {err}", dv.name_any());
    reconciler::error_policy(dv, err, ctx)
}
