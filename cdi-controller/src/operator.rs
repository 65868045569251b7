use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use cdi_api::v1beta1::{CdiConfig, DataSource, DataVolume, ObjectTransfer, StorageProfile};
use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use kube::api::{ListParams, Patch, PatchParams, PostParams};
use kube::runtime::wait::{await_condition, conditions};
use kube::{Api, Client, CustomResourceExt, Resource};
use tokio::signal;
use tracing::{debug, info, warn};
use utils::migration::ApiVersion;

use crate::config::Config;
use crate::context::Context;

/// wait crd to establish timeout
const CRD_ESTABLISH_TIMEOUT: Duration = Duration::from_secs(20);

/// CDI DataVolume reconciliation engine
#[derive(Debug)]
pub struct Operator {
    /// Config of this operator
    config: Config,
}

impl Operator {
    /// Constructor
    #[inline]
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Run the operator: install/migrate this engine's CRDs, then run the `DataVolume`,
    /// `StorageProfile` and proxy-propagation reconcilers alongside the progress scraper and the
    /// metrics/health HTTP server until shut down (spec.md §1, four independent reconcile loops
    /// sharing one process).
    ///
    /// # Errors
    ///
    /// Returns `Err` when startup (CRD install, client construction) or the web server fails.
    #[inline]
    pub async fn run(&self) -> Result<()> {
        let client: Client = Client::try_default().await?;
        self.prepare_crds(&client).await?;
        crate::metrics::init();

        let ctx = Arc::new(Context::new(client.clone(), self.config.clone()));

        let forceful_shutdown = async {
            info!("press ctrl+c to shut down gracefully");
            let _ctrl_c = signal::ctrl_c().await;
            info!("shutdown requested");
        };

        let data_volume_task = crate::datavolume::run(client.clone(), Arc::clone(&ctx));
        let storage_profile_task = crate::storageprofile::run(client.clone(), Arc::clone(&ctx));
        let proxy_task = crate::proxy::run(client.clone(), ctx);
        let progress_task = crate::pvc::progress::run(client.clone());
        let gc_task = crate::datavolume::gc::run(client);
        let web_server = self.web_server();

        tokio::pin!(forceful_shutdown);
        tokio::pin!(data_volume_task);
        tokio::pin!(storage_profile_task);
        tokio::pin!(proxy_task);
        tokio::pin!(progress_task);
        tokio::pin!(gc_task);
        tokio::pin!(web_server);

        let mut data_volume_shutdown = false;
        let mut storage_profile_shutdown = false;
        let mut proxy_shutdown = false;
        let mut progress_shutdown = false;
        let mut gc_shutdown = false;
        let mut web_server_shutdown = false;

        loop {
            tokio::select! {
                () = &mut forceful_shutdown => {
                    warn!("forceful shutdown");
                    break;
                }
                () = &mut data_volume_task, if !data_volume_shutdown => {
                    data_volume_shutdown = true;
                    info!("DataVolume controller stopped");
                }
                () = &mut storage_profile_task, if !storage_profile_shutdown => {
                    storage_profile_shutdown = true;
                    info!("StorageProfile controller stopped");
                }
                () = &mut proxy_task, if !proxy_shutdown => {
                    proxy_shutdown = true;
                    info!("proxy controller stopped");
                }
                () = &mut progress_task, if !progress_shutdown => {
                    progress_shutdown = true;
                    info!("progress scraper stopped");
                }
                () = &mut gc_task, if !gc_shutdown => {
                    gc_shutdown = true;
                    info!("garbage collector stopped");
                }
                res = &mut web_server, if !web_server_shutdown => {
                    res?;
                    web_server_shutdown = true;
                    info!("web server graceful shutdown");
                }
            }

            if data_volume_shutdown
                && storage_profile_shutdown
                && proxy_shutdown
                && progress_shutdown
                && gc_shutdown
                && web_server_shutdown
            {
                break;
            }
        }

        Ok(())
    }

    /// Ensure every CRD this engine owns is installed, migrating an already-installed one
    /// forward when its storage version is behind this binary's (spec.md §6, legacy
    /// `v1alpha1` coexisting with `v1beta1`).
    async fn prepare_crds(&self, client: &Client) -> Result<()> {
        let crd_api: Api<CustomResourceDefinition> = Api::all(client.clone());
        ensure_crd::<DataVolume>(&crd_api, self.config.create_crds, self.config.auto_migration).await?;
        ensure_crd::<StorageProfile>(&crd_api, self.config.create_crds, self.config.auto_migration).await?;
        ensure_crd::<CdiConfig>(&crd_api, self.config.create_crds, self.config.auto_migration).await?;
        ensure_crd::<DataSource>(&crd_api, self.config.create_crds, self.config.auto_migration).await?;
        ensure_crd::<ObjectTransfer>(&crd_api, self.config.create_crds, self.config.auto_migration).await?;
        Ok(())
    }

    /// Run a server exposing `/metrics` and `/healthz`
    async fn web_server(&self) -> Result<()> {
        axum::Server::bind(&self.config.listen_addr.parse()?)
            .serve(crate::router::app().into_make_service())
            .await?;
        Ok(())
    }

    /// Print the YAML manifest for every CRD this engine owns, for `kubectl apply -f -`
    /// (backs the standalone `crdgen` binary, mirroring the teacher's own `crdgen` bin)
    ///
    /// # Errors
    ///
    /// Returns `Err` if a manifest fails to serialize.
    #[inline]
    pub fn generate_crds(&self) -> Result<()> {
        print_crd(&DataVolume::crd())?;
        print_crd(&StorageProfile::crd())?;
        print_crd(&CdiConfig::crd())?;
        print_crd(&DataSource::crd())?;
        print_crd(&ObjectTransfer::crd())?;
        Ok(())
    }
}

fn print_crd(definition: &CustomResourceDefinition) -> Result<()> {
    println!("---");
    println!("{}", serde_yaml::to_string(definition)?);
    Ok(())
}

/// Install `K`'s CRD if absent, or patch it forward when the installed version is behind this
/// binary's and `create_crds`/`auto_migration` allows it (mirrors the teacher's single-CRD
/// `prepare_crd`, generalized over every CRD this engine owns).
async fn ensure_crd<K>(crd_api: &Api<CustomResourceDefinition>, create_crds: bool, auto_migration: bool) -> Result<()>
where
    K: Resource + CustomResourceExt,
    K::DynamicType: Default,
{
    let crds: HashMap<_, _> = crd_api
        .list(&ListParams::default())
        .await?
        .items
        .into_iter()
        .filter_map(|crd| crd.metadata.name.map(|name| (name, crd.spec.versions)))
        .collect();
    let definition = K::crd();
    let name = K::crd_name();

    match crds.get(name) {
        None => {
            debug!("{name} CRD not found, installing it");
            let _crd = crd_api.create(&PostParams::default(), &definition).await?;
        }
        Some(versions) => {
            let current_version: ApiVersion<K> = K::version(&K::DynamicType::default()).as_ref().parse()?;
            debug!("found {name} CRD, current version {current_version}");
            let installed: Vec<ApiVersion<K>> = versions.iter().map(|v| v.name.parse()).collect::<Result<_>>()?;

            let behind = installed.iter().all(|ver| &current_version > ver);
            if behind && (create_crds || auto_migration) {
                debug!("{current_version} is ahead of every installed version of {name}, patching");
                let _crd = crd_api
                    .patch(name, &PatchParams::default(), &Patch::Merge(definition))
                    .await?;
                return Ok(());
            }
            assert!(
                create_crds || !installed.iter().any(|ver| ver > &current_version),
                "the installed {name} CRD is ahead of this binary's {current_version}; upgrade the operator or pass --create-crds"
            );
        }
    }

    let establish = await_condition(crd_api.clone(), name, conditions::is_crd_established());
    let _crd = tokio::time::timeout(CRD_ESTABLISH_TIMEOUT, establish).await??;
    debug!("{name} CRD established");
    Ok(())
}
