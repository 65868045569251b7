use std::sync::Arc;

use cdi_api::openshift::Proxy;
use cdi_api::v1beta1::{CdiConfig, CdiConfigStatus};
use futures::StreamExt;
use kube::runtime::controller::Action;
use kube::runtime::{watcher, Controller};
use kube::{Api, Client, ResourceExt};
use tracing::{error, info};

use crate::consts::DEFAULT_REQUEUE_DURATION;
use crate::context::Context;
use crate::store::{KubeStore, Store};

/// Name of the cluster-scoped `CDIConfig` singleton this reconciler keeps up to date
const CONFIG_NAME: &str = "config";
/// Name of the cluster-scoped OpenShift `Proxy` singleton, fixed by convention upstream
const CLUSTER_PROXY_NAME: &str = "cluster";

/// Errors the proxy propagation reconciler can raise (spec.md §4.7, §7 error taxonomy)
#[derive(Debug, thiserror::Error)]
pub(crate) enum Error {
    /// any Kubernetes API call failure, including a missing `CDIConfig` singleton
    #[error("kubernetes api error: {0}")]
    Kube(#[from] kube::Error),
}

impl Error {
    /// Every failure here is a transient API hiccup; retry on the default backoff
    pub(crate) fn retry_policy(&self) -> crate::error::RetryPolicy {
        match *self {
            Self::Kube(_) => crate::error::RetryPolicy::Retry(DEFAULT_REQUEUE_DURATION),
        }
    }
}

/// Start the proxy propagation controller loop (spec.md §4.7): triggered by `CDIConfig` changes,
/// re-derives the effective `ImportProxy` from the cluster `Proxy` object (if present) or from
/// `CDIConfig.spec.importProxy` and writes it back to `CDIConfig.status.importProxy`.
pub(crate) async fn run(client: Client, ctx: Arc<Context>) {
    let configs: Api<CdiConfig> = Api::all(client);

    Controller::new(configs, watcher::Config::default())
        .run(reconcile, error_policy, ctx)
        .for_each(|result| async move {
            match result {
                Ok((object, _action)) => info!("reconciled proxy settings for {}", object.name),
                Err(err) => error!("proxy reconcile failed: {err}"),
            }
        })
        .await;
}

async fn reconcile(cdi_config: Arc<CdiConfig>, ctx: Arc<Context>) -> Result<Action, Error> {
    if cdi_config.name_any() != CONFIG_NAME {
        return Ok(Action::await_change());
    }

    let client = ctx.client.clone();
    let config_store = KubeStore::new(Api::<CdiConfig>::all(client.clone()), cdi_common::consts::FIELD_MANAGER);
    let proxy_api: Api<Proxy> = Api::all(client);

    let cluster_proxy = match proxy_api.get(CLUSTER_PROXY_NAME).await {
        Ok(proxy) => Some(proxy),
        Err(kube::Error::Api(err)) if err.code == 404 => None,
        Err(err) => return Err(Error::Kube(err)),
    };

    let effective = merge(cluster_proxy.as_ref(), &cdi_config);

    let mut patch = (*cdi_config).clone();
    let status = patch.status.get_or_insert_with(CdiConfigStatus::default);
    status.import_proxy = effective;

    let _config = config_store.patch(CONFIG_NAME, &patch).await.map_err(Error::Kube)?;
    Ok(Action::requeue(DEFAULT_REQUEUE_DURATION))
}

/// The cluster `Proxy` object wins when present (its `TrustedCA` is still sourced from
/// `CDIConfig.spec`, since the OpenShift object never carries one); absent a `Proxy` object,
/// `CDIConfig.spec.importProxy` is used verbatim (spec.md §4.7)
fn merge(cluster_proxy: Option<&Proxy>, cdi_config: &CdiConfig) -> Option<cdi_common::proxy::ImportProxy> {
    let spec_proxy = cdi_config.spec.import_proxy.as_ref();

    match cluster_proxy.and_then(|proxy| proxy.status.as_ref()) {
        Some(status) => {
            let mut merged = status.to_import_proxy();
            merged.trusted_ca_config_map_name = spec_proxy.and_then(|p| p.trusted_ca_config_map_name.clone());
            Some(merged)
        }
        None => spec_proxy.cloned(),
    }
}

fn error_policy(_cdi_config: Arc<CdiConfig>, err: &Error, _ctx: Arc<Context>) -> Action {
    err.retry_policy().into_action()
}

#[cfg(test)]
mod test {
    use super::merge;
    use cdi_api::openshift::{Proxy, ProxySpec, ProxyStatus};
    use cdi_api::v1beta1::{CdiConfig, CdiConfigSpec};
    use cdi_common::proxy::ImportProxy;

    fn config_with_spec_proxy() -> CdiConfig {
        CdiConfig::new(
            "config",
            CdiConfigSpec {
                import_proxy: Some(ImportProxy {
                    http_proxy: Some("http://spec-proxy:3128".to_owned()),
                    https_proxy: None,
                    no_proxy: None,
                    trusted_ca_config_map_name: Some("my-ca-bundle".to_owned()),
                }),
                ..CdiConfigSpec::default()
            },
        )
    }

    #[test]
    fn falls_back_to_spec_when_no_cluster_proxy() {
        let config = config_with_spec_proxy();
        let effective = merge(None, &config).unwrap();
        assert_eq!(effective.http_proxy.as_deref(), Some("http://spec-proxy:3128"));
    }

    #[test]
    fn cluster_proxy_wins_but_keeps_spec_trusted_ca() {
        let config = config_with_spec_proxy();
        let cluster = Proxy::new(
            "cluster",
            ProxySpec::default(),
        );
        let mut cluster = cluster;
        cluster.status = Some(ProxyStatus {
            http_proxy: Some("http://cluster-proxy:3128".to_owned()),
            https_proxy: Some("https://cluster-proxy:3128".to_owned()),
            no_proxy: Some("localhost".to_owned()),
        });

        let effective = merge(Some(&cluster), &config).unwrap();
        assert_eq!(effective.http_proxy.as_deref(), Some("http://cluster-proxy:3128"));
        assert_eq!(effective.no_proxy.as_deref(), Some("localhost"));
        assert_eq!(effective.trusted_ca_config_map_name.as_deref(), Some("my-ca-bundle"));
    }

    #[test]
    fn no_proxy_anywhere_resolves_to_none() {
        let config = CdiConfig::new("config", CdiConfigSpec::default());
        assert!(merge(None, &config).is_none());
    }
}
