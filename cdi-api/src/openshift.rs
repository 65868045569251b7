use cdi_common::proxy::ImportProxy;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Hand-written mirror of OpenShift's cluster-scoped `config.openshift.io/v1` `Proxy` singleton
/// (spec.md §4.7). Absent on vanilla Kubernetes clusters; the proxy propagation logic falls back
/// to `CDIConfig.spec.importProxy` when this object cannot be found.
#[derive(CustomResource, Deserialize, Serialize, Clone, Debug, Default, JsonSchema)]
#[kube(
    group = "config.openshift.io",
    version = "v1",
    kind = "Proxy",
    struct = "Proxy",
    status = "ProxyStatus"
)]
#[serde(rename_all = "camelCase")]
pub struct ProxySpec {
    /// user-facing proxy configuration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_proxy: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub https_proxy: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub no_proxy: Option<String>,
}

/// Cluster-wide effective proxy configuration, merged by the cluster network operator; this is
/// the side the reconciler actually reads (spec.md §4.7)
#[derive(Deserialize, Serialize, Clone, Debug, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProxyStatus {
    /// effective `HTTP_PROXY`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_proxy: Option<String>,
    /// effective `HTTPS_PROXY`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub https_proxy: Option<String>,
    /// effective `NO_PROXY`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub no_proxy: Option<String>,
}

impl ProxyStatus {
    /// Project this cluster-wide status onto the `ImportProxy` shape the reconciler threads
    /// through to the worker pod (spec.md §4.7). The trusted CA config map is never carried by
    /// the OpenShift `Proxy` object itself and must come from `CDIConfig`.
    #[must_use]
    pub fn to_import_proxy(&self) -> ImportProxy {
        ImportProxy {
            http_proxy: self.http_proxy.clone(),
            https_proxy: self.https_proxy.clone(),
            no_proxy: self.no_proxy.clone(),
            trusted_ca_config_map_name: None,
        }
    }
}
