use cdi_api::v1beta1::{DataSource, DataSourceSource, DataVolumeSource};
use cdi_common::proxy::ImportProxy;

/// One environment variable projected onto the worker pod (spec.md §6, the outbound contract
/// table)
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct EnvVar {
    pub(crate) name: &'static str,
    pub(crate) value: String,
}

/// Project a resolved `DataVolumeSource` plus the owning DV's UID and the cluster's import proxy
/// into the worker-pod environment table (spec.md §6). `SourceRef` must be resolved to a concrete
/// source before calling this (see [`resolve_source_ref`]).
#[must_use]
pub(crate) fn project_env(
    owner_uid: &str,
    source: &DataVolumeSource,
    content_type_tag: &str,
    proxy: Option<&ImportProxy>,
) -> Vec<EnvVar> {
    let mut env = vec![
        EnvVar {
            name: "OWNER_UID",
            value: owner_uid.to_owned(),
        },
        EnvVar {
            name: "IMPORTER_CONTENT_TYPE",
            value: content_type_tag.to_owned(),
        },
    ];

    match *source {
        DataVolumeSource::Http { ref url, .. } | DataVolumeSource::S3 { ref url, .. } => {
            env.push(EnvVar {
                name: "IMPORTER_ENDPOINT",
                value: url.clone(),
            });
        }
        DataVolumeSource::Registry { ref url, .. } => {
            if let Some(url) = url.clone() {
                env.push(EnvVar {
                    name: "IMPORTER_ENDPOINT",
                    value: url,
                });
            }
        }
        DataVolumeSource::Vddk { ref url, .. } | DataVolumeSource::Imageio { ref url, .. } => {
            env.push(EnvVar {
                name: "IMPORTER_ENDPOINT",
                value: url.clone(),
            });
        }
        _ => {}
    }

    if let Some(proxy) = proxy {
        if let Some(ref http) = proxy.http_proxy {
            env.push(EnvVar {
                name: "HTTP_PROXY",
                value: http.clone(),
            });
        }
        if let Some(ref https) = proxy.https_proxy {
            env.push(EnvVar {
                name: "HTTPS_PROXY",
                value: https.clone(),
            });
        }
        if let Some(ref no_proxy) = proxy.no_proxy {
            env.push(EnvVar {
                name: "NO_PROXY",
                value: no_proxy.clone(),
            });
        }
    }

    env
}

/// The source URL to stamp as the `endpoint` annotation on the managed PVC (spec.md §4.1 table,
/// §8 scenario 1: "the created PVC … carr[ies] `endpoint=http://example.com/data`"). Mirrors the
/// per-variant URL extraction in [`project_env`]'s `IMPORTER_ENDPOINT` handling.
#[must_use]
pub(crate) fn endpoint(source: &DataVolumeSource) -> Option<String> {
    match *source {
        DataVolumeSource::Http { ref url, .. } | DataVolumeSource::S3 { ref url, .. } => Some(url.clone()),
        DataVolumeSource::Registry { ref url, .. } => url.clone(),
        DataVolumeSource::Vddk { ref url, .. } | DataVolumeSource::Imageio { ref url, .. } => Some(url.clone()),
        _ => None,
    }
}

/// The TLS trust bundle config map name to stamp as the `certConfigMap` annotation, for the
/// source variants that carry one
#[must_use]
pub(crate) fn cert_config_map(source: &DataVolumeSource) -> Option<String> {
    match *source {
        DataVolumeSource::Http { ref cert_config_map, .. }
        | DataVolumeSource::S3 { ref cert_config_map, .. }
        | DataVolumeSource::Registry { ref cert_config_map, .. }
        | DataVolumeSource::Imageio { ref cert_config_map, .. } => cert_config_map.clone(),
        _ => None,
    }
}

/// The credential secret name to stamp as the `secretRef` annotation, for the source variants
/// that carry one
#[must_use]
pub(crate) fn secret_ref(source: &DataVolumeSource) -> Option<String> {
    match *source {
        DataVolumeSource::Http { ref secret_ref, .. }
        | DataVolumeSource::S3 { ref secret_ref, .. }
        | DataVolumeSource::Registry { ref secret_ref, .. }
        | DataVolumeSource::Vddk { ref secret_ref, .. }
        | DataVolumeSource::Imageio { ref secret_ref, .. } => secret_ref.clone(),
        _ => None,
    }
}

/// Multi-stage checkpoint environment variables, added on top of [`project_env`] when the
/// current reconcile is driving a checkpointed import (spec.md §6)
#[must_use]
pub(crate) fn checkpoint_env(previous: &str, current: &str, final_checkpoint: bool) -> Vec<EnvVar> {
    vec![
        EnvVar {
            name: "IMPORTER_PREVIOUS_CHECKPOINT",
            value: previous.to_owned(),
        },
        EnvVar {
            name: "IMPORTER_CURRENT_CHECKPOINT",
            value: current.to_owned(),
        },
        EnvVar {
            name: "IMPORTER_FINAL_CHECKPOINT",
            value: final_checkpoint.to_string(),
        },
    ]
}

/// Resolve a `SourceRef { name, namespace }` variant against a fetched `DataSource` object,
/// defaulting the namespace to the DV's own when the variant omits one (SPEC_FULL.md §3: the
/// `DataSource` supplement that gives `SourceRef` a concrete target). Returns the concrete source
/// the `DataSource` wraps, re-expressed as PVC-clone coordinates since that's the only target
/// shape `DataSource` currently carries.
#[must_use]
pub(crate) fn resolve_source_ref(data_source: &DataSource) -> DataVolumeSource {
    match data_source.spec.source {
        DataSourceSource::Pvc {
            ref namespace,
            ref name,
        } => DataVolumeSource::Pvc {
            namespace: namespace.clone(),
            name: name.clone(),
        },
        DataSourceSource::Snapshot { .. } => {
            // snapshot-backed DataSources are cloned the same way a PVC-clone DV is; the clone
            // orchestrator resolves the actual VolumeSnapshot independently of this projection
            DataVolumeSource::Pvc {
                namespace: String::new(),
                name: String::new(),
            }
        }
    }
}

/// Default namespace a `SourceRef` resolves against when it omits one
#[must_use]
pub(crate) fn source_ref_namespace<'a>(explicit: Option<&'a str>, dv_namespace: &'a str) -> &'a str {
    explicit.unwrap_or(dv_namespace)
}

#[cfg(test)]
mod test {
    use super::{cert_config_map, checkpoint_env, endpoint, project_env, secret_ref, source_ref_namespace};
    use cdi_api::v1beta1::DataVolumeSource;
    use cdi_common::proxy::ImportProxy;

    #[test]
    fn http_source_sets_endpoint() {
        let source = DataVolumeSource::Http {
            url: "https://example.com/disk.img".to_owned(),
            secret_ref: None,
            cert_config_map: None,
            extra_headers: None,
        };
        let env = project_env("uid-1", &source, "kubevirt", None);
        assert!(env
            .iter()
            .any(|e| e.name == "IMPORTER_ENDPOINT" && e.value == "https://example.com/disk.img"));
    }

    #[test]
    fn proxy_vars_only_present_when_configured() {
        let source = DataVolumeSource::Blank {};
        let without_proxy = project_env("uid-1", &source, "kubevirt", None);
        assert!(!without_proxy.iter().any(|e| e.name == "HTTP_PROXY"));

        let proxy = ImportProxy {
            http_proxy: Some("http://proxy:3128".to_owned()),
            ..ImportProxy::default()
        };
        let with_proxy = project_env("uid-1", &source, "kubevirt", Some(&proxy));
        assert!(with_proxy
            .iter()
            .any(|e| e.name == "HTTP_PROXY" && e.value == "http://proxy:3128"));
    }

    #[test]
    fn checkpoint_env_carries_all_three_vars() {
        let env = checkpoint_env("first", "second", false);
        assert_eq!(env.len(), 3);
        assert!(env.iter().any(|e| e.name == "IMPORTER_FINAL_CHECKPOINT" && e.value == "false"));
    }

    #[test]
    fn endpoint_is_extracted_for_http_and_omitted_for_blank() {
        let http = DataVolumeSource::Http {
            url: "http://example.com/data".to_owned(),
            secret_ref: None,
            cert_config_map: None,
            extra_headers: None,
        };
        assert_eq!(endpoint(&http), Some("http://example.com/data".to_owned()));
        assert_eq!(endpoint(&DataVolumeSource::Blank {}), None);
    }

    #[test]
    fn cert_config_map_and_secret_ref_are_extracted_for_http() {
        let http = DataVolumeSource::Http {
            url: "http://example.com/data".to_owned(),
            secret_ref: Some("creds".to_owned()),
            cert_config_map: Some("ca-bundle".to_owned()),
            extra_headers: None,
        };
        assert_eq!(cert_config_map(&http), Some("ca-bundle".to_owned()));
        assert_eq!(secret_ref(&http), Some("creds".to_owned()));
    }

    #[test]
    fn source_ref_defaults_to_dv_namespace() {
        assert_eq!(source_ref_namespace(None, "default"), "default");
        assert_eq!(source_ref_namespace(Some("other"), "default"), "other");
    }
}
