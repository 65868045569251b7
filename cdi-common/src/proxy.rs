use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The fields `CDIConfig.status.importProxy` can be queried by. A closed tag enum in place of
/// the runtime-reflection-by-field-name the source implementation used (spec.md §9 REDESIGN
/// FLAGS: "Runtime reflection on status types").
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ImportProxyField {
    /// `HTTPProxy`
    Http,
    /// `HTTPSProxy`
    Https,
    /// `NoProxy`
    NoProxy,
    /// `TrustedCA.Name`, the config map carrying additional trusted CA certificates
    ConfigMapName,
}

/// Errors accessing `ImportProxy` fields, with the exact wording spec.md §4.7 specifies
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ImportProxyError {
    /// the `ImportProxy` struct itself is absent
    #[error("failed to get field, the CDIConfig ImportProxy is nil")]
    Nil,
    /// the requested field has no value
    #[error("CDIConfig ImportProxy does not have the field: {0}")]
    MissingField(&'static str),
}

impl ImportProxyField {
    /// Display name used in `ImportProxyError::MissingField`
    const fn label(self) -> &'static str {
        match self {
            Self::Http => "http",
            Self::Https => "https",
            Self::NoProxy => "no-proxy",
            Self::ConfigMapName => "configMapName",
        }
    }
}

/// Mirrors `CDIConfig.status.importProxy`: outbound HTTP(S) proxy configuration plus a
/// trusted-CA bundle config map, resolved from the cluster-wide `Proxy` object or, absent one,
/// from the CDIConfig's own spec (spec.md §4.7)
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ImportProxy {
    /// `HTTP_PROXY`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_proxy: Option<String>,
    /// `HTTPS_PROXY`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub https_proxy: Option<String>,
    /// `NO_PROXY`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub no_proxy: Option<String>,
    /// name of a config map carrying a trusted CA bundle to add to the worker pod's trust store
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trusted_ca_config_map_name: Option<String>,
}

impl ImportProxy {
    /// Look up a single field, producing the exact error strings spec.md §4.7 specifies
    pub fn get(this: Option<&Self>, field: ImportProxyField) -> Result<String, ImportProxyError> {
        let this = this.ok_or(ImportProxyError::Nil)?;
        let value = match field {
            ImportProxyField::Http => this.http_proxy.as_ref(),
            ImportProxyField::Https => this.https_proxy.as_ref(),
            ImportProxyField::NoProxy => this.no_proxy.as_ref(),
            ImportProxyField::ConfigMapName => this.trusted_ca_config_map_name.as_ref(),
        };
        value
            .cloned()
            .ok_or(ImportProxyError::MissingField(field.label()))
    }
}

#[cfg(test)]
mod test {
    use super::{ImportProxy, ImportProxyError, ImportProxyField};

    #[test]
    fn nil_import_proxy_errors() {
        assert_eq!(
            ImportProxy::get(None, ImportProxyField::Http).unwrap_err(),
            ImportProxyError::Nil
        );
    }

    #[test]
    fn missing_field_errors() {
        let proxy = ImportProxy::default();
        assert_eq!(
            ImportProxy::get(Some(&proxy), ImportProxyField::Https).unwrap_err(),
            ImportProxyError::MissingField("https")
        );
    }

    #[test]
    fn present_field_returns_value() {
        let proxy = ImportProxy {
            http_proxy: Some("http://proxy:3128".to_owned()),
            ..ImportProxy::default()
        };
        assert_eq!(
            ImportProxy::get(Some(&proxy), ImportProxyField::Http).unwrap(),
            "http://proxy:3128"
        );
    }
}
