use cdi_api::v1beta1::{CdiConfig, DataVolume, DataVolumeSource};
use cdi_common::consts::AnnotationKey;

/// One annotation to add or leave untouched on a `DataVolume`, the mutating-admission contract
/// reduced to a pure, testable function (spec.md §6: "mutating admission webhook adds
/// `cloneToken` annotation and `deleteAfterCompletion=true` when CDIConfig requests TTL"). The
/// webhook server itself is out of scope (spec.md §1); only the mutation logic is ambient
/// validation/config plumbing worth keeping in-process and unit-testable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct AnnotationPatch {
    /// the annotation key
    pub(crate) key: &'static str,
    /// the value to set
    pub(crate) value: String,
}

/// Compute the annotations the admission webhook would add to `dv` before it is persisted.
/// Never overwrites a value the user has already set — spec.md §9's "user-authoritative"
/// resolution for `deleteAfterCompletion` generalizes to every annotation this function emits.
#[must_use]
pub(crate) fn mutate(dv: &DataVolume, cdi_config: &CdiConfig) -> Vec<AnnotationPatch> {
    let existing = dv.metadata.annotations.clone().unwrap_or_default();
    let mut patches = Vec::new();

    if matches!(dv.spec.source, DataVolumeSource::Pvc { .. })
        && AnnotationKey::CloneOf.get(&existing).is_none()
    {
        patches.push(AnnotationPatch {
            key: "cdi.kubevirt.io/storage.cloneToken",
            value: clone_token(dv),
        });
    }

    if cdi_config.spec.data_volume_ttl_seconds.is_some()
        && AnnotationKey::DeleteAfterCompletion.get(&existing).is_none()
    {
        patches.push(AnnotationPatch {
            key: AnnotationKey::DeleteAfterCompletion.as_str(),
            value: "true".to_owned(),
        });
    }

    patches
}

/// Build the clone-token payload (spec.md §6: `{operation=clone, name, namespace, resource,
/// params:{targetNamespace, targetName}}`). Signing is left to the real admission server; this
/// produces the unsigned JSON payload the signature covers.
fn clone_token(dv: &DataVolume) -> String {
    let DataVolumeSource::Pvc {
        ref namespace,
        ref name,
    } = dv.spec.source
    else {
        return String::new();
    };
    let target_namespace = dv.metadata.namespace.clone().unwrap_or_default();
    let target_name = dv.metadata.name.clone().unwrap_or_default();
    serde_json::json!({
        "operation": "clone",
        "name": name,
        "namespace": namespace,
        "resource": "persistentvolumeclaims",
        "params": {
            "targetNamespace": target_namespace,
            "targetName": target_name,
        },
    })
    .to_string()
}

#[cfg(test)]
mod test {
    use super::mutate;
    use cdi_api::v1beta1::{CdiConfig, CdiConfigSpec, DataVolume, DataVolumeSource, DataVolumeSpec};

    fn clone_dv() -> DataVolume {
        let mut dv = DataVolume::new(
            "test-dv",
            DataVolumeSpec {
                source: DataVolumeSource::Pvc {
                    namespace: "src-ns".to_owned(),
                    name: "src-pvc".to_owned(),
                },
                pvc: None,
                storage: None,
                content_type: None,
                checkpoints: None,
                final_checkpoint: None,
                priority_class_name: None,
                preallocation: None,
            },
        );
        dv.metadata.namespace = Some("dst-ns".to_owned());
        dv
    }

    #[test]
    fn clone_source_gets_token_annotation() {
        let dv = clone_dv();
        let cdi_config = CdiConfig::new("config", CdiConfigSpec::default());
        let patches = mutate(&dv, &cdi_config);
        assert!(patches
            .iter()
            .any(|p| p.key == "cdi.kubevirt.io/storage.cloneToken"));
    }

    #[test]
    fn non_clone_source_gets_no_token() {
        let mut dv = clone_dv();
        dv.spec.source = DataVolumeSource::Blank {};
        let cdi_config = CdiConfig::new("config", CdiConfigSpec::default());
        let patches = mutate(&dv, &cdi_config);
        assert!(patches.is_empty());
    }

    #[test]
    fn ttl_requests_delete_after_completion() {
        let mut dv = clone_dv();
        dv.spec.source = DataVolumeSource::Blank {};
        let mut spec = CdiConfigSpec::default();
        spec.data_volume_ttl_seconds = Some(3600);
        let cdi_config = CdiConfig::new("config", spec);
        let patches = mutate(&dv, &cdi_config);
        assert!(patches
            .iter()
            .any(|p| p.key == "cdi.kubevirt.io/storage.deleteAfterCompletion" && p.value == "true"));
    }

    #[test]
    fn no_ttl_configured_leaves_annotation_alone() {
        let mut dv = clone_dv();
        dv.spec.source = DataVolumeSource::Blank {};
        let cdi_config = CdiConfig::new("config", CdiConfigSpec::default());
        let patches = mutate(&dv, &cdi_config);
        assert!(!patches
            .iter()
            .any(|p| p.key == "cdi.kubevirt.io/storage.deleteAfterCompletion"));
    }
}
