use std::collections::HashMap;

use cdi_api::v1beta1::{DataVolumeContentType, StorageProfileSpec, StorageSpec};
use cdi_common::registry::{AccessMode, ClaimPropertySet, VolumeMode};

mod reconcile;

pub(crate) use reconcile::run;

/// Errors the storage profile resolver can raise (spec.md §4.4, §7 error taxonomy)
#[derive(Debug, thiserror::Error)]
pub(crate) enum Error {
    /// any Kubernetes API call failure
    #[error("kubernetes api error: {0}")]
    Kube(#[from] kube::Error),
    /// every candidate `ClaimPropertySet` was block-only, but the DV requests an `Archive`
    /// payload, which can only be unpacked onto a filesystem (spec.md §4.4 edge case)
    #[error("DataVolume requests Archive content but the resolved storage class is block-only")]
    ArchiveRequiresFilesystem,
    /// `spec.storage` did not carry a size request and none could be derived
    #[error("DataVolume does not request a storage size")]
    MissingSize,
    /// no `ClaimPropertySet` resolved at all (static table miss, no PVs to enumerate, no
    /// explicit override)
    #[error("no usable access mode / volume mode combination could be resolved")]
    NoUsableClaimPropertySet,
    /// the DV named no storage class and the cluster has no default either (spec.md §4.4 step 2)
    #[error("no storage class requested and the cluster has no default storage class")]
    MissingStorageClass,
}

impl Error {
    /// A transient API error retries on the default backoff; every resolution failure needs
    /// operator intervention (size on the DV, or a `StorageProfile` populated by hand) and does
    /// not self-heal by retrying
    pub(crate) fn retry_policy(&self) -> crate::error::RetryPolicy {
        match *self {
            Self::Kube(_) => crate::error::RetryPolicy::Retry(crate::consts::DEFAULT_REQUEUE_DURATION),
            Self::ArchiveRequiresFilesystem
            | Self::MissingSize
            | Self::NoUsableClaimPropertySet
            | Self::MissingStorageClass => crate::error::RetryPolicy::NoRetry,
        }
    }
}

/// Resolve the ordered `ClaimPropertySet` list for a storage class (spec.md §4.4 steps 1-3):
/// 1. an explicit override on the `StorageProfile` always wins
/// 2. else the static provisioner capability table (`cdi_common::registry`)
/// 3. else whatever combinations were actually observed on live, bound PVs using this class
#[must_use]
pub(crate) fn resolve_claim_property_sets(
    profile: &StorageProfileSpec,
    provisioner: Option<&str>,
    observed_on_live_pvs: &[ClaimPropertySet],
) -> Vec<ClaimPropertySet> {
    if let Some(ref explicit) = profile.claim_property_sets {
        return explicit.clone();
    }
    if let Some(provisioner) = provisioner {
        if let Some(sets) = cdi_common::registry::lookup(provisioner, &HashMap::new()) {
            return sets.to_vec();
        }
    }
    observed_on_live_pvs.to_vec()
}

/// Count how many resolved sets are incomplete (spec.md §4.4: a `volumeMode` with no
/// `accessModes` is reported via `IncompleteProfileGauge`, not treated as fatal)
#[must_use]
pub(crate) fn count_incomplete(sets: &[ClaimPropertySet]) -> usize {
    sets.iter().filter(|set| !set.is_complete()).count()
}

/// Pick the first complete, content-type-compatible `ClaimPropertySet` from the resolved list
/// (spec.md §4.4 step 3-5). `Archive` content cannot land on a `Block` volume mode. When the DV
/// specifies only one of `accessModes`/`volumeMode` (not both, since both together skip profile
/// resolution entirely), step 3 narrows the candidates down to sets carrying that one requested
/// value before falling through to the first complete, content-type-compatible set.
pub(crate) fn pick(
    sets: &[ClaimPropertySet],
    content_type: Option<DataVolumeContentType>,
    requested_access_mode: Option<AccessMode>,
    requested_volume_mode: Option<VolumeMode>,
) -> Result<ClaimPropertySet, Error> {
    let archive = matches!(content_type, Some(DataVolumeContentType::Archive));
    let compatible = |set: &&ClaimPropertySet| set.is_complete() && (!archive || set.volume_mode != Some(VolumeMode::Block));

    let requested_match = sets.iter().filter(compatible).find(|set| {
        requested_access_mode.is_some_and(|mode| set.access_modes.contains(&mode))
            || requested_volume_mode.is_some_and(|mode| set.volume_mode == Some(mode))
    });

    requested_match
        .or_else(|| sets.iter().find(compatible))
        .cloned()
        .ok_or_else(|| {
            if archive && sets.iter().any(|set| set.is_complete()) {
                Error::ArchiveRequiresFilesystem
            } else {
                Error::NoUsableClaimPropertySet
            }
        })
}

/// Whether `storage.resources.requests["storage"]` is present (spec.md §4.4: a DV with neither
/// an explicit size nor a clone source to size from cannot have its PVC created)
#[must_use]
pub(crate) fn has_requested_size(storage: Option<&StorageSpec>) -> bool {
    storage
        .and_then(|s| s.resources.as_ref())
        .and_then(|r| r.requests.as_ref())
        .is_some_and(|requests| requests.contains_key("storage"))
}

/// Default access-mode/volume-mode pair used when nothing else resolves anything (spec.md §4.4:
/// CDI's own baked-in default rather than a hard failure)
#[must_use]
pub(crate) fn default_claim_property_set() -> ClaimPropertySet {
    ClaimPropertySet {
        access_modes: vec![AccessMode::ReadWriteOnce],
        volume_mode: Some(VolumeMode::Filesystem),
    }
}

#[cfg(test)]
mod test {
    use super::{count_incomplete, has_requested_size, pick, resolve_claim_property_sets, Error};
    use cdi_api::v1beta1::{DataVolumeContentType, StorageProfileSpec, StorageSpec};
    use cdi_common::registry::{AccessMode, ClaimPropertySet, VolumeMode};

    #[test]
    fn explicit_override_wins_over_provisioner_table() {
        let mut profile = StorageProfileSpec::default();
        profile.claim_property_sets = Some(vec![ClaimPropertySet {
            access_modes: vec![AccessMode::ReadWriteMany],
            volume_mode: Some(VolumeMode::Filesystem),
        }]);
        let sets = resolve_claim_property_sets(&profile, Some("rbd.csi.ceph.com"), &[]);
        assert_eq!(sets[0].access_modes, vec![AccessMode::ReadWriteMany]);
    }

    #[test]
    fn falls_back_to_provisioner_table() {
        let profile = StorageProfileSpec::default();
        let sets = resolve_claim_property_sets(&profile, Some("rbd.csi.ceph.com"), &[]);
        assert_eq!(sets[0].volume_mode, Some(VolumeMode::Block));
    }

    #[test]
    fn falls_back_to_pv_enumeration_when_provisioner_unknown() {
        let profile = StorageProfileSpec::default();
        let observed = vec![ClaimPropertySet {
            access_modes: vec![AccessMode::ReadWriteOnce],
            volume_mode: Some(VolumeMode::Filesystem),
        }];
        let sets = resolve_claim_property_sets(&profile, None, &observed);
        assert_eq!(sets, observed);
    }

    #[test]
    fn incomplete_sets_are_counted_not_rejected() {
        let sets = vec![ClaimPropertySet {
            access_modes: vec![],
            volume_mode: Some(VolumeMode::Block),
        }];
        assert_eq!(count_incomplete(&sets), 1);
    }

    #[test]
    fn archive_content_rejects_block_only_profile() {
        let sets = vec![ClaimPropertySet {
            access_modes: vec![AccessMode::ReadWriteOnce],
            volume_mode: Some(VolumeMode::Block),
        }];
        let result = pick(&sets, Some(DataVolumeContentType::Archive), None, None);
        assert!(matches!(result, Err(Error::ArchiveRequiresFilesystem)));
    }

    #[test]
    fn archive_content_picks_filesystem_entry_when_available() {
        let sets = vec![
            ClaimPropertySet {
                access_modes: vec![AccessMode::ReadWriteOnce],
                volume_mode: Some(VolumeMode::Block),
            },
            ClaimPropertySet {
                access_modes: vec![AccessMode::ReadWriteOnce],
                volume_mode: Some(VolumeMode::Filesystem),
            },
        ];
        let result = pick(&sets, Some(DataVolumeContentType::Archive), None, None).unwrap();
        assert_eq!(result.volume_mode, Some(VolumeMode::Filesystem));
    }

    #[test]
    fn requested_access_mode_alone_narrows_the_candidates() {
        let sets = vec![
            ClaimPropertySet {
                access_modes: vec![AccessMode::ReadWriteOnce],
                volume_mode: Some(VolumeMode::Filesystem),
            },
            ClaimPropertySet {
                access_modes: vec![AccessMode::ReadWriteMany],
                volume_mode: Some(VolumeMode::Filesystem),
            },
        ];
        let result = pick(&sets, None, Some(AccessMode::ReadWriteMany), None).unwrap();
        assert_eq!(result.access_modes, vec![AccessMode::ReadWriteMany]);
    }

    #[test]
    fn requested_volume_mode_alone_narrows_the_candidates() {
        let sets = vec![
            ClaimPropertySet {
                access_modes: vec![AccessMode::ReadWriteOnce],
                volume_mode: Some(VolumeMode::Filesystem),
            },
            ClaimPropertySet {
                access_modes: vec![AccessMode::ReadWriteOnce],
                volume_mode: Some(VolumeMode::Block),
            },
        ];
        let result = pick(&sets, None, None, Some(VolumeMode::Block)).unwrap();
        assert_eq!(result.volume_mode, Some(VolumeMode::Block));
    }

    #[test]
    fn missing_size_is_detected() {
        assert!(!has_requested_size(None));
        assert!(!has_requested_size(Some(&StorageSpec::default())));
    }
}
