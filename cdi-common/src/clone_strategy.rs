use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// How a PVC-clone `DataVolume` is populated (spec.md §4.3)
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "PascalCase")]
pub enum CloneStrategy {
    /// byte-level copy performed by a worker pod mounting both source and target
    HostAssisted,
    /// clone implemented via snapshot + restore
    Snapshot,
    /// clone implemented via the storage driver's native volume-data-source mechanism
    CsiClone,
}

impl Default for CloneStrategy {
    fn default() -> Self {
        // spec.md §4.3 precedence rule 3: absent any override or profile preference, Snapshot
        Self::Snapshot
    }
}

/// Resolve the effective clone strategy by precedence (spec.md §4.3):
/// 1. cluster-wide override on the CDI custom resource
/// 2. preferred strategy on the target StorageClass's `StorageProfile`
/// 3. default `Snapshot`
#[must_use]
pub fn resolve(
    cluster_override: Option<CloneStrategy>,
    profile_preference: Option<CloneStrategy>,
) -> CloneStrategy {
    cluster_override
        .or(profile_preference)
        .unwrap_or_default()
}

#[cfg(test)]
mod test {
    use super::{resolve, CloneStrategy};

    #[test]
    fn override_always_wins() {
        assert_eq!(
            resolve(Some(CloneStrategy::HostAssisted), Some(CloneStrategy::CsiClone)),
            CloneStrategy::HostAssisted
        );
    }

    #[test]
    fn falls_back_to_profile_preference() {
        assert_eq!(
            resolve(None, Some(CloneStrategy::CsiClone)),
            CloneStrategy::CsiClone
        );
    }

    #[test]
    fn falls_back_to_snapshot_default() {
        assert_eq!(resolve(None, None), CloneStrategy::Snapshot);
    }
}
