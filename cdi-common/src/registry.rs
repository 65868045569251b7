use std::collections::HashMap;

use once_cell::sync::Lazy;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A Kubernetes PVC access mode
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "PascalCase")]
pub enum AccessMode {
    /// mountable read-write by a single node
    ReadWriteOnce,
    /// mountable read-write by many nodes
    ReadWriteMany,
    /// mountable read-only by many nodes
    ReadOnlyMany,
    /// mountable read-write by a single pod
    ReadWriteOncePod,
}

/// A Kubernetes PVC volume mode
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "PascalCase")]
pub enum VolumeMode {
    /// a mounted filesystem
    Filesystem,
    /// a raw block device
    Block,
}

/// One allowed `{accessModes, volumeMode}` combination on a `StorageProfile`, in the order the
/// resolver should prefer them (spec.md §3, §4.4)
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClaimPropertySet {
    /// empty means "unknown", handled the same as "incomplete" by the resolver
    #[serde(default)]
    pub access_modes: Vec<AccessMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume_mode: Option<VolumeMode>,
}

impl ClaimPropertySet {
    /// spec.md §3 StorageProfile invariant: a set with a non-nil `volumeMode` must have at
    /// least one `accessMode`
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.volume_mode.is_none() || !self.access_modes.is_empty()
    }
}

/// Static map from well-known CSI/in-tree provisioner strings to their ordered
/// `ClaimPropertySet` preference list (spec.md §4.4, "Provisioner-to-capability table").
/// Some provisioners are keyed by parameters (portworx `shared=true`), resolved by
/// [`resolve_key`] before lookup.
static CAPABILITY_TABLE: Lazy<HashMap<&'static str, Vec<ClaimPropertySet>>> = Lazy::new(|| {
    let mut table = HashMap::new();
    let _prev = table.insert(
        "rbd.csi.ceph.com",
        vec![
            ClaimPropertySet {
                access_modes: vec![AccessMode::ReadWriteOnce],
                volume_mode: Some(VolumeMode::Block),
            },
            ClaimPropertySet {
                access_modes: vec![AccessMode::ReadWriteOnce],
                volume_mode: Some(VolumeMode::Filesystem),
            },
            ClaimPropertySet {
                access_modes: vec![AccessMode::ReadWriteMany],
                volume_mode: Some(VolumeMode::Block),
            },
        ],
    );
    let _prev = table.insert(
        "disk.csi.azure.com",
        vec![
            ClaimPropertySet {
                access_modes: vec![AccessMode::ReadWriteOnce],
                volume_mode: Some(VolumeMode::Filesystem),
            },
            ClaimPropertySet {
                access_modes: vec![AccessMode::ReadWriteOnce],
                volume_mode: Some(VolumeMode::Block),
            },
        ],
    );
    let _prev = table.insert(
        "pxd.portworx.com",
        vec![ClaimPropertySet {
            access_modes: vec![AccessMode::ReadWriteOnce],
            volume_mode: Some(VolumeMode::Filesystem),
        }],
    );
    // portworx `shared=true` volumes are mountable by many nodes at once
    let _prev = table.insert(
        "pxd.portworx.com/shared",
        vec![ClaimPropertySet {
            access_modes: vec![AccessMode::ReadWriteMany],
            volume_mode: Some(VolumeMode::Filesystem),
        }],
    );
    let _prev = table.insert(
        "csi.vsphere.vmware.com",
        vec![ClaimPropertySet {
            access_modes: vec![AccessMode::ReadWriteOnce],
            volume_mode: Some(VolumeMode::Filesystem),
        }],
    );
    let _prev = table.insert(
        "filestore.csi.storage.gke.io",
        vec![ClaimPropertySet {
            access_modes: vec![AccessMode::ReadWriteMany],
            volume_mode: Some(VolumeMode::Filesystem),
        }],
    );
    table
});

/// Apply provisioner-specific parameter keying before a capability-table lookup (spec.md §4.4:
/// "Some provisioners are keyed by parameters ... which the resolver applies before lookup")
#[must_use]
fn resolve_key<'a>(provisioner: &'a str, parameters: &HashMap<String, String>) -> &'a str {
    if provisioner == "pxd.portworx.com"
        && parameters.get("shared").map(String::as_str) == Some("true")
    {
        return "pxd.portworx.com/shared";
    }
    provisioner
}

/// Look up the static capability list for a provisioner, applying parameter keying first.
/// Returns `None` for unknown provisioners — callers fall back to PV enumeration (spec.md §4.4).
#[must_use]
pub fn lookup(provisioner: &str, parameters: &HashMap<String, String>) -> Option<&'static [ClaimPropertySet]> {
    CAPABILITY_TABLE
        .get(resolve_key(provisioner, parameters))
        .map(Vec::as_slice)
}
