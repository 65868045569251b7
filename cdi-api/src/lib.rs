//! Custom Resource Definitions for the CDI DataVolume reconciliation engine.
//!
//! `v1beta1` carries the CRDs this engine owns (`DataVolume`, `StorageProfile`, `CDIConfig`,
//! `DataSource`, `ObjectTransfer`). `snapshot` and `openshift` carry minimal hand-written
//! mirrors of external CRDs this engine only reads.

/// External CSI `VolumeSnapshot` type, read but not owned by this engine
pub mod snapshot;

/// External OpenShift `Proxy` singleton, read but not owned by this engine
pub mod openshift;

/// CRDs owned by this engine
pub mod v1beta1;
