pub use cdiconfig::{CdiConfig, CdiConfigSpec, CdiConfigStatus, FilesystemOverhead};
pub use datasource::{DataSource, DataSourceSource, DataSourceSpec, DataSourceStatus};
pub use datavolume::{
    ConditionStatus, DataVolume, DataVolumeCheckpoint, DataVolumeCondition,
    DataVolumeConditionType, DataVolumeContentType, DataVolumePhase, DataVolumeSource,
    DataVolumeSpec, DataVolumeStatus, LegacyPvcSpec, StorageSpec,
};
pub use objecttransfer::{
    ObjectTransfer, ObjectTransferSource, ObjectTransferSpec, ObjectTransferStatus,
    ObjectTransferTarget,
};
pub use storageprofile::{
    StorageProfile, StorageProfileClaimPropertySets, StorageProfileSpec, StorageProfileStatus,
};

mod cdiconfig;
mod datasource;
mod datavolume;
mod objecttransfer;
mod storageprofile;
