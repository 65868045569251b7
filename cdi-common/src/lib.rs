/// Annotation and label keys shared between the reconciler and the PVC/pod it manages
pub mod consts;

/// Clone strategy selection, shared between the storage profile resolver and the clone orchestrator
pub mod clone_strategy;

/// `ImportProxy` field access as a closed tag enum, replacing runtime reflection
pub mod proxy;

/// Static provisioner-to-claim-property-set capability table
pub mod registry;

/// `GetRequiredSpace` and related volume-size math
pub mod sizing;
