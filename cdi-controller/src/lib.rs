//! CDI DataVolume reconciliation engine: watches `DataVolume`, `StorageProfile` and `CDIConfig`
//! objects and drives them toward populated, bound PVCs.

/// Mutating-admission logic: the annotations a webhook would stamp onto a `DataVolume` before
/// it is persisted (spec.md §6). The webhook server itself is out of scope; only the pure,
/// testable mutation function lives here.
mod admission;
/// Smart/CSI clone orchestration and the source-in-use concurrency guard (spec.md §4.3)
mod clone;
/// CLI configuration
pub mod config;
/// Shared tunables not exposed on the CLI
mod consts;
/// Per-reconciler shared state
mod context;
/// `DataVolume` reconciliation: phase state machine, checkpoints, worker-pod env projection
/// (spec.md §4.1, §4.2, §6)
mod datavolume;
/// Top-level error aggregation and retry classification (spec.md §7)
mod error;
/// Kubernetes event recording, abstracted behind a trait for testability
mod events;
/// Prometheus metrics registry and HTTP handler
mod metrics;
/// Operator assembly: CRD bootstrap, reconciler wiring, graceful shutdown
pub mod operator;
/// PVC/worker-pod templates, pod-phase/progress helpers (spec.md §4.5)
mod pvc;
/// Outbound HTTP proxy propagation from the cluster `Proxy` object into `CDIConfig` (spec.md §4.7)
mod proxy;
/// axum app serving `/metrics` and `/healthz`
mod router;
/// `StorageProfile` capability resolution (spec.md §4.4)
mod storageprofile;
/// The minimal `{Get, List, Create, Patch, Delete}` interface reconcile logic needs, plus a real
/// and an in-memory implementation (spec.md §9 REDESIGN FLAGS)
mod store;
