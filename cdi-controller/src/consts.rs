use std::time::Duration;

/// The default requeue duration to achieve eventual consistency
pub(crate) const DEFAULT_REQUEUE_DURATION: Duration = Duration::from_secs(600);
/// Requeue delay after a `SmartCloneSourceInUse` backoff (spec.md §4.3)
pub(crate) const SOURCE_IN_USE_REQUEUE_DURATION: Duration = Duration::from_secs(15);
/// Interval between progress-scrape sweeps (spec.md §4.5, "kept out of the reconcile critical path")
pub(crate) const PROGRESS_SCRAPE_INTERVAL: Duration = Duration::from_secs(10);
/// Legacy DV API version, still served for backward compatibility (spec.md §6)
pub(crate) const LEGACY_API_VERSION: &str = "v1alpha1";
/// Name of the container port the worker pod advertises its progress metrics on (spec.md §4.5:
/// "pod spec advertises a metrics port")
pub(crate) const WORKER_METRICS_PORT_NAME: &str = "metrics";
/// Port number behind `WORKER_METRICS_PORT_NAME`
pub(crate) const WORKER_METRICS_PORT: i32 = 8443;
/// Interval between terminal-DataVolume garbage-collection sweeps (spec.md §3, TTL for completed DVs)
pub(crate) const GC_SWEEP_INTERVAL: Duration = Duration::from_secs(60);
