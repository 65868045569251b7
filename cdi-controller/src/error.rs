use std::time::Duration;

use kube::runtime::controller::Action;

use crate::clone;
use crate::consts::DEFAULT_REQUEUE_DURATION;
use crate::datavolume;
use crate::proxy;
use crate::storageprofile;

/// How the `kube::runtime` error-policy callback should respond to a failed reconcile
/// (spec.md §7 error taxonomy)
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum RetryPolicy {
    /// transient, retry on the default backoff
    Retry(Duration),
    /// terminal for this reconcile; only a spec change or external event re-triggers it
    NoRetry,
}

impl RetryPolicy {
    /// Convert into the `Action` the `kube::runtime` error-policy callback must return
    pub(crate) fn into_action(self) -> Action {
        match self {
            Self::Retry(after) => Action::requeue(after),
            Self::NoRetry => Action::await_change(),
        }
    }
}

/// Top-level error, aggregating every sub-reconciler's error enum (spec.md §7, mirroring the
/// teacher's per-controller `Error` enum but rolled up so `main.rs` has one type to log)
#[derive(Debug, thiserror::Error)]
pub(crate) enum Error {
    /// Kubernetes API error not otherwise classified
    #[error("kubernetes api error: {0}")]
    Kube(#[from] kube::Error),
    /// DataVolume reconciler error
    #[error(transparent)]
    DataVolume(#[from] datavolume::Error),
    /// Clone orchestrator error
    #[error(transparent)]
    Clone(#[from] clone::Error),
    /// Storage profile resolver error
    #[error(transparent)]
    StorageProfile(#[from] storageprofile::Error),
    /// Proxy propagation error
    #[error(transparent)]
    Proxy(#[from] proxy::Error),
}

impl Error {
    /// Classify this error per the spec.md §7 error taxonomy table
    pub(crate) fn retry_policy(&self) -> RetryPolicy {
        match *self {
            Self::Kube(_) => RetryPolicy::Retry(DEFAULT_REQUEUE_DURATION),
            Self::DataVolume(ref err) => err.retry_policy(),
            Self::Clone(ref err) => err.retry_policy(),
            Self::StorageProfile(_) | Self::Proxy(_) => RetryPolicy::Retry(DEFAULT_REQUEUE_DURATION),
        }
    }
}
