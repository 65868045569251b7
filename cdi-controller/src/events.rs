use kube::runtime::events::{Event, EventType, Recorder};
use tracing::warn;

/// Thin wrapper over `kube::runtime::events::Recorder`, giving the reconcile logic the
/// `EventRecorder` half of the minimal interface named in spec.md §9 REDESIGN FLAGS. Kept as a
/// trait so tests can swap in a no-op recorder instead of talking to an API server.
#[async_trait::async_trait]
pub(crate) trait EventSink: Send + Sync {
    /// record a Normal event, e.g. a phase transition (spec.md §7: "Level: Normal for progress")
    async fn normal(&self, reason: &str, note: impl Into<String> + Send);
    /// record a Warning event, e.g. a non-retried failure or `SmartCloneSourceInUse` (spec.md §7)
    async fn warning(&self, reason: &str, note: impl Into<String> + Send);
}

/// [`EventSink`] backed by a real `kube::runtime::events::Recorder`
pub(crate) struct KubeEvents {
    /// the underlying recorder, bound to one reporting controller and involved object
    recorder: Recorder,
}

impl KubeEvents {
    /// Wrap a `Recorder` as an [`EventSink`]
    pub(crate) fn new(recorder: Recorder) -> Self {
        Self { recorder }
    }

    async fn publish(&self, type_: EventType, reason: &str, note: String) {
        let result = self
            .recorder
            .publish(Event {
                type_,
                reason: reason.to_owned(),
                note: Some(note),
                action: reason.to_owned(),
                secondary: None,
            })
            .await;
        if let Err(err) = result {
            warn!("failed to publish event {reason}: {err}");
        }
    }
}

#[async_trait::async_trait]
impl EventSink for KubeEvents {
    async fn normal(&self, reason: &str, note: impl Into<String> + Send) {
        self.publish(EventType::Normal, reason, note.into()).await;
    }

    async fn warning(&self, reason: &str, note: impl Into<String> + Send) {
        self.publish(EventType::Warning, reason, note.into()).await;
    }
}
