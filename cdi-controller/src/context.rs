use kube::Client;

use crate::config::Config;

/// Shared state handed to every reconcile function via `kube::runtime::Controller::run`'s
/// context parameter (mirrors the teacher's own `Context<ClusterController>` wrapper, generalized
/// since this crate runs four independent reconcilers sharing one client and config rather than
/// one)
pub(crate) struct Context {
    /// kubernetes client shared read-only across all reconcile workers
    pub(crate) client: Client,
    /// CLI configuration
    pub(crate) config: Config,
}

impl Context {
    /// Build shared context for all reconcilers
    pub(crate) fn new(client: Client, config: Config) -> Self {
        Self { client, config }
    }
}
