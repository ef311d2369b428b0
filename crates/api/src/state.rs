use std::collections::HashMap;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use actionrunner_core::job::{JobKind, TargetEndpoint};
use actionrunner_db::SessionCache;
use actionrunner_pipeline::{ActionRunner, Collaborators};

use crate::config::{RunnerConfig, ServerConfig};

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable; everything inside is behind an `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    /// One runner per enabled job type.
    pub runners: Arc<HashMap<JobKind, Arc<ActionRunner>>>,
    /// Process-wide target sessions, shared with the runners.
    pub sessions: Arc<SessionCache>,
    /// Target for direct `/sql` requests.
    pub sql_target: Option<TargetEndpoint>,
    /// Port for `/sql` targets given without one.
    pub target_port: u16,
    /// Cancelled at shutdown; every invocation runs under a child token.
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn runner(&self, kind: JobKind) -> Option<Arc<ActionRunner>> {
        self.runners.get(&kind).cloned()
    }
}

/// One runner per job type, all sharing `deps`.
pub fn build_runners(
    config: &RunnerConfig,
    deps: &Collaborators,
) -> HashMap<JobKind, Arc<ActionRunner>> {
    JobKind::ALL
        .into_iter()
        .map(|kind| {
            let runner = ActionRunner::new(config.profile(kind), deps.clone());
            (kind, Arc::new(runner))
        })
        .collect()
}
