use crate::profiles::AgentRegistry;
use crate::store::TaskStore;
use crate::types::TaskRecord;
use conductor_core::ConductorResult;
use conductor_session::{SessionGateway, SessionHandle, SessionMonitor};
use std::sync::Arc;
use tracing::{debug, error, Level};

/// Transcript entries fetched for diagnostics after an unsuccessful session.
const HISTORY_LIMIT: usize = 10;

/// Collaborators shared by both dispatchers.
#[derive(Clone)]
pub struct DispatchContext {
    pub registry: Arc<AgentRegistry>,
    pub monitor: SessionMonitor,
    pub store: Arc<dyn TaskStore>,
}

impl DispatchContext {
    pub fn new(
        registry: Arc<AgentRegistry>,
        monitor: SessionMonitor,
        store: Arc<dyn TaskStore>,
    ) -> Self {
        Self {
            registry,
            monitor,
            store,
        }
    }

    pub fn gateway(&self) -> &Arc<dyn SessionGateway> {
        self.monitor.gateway()
    }

    /// Persist the whole record after a state change.
    pub(crate) async fn checkpoint(&self, record: &TaskRecord) -> ConductorResult<()> {
        self.store.put(record).await.map_err(|e| {
            error!(task_id = %record.task_id, error = %e, "Failed to persist task record");
            e
        })
    }

    /// Log the tail of a session transcript when debug logging is on.
    pub(crate) async fn log_history(&self, task_id: &str, handle: &SessionHandle) {
        if !tracing::enabled!(Level::DEBUG) {
            return;
        }
        match self.gateway().history(handle, HISTORY_LIMIT).await {
            Some(transcript) => {
                debug!(
                    task_id = %task_id,
                    session = %handle,
                    transcript = %transcript,
                    "Session transcript"
                );
            }
            None => {
                debug!(task_id = %task_id, session = %handle, "Session transcript not available");
            }
        }
    }
}
