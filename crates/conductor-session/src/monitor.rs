use crate::gateway::{SessionGateway, SessionHandle, SessionStatus};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Polling cadence for [`SessionMonitor`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
        }
    }
}

fn default_poll_interval_secs() -> u64 {
    10
}

/// Terminal result of waiting on a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PollOutcome {
    Completed,
    Error,
    /// The overall wait bound elapsed before a terminal status was seen.
    Timeout,
}

impl std::fmt::Display for PollOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PollOutcome::Completed => write!(f, "completed"),
            PollOutcome::Error => write!(f, "error"),
            PollOutcome::Timeout => write!(f, "timeout"),
        }
    }
}

/// Waits for sessions to reach a terminal status by polling the gateway.
#[derive(Clone)]
pub struct SessionMonitor {
    gateway: Arc<dyn SessionGateway>,
    poll_interval: Duration,
}

impl SessionMonitor {
    pub fn new(gateway: Arc<dyn SessionGateway>, poll_interval: Duration) -> Self {
        Self {
            gateway,
            poll_interval,
        }
    }

    pub fn from_config(gateway: Arc<dyn SessionGateway>, config: &MonitorConfig) -> Self {
        Self::new(gateway, Duration::from_secs(config.poll_interval_secs))
    }

    /// The gateway this monitor polls.
    pub fn gateway(&self) -> &Arc<dyn SessionGateway> {
        &self.gateway
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Poll `handle` until it is `completed` or `error`, or until `timeout`
    /// elapses.
    ///
    /// Sleeps the full poll interval between queries and never starts a new
    /// query once `timeout` has passed. A query still outstanding at the
    /// deadline counts as `unknown`, so the wait overshoots `timeout` by at
    /// most one interval. `running` and `unknown` both keep polling.
    pub async fn await_completion(
        &self,
        handle: &SessionHandle,
        timeout: Duration,
    ) -> (PollOutcome, Duration) {
        let start = Instant::now();

        loop {
            let elapsed = start.elapsed();
            if elapsed >= timeout {
                debug!(
                    session = %handle,
                    elapsed_secs = elapsed.as_secs(),
                    "Session wait timed out"
                );
                return (PollOutcome::Timeout, elapsed);
            }

            // the query itself may not run past the deadline
            let status = tokio::time::timeout(timeout - elapsed, self.gateway.status(handle))
                .await
                .unwrap_or(SessionStatus::Unknown);

            match status {
                SessionStatus::Completed => return (PollOutcome::Completed, start.elapsed()),
                SessionStatus::Error => return (PollOutcome::Error, start.elapsed()),
                status @ (SessionStatus::Running | SessionStatus::Unknown) => {
                    debug!(
                        session = %handle,
                        status = %status,
                        elapsed_secs = elapsed.as_secs(),
                        "Waiting for session"
                    );
                }
            }

            tokio::time::sleep(self.poll_interval).await;
        }
    }
}
