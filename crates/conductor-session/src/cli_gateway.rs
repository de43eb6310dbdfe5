use crate::gateway::{
    classify_status, parse_session_handle, SessionGateway, SessionHandle, SessionStatus,
};
use async_trait::async_trait;
use chrono::Utc;
use conductor_core::{ConductorError, ConductorResult};
use serde::{Deserialize, Serialize};
use std::process::Output;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// How to reach the runtime CLI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Executable of the runtime CLI.
    #[serde(default = "default_command")]
    pub command: String,
    /// Arguments placed before the `sessions ...` subcommand.
    #[serde(default)]
    pub args: Vec<String>,
    /// Admission-control bound for `spawn`. Much shorter than a session's
    /// own execution timeout.
    #[serde(default = "default_spawn_timeout_secs")]
    pub spawn_timeout_secs: u64,
    /// Bound for `status` and `history` queries.
    #[serde(default = "default_query_timeout_secs")]
    pub query_timeout_secs: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            command: default_command(),
            args: Vec::new(),
            spawn_timeout_secs: default_spawn_timeout_secs(),
            query_timeout_secs: default_query_timeout_secs(),
        }
    }
}

fn default_command() -> String {
    "openclaw".to_string()
}

fn default_spawn_timeout_secs() -> u64 {
    15
}

fn default_query_timeout_secs() -> u64 {
    10
}

/// Session gateway backed by the runtime's command-line interface.
///
/// Runs `<command> [args..] sessions spawn|status|history ...` as a child
/// process for every call, killing it when its time bound elapses.
pub struct CliSessionGateway {
    config: GatewayConfig,
}

impl CliSessionGateway {
    /// Create a gateway for the given runtime CLI configuration.
    pub fn new(config: GatewayConfig) -> Self {
        Self { config }
    }

    fn sessions_command(&self) -> Command {
        let mut cmd = Command::new(&self.config.command);
        cmd.args(&self.config.args);
        cmd.arg("sessions");
        cmd.kill_on_drop(true);
        cmd
    }

    async fn run(&self, mut cmd: Command, bound: Duration) -> ConductorResult<Output> {
        match tokio::time::timeout(bound, cmd.output()).await {
            Ok(Ok(output)) => Ok(output),
            Ok(Err(e)) => Err(ConductorError::GatewayUnavailable(format!(
                "failed to run '{}': {e}",
                self.config.command
            ))),
            Err(_) => Err(ConductorError::GatewayUnavailable(format!(
                "'{}' did not respond within {}s",
                self.config.command,
                bound.as_secs()
            ))),
        }
    }

    fn query_bound(&self) -> Duration {
        Duration::from_secs(self.config.query_timeout_secs)
    }
}

#[async_trait]
impl SessionGateway for CliSessionGateway {
    async fn spawn(
        &self,
        agent_id: &str,
        payload: &str,
        timeout: Duration,
    ) -> ConductorResult<SessionHandle> {
        let mut cmd = self.sessions_command();
        cmd.arg("spawn")
            .arg("--agent")
            .arg(agent_id)
            .arg("--mode")
            .arg("run")
            .arg("--timeout")
            .arg(timeout.as_secs().to_string())
            .arg("--task")
            .arg(payload);

        debug!(agent = %agent_id, payload_len = payload.len(), "Spawning session");

        let output = self
            .run(cmd, Duration::from_secs(self.config.spawn_timeout_secs))
            .await
            .map_err(|e| ConductorError::spawn_failed(e.to_string()))?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);

        if !output.status.success() {
            return Err(ConductorError::spawn_failed(format!(
                "exit {}: {}",
                output.status.code().unwrap_or(-1),
                stderr.trim()
            )));
        }

        let combined = format!("{stdout}\n{stderr}");
        let handle = match parse_session_handle(&combined) {
            Some(handle) => handle,
            None => {
                let fallback =
                    SessionHandle::new(format!("agent:{agent_id}:{}", Utc::now().timestamp()));
                warn!(
                    agent = %agent_id,
                    session = %fallback,
                    "Spawn output carried no session key, using synthesized handle"
                );
                fallback
            }
        };

        info!(agent = %agent_id, session = %handle, "Session spawned");
        Ok(handle)
    }

    async fn status(&self, handle: &SessionHandle) -> SessionStatus {
        let mut cmd = self.sessions_command();
        cmd.arg("status").arg(handle.as_str());

        match self.run(cmd, self.query_bound()).await {
            Ok(output) if output.status.success() => {
                classify_status(&String::from_utf8_lossy(&output.stdout))
            }
            Ok(output) => {
                debug!(
                    session = %handle,
                    exit = output.status.code().unwrap_or(-1),
                    "Status query returned non-zero exit"
                );
                SessionStatus::Unknown
            }
            Err(e) => {
                warn!(session = %handle, error = %e, "Status query failed");
                SessionStatus::Unknown
            }
        }
    }

    async fn history(&self, handle: &SessionHandle, limit: usize) -> Option<String> {
        let mut cmd = self.sessions_command();
        cmd.arg("history")
            .arg(handle.as_str())
            .arg("--limit")
            .arg(limit.to_string());

        match self.run(cmd, self.query_bound()).await {
            Ok(output) if output.status.success() => {
                Some(String::from_utf8_lossy(&output.stdout).into_owned())
            }
            Ok(_) => None,
            Err(e) => {
                debug!(session = %handle, error = %e, "History query failed");
                None
            }
        }
    }
}
