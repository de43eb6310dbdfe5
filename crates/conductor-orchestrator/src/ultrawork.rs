use crate::dispatch::DispatchContext;
use crate::profiles::AgentProfile;
use crate::types::{SubtaskStatus, TaskRecord, TaskStatus};
use conductor_core::ConductorResult;
use conductor_session::{PollOutcome, SessionHandle};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

/// Settings for fan-out dispatch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UltraworkConfig {
    /// Execution budget given to each agent session, also the wait bound.
    #[serde(default = "default_session_timeout_secs")]
    pub session_timeout_secs: u64,
    /// Default for the `concurrent` flag when the caller does not choose.
    #[serde(default = "default_concurrent")]
    pub concurrent: bool,
}

impl Default for UltraworkConfig {
    fn default() -> Self {
        Self {
            session_timeout_secs: default_session_timeout_secs(),
            concurrent: default_concurrent(),
        }
    }
}

fn default_session_timeout_secs() -> u64 {
    600
}

fn default_concurrent() -> bool {
    true
}

/// Fan-out dispatcher: one session per agent for a shared task description.
pub struct Ultrawork {
    ctx: DispatchContext,
    config: UltraworkConfig,
}

impl Ultrawork {
    pub fn new(ctx: DispatchContext, config: UltraworkConfig) -> Self {
        Self { ctx, config }
    }

    pub fn config(&self) -> &UltraworkConfig {
        &self.config
    }

    /// Dispatch `description` to `agents` (every registered agent when `None`).
    ///
    /// All keys are validated before any record is written or session
    /// spawned. A spawn failure only fails that agent's subtask. With
    /// `concurrent` off each agent is awaited right after its spawn; with it
    /// on every spawn happens first and the waits then run in parallel, so
    /// the wait phase lasts as long as the slowest agent.
    pub async fn run(
        &self,
        description: &str,
        agents: Option<&[String]>,
        concurrent: bool,
    ) -> ConductorResult<TaskRecord> {
        let selected = self.ctx.registry.select(agents)?;
        let keys: Vec<String> = selected.iter().map(|p| p.key.clone()).collect();

        let mut record = TaskRecord::fanout(description, keys, concurrent);
        info!(
            task_id = %record.task_id,
            agents = selected.len(),
            concurrent,
            "Ultrawork: dispatching"
        );
        self.ctx.checkpoint(&record).await?;

        let timeout = Duration::from_secs(self.config.session_timeout_secs);
        let mut waiting: Vec<(String, SessionHandle)> = Vec::new();

        for profile in &selected {
            let Some(handle) = self.spawn_one(&mut record, profile, description, timeout).await?
            else {
                continue;
            };

            if concurrent {
                waiting.push((profile.key.clone(), handle));
            } else {
                let (outcome, elapsed) =
                    self.ctx.monitor.await_completion(&handle, timeout).await;
                self.settle(&mut record, &profile.key, &handle, outcome, elapsed).await?;
            }
        }

        if !waiting.is_empty() {
            self.await_all(&mut record, waiting, timeout).await?;
        }

        let status = record.outcome();
        record.finish(status);
        self.ctx.checkpoint(&record).await?;

        match status {
            TaskStatus::Completed => {
                info!(task_id = %record.task_id, "Ultrawork: all agents completed");
            }
            _ => {
                warn!(
                    task_id = %record.task_id,
                    status = %status,
                    "Ultrawork: finished with failures"
                );
            }
        }
        Ok(record)
    }

    /// Spawn one agent's session and record the result. `None` when the
    /// spawn failed.
    async fn spawn_one(
        &self,
        record: &mut TaskRecord,
        profile: &AgentProfile,
        description: &str,
        timeout: Duration,
    ) -> ConductorResult<Option<SessionHandle>> {
        let payload = fanout_instruction(profile, description);

        match self.ctx.gateway().spawn(&profile.id, &payload, timeout).await {
            Ok(handle) => {
                info!(
                    task_id = %record.task_id,
                    agent = %profile.key,
                    session = %handle,
                    "Ultrawork: agent started"
                );
                record.mark_subtask_running(&profile.key, handle.clone());
                self.ctx.checkpoint(record).await?;
                Ok(Some(handle))
            }
            Err(e) => {
                warn!(
                    task_id = %record.task_id,
                    agent = %profile.key,
                    error = %e,
                    "Ultrawork: agent failed to start"
                );
                record.mark_subtask_failed(&profile.key, e.to_string());
                self.ctx.checkpoint(record).await?;
                Ok(None)
            }
        }
    }

    /// Wait for every spawned session in parallel, folding each result into
    /// the record as it arrives.
    async fn await_all(
        &self,
        record: &mut TaskRecord,
        waiting: Vec<(String, SessionHandle)>,
        timeout: Duration,
    ) -> ConductorResult<()> {
        let mut join_set = JoinSet::new();
        for (key, handle) in waiting {
            let monitor = self.ctx.monitor.clone();
            join_set.spawn(async move {
                let (outcome, elapsed) = monitor.await_completion(&handle, timeout).await;
                (key, handle, outcome, elapsed)
            });
        }

        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((key, handle, outcome, elapsed)) => {
                    self.settle(record, &key, &handle, outcome, elapsed).await?;
                }
                Err(e) => {
                    error!(task_id = %record.task_id, error = %e, "Ultrawork: wait task aborted");
                }
            }
        }

        // Subtasks whose wait task died are closed out as errors.
        let orphaned = record.unsettled_subtasks();
        if !orphaned.is_empty() {
            for key in &orphaned {
                record.settle_subtask(key, SubtaskStatus::Error);
            }
            self.ctx.checkpoint(record).await?;
        }
        Ok(())
    }

    async fn settle(
        &self,
        record: &mut TaskRecord,
        key: &str,
        handle: &SessionHandle,
        outcome: PollOutcome,
        elapsed: Duration,
    ) -> ConductorResult<()> {
        info!(
            task_id = %record.task_id,
            agent = %key,
            outcome = %outcome,
            elapsed_secs = elapsed.as_secs(),
            "Ultrawork: agent finished"
        );
        record.settle_subtask(key, outcome.into());
        self.ctx.checkpoint(record).await?;

        if outcome != PollOutcome::Completed {
            self.ctx.log_history(&record.task_id, handle).await;
        }
        Ok(())
    }
}

/// Per-agent instruction for a fan-out session.
pub fn fanout_instruction(profile: &AgentProfile, description: &str) -> String {
    format!(
        "[{role} - {name}]\n\n\
         Task: {description}\n\n\
         Complete the part of this task that falls within your responsibilities, \
         working independently. When finished, report:\n\
         1. What you did and the result\n\
         2. Completion status (success/failure)\n\
         3. Key outputs or deliverables",
        role = profile.role,
        name = profile.name,
    )
}
