use crate::dispatch::DispatchContext;
use crate::types::{AttemptRecord, TaskRecord, TaskStatus};
use conductor_core::ConductorResult;
use conductor_session::PollOutcome;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{info, warn};

/// Settings for retry-until-success dispatch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RalphConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_per_attempt_secs")]
    pub timeout_per_attempt_secs: u64,
    /// Pause after an attempt whose session never started.
    #[serde(default = "default_spawn_failure_backoff_secs")]
    pub spawn_failure_backoff_secs: u64,
    /// Pause after an attempt that ran but did not complete. Longer than
    /// the spawn failure backoff.
    #[serde(default = "default_retry_backoff_secs")]
    pub retry_backoff_secs: u64,
    /// Agent used when the caller names none.
    #[serde(default = "default_agent")]
    pub default_agent: String,
}

impl Default for RalphConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            timeout_per_attempt_secs: default_timeout_per_attempt_secs(),
            spawn_failure_backoff_secs: default_spawn_failure_backoff_secs(),
            retry_backoff_secs: default_retry_backoff_secs(),
            default_agent: default_agent(),
        }
    }
}

fn default_max_retries() -> u32 {
    5
}

fn default_timeout_per_attempt_secs() -> u64 {
    600
}

fn default_spawn_failure_backoff_secs() -> u64 {
    5
}

fn default_retry_backoff_secs() -> u64 {
    10
}

fn default_agent() -> String {
    "developer".to_string()
}

/// Retry dispatcher: re-runs one task on one agent until a session
/// completes or the retry budget runs out.
pub struct RalphLoop {
    ctx: DispatchContext,
    config: RalphConfig,
}

impl RalphLoop {
    pub fn new(ctx: DispatchContext, config: RalphConfig) -> Self {
        Self { ctx, config }
    }

    pub fn config(&self) -> &RalphConfig {
        &self.config
    }

    /// Run with the configured retry budget and per-attempt timeout.
    pub async fn run(&self, description: &str, agent_key: &str) -> ConductorResult<TaskRecord> {
        self.run_with(
            description,
            agent_key,
            self.config.max_retries,
            Duration::from_secs(self.config.timeout_per_attempt_secs),
        )
        .await
    }

    /// Attempt `description` on `agent_key` up to `max_retries` times.
    ///
    /// Exactly one attempt record is appended per iteration. The only
    /// success exit is an attempt whose session completed; that attempt is
    /// always the last one recorded.
    pub async fn run_with(
        &self,
        description: &str,
        agent_key: &str,
        max_retries: u32,
        timeout_per_attempt: Duration,
    ) -> ConductorResult<TaskRecord> {
        let profile = self.ctx.registry.require(agent_key)?.clone();

        let mut record = TaskRecord::retry(description, &profile.key, max_retries);
        info!(
            task_id = %record.task_id,
            agent = %profile.key,
            max_retries,
            "Ralph loop: starting"
        );
        self.ctx.checkpoint(&record).await?;

        for attempt in 1..=max_retries {
            let payload = retry_instruction(description, attempt, max_retries);
            let has_next = attempt < max_retries;

            let handle = match self
                .ctx
                .gateway()
                .spawn(&profile.id, &payload, timeout_per_attempt)
                .await
            {
                Ok(handle) => handle,
                Err(e) => {
                    warn!(
                        task_id = %record.task_id,
                        attempt,
                        error = %e,
                        "Ralph loop: spawn failed"
                    );
                    record.push_attempt(AttemptRecord::spawn_failed(attempt, e.to_string()));
                    self.ctx.checkpoint(&record).await?;
                    if has_next {
                        self.backoff(self.config.spawn_failure_backoff_secs).await;
                    }
                    continue;
                }
            };

            let (outcome, elapsed) = self
                .ctx
                .monitor
                .await_completion(&handle, timeout_per_attempt)
                .await;
            record.push_attempt(AttemptRecord::finished(
                attempt,
                handle.clone(),
                outcome,
                elapsed.as_secs(),
            ));
            self.ctx.checkpoint(&record).await?;

            if outcome == PollOutcome::Completed {
                record.finish(TaskStatus::Completed);
                self.ctx.checkpoint(&record).await?;
                info!(
                    task_id = %record.task_id,
                    attempt,
                    elapsed_secs = elapsed.as_secs(),
                    "Ralph loop: task completed"
                );
                return Ok(record);
            }

            warn!(
                task_id = %record.task_id,
                attempt,
                outcome = %outcome,
                "Ralph loop: attempt did not complete"
            );
            self.ctx.log_history(&record.task_id, &handle).await;
            if has_next {
                self.backoff(self.config.retry_backoff_secs).await;
            }
        }

        record.finish(TaskStatus::Failed);
        self.ctx.checkpoint(&record).await?;
        warn!(
            task_id = %record.task_id,
            attempts = max_retries,
            "Ralph loop: retry budget exhausted"
        );
        Ok(record)
    }

    async fn backoff(&self, secs: u64) {
        tokio::time::sleep(Duration::from_secs(secs)).await;
    }
}

/// Attempt-specific instruction for a retry session.
pub fn retry_instruction(description: &str, attempt: u32, max_retries: u32) -> String {
    format!(
        "[Retry loop - attempt {attempt}/{max_retries}]\n\n\
         Task: {description}\n\n\
         When finished you must report explicitly:\n\
         1. A summary of the result\n\
         2. Completion status: SUCCESS or NOT FINISHED\n\
         3. If not finished, current progress and blockers\n\
         4. Suggested next step\n\n\
         This is attempt {attempt} of {max_retries}; unfinished work will be attempted again."
    )
}
