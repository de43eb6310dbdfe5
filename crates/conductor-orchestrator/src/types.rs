use chrono::{DateTime, Utc};
use conductor_session::{PollOutcome, SessionHandle};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// The full persisted task set, keyed by task id.
pub type TaskSet = BTreeMap<String, TaskRecord>;

/// Overall status of a dispatched task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Running,
    Completed,
    /// Fan-out only: some subtasks completed, some did not.
    Partial,
    Failed,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        self != TaskStatus::Running
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskStatus::Running => write!(f, "running"),
            TaskStatus::Completed => write!(f, "completed"),
            TaskStatus::Partial => write!(f, "partial"),
            TaskStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Status of one agent's share of a fan-out task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubtaskStatus {
    Pending,
    Running,
    Completed,
    Error,
    Timeout,
    /// The session never started.
    Failed,
}

impl SubtaskStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, SubtaskStatus::Pending | SubtaskStatus::Running)
    }
}

impl From<PollOutcome> for SubtaskStatus {
    fn from(outcome: PollOutcome) -> Self {
        match outcome {
            PollOutcome::Completed => SubtaskStatus::Completed,
            PollOutcome::Error => SubtaskStatus::Error,
            PollOutcome::Timeout => SubtaskStatus::Timeout,
        }
    }
}

impl std::fmt::Display for SubtaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SubtaskStatus::Pending => write!(f, "pending"),
            SubtaskStatus::Running => write!(f, "running"),
            SubtaskStatus::Completed => write!(f, "completed"),
            SubtaskStatus::Error => write!(f, "error"),
            SubtaskStatus::Timeout => write!(f, "timeout"),
            SubtaskStatus::Failed => write!(f, "failed"),
        }
    }
}

/// One agent's share of a fan-out task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubtaskRecord {
    pub agent_key: String,
    /// Set once the spawn succeeds.
    pub session: Option<SessionHandle>,
    pub status: SubtaskStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SubtaskRecord {
    pub fn pending(agent_key: impl Into<String>) -> Self {
        Self {
            agent_key: agent_key.into(),
            session: None,
            status: SubtaskStatus::Pending,
            started_at: Utc::now(),
            completed_at: None,
            error: None,
        }
    }
}

/// Outcome of a single retry attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AttemptStatus {
    FailedToSpawn,
    Completed,
    Error,
    Timeout,
}

impl From<PollOutcome> for AttemptStatus {
    fn from(outcome: PollOutcome) -> Self {
        match outcome {
            PollOutcome::Completed => AttemptStatus::Completed,
            PollOutcome::Error => AttemptStatus::Error,
            PollOutcome::Timeout => AttemptStatus::Timeout,
        }
    }
}

impl std::fmt::Display for AttemptStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AttemptStatus::FailedToSpawn => write!(f, "failed-to-spawn"),
            AttemptStatus::Completed => write!(f, "completed"),
            AttemptStatus::Error => write!(f, "error"),
            AttemptStatus::Timeout => write!(f, "timeout"),
        }
    }
}

/// One iteration of a retry loop. Never modified after it is appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptRecord {
    /// 1-based.
    pub attempt: u32,
    pub session: Option<SessionHandle>,
    pub status: AttemptStatus,
    pub duration_secs: u64,
    pub completed_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AttemptRecord {
    /// An attempt whose session could not be started.
    pub fn spawn_failed(attempt: u32, reason: impl Into<String>) -> Self {
        Self {
            attempt,
            session: None,
            status: AttemptStatus::FailedToSpawn,
            duration_secs: 0,
            completed_at: Utc::now(),
            error: Some(reason.into()),
        }
    }

    /// An attempt whose session ran and was waited on.
    pub fn finished(
        attempt: u32,
        session: SessionHandle,
        outcome: PollOutcome,
        duration_secs: u64,
    ) -> Self {
        Self {
            attempt,
            session: Some(session),
            status: outcome.into(),
            duration_secs,
            completed_at: Utc::now(),
            error: None,
        }
    }
}

/// Mode-specific part of a [`TaskRecord`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TaskDetail {
    /// One session per agent, all working on the same description.
    Fanout {
        /// Agent keys in dispatch order.
        agents: Vec<String>,
        concurrent: bool,
        subtasks: BTreeMap<String, SubtaskRecord>,
    },
    /// Repeated sessions of one agent until one completes.
    Retry {
        agent: String,
        max_retries: u32,
        attempts: Vec<AttemptRecord>,
    },
}

/// Durable record of one dispatch.
///
/// `status` stays `Running` until every child is terminal; after that the
/// record is not modified again.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub task_id: String,
    pub description: String,
    pub status: TaskStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub detail: TaskDetail,
}

impl TaskRecord {
    /// Start a fan-out record with every subtask pending.
    pub fn fanout(description: impl Into<String>, agents: Vec<String>, concurrent: bool) -> Self {
        let subtasks = agents
            .iter()
            .map(|key| (key.clone(), SubtaskRecord::pending(key.as_str())))
            .collect();
        Self::new(
            "ultrawork",
            description.into(),
            TaskDetail::Fanout {
                agents,
                concurrent,
                subtasks,
            },
        )
    }

    /// Start a retry record with no attempts.
    pub fn retry(
        description: impl Into<String>,
        agent: impl Into<String>,
        max_retries: u32,
    ) -> Self {
        Self::new(
            "ralph",
            description.into(),
            TaskDetail::Retry {
                agent: agent.into(),
                max_retries,
                attempts: Vec::new(),
            },
        )
    }

    fn new(prefix: &str, description: String, detail: TaskDetail) -> Self {
        let started_at = Utc::now();
        Self {
            task_id: generate_task_id(prefix, started_at),
            description,
            status: TaskStatus::Running,
            started_at,
            completed_at: None,
            detail,
        }
    }

    /// `"fanout"` or `"retry"`.
    pub fn kind(&self) -> &'static str {
        match self.detail {
            TaskDetail::Fanout { .. } => "fanout",
            TaskDetail::Retry { .. } => "retry",
        }
    }

    pub fn subtasks(&self) -> Option<&BTreeMap<String, SubtaskRecord>> {
        match &self.detail {
            TaskDetail::Fanout { subtasks, .. } => Some(subtasks),
            TaskDetail::Retry { .. } => None,
        }
    }

    pub fn attempts(&self) -> Option<&[AttemptRecord]> {
        match &self.detail {
            TaskDetail::Retry { attempts, .. } => Some(attempts),
            TaskDetail::Fanout { .. } => None,
        }
    }

    fn subtask_mut(&mut self, agent_key: &str) -> Option<&mut SubtaskRecord> {
        match &mut self.detail {
            TaskDetail::Fanout { subtasks, .. } => subtasks.get_mut(agent_key),
            TaskDetail::Retry { .. } => None,
        }
    }

    /// The agent's session started.
    pub fn mark_subtask_running(&mut self, agent_key: &str, session: SessionHandle) {
        if let Some(subtask) = self.subtask_mut(agent_key) {
            subtask.session = Some(session);
            subtask.status = SubtaskStatus::Running;
            subtask.started_at = Utc::now();
        }
    }

    /// The agent's session could not be started.
    pub fn mark_subtask_failed(&mut self, agent_key: &str, reason: impl Into<String>) {
        if let Some(subtask) = self.subtask_mut(agent_key) {
            subtask.status = SubtaskStatus::Failed;
            subtask.completed_at = Some(Utc::now());
            subtask.error = Some(reason.into());
        }
    }

    /// Record the terminal poll result of a running subtask.
    pub fn settle_subtask(&mut self, agent_key: &str, status: SubtaskStatus) {
        if let Some(subtask) = self.subtask_mut(agent_key) {
            subtask.status = status;
            subtask.completed_at = Some(Utc::now());
        }
    }

    /// Agent keys of subtasks that have not reached a terminal status.
    pub fn unsettled_subtasks(&self) -> Vec<String> {
        self.subtasks()
            .map(|subtasks| {
                subtasks
                    .values()
                    .filter(|s| !s.status.is_terminal())
                    .map(|s| s.agent_key.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Append a retry attempt.
    pub fn push_attempt(&mut self, attempt: AttemptRecord) {
        if let TaskDetail::Retry { attempts, .. } = &mut self.detail {
            attempts.push(attempt);
        }
    }

    /// Fix the final status and stamp the completion time.
    pub fn finish(&mut self, status: TaskStatus) {
        self.status = status;
        self.completed_at = Some(Utc::now());
    }

    /// Status implied by the children recorded so far.
    ///
    /// Fan-out: `completed` when every subtask completed, `failed` when none
    /// did, `partial` otherwise. Retry: `completed` when the last attempt
    /// completed, else `failed`.
    pub fn outcome(&self) -> TaskStatus {
        match &self.detail {
            TaskDetail::Fanout { subtasks, .. } => {
                let completed = subtasks
                    .values()
                    .filter(|s| s.status == SubtaskStatus::Completed)
                    .count();
                if completed == 0 {
                    TaskStatus::Failed
                } else if completed == subtasks.len() {
                    TaskStatus::Completed
                } else {
                    TaskStatus::Partial
                }
            }
            TaskDetail::Retry { attempts, .. } => match attempts.last() {
                Some(last) if last.status == AttemptStatus::Completed => TaskStatus::Completed,
                _ => TaskStatus::Failed,
            },
        }
    }
}

/// `<prefix>_<unix millis>_<8 hex chars>`.
pub fn generate_task_id(prefix: &str, at: DateTime<Utc>) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{prefix}_{}_{}", at.timestamp_millis(), &suffix[..8])
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn agents(keys: &[&str]) -> Vec<String> {
        keys.iter().map(|k| k.to_string()).collect()
    }

    #[test]
    fn test_fanout_record_starts_pending() {
        let record = TaskRecord::fanout("ship it", agents(&["developer", "writer"]), true);
        assert_eq!(record.status, TaskStatus::Running);
        assert_eq!(record.kind(), "fanout");
        assert!(record.task_id.starts_with("ultrawork_"));
        let subtasks = record.subtasks().unwrap();
        assert_eq!(subtasks.len(), 2);
        assert!(subtasks
            .values()
            .all(|s| s.status == SubtaskStatus::Pending && s.session.is_none()));
    }

    #[test]
    fn test_retry_record_starts_empty() {
        let record = TaskRecord::retry("fix login", "developer", 3);
        assert_eq!(record.kind(), "retry");
        assert!(record.task_id.starts_with("ralph_"));
        assert!(record.attempts().unwrap().is_empty());
        assert!(record.completed_at.is_none());
    }

    #[test]
    fn test_task_ids_are_unique() {
        let now = Utc::now();
        let a = generate_task_id("ralph", now);
        let b = generate_task_id("ralph", now);
        assert_ne!(a, b);
        assert!(a.starts_with(&format!("ralph_{}_", now.timestamp_millis())));
    }

    #[test]
    fn test_fanout_outcome_rules() {
        let mut record = TaskRecord::fanout("t", agents(&["a", "b"]), false);
        record.settle_subtask("a", SubtaskStatus::Completed);
        record.settle_subtask("b", SubtaskStatus::Completed);
        assert_eq!(record.outcome(), TaskStatus::Completed);

        record.settle_subtask("b", SubtaskStatus::Timeout);
        assert_eq!(record.outcome(), TaskStatus::Partial);

        record.settle_subtask("a", SubtaskStatus::Error);
        record.mark_subtask_failed("b", "no runtime");
        assert_eq!(record.outcome(), TaskStatus::Failed);
    }

    #[test]
    fn test_subtask_transitions() {
        let mut record = TaskRecord::fanout("t", agents(&["a", "b"]), true);
        record.mark_subtask_running("a", SessionHandle::new("s-a"));
        record.mark_subtask_failed("b", "exit 1");
        assert_eq!(record.unsettled_subtasks(), vec!["a".to_string()]);

        let subtasks = record.subtasks().unwrap();
        assert_eq!(subtasks["a"].session.as_ref().unwrap().as_str(), "s-a");
        assert!(subtasks["b"].session.is_none());
        assert_eq!(subtasks["b"].error.as_deref(), Some("exit 1"));
        assert!(subtasks["b"].completed_at.is_some());
    }

    #[test]
    fn test_retry_outcome_uses_last_attempt() {
        let mut record = TaskRecord::retry("t", "developer", 3);
        assert_eq!(record.outcome(), TaskStatus::Failed);
        record.push_attempt(AttemptRecord::spawn_failed(1, "busy"));
        record.push_attempt(AttemptRecord::finished(
            2,
            SessionHandle::new("s"),
            PollOutcome::Completed,
            12,
        ));
        assert_eq!(record.outcome(), TaskStatus::Completed);
    }

    #[test]
    fn test_mutators_ignore_other_mode() {
        let mut record = TaskRecord::retry("t", "developer", 3);
        record.mark_subtask_failed("developer", "nope");
        assert!(record.subtasks().is_none());

        let mut record = TaskRecord::fanout("t", agents(&["a"]), true);
        record.push_attempt(AttemptRecord::spawn_failed(1, "busy"));
        assert!(record.attempts().is_none());
    }

    #[test]
    fn test_record_json_shape() {
        let mut record = TaskRecord::retry("fix", "developer", 2);
        record.push_attempt(AttemptRecord::spawn_failed(1, "busy"));
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["type"], "retry");
        assert_eq!(json["status"], "running");
        assert_eq!(json["attempts"][0]["status"], "failed-to-spawn");
        assert!(json["attempts"][0]["session"].is_null());

        let parsed: TaskRecord = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, record);
    }
}
