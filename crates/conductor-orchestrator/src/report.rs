use crate::profiles::AgentRegistry;
use crate::store::TaskStore;
use crate::types::{AttemptStatus, SubtaskStatus, TaskDetail, TaskRecord, TaskStatus};
use chrono::{DateTime, Utc};
use conductor_core::ConductorResult;
use std::fmt::Write as _;
use std::sync::Arc;

const RULE: &str = "============================================================";

/// Result of a single-task lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskView {
    Found(TaskRecord),
    NotFound(String),
}

/// One line of the all-tasks view.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskSummary {
    pub task_id: String,
    pub kind: &'static str,
    pub status: TaskStatus,
}

/// Read-only views over the task store.
pub struct StatusReporter {
    store: Arc<dyn TaskStore>,
    registry: Arc<AgentRegistry>,
}

impl StatusReporter {
    pub fn new(store: Arc<dyn TaskStore>, registry: Arc<AgentRegistry>) -> Self {
        Self { store, registry }
    }

    pub async fn detail(&self, task_id: &str) -> ConductorResult<TaskView> {
        Ok(match self.store.get(task_id).await? {
            Some(record) => TaskView::Found(record),
            None => TaskView::NotFound(task_id.to_string()),
        })
    }

    /// Every task in id order.
    pub async fn summary(&self) -> ConductorResult<Vec<TaskSummary>> {
        Ok(self
            .store
            .load_all()
            .await?
            .into_values()
            .map(|record| TaskSummary {
                kind: record.kind(),
                status: record.status,
                task_id: record.task_id,
            })
            .collect())
    }

    pub fn render_detail(&self, view: &TaskView) -> String {
        match view {
            TaskView::NotFound(task_id) => format!("Task {task_id} not found."),
            TaskView::Found(record) => self.render_record(record),
        }
    }

    fn render_record(&self, record: &TaskRecord) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Task {}", record.task_id);
        let _ = writeln!(out, "{RULE}");
        let _ = writeln!(out, "Type:        {}", record.kind());
        let _ = writeln!(out, "Status:      {}", record.status);
        let _ = writeln!(out, "Started:     {}", timestamp(&record.started_at));
        let _ = writeln!(out, "Completed:   {}", optional_timestamp(record.completed_at.as_ref()));
        let _ = writeln!(out, "Description: {}", record.description);

        match &record.detail {
            TaskDetail::Fanout {
                agents,
                concurrent,
                subtasks,
            } => {
                let mode = if *concurrent { "concurrent" } else { "sequential" };
                let _ = writeln!(out, "\nSubtasks ({mode}):");
                // dispatch order first, then anything not listed
                let ordered = agents
                    .iter()
                    .filter_map(|key| subtasks.get(key))
                    .chain(subtasks.values().filter(|s| !agents.contains(&s.agent_key)));
                for subtask in ordered {
                    let _ = write!(
                        out,
                        "  {} {}: {}",
                        subtask_marker(subtask.status),
                        self.registry.display_name(&subtask.agent_key),
                        subtask.status
                    );
                    if let Some(session) = &subtask.session {
                        let _ = write!(out, "  session={session}");
                    }
                    if let Some(error) = &subtask.error {
                        let _ = write!(out, "  error={error}");
                    }
                    out.push('\n');
                }
            }
            TaskDetail::Retry {
                agent,
                max_retries,
                attempts,
            } => {
                let _ = writeln!(out, "Agent:       {}", self.registry.display_name(agent));
                let _ = writeln!(out, "\nAttempts ({}/{max_retries}):", attempts.len());
                for attempt in attempts {
                    let _ = write!(
                        out,
                        "  {} attempt {}: {} ({}s)",
                        attempt_marker(attempt.status),
                        attempt.attempt,
                        attempt.status,
                        attempt.duration_secs
                    );
                    if let Some(error) = &attempt.error {
                        let _ = write!(out, "  error={error}");
                    }
                    out.push('\n');
                }
            }
        }
        out
    }

    /// Render the all-tasks view; an empty set is reported as such.
    pub fn render_summary(summaries: &[TaskSummary]) -> String {
        if summaries.is_empty() {
            return "No tasks yet.".to_string();
        }
        let mut out = String::new();
        let _ = writeln!(out, "All tasks:");
        let _ = writeln!(out, "{RULE}");
        for summary in summaries {
            let _ = writeln!(
                out,
                "  {} {}: {} | {}",
                task_marker(summary.status),
                summary.task_id,
                summary.kind,
                summary.status
            );
        }
        out
    }
}

fn timestamp(at: &DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

fn optional_timestamp(at: Option<&DateTime<Utc>>) -> String {
    at.map_or_else(|| "-".to_string(), timestamp)
}

fn task_marker(status: TaskStatus) -> &'static str {
    match status {
        TaskStatus::Completed => "[ok]",
        TaskStatus::Running => "[..]",
        TaskStatus::Partial => "[~~]",
        TaskStatus::Failed => "[!!]",
    }
}

fn subtask_marker(status: SubtaskStatus) -> &'static str {
    match status {
        SubtaskStatus::Completed => "[ok]",
        SubtaskStatus::Pending | SubtaskStatus::Running => "[..]",
        SubtaskStatus::Error | SubtaskStatus::Timeout | SubtaskStatus::Failed => "[!!]",
    }
}

fn attempt_marker(status: AttemptStatus) -> &'static str {
    match status {
        AttemptStatus::Completed => "[ok]",
        _ => "[!!]",
    }
}
