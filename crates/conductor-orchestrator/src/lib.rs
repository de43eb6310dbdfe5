//! Task dispatch engine for externally-run agent sessions.
//!
//! Hands units of work to agent sessions hosted by an external runtime,
//! follows them by polling, and checkpoints every state change of the task
//! record to a snapshot store.
//!
//! # Main types
//!
//! - [`Ultrawork`] — Fan-out dispatcher: one session per agent, waits in parallel.
//! - [`RalphLoop`] — Retry dispatcher: re-runs one agent until a session completes.
//! - [`TaskStore`] — Whole-snapshot persistence of [`TaskRecord`]s.
//! - [`StatusReporter`] — Read-only detail and summary views over the store.
//! - [`AgentRegistry`] — Immutable set of [`AgentProfile`]s injected into dispatchers.

/// Collaborators shared by the dispatchers.
pub mod dispatch;
/// Agent profiles and the registry.
pub mod profiles;
/// Retry-until-success dispatcher.
pub mod ralph_loop;
/// Status views over persisted tasks.
pub mod report;
/// Task snapshot persistence.
pub mod store;
/// Task, subtask and attempt records.
pub mod types;
/// Fan-out dispatcher.
pub mod ultrawork;

pub use dispatch::DispatchContext;
pub use profiles::{default_profiles, AgentProfile, AgentRegistry};
pub use ralph_loop::{RalphConfig, RalphLoop};
pub use report::{StatusReporter, TaskSummary, TaskView};
pub use store::{InMemoryTaskStore, JsonTaskStore, TaskStore};
pub use types::{
    AttemptRecord, AttemptStatus, SubtaskRecord, SubtaskStatus, TaskDetail, TaskRecord, TaskSet,
    TaskStatus,
};
pub use ultrawork::{Ultrawork, UltraworkConfig};
