use async_trait::async_trait;
use conductor_core::ConductorResult;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use std::time::Duration;

/// Opaque identifier of a session started by the external runtime.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionHandle(String);

impl SessionHandle {
    /// Wrap a runtime-issued session key.
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// The raw session key.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Status of a running session as reported by the runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    /// The session finished its work.
    Completed,
    /// The session is still executing.
    Running,
    /// The session stopped with an error.
    Error,
    /// The status could not be determined; polling continues.
    Unknown,
}

impl SessionStatus {
    /// `Completed` and `Error` end polling; `Running` and `Unknown` do not.
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionStatus::Completed | SessionStatus::Error)
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionStatus::Completed => write!(f, "completed"),
            SessionStatus::Running => write!(f, "running"),
            SessionStatus::Error => write!(f, "error"),
            SessionStatus::Unknown => write!(f, "unknown"),
        }
    }
}

/// Boundary to the external agent runtime.
///
/// Every call is bounded in duration and independently failure-prone.
/// Only `spawn` reports failure as an error; `status` downgrades failures to
/// [`SessionStatus::Unknown`] and `history` to `None`, so a dispatcher polling
/// a flaky runtime keeps going instead of aborting.
#[async_trait]
pub trait SessionGateway: Send + Sync {
    /// Start a session for `agent_id` running `payload`, allowing it
    /// `timeout` of execution time inside the runtime.
    async fn spawn(
        &self,
        agent_id: &str,
        payload: &str,
        timeout: Duration,
    ) -> ConductorResult<SessionHandle>;

    /// Query the current status of a session.
    async fn status(&self, handle: &SessionHandle) -> SessionStatus;

    /// Fetch up to `limit` recent transcript entries. Diagnostics only.
    async fn history(&self, handle: &SessionHandle, limit: usize) -> Option<String>;
}

/// Classify raw runtime status output.
///
/// A JSON object carrying a `status` string is read as a structured status
/// and matched exactly. Anything else falls back to a case-insensitive
/// keyword scan, checked in the order completed/done, running/active,
/// error/failed. The keyword scan is best-effort: output that merely mentions
/// one of those words is misclassified.
pub fn classify_status(output: &str) -> SessionStatus {
    if let Some(status) = structured_status(output) {
        return status;
    }

    let lower = output.to_lowercase();
    if lower.contains("completed") || lower.contains("done") {
        SessionStatus::Completed
    } else if lower.contains("running") || lower.contains("active") {
        SessionStatus::Running
    } else if lower.contains("error") || lower.contains("failed") {
        SessionStatus::Error
    } else {
        SessionStatus::Unknown
    }
}

fn structured_status(output: &str) -> Option<SessionStatus> {
    let value: serde_json::Value = serde_json::from_str(output.trim()).ok()?;
    let status = value.get("status")?.as_str()?.to_ascii_lowercase();
    Some(match status.as_str() {
        "completed" | "done" => SessionStatus::Completed,
        "running" | "active" => SessionStatus::Running,
        "error" | "failed" => SessionStatus::Error,
        _ => SessionStatus::Unknown,
    })
}

/// Extract the session key from `spawn` output.
///
/// Accepts a JSON line with `sessionKey` / `session_key`, a
/// `sessionKey: <key>` line, or a `spawned session <key>` line.
pub fn parse_session_handle(output: &str) -> Option<SessionHandle> {
    for line in output.lines() {
        if let Ok(value) = serde_json::from_str::<serde_json::Value>(line.trim()) {
            let key = ["sessionKey", "session_key"]
                .iter()
                .find_map(|field| value.get(*field).and_then(|v| v.as_str()));
            if let Some(key) = key.filter(|k| !k.is_empty()) {
                return Some(SessionHandle::new(key));
            }
        }
    }

    let (keyed, spawned) = handle_patterns();
    keyed
        .captures(output)
        .or_else(|| spawned.captures(output))
        .and_then(|caps| caps.get(1))
        .map(|m| SessionHandle::new(m.as_str()))
}

#[allow(clippy::expect_used)]
fn handle_patterns() -> (&'static Regex, &'static Regex) {
    static KEYED: OnceLock<Regex> = OnceLock::new();
    static SPAWNED: OnceLock<Regex> = OnceLock::new();

    // Both patterns are literals.
    let keyed = KEYED.get_or_init(|| {
        Regex::new(r#"(?i)session[_ ]?key["']?\s*[:=]\s*["']?([^\s"',}]+)"#)
            .expect("session key pattern")
    });
    let spawned = SPAWNED.get_or_init(|| {
        Regex::new(r#"(?i)spawned\s+session\s+["']?([^\s"',}]+)"#).expect("spawned pattern")
    });
    (keyed, spawned)
}
