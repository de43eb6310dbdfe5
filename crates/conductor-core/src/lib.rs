//! Core error definitions for the conductor workspace.
//!
//! Every crate in the workspace reports failures through [`ConductorError`].
//! Most runtime failures never reach a caller as an error value: dispatchers
//! fold them into the persisted task record instead. The variants that do
//! escape are validation failures raised before any session is spawned and
//! task store I/O failures.
//!
//! # Main types
//!
//! - [`ConductorError`] — Unified error enum for all conductor subsystems.
//! - [`ConductorResult`] — Convenience alias for `Result<T, ConductorError>`.

// --- Error types ---

/// Top-level error type for the conductor workspace.
#[derive(Debug, thiserror::Error)]
pub enum ConductorError {
    /// A dispatcher was given an agent key that is not in the registry.
    #[error("Unknown agent: {0}")]
    UnknownAgent(String),

    /// A fan-out dispatch was requested with an empty agent selection.
    #[error("No agents selected for dispatch")]
    NoAgents,

    /// The external runtime refused or failed to start a session.
    #[error("Spawn failed: {reason}")]
    SpawnFailed {
        /// Diagnostic text reported by the runtime (or the local failure).
        reason: String,
    },

    /// The external runtime could not be reached at all.
    #[error("Gateway unavailable: {0}")]
    GatewayUnavailable(String),

    /// An error in task snapshot persistence.
    #[error("Store error: {0}")]
    Store(String),

    /// An error in configuration parsing or validation.
    #[error("Config error: {0}")]
    Config(String),

    /// A JSON serialization or deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A standard I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ConductorError {
    /// Shorthand for building a [`ConductorError::SpawnFailed`].
    pub fn spawn_failed(reason: impl Into<String>) -> Self {
        Self::SpawnFailed {
            reason: reason.into(),
        }
    }

    /// Whether the error was raised by dispatch validation, before any
    /// session was spawned or any record was written.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::UnknownAgent(_) | Self::NoAgents)
    }
}

/// A convenience `Result` alias using [`ConductorError`].
pub type ConductorResult<T> = Result<T, ConductorError>;

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_agent_display() {
        let err = ConductorError::UnknownAgent("ghost".to_string());
        assert_eq!(err.to_string(), "Unknown agent: ghost");
        assert!(err.is_validation());
    }

    #[test]
    fn test_spawn_failed_display() {
        let err = ConductorError::spawn_failed("exit 2: no such agent");
        assert_eq!(err.to_string(), "Spawn failed: exit 2: no such agent");
        assert!(!err.is_validation());
    }

    #[test]
    fn test_io_error_conversion() {
        fn read() -> ConductorResult<()> {
            Err(std::io::Error::new(std::io::ErrorKind::NotFound, "gone"))?;
            Ok(())
        }
        let err = read().unwrap_err();
        assert!(matches!(err, ConductorError::Io(_)));
        assert!(err.to_string().contains("gone"));
    }

    #[test]
    fn test_json_error_conversion() {
        let parse: Result<serde_json::Value, _> = serde_json::from_str("{not json");
        let err: ConductorError = parse.unwrap_err().into();
        assert!(err.to_string().starts_with("JSON error"));
    }
}
