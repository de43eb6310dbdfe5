//! `conductor.toml` loading.
//!
//! Every section is optional. A missing file yields the built-in defaults so
//! the binary works out of the box against a locally installed runtime.

use conductor_core::{ConductorError, ConductorResult};
use conductor_orchestrator::{AgentProfile, AgentRegistry, RalphConfig, UltraworkConfig};
use conductor_session::{GatewayConfig, MonitorConfig};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Environment variable that overrides `data_dir`.
pub const DATA_DIR_ENV: &str = "CONDUCTOR_DATA_DIR";

const SNAPSHOT_FILE: &str = "tasks.json";

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ConductorConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub monitor: MonitorConfig,
    #[serde(default)]
    pub ultrawork: UltraworkConfig,
    #[serde(default)]
    pub ralph: RalphConfig,
    /// Replaces the built-in registry when non-empty.
    #[serde(default)]
    pub agents: Vec<AgentProfile>,
}

impl Default for ConductorConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            gateway: GatewayConfig::default(),
            monitor: MonitorConfig::default(),
            ultrawork: UltraworkConfig::default(),
            ralph: RalphConfig::default(),
            agents: Vec::new(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

impl ConductorConfig {
    /// Read `path`, falling back to defaults when it does not exist, then
    /// apply the `CONDUCTOR_DATA_DIR` override.
    pub async fn load(path: &Path) -> ConductorResult<Self> {
        let mut config = match tokio::fs::read_to_string(path).await {
            Ok(text) => Self::parse(&text)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "Config file not found, using defaults");
                Self::default()
            }
            Err(e) => {
                return Err(ConductorError::Config(format!(
                    "Failed to read config file '{}': {e}",
                    path.display()
                )))
            }
        };
        config.override_data_dir(std::env::var(DATA_DIR_ENV).ok());
        Ok(config)
    }

    pub fn parse(text: &str) -> ConductorResult<Self> {
        toml::from_str(text).map_err(|e| ConductorError::Config(e.to_string()))
    }

    fn override_data_dir(&mut self, value: Option<String>) {
        if let Some(dir) = value.filter(|v| !v.trim().is_empty()) {
            self.data_dir = PathBuf::from(dir);
        }
    }

    /// Location of the task snapshot.
    pub fn snapshot_path(&self) -> PathBuf {
        self.data_dir.join(SNAPSHOT_FILE)
    }

    pub fn registry(&self) -> ConductorResult<AgentRegistry> {
        if self.agents.is_empty() {
            Ok(AgentRegistry::builtin())
        } else {
            AgentRegistry::new(self.agents.clone())
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = ConductorConfig::parse("").unwrap();
        assert_eq!(config.data_dir, PathBuf::from("./data"));
        assert_eq!(config.gateway.command, "openclaw");
        assert_eq!(config.gateway.spawn_timeout_secs, 15);
        assert_eq!(config.gateway.query_timeout_secs, 10);
        assert_eq!(config.monitor.poll_interval_secs, 10);
        assert_eq!(config.ultrawork.session_timeout_secs, 600);
        assert_eq!(config.ralph.max_retries, 5);
        assert_eq!(config.ralph.default_agent, "developer");
        assert_eq!(config.registry().unwrap().len(), 5);
        assert_eq!(config.snapshot_path(), PathBuf::from("./data/tasks.json"));
    }

    #[test]
    fn test_partial_sections() {
        let config = ConductorConfig::parse(
            r#"
data_dir = "/var/lib/conductor"

[gateway]
command = "sh"
args = ["runtime.sh"]

[ralph]
max_retries = 2
retry_backoff_secs = 1
"#,
        )
        .unwrap();

        assert_eq!(config.gateway.command, "sh");
        assert_eq!(config.gateway.args, vec!["runtime.sh".to_string()]);
        assert_eq!(config.gateway.spawn_timeout_secs, 15);
        assert_eq!(config.ralph.max_retries, 2);
        assert_eq!(config.ralph.retry_backoff_secs, 1);
        assert_eq!(config.ralph.spawn_failure_backoff_secs, 5);
        assert_eq!(
            config.snapshot_path(),
            PathBuf::from("/var/lib/conductor/tasks.json")
        );
    }

    #[test]
    fn test_agents_replace_builtin_registry() {
        let config = ConductorConfig::parse(
            r#"
[[agents]]
key = "ops"
id = "ops-bot"
name = "Ops"
role = "Operations"

[[agents]]
key = "qa"
id = "qa"
name = "QA"
role = "Quality"
priority = 1
"#,
        )
        .unwrap();

        let registry = config.registry().unwrap();
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.require("ops").unwrap().id, "ops-bot");
        assert_eq!(registry.require("qa").unwrap().priority, 1);
        assert!(registry.profile("developer").is_none());
    }

    #[test]
    fn test_duplicate_agent_keys_rejected() {
        let config = ConductorConfig::parse(
            r#"
[[agents]]
key = "ops"
id = "a"
name = "A"
role = "r"

[[agents]]
key = "ops"
id = "b"
name = "B"
role = "r"
"#,
        )
        .unwrap();
        assert!(matches!(config.registry(), Err(ConductorError::Config(_))));
    }

    #[test]
    fn test_invalid_toml() {
        let err = ConductorConfig::parse("[monitor]\npoll_interval_secs = \"soon\"").unwrap_err();
        assert!(matches!(err, ConductorError::Config(_)));
    }

    #[test]
    fn test_data_dir_override() {
        let mut config = ConductorConfig::default();
        config.override_data_dir(Some("  ".to_string()));
        assert_eq!(config.data_dir, PathBuf::from("./data"));
        config.override_data_dir(Some("/tmp/conductor".to_string()));
        assert_eq!(config.data_dir, PathBuf::from("/tmp/conductor"));
    }

    #[tokio::test]
    async fn test_missing_file_falls_back_to_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let config = ConductorConfig::load(&tmp.path().join("absent.toml"))
            .await
            .unwrap();
        assert_eq!(config.gateway.command, "openclaw");
    }

    #[tokio::test]
    async fn test_load_from_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("conductor.toml");
        std::fs::write(&path, "[ultrawork]\nconcurrent = false\n").unwrap();
        let config = ConductorConfig::load(&path).await.unwrap();
        assert!(!config.ultrawork.concurrent);
    }
}
