use conductor_core::{ConductorError, ConductorResult};
use serde::{Deserialize, Serialize};

/// Static description of an agent the runtime can host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentProfile {
    /// Lookup key used on the command line and in task records.
    pub key: String,
    /// Agent identity inside the runtime, passed to `spawn`.
    pub id: String,
    pub name: String,
    pub role: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// Lower is more important.
    #[serde(default = "default_priority")]
    pub priority: u8,
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_priority() -> u8 {
    3
}

const DEFAULT_MODEL: &str = "kimi-coding/k2p5";

/// Immutable set of agent profiles, in declaration order.
///
/// Handed to each dispatcher at construction; nothing mutates it afterwards.
#[derive(Debug, Clone)]
pub struct AgentRegistry {
    profiles: Vec<AgentProfile>,
}

impl AgentRegistry {
    /// Build a registry, rejecting duplicate keys.
    pub fn new(profiles: Vec<AgentProfile>) -> ConductorResult<Self> {
        for (i, profile) in profiles.iter().enumerate() {
            if profiles[..i].iter().any(|p| p.key == profile.key) {
                return Err(ConductorError::Config(format!(
                    "duplicate agent key '{}'",
                    profile.key
                )));
            }
        }
        Ok(Self { profiles })
    }

    /// The built-in five-agent team.
    pub fn builtin() -> Self {
        Self {
            profiles: default_profiles(),
        }
    }

    pub fn profile(&self, key: &str) -> Option<&AgentProfile> {
        self.profiles.iter().find(|p| p.key == key)
    }

    /// Like [`profile`](Self::profile) but fails with `UnknownAgent`.
    pub fn require(&self, key: &str) -> ConductorResult<&AgentProfile> {
        self.profile(key)
            .ok_or_else(|| ConductorError::UnknownAgent(key.to_string()))
    }

    /// Resolve a fan-out selection.
    ///
    /// `None` selects every agent. Explicit keys are deduplicated keeping
    /// first occurrence order, and every key is validated before anything is
    /// returned.
    pub fn select(&self, keys: Option<&[String]>) -> ConductorResult<Vec<AgentProfile>> {
        let Some(keys) = keys else {
            return Ok(self.profiles.clone());
        };

        let mut selected: Vec<AgentProfile> = Vec::with_capacity(keys.len());
        for key in keys {
            let profile = self.require(key)?;
            if !selected.iter().any(|p| p.key == profile.key) {
                selected.push(profile.clone());
            }
        }

        if selected.is_empty() {
            return Err(ConductorError::NoAgents);
        }
        Ok(selected)
    }

    /// Display name for a key, falling back to the key itself.
    pub fn display_name<'a>(&'a self, key: &'a str) -> &'a str {
        self.profile(key).map_or(key, |p| p.name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &AgentProfile> {
        self.profiles.iter()
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

impl Default for AgentRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Create the default agent profiles.
pub fn default_profiles() -> Vec<AgentProfile> {
    vec![
        profile(
            "commander",
            "main",
            "Commander",
            "Chief coordinator",
            "Strategic planning, coordinating the other agents, key decisions",
            1,
        ),
        profile(
            "writer",
            "writer",
            "Writer",
            "Content lead",
            "Article drafting and retrospectives",
            2,
        ),
        profile(
            "developer",
            "developer",
            "Developer",
            "Engineering lead",
            "Code development and deployment",
            2,
        ),
        profile(
            "analyst",
            "analyst",
            "Analyst",
            "Analyst",
            "Calendar, memo and reminder analysis",
            3,
        ),
        profile(
            "generalist",
            "generalist",
            "Generalist",
            "General purpose",
            "Ad-hoc tasks and quick prototypes",
            3,
        ),
    ]
}

fn profile(
    key: &str,
    id: &str,
    name: &str,
    role: &str,
    description: &str,
    priority: u8,
) -> AgentProfile {
    AgentProfile {
        key: key.to_string(),
        id: id.to_string(),
        name: name.to_string(),
        role: role.to_string(),
        description: description.to_string(),
        model: DEFAULT_MODEL.to_string(),
        priority,
    }
}
