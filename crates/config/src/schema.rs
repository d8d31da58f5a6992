//! Config schema structs. Every field has a serde default so a partial (or
//! absent) file still produces a usable config.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct OpenclawConfig {
    pub agent: AgentConfig,
    pub cron: CronConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct AgentConfig {
    /// Agent that receives main-session events when a job names none.
    pub default_id: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            default_id: "main".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct CronConfig {
    /// Bearer token attached to webhook deliveries when non-empty.
    pub webhook_token: Option<String>,
    /// Command used to run an isolated agent turn. The turn message is
    /// appended as the final argument.
    pub agent_command: Vec<String>,
    /// Default timeout for isolated turns, seconds.
    pub agent_timeout_seconds: u64,
}

impl Default for CronConfig {
    fn default() -> Self {
        Self {
            webhook_token: None,
            agent_command: vec!["openclaw-agent".into()],
            agent_timeout_seconds: 600,
        }
    }
}

impl OpenclawConfig {
    /// Session key of an agent's main (long-lived) session.
    pub fn main_session_key(&self, agent_id: &str) -> String {
        format!("agent:{agent_id}:main")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_usable() {
        let cfg = OpenclawConfig::default();
        assert_eq!(cfg.agent.default_id, "main");
        assert!(cfg.cron.webhook_token.is_none());
        assert_eq!(cfg.cron.agent_command, vec!["openclaw-agent".to_string()]);
    }

    #[test]
    fn main_session_key_derivation() {
        let cfg = OpenclawConfig::default();
        assert_eq!(cfg.main_session_key("ops"), "agent:ops:main");
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let cfg: OpenclawConfig = toml::from_str("[cron]\nwebhook_token = \"tok\"\n").unwrap();
        assert_eq!(cfg.cron.webhook_token.as_deref(), Some("tok"));
        assert_eq!(cfg.agent.default_id, "main");
    }
}
