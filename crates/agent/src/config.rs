//! Agent configuration: env vars override a TOML file which overrides
//! built-in defaults, applied in `AgentConfig::load()`.

use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub docker_socket: String,
    pub max_command_payload_bytes: usize,
    pub script_timeout_seconds: u64,
    pub shell_exec_timeout_seconds: u64,
    pub shell_exec_max_output_chars: usize,
    pub terminal_max_output_bytes: u64,
    pub terminal_max_duration_seconds: u64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            docker_socket: String::new(),
            max_command_payload_bytes: 32 * 1024,
            script_timeout_seconds: 300,
            shell_exec_timeout_seconds: 60,
            shell_exec_max_output_chars: 65_536,
            terminal_max_output_bytes: 1_000_000,
            terminal_max_duration_seconds: 3600,
        }
    }
}

impl AgentConfig {
    /// Loads from `AGENT_CONFIG_FILE` (default `/etc/manlab/agent.toml`) if
    /// it exists, otherwise from environment variables, then applies any
    /// set environment variables as overrides either way.
    pub fn load() -> Result<Self, Box<dyn std::error::Error>> {
        let config_path = std::env::var("AGENT_CONFIG_FILE").unwrap_or_else(|_| "/etc/manlab/agent.toml".to_string());

        let mut config = if Path::new(&config_path).exists() {
            tracing::info!(path = %config_path, "loading agent configuration from file");
            Self::from_file(&config_path)?
        } else {
            tracing::info!(path = %config_path, "config file not found, using environment variables");
            Self::from_env()
        };

        if let Ok(socket) = std::env::var("DOCKER_SOCKET") {
            config.docker_socket = socket;
        }
        Ok(config)
    }

    pub fn from_file(path: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&contents)?)
    }

    pub fn from_env() -> Self {
        Self {
            docker_socket: std::env::var("DOCKER_SOCKET").unwrap_or_default(),
            max_command_payload_bytes: std::env::var("AGENT_MAX_COMMAND_PAYLOAD_BYTES").ok().and_then(|s| s.parse().ok()).unwrap_or(32 * 1024),
            script_timeout_seconds: std::env::var("AGENT_SCRIPT_TIMEOUT_SECONDS").ok().and_then(|s| s.parse().ok()).unwrap_or(300),
            shell_exec_timeout_seconds: std::env::var("AGENT_SHELL_EXEC_TIMEOUT_SECONDS").ok().and_then(|s| s.parse().ok()).unwrap_or(60),
            shell_exec_max_output_chars: std::env::var("AGENT_SHELL_EXEC_MAX_OUTPUT_CHARS").ok().and_then(|s| s.parse().ok()).unwrap_or(65_536),
            terminal_max_output_bytes: std::env::var("AGENT_TERMINAL_MAX_OUTPUT_BYTES").ok().and_then(|s| s.parse().ok()).unwrap_or(1_000_000),
            terminal_max_duration_seconds: std::env::var("AGENT_TERMINAL_MAX_DURATION_SECONDS").ok().and_then(|s| s.parse().ok()).unwrap_or(3600),
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.max_command_payload_bytes == 0 {
            return Err("max_command_payload_bytes must be > 0".to_string());
        }
        if self.script_timeout_seconds == 0 {
            return Err("script_timeout_seconds must be > 0".to_string());
        }
        if self.shell_exec_timeout_seconds == 0 {
            return Err("shell_exec_timeout_seconds must be > 0".to_string());
        }
        if self.terminal_max_output_bytes == 0 {
            return Err("terminal_max_output_bytes must be > 0".to_string());
        }
        if self.terminal_max_duration_seconds == 0 {
            return Err("terminal_max_duration_seconds must be > 0".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_pass_validation() {
        assert!(AgentConfig::default().validate().is_ok());
    }

    #[test]
    fn zero_script_timeout_is_rejected() {
        let config = AgentConfig { script_timeout_seconds: 0, ..AgentConfig::default() };
        assert!(config.validate().is_err());
    }

    #[test]
    fn parses_from_toml() {
        let toml_text = "docker_socket = \"/var/run/docker.sock\"\nscript_timeout_seconds = 120\n";
        let config: AgentConfig = toml::from_str(toml_text).unwrap();
        assert_eq!(config.docker_socket, "/var/run/docker.sock");
        assert_eq!(config.script_timeout_seconds, 120);
        assert_eq!(config.shell_exec_timeout_seconds, 60);
    }
}
