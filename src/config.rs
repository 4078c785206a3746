//! Process configuration
//!
//! Everything is read from environment variables once at startup. Lookups go
//! through a closure so tests can supply their own variables.
//!
//! Reads from:
//! - `CHAT_BIND_ADDR` (defaults to 127.0.0.1:8080)
//! - `ANTHROPIC_API_KEY` (required)
//! - `ANTHROPIC_MODEL`, `ANTHROPIC_MAX_TOKENS`, `ANTHROPIC_BASE_URL`
//! - `CHAT_TEMPERATURE`, `CHAT_MAX_ROUNDS`, `CHAT_HISTORY_BUDGET`,
//!   `CHAT_REQUEST_TIMEOUT_SECS`, `CHAT_KEEP_ALIVE_SECS`, `CHAT_SYSTEM_PROMPT`
//! - `CHAT_STORE_DIR`, `CHAT_AUTH_TOKENS`
//! - `CHAT_LOG_DIR`, `CHAT_LOG_LEVEL`

use std::env;
use std::fmt::Display;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::agent::{AgentConfig, TrimBudget, TrimPolicy, DEFAULT_SYSTEM_PROMPT};
use crate::core::{ChatError, ChatResult};

pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8080";
pub const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";
pub const DEFAULT_MAX_TOKENS: u32 = 4096;
pub const DEFAULT_TEMPERATURE: f32 = 0.7;
pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:8080";

/// Settings for the Anthropic model provider
#[derive(Debug, Clone)]
pub struct AnthropicSettings {
    pub api_key: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    /// Full messages endpoint, overriding the public API
    pub base_url: Option<String>,
}

/// Logging output settings
#[derive(Debug, Clone, PartialEq)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset
    pub level: String,
    /// Directory for daily-rolling JSON log files
    pub log_dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            log_dir: None,
        }
    }
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub anthropic: AnthropicSettings,
    pub system_prompt: String,
    pub max_rounds: usize,
    pub history_budget: usize,
    pub request_timeout: Duration,
    /// Zero disables keep-alive comments
    pub keep_alive: Duration,
    pub store_dir: PathBuf,
    /// `token=user` pairs, comma separated
    pub auth_tokens: String,
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from the process environment
    pub fn from_env() -> ChatResult<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> ChatResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = lookup("ANTHROPIC_API_KEY")
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| {
                ChatError::InvalidConfig("ANTHROPIC_API_KEY environment variable not set".into())
            })?;

        let anthropic = AnthropicSettings {
            api_key,
            model: lookup("ANTHROPIC_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            max_tokens: parse_var(&lookup, "ANTHROPIC_MAX_TOKENS", DEFAULT_MAX_TOKENS)?,
            temperature: parse_var(&lookup, "CHAT_TEMPERATURE", DEFAULT_TEMPERATURE)?,
            base_url: lookup("ANTHROPIC_BASE_URL").filter(|url| !url.trim().is_empty()),
        };

        let bind_addr = parse_var(
            &lookup,
            "CHAT_BIND_ADDR",
            SocketAddr::from(([127, 0, 0, 1], 8080)),
        )?;

        Ok(Self {
            bind_addr,
            anthropic,
            system_prompt: lookup("CHAT_SYSTEM_PROMPT")
                .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string()),
            max_rounds: parse_var(&lookup, "CHAT_MAX_ROUNDS", 10)?,
            history_budget: parse_var(&lookup, "CHAT_HISTORY_BUDGET", 10)?,
            request_timeout: Duration::from_secs(parse_var(
                &lookup,
                "CHAT_REQUEST_TIMEOUT_SECS",
                120,
            )?),
            keep_alive: Duration::from_secs(parse_var(&lookup, "CHAT_KEEP_ALIVE_SECS", 15)?),
            store_dir: lookup("CHAT_STORE_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("./conversations")),
            auth_tokens: lookup("CHAT_AUTH_TOKENS").unwrap_or_default(),
            logging: LoggingConfig::from_lookup(&lookup),
        })
    }

    /// Engine configuration derived from these settings
    pub fn agent_config(&self) -> AgentConfig {
        let config = AgentConfig::new(self.system_prompt.clone())
            .with_max_rounds(self.max_rounds)
            .with_trim_policy(TrimPolicy::new(TrimBudget::Messages(self.history_budget)));

        let config = if self.keep_alive.is_zero() {
            config.without_keep_alive()
        } else {
            config.with_keep_alive(self.keep_alive)
        };

        if self.request_timeout.is_zero() {
            config.without_request_timeout()
        } else {
            config.with_request_timeout(self.request_timeout)
        }
    }
}

impl LoggingConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            level: lookup("CHAT_LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            log_dir: lookup("CHAT_LOG_DIR")
                .filter(|dir| !dir.trim().is_empty())
                .map(PathBuf::from),
        }
    }
}

/// Settings for the `ask` command
#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub server_url: String,
    pub token: Option<String>,
}

impl ClientSettings {
    /// Reads `CHAT_SERVER_URL` and `CHAT_TOKEN`
    pub fn from_env() -> Self {
        Self {
            server_url: env::var("CHAT_SERVER_URL")
                .unwrap_or_else(|_| DEFAULT_SERVER_URL.to_string()),
            token: env::var("CHAT_TOKEN").ok().filter(|t| !t.is_empty()),
        }
    }
}

fn parse_var<F, T>(lookup: &F, key: &str, default: T) -> ChatResult<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: Display,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => raw.trim().parse().map_err(|e| {
            ChatError::InvalidConfig(format!("{} has invalid value '{}': {}", key, raw, e))
        }),
        _ => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::from_lookup(lookup_from(&[("ANTHROPIC_API_KEY", "sk-test")])).unwrap();

        assert_eq!(config.bind_addr.to_string(), DEFAULT_BIND_ADDR);
        assert_eq!(config.anthropic.model, DEFAULT_MODEL);
        assert_eq!(config.anthropic.max_tokens, 4096);
        assert!((config.anthropic.temperature - 0.7).abs() < f32::EPSILON);
        assert!(config.anthropic.base_url.is_none());
        assert_eq!(config.max_rounds, 10);
        assert_eq!(config.history_budget, 10);
        assert_eq!(config.request_timeout, Duration::from_secs(120));
        assert_eq!(config.keep_alive, Duration::from_secs(15));
        assert_eq!(config.store_dir, PathBuf::from("./conversations"));
        assert_eq!(config.logging, LoggingConfig::default());
    }

    #[test]
    fn test_overrides() {
        let config = AppConfig::from_lookup(lookup_from(&[
            ("ANTHROPIC_API_KEY", "sk-test"),
            ("CHAT_BIND_ADDR", "0.0.0.0:9000"),
            ("CHAT_MAX_ROUNDS", "4"),
            ("CHAT_HISTORY_BUDGET", " 6 "),
            ("CHAT_REQUEST_TIMEOUT_SECS", "0"),
            ("CHAT_KEEP_ALIVE_SECS", "0"),
            ("CHAT_LOG_DIR", "/tmp/logs"),
            ("ANTHROPIC_BASE_URL", "http://localhost:9999/v1/messages"),
        ]))
        .unwrap();

        assert_eq!(config.bind_addr.port(), 9000);
        assert_eq!(config.logging.log_dir, Some(PathBuf::from("/tmp/logs")));

        let agent = config.agent_config();
        assert_eq!(agent.max_rounds, 4);
        assert_eq!(agent.trim_policy.budget, TrimBudget::Messages(6));
        assert!(agent.request_timeout.is_none());
        assert!(agent.keep_alive.is_none());
        assert_eq!(agent.system_prompt.as_deref(), Some(DEFAULT_SYSTEM_PROMPT));
    }

    #[test]
    fn test_missing_api_key() {
        let err = AppConfig::from_lookup(lookup_from(&[])).unwrap_err();
        assert!(matches!(err, ChatError::InvalidConfig(_)));
    }

    #[test]
    fn test_invalid_number() {
        let err = AppConfig::from_lookup(lookup_from(&[
            ("ANTHROPIC_API_KEY", "sk-test"),
            ("CHAT_MAX_ROUNDS", "ten"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("CHAT_MAX_ROUNDS"));
    }
}
