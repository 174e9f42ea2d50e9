//! Configuration file support

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use chrono::FixedOffset;
use huddle_agent::{OrchestratorConfig, ResolverSettings, RetryPolicy, RosterMember};
use serde::{Deserialize, Serialize};

pub const DEFAULT_MODEL: &str = "claude-sonnet-4-5-20250929";

/// Configuration for huddle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Model to use
    pub model: String,
    /// Override for the Anthropic API base URL
    pub base_url: Option<String>,
    /// Maximum tokens per model response
    pub max_tokens: u32,
    /// Local UTC offset for times with no zone, e.g. "-05:00"
    pub utc_offset: String,
    /// Hour used when a message names no time
    pub default_hour: u32,
    /// Messages remembered per sender
    pub history_limit: usize,
    /// Tool rounds allowed per message
    pub max_tool_rounds: usize,
    /// Per-request timeout for model calls
    pub request_timeout_secs: u64,
    /// Where conversations and the calendar are stored
    pub data_dir: Option<PathBuf>,
    /// Tracing filter used when RUST_LOG is unset
    pub log_filter: Option<String>,
    pub retry: RetrySettings,
    /// API keys (alternative to environment variables)
    pub api_keys: ApiKeys,
    /// Known contacts, shared by every sender
    pub roster: Vec<RosterEntry>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            base_url: None,
            max_tokens: 1024,
            utc_offset: "+00:00".to_string(),
            default_hour: 19,
            history_limit: 5,
            max_tool_rounds: 3,
            request_timeout_secs: 60,
            data_dir: None,
            log_filter: None,
            retry: RetrySettings::default(),
            api_keys: ApiKeys::default(),
            roster: vec![],
        }
    }
}

/// Backoff for transient model failures
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_multiplier: f64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        let policy = RetryPolicy::default();
        Self {
            max_attempts: policy.max_attempts,
            base_delay_ms: policy.base_delay.as_millis() as u64,
            max_delay_ms: policy.max_delay.as_millis() as u64,
            backoff_multiplier: policy.backoff_multiplier,
        }
    }
}

impl From<&RetrySettings> for RetryPolicy {
    fn from(settings: &RetrySettings) -> Self {
        Self {
            max_attempts: settings.max_attempts.max(1),
            base_delay: Duration::from_millis(settings.base_delay_ms),
            max_delay: Duration::from_millis(settings.max_delay_ms),
            backoff_multiplier: backoff_multiplier(settings.backoff_multiplier),
        }
    }
}

/// Backoff never shrinks; anything below 1 or non-finite becomes 1
fn backoff_multiplier(value: f64) -> f64 {
    if value.is_finite() && value >= 1.0 { value } else { 1.0 }
}

/// API key configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiKeys {
    pub anthropic: Option<String>,
}

/// One `[[roster]]` entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RosterEntry {
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: String,
}

impl Config {
    /// Get the config directory
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("huddle")
    }

    /// Get the config file path
    pub fn config_path() -> PathBuf {
        if let Ok(path) = std::env::var("HUDDLE_CONFIG_PATH") {
            return PathBuf::from(path);
        }
        Self::config_dir().join("config.toml")
    }

    /// Load config from the default location
    pub fn load() -> Self {
        Self::load_from(&Self::config_path())
    }

    /// Load config from `path`; missing or unreadable files yield defaults
    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }

        match fs::read_to_string(path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(config) => config,
                Err(e) => {
                    eprintln!("Warning: Failed to parse config file {}: {}", path.display(), e);
                    Self::default()
                }
            },
            Err(e) => {
                eprintln!("Warning: Failed to read config file {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Save config to `path`
    pub fn save_to(&self, path: &Path) -> std::io::Result<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }

        let content = toml::to_string_pretty(self).map_err(std::io::Error::other)?;
        fs::write(path, content)
    }

    /// Create a default config file at `path` if it doesn't exist
    pub fn init(path: &Path) -> std::io::Result<()> {
        if path.exists() {
            return Ok(());
        }
        Self::default().save_to(path)
    }

    /// Anthropic API key, checking config then env
    pub fn api_key(&self) -> Option<String> {
        self.api_keys
            .anthropic
            .clone()
            .filter(|k| !k.trim().is_empty())
            .or_else(|| std::env::var("ANTHROPIC_API_KEY").ok())
    }

    pub fn data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(|| {
            dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("huddle")
        })
    }

    pub fn local_offset(&self) -> anyhow::Result<FixedOffset> {
        self.utc_offset
            .trim()
            .parse::<FixedOffset>()
            .with_context(|| format!("invalid utc_offset '{}', expected e.g. \"-05:00\"", self.utc_offset))
    }

    pub fn resolver_settings(&self) -> anyhow::Result<ResolverSettings> {
        Ok(ResolverSettings {
            local_offset: self.local_offset()?,
            default_hour: self.default_hour.min(23),
        })
    }

    pub fn orchestrator_config(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            history_limit: self.history_limit,
            max_tool_rounds: self.max_tool_rounds,
            retry: RetryPolicy::from(&self.retry),
        }
    }

    pub fn roster_members(&self) -> Vec<RosterMember> {
        self.roster
            .iter()
            .map(|r| RosterMember::new(&r.name, r.email.as_deref(), &r.phone))
            .collect()
    }
}

/// Generate example config content
pub fn example_config() -> &'static str {
    r#"# huddle configuration file
# Place at ~/.config/huddle/config.toml (Linux/Mac) or %APPDATA%\huddle\config.toml (Windows)
# or point HUDDLE_CONFIG_PATH at it

# Model to use
model = "claude-sonnet-4-5-20250929"

# Local UTC offset for times that name no timezone
utc_offset = "-05:00"

# Messages remembered per sender, and tool rounds per message
history_limit = 5
max_tool_rounds = 3

# Where conversations and the calendar snapshot are kept
# data_dir = "~/.local/share/huddle"

# Tracing filter when RUST_LOG is unset
# log_filter = "huddle=info"

[retry]
max_attempts = 3
base_delay_ms = 1000
max_delay_ms = 30000
backoff_multiplier = 2.0

# API keys (optional - can also use environment variables)
[api_keys]
# anthropic = "sk-ant-..."

# Contacts that attendee names are matched against
[[roster]]
name = "Alex Rivera"
email = "alex@example.com"
phone = "+15550001"

[[roster]]
name = "Sam Chen"
email = "sam@example.com"
phone = "+15550002"
"#
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_example_config_parses() {
        let config: Config = toml::from_str(example_config()).unwrap();
        assert_eq!(config.model, DEFAULT_MODEL);
        assert_eq!(config.local_offset().unwrap(), FixedOffset::west_opt(5 * 3600).unwrap());
        assert_eq!(config.roster.len(), 2);
        assert_eq!(config.retry, RetrySettings::default());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config: Config = toml::from_str("history_limit = 2\n[retry]\nmax_attempts = 5\n").unwrap();
        assert_eq!(config.history_limit, 2);
        assert_eq!(config.max_tool_rounds, 3);
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.retry.base_delay_ms, 1000);
    }

    #[test]
    fn test_missing_and_malformed_files_yield_defaults() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(Config::load_from(&dir.path().join("absent.toml")), Config::default());

        let bad = dir.path().join("bad.toml");
        fs::write(&bad, "model = [unclosed").unwrap();
        assert_eq!(Config::load_from(&bad), Config::default());
    }

    #[test]
    fn test_init_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        Config::init(&path).unwrap();
        assert_eq!(Config::load_from(&path), Config::default());
    }

    #[test]
    fn test_engine_settings() {
        let config = Config {
            utc_offset: "+05:30".to_string(),
            retry: RetrySettings {
                max_attempts: 0,
                base_delay_ms: 10,
                max_delay_ms: 100,
                backoff_multiplier: 3.0,
            },
            ..Default::default()
        };

        let settings = config.resolver_settings().unwrap();
        assert_eq!(settings.local_offset, FixedOffset::east_opt(5 * 3600 + 1800).unwrap());

        let engine = config.orchestrator_config();
        assert_eq!(engine.retry.max_attempts, 1);
        assert_eq!(engine.retry.base_delay, Duration::from_millis(10));
        assert_eq!(engine.model, DEFAULT_MODEL);
    }

    #[test]
    fn test_backoff_multiplier_is_sanitized() {
        let config: Config = toml::from_str("[retry]\nbackoff_multiplier = -2.0\n").unwrap();
        assert_eq!(config.orchestrator_config().retry.backoff_multiplier, 1.0);

        let config: Config = toml::from_str("[retry]\nbackoff_multiplier = nan\n").unwrap();
        let retry = config.orchestrator_config().retry;
        assert_eq!(retry.backoff_multiplier, 1.0);
        assert_eq!(retry.delay_for_attempt(2), Duration::from_millis(1000));

        let config: Config = toml::from_str("[retry]\nbackoff_multiplier = 1.5\n").unwrap();
        assert_eq!(config.orchestrator_config().retry.backoff_multiplier, 1.5);
    }

    #[test]
    fn test_bad_offset_is_an_error() {
        let config = Config {
            utc_offset: "EST".to_string(),
            ..Default::default()
        };
        assert!(config.local_offset().is_err());
    }

    #[test]
    fn test_roster_members() {
        let config: Config = toml::from_str(
            r#"
            [[roster]]
            name = "Priya"
            phone = "+15550003"
            "#,
        )
        .unwrap();
        let members = config.roster_members();
        assert_eq!(members[0].display_name, "Priya");
        assert_eq!(members[0].contact_address, None);
    }
}
