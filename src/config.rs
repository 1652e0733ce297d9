//! Configuration management for Turnstile.

use std::collections::HashMap;
use std::env;
use std::net::SocketAddr;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{Result, TurnstileError};
use crate::ratelimit::{LimiterConfig, RateLimitRule};

/// Main configuration for the Turnstile service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TurnstileConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Counter store configuration
    #[serde(default)]
    pub storage: StorageConfig,

    /// Rate limit rules
    #[serde(default)]
    pub limits: LimitsConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP bind address
    #[serde(default = "default_bind_addr")]
    pub bind_addr: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
        }
    }
}

fn default_bind_addr() -> SocketAddr {
    "0.0.0.0:8080".parse().unwrap()
}

/// Which counter store implementation to run against.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Shared Redis server; required for multi-instance deployments
    #[default]
    Redis,
    /// In-process memory; counters are local to one instance
    Memory,
}

impl FromStr for StorageBackend {
    type Err = TurnstileError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "redis" => Ok(StorageBackend::Redis),
            "memory" => Ok(StorageBackend::Memory),
            other => Err(TurnstileError::Config(format!(
                "unsupported storage backend: {}",
                other
            ))),
        }
    }
}

/// Counter store configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Store implementation to use
    #[serde(default)]
    pub backend: StorageBackend,

    /// Redis settings, used when the backend is `redis`
    #[serde(default)]
    pub redis: RedisConfig,
}

/// Redis connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    /// Connection URL, e.g. `redis://:password@host:6379/0`
    #[serde(default = "default_redis_url")]
    pub url: String,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: default_redis_url(),
        }
    }
}

fn default_redis_url() -> String {
    "redis://127.0.0.1:6379".to_string()
}

/// Rate limit rules as written in configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Rule for requests limited by IP address
    #[serde(default)]
    pub ip: RuleConfig,

    /// Rule for tokens without an explicit override, if any
    #[serde(default)]
    pub token_default: Option<RuleConfig>,

    /// Per-token rule overrides
    #[serde(default)]
    pub token_overrides: HashMap<String, RuleConfig>,
}

/// One rate limit rule as written in configuration.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RuleConfig {
    /// Requests allowed per window
    #[serde(default = "default_ip_requests")]
    pub requests: u32,

    /// Window length in seconds
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,

    /// Block duration in seconds once the budget is exceeded
    #[serde(default = "default_block_secs")]
    pub block_secs: u64,
}

impl Default for RuleConfig {
    fn default() -> Self {
        Self {
            requests: default_ip_requests(),
            window_secs: default_window_secs(),
            block_secs: default_block_secs(),
        }
    }
}

impl RuleConfig {
    /// Convert to the limiter's rule value.
    pub fn to_rule(self) -> RateLimitRule {
        RateLimitRule::new(
            self.requests,
            Duration::from_secs(self.window_secs),
            Duration::from_secs(self.block_secs),
        )
    }
}

fn default_ip_requests() -> u32 {
    10
}

fn default_window_secs() -> u64 {
    1
}

fn default_block_secs() -> u64 {
    300
}

impl TurnstileConfig {
    /// Load configuration: the YAML file when given, then environment
    /// overrides on top.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Load configuration from a YAML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        info!(path = %path.display(), "Loading configuration");
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Load configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml)
            .map_err(|e| TurnstileError::Config(format!("failed to parse config: {}", e)))
    }

    /// Build the limiter's immutable rule set from this configuration.
    pub fn limiter_config(&self) -> LimiterConfig {
        LimiterConfig {
            default_ip_rule: self.limits.ip.to_rule(),
            default_token_rule: self.limits.token_default.map(RuleConfig::to_rule),
            token_rules: self
                .limits
                .token_overrides
                .iter()
                .map(|(token, rule)| (token.clone(), rule.to_rule()))
                .collect(),
        }
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Some(addr) = env_parse::<SocketAddr>("BIND_ADDR")? {
            self.server.bind_addr = addr;
        }
        if let Some(backend) = env_parse::<StorageBackend>("STORAGE_BACKEND")? {
            self.storage.backend = backend;
        }
        if let Some(url) = env_string("REDIS_URL") {
            self.storage.redis.url = url;
        }

        if let Some(requests) = env_parse::<u32>("RATE_LIMIT_IP_REQUESTS")? {
            self.limits.ip.requests = requests;
        }
        if let Some(secs) = env_parse::<u64>("RATE_LIMIT_IP_WINDOW_SECONDS")? {
            self.limits.ip.window_secs = secs;
        }
        if let Some(secs) = env_parse::<u64>("RATE_LIMIT_IP_BLOCK_SECONDS")? {
            self.limits.ip.block_secs = secs;
        }

        // The default token rule exists only when a budget is configured
        // for it, in the file or here.
        if let Some(requests) = env_parse::<u32>("RATE_LIMIT_TOKEN_DEFAULT_REQUESTS")? {
            let rule = self
                .limits
                .token_default
                .get_or_insert_with(RuleConfig::default);
            rule.requests = requests;
        }
        if let Some(rule) = self.limits.token_default.as_mut() {
            if let Some(secs) = env_parse::<u64>("RATE_LIMIT_TOKEN_DEFAULT_WINDOW_SECONDS")? {
                rule.window_secs = secs;
            }
            if let Some(secs) = env_parse::<u64>("RATE_LIMIT_TOKEN_DEFAULT_BLOCK_SECONDS")? {
                rule.block_secs = secs;
            }
        }

        if let Some(raw) = env_string("TOKEN_OVERRIDES") {
            self.limits.token_overrides.extend(parse_token_overrides(&raw)?);
        }

        Ok(())
    }
}

fn env_string(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn env_parse<T: FromStr>(key: &str) -> Result<Option<T>>
where
    T::Err: std::fmt::Display,
{
    match env_string(key) {
        None => Ok(None),
        Some(raw) => raw
            .parse::<T>()
            .map(Some)
            .map_err(|e| TurnstileError::Config(format!("invalid {}: {}", key, e))),
    }
}

/// Parse a comma-separated token override list in the
/// `TOKEN:REQUESTS:WINDOW_SECONDS:BLOCK_SECONDS` format.
pub fn parse_token_overrides(raw: &str) -> Result<HashMap<String, RuleConfig>> {
    let mut overrides = HashMap::new();

    for item in raw.split(',') {
        let item = item.trim();
        if item.is_empty() {
            continue;
        }

        let parts: Vec<&str> = item.split(':').collect();
        if parts.len() != 4 {
            return Err(TurnstileError::Config(format!(
                "token override must follow TOKEN:REQUESTS:WINDOW_SECONDS:BLOCK_SECONDS: {}",
                item
            )));
        }

        let token = parts[0].trim().to_string();
        let requests = parse_override_field(parts[1], "requests", &token)?;
        let window_secs = parse_override_field(parts[2], "window seconds", &token)?;
        let block_secs = parse_override_field(parts[3], "block seconds", &token)?;

        overrides.insert(
            token,
            RuleConfig {
                requests: requests as u32,
                window_secs,
                block_secs,
            },
        );
    }

    Ok(overrides)
}

fn parse_override_field(raw: &str, field: &str, token: &str) -> Result<u64> {
    raw.trim().parse::<u64>().map_err(|e| {
        TurnstileError::Config(format!("invalid {} for token {}: {}", field, token, e))
    })
}
