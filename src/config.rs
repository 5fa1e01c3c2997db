//! Bot configuration from environment variables

use crate::delivery::RetryPolicy;
use std::env;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set in the environment or .env file")]
    MissingVariable(&'static str),

    #[error("{name} has an invalid value: {reason}")]
    InvalidValue { name: &'static str, reason: String },
}

/// Runtime configuration
///
/// Environment variables:
/// - `TELEGRAM_BOT_TOKEN` (required)
/// - `TELEGRAM_API_URL` (default: https://api.telegram.org)
/// - `TALLYBOT_DB_PATH` (default: analytics.db)
/// - `TALLYBOT_SCRATCH_DIR` (default: temp_charts)
/// - `SEND_MAX_RETRIES` (default: 5)
/// - `SEND_INITIAL_DELAY_MS` (default: 1000)
/// - `API_TIMEOUT_SECS` (default: 60)
/// - `POLL_TIMEOUT_SECS` (default: 30)
/// - `TALLYBOT_CURRENCY` (default: UAH)
/// - `TALLYBOT_SEED_DEMO` (default: false)
#[derive(Clone)]
pub struct BotConfig {
    pub bot_token: String,
    pub api_url: String,
    pub db_path: String,
    pub scratch_dir: String,
    pub max_send_attempts: u32,
    pub initial_delay_ms: u64,
    pub api_timeout_secs: u64,
    pub poll_timeout_secs: u64,
    pub currency: String,
    pub seed_demo_data: bool,
}

impl std::fmt::Debug for BotConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BotConfig")
            .field("bot_token", &"<redacted>")
            .field("api_url", &self.api_url)
            .field("db_path", &self.db_path)
            .field("scratch_dir", &self.scratch_dir)
            .field("max_send_attempts", &self.max_send_attempts)
            .field("initial_delay_ms", &self.initial_delay_ms)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("poll_timeout_secs", &self.poll_timeout_secs)
            .field("currency", &self.currency)
            .field("seed_demo_data", &self.seed_demo_data)
            .finish()
    }
}

fn parsed_or<T, F>(lookup: &F, name: &str, default: T) -> T
where
    T: FromStr + std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            log::warn!("⚠️  {}={:?} is not valid, using {}", name, raw, default);
            default
        }),
        None => default,
    }
}

fn string_or<F>(lookup: &F, name: &str, default: &str) -> String
where
    F: Fn(&str) -> Option<String>,
{
    lookup(name)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| default.to_string())
}

impl BotConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build from an arbitrary key lookup (tests pass a map)
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let bot_token = lookup("TELEGRAM_BOT_TOKEN")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .ok_or(ConfigError::MissingVariable("TELEGRAM_BOT_TOKEN"))?;

        let api_url = string_or(&lookup, "TELEGRAM_API_URL", "https://api.telegram.org");
        if !(api_url.starts_with("http://") || api_url.starts_with("https://")) {
            return Err(ConfigError::InvalidValue {
                name: "TELEGRAM_API_URL",
                reason: format!("{:?} is not an http(s) URL", api_url),
            });
        }

        let mut max_send_attempts: u32 = parsed_or(&lookup, "SEND_MAX_RETRIES", 5);
        if max_send_attempts == 0 {
            log::warn!("⚠️  SEND_MAX_RETRIES=0 is not valid, using 1");
            max_send_attempts = 1;
        }

        Ok(Self {
            bot_token,
            api_url,
            db_path: string_or(&lookup, "TALLYBOT_DB_PATH", "analytics.db"),
            scratch_dir: string_or(&lookup, "TALLYBOT_SCRATCH_DIR", "temp_charts"),
            max_send_attempts,
            initial_delay_ms: parsed_or(&lookup, "SEND_INITIAL_DELAY_MS", 1_000),
            api_timeout_secs: parsed_or(&lookup, "API_TIMEOUT_SECS", 60),
            poll_timeout_secs: parsed_or(&lookup, "POLL_TIMEOUT_SECS", 30),
            currency: string_or(&lookup, "TALLYBOT_CURRENCY", "UAH"),
            seed_demo_data: parsed_or(&lookup, "TALLYBOT_SEED_DEMO", false),
        })
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_send_attempts,
            Duration::from_millis(self.initial_delay_ms),
        )
    }

    pub fn api_timeout(&self) -> Duration {
        Duration::from_secs(self.api_timeout_secs)
    }
}
