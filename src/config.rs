//! Application configuration
//!
//! Loaded from YAML, then adjusted by `TRACECRAFT_*` environment variables.

use std::env;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use action_flow::{DefaultStepExecutor, RetryPolicy};
use action_locator::DefaultLocatorResolver;
use serde::{Deserialize, Serialize};
use tracing::warn;

pub const ENV_OUTPUT_DIR: &str = "TRACECRAFT_OUTPUT_DIR";
pub const ENV_MAX_ATTEMPTS: &str = "TRACECRAFT_MAX_ATTEMPTS";
pub const ENV_BACKOFF_MS: &str = "TRACECRAFT_BACKOFF_MS";
pub const ENV_STEP_TIMEOUT_MS: &str = "TRACECRAFT_STEP_TIMEOUT_MS";

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Where `run` writes traces, scripts and exports.
    pub output_dir: PathBuf,
    pub retry: RetryConfig,
    pub default_step_timeout_ms: u64,
    /// Upper bound on usable candidates kept per step.
    pub max_candidates: usize,
    /// Site fixture used when `run`/`replay` get no `--fixture`.
    pub fixture: Option<PathBuf>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("./tracecraft-output"),
            retry: RetryConfig::default(),
            default_step_timeout_ms: 30_000,
            max_candidates: 8,
            fixture: None,
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        let policy = RetryPolicy::default();
        Self {
            max_attempts: policy.max_attempts,
            base_backoff_ms: policy.base_backoff_ms,
            max_backoff_ms: policy.max_backoff_ms,
        }
    }
}

impl Config {
    /// Apply `TRACECRAFT_*` overrides. Unparseable values are ignored with a warning.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(dir) = env::var(ENV_OUTPUT_DIR) {
            if !dir.trim().is_empty() {
                self.output_dir = PathBuf::from(dir);
            }
        }
        if let Some(value) = env_number(ENV_MAX_ATTEMPTS) {
            self.retry.max_attempts = value;
        }
        if let Some(value) = env_number(ENV_BACKOFF_MS) {
            self.retry.base_backoff_ms = value;
        }
        if let Some(value) = env_number(ENV_STEP_TIMEOUT_MS) {
            self.default_step_timeout_ms = value;
        }
    }

    /// Problems that make the configuration unusable.
    pub fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();
        if self.retry.max_attempts == 0 {
            problems.push("retry.max_attempts must be at least 1".to_string());
        }
        if self.retry.max_backoff_ms < self.retry.base_backoff_ms {
            problems.push("retry.max_backoff_ms is smaller than retry.base_backoff_ms".to_string());
        }
        if self.default_step_timeout_ms == 0 {
            problems.push("default_step_timeout_ms must be positive".to_string());
        }
        if self.max_candidates == 0 {
            problems.push("max_candidates must be at least 1".to_string());
        }
        if self.output_dir.as_os_str().is_empty() {
            problems.push("output_dir is empty".to_string());
        }
        problems
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_backoff_ms: self.retry.max_backoff_ms,
            ..RetryPolicy::new(self.retry.max_attempts, self.retry.base_backoff_ms)
        }
    }

    pub fn step_executor(&self) -> DefaultStepExecutor {
        DefaultStepExecutor::new(self.retry_policy())
            .with_default_timeout(Duration::from_millis(self.default_step_timeout_ms))
    }

    pub fn locator_resolver(&self) -> DefaultLocatorResolver {
        DefaultLocatorResolver::new().with_max_candidates(self.max_candidates)
    }
}

fn env_number<T>(key: &str) -> Option<T>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    let raw = env::var(key).ok()?;
    parse_number(key, &raw)
}

/// Values out of range for the target field are ignored like any other bad value.
fn parse_number<T>(key: &str, raw: &str) -> Option<T>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    match raw.trim().parse::<T>() {
        Ok(value) => Some(value),
        Err(err) => {
            warn!(key, value = %raw, %err, "ignoring unusable numeric override");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_yaml_keeps_defaults() {
        let config: Config = serde_yaml::from_str("retry:\n  max_attempts: 5\n").unwrap();
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.retry.base_backoff_ms, 1000);
        assert_eq!(config.default_step_timeout_ms, 30_000);
        assert_eq!(config.max_candidates, 8);
        assert!(config.validate().is_empty());
    }

    #[test]
    fn retry_policy_follows_config() {
        let mut config = Config::default();
        config.retry.max_attempts = 4;
        config.retry.base_backoff_ms = 10;
        config.retry.max_backoff_ms = 25;
        let policy = config.retry_policy();
        assert_eq!(policy.max_attempts, 4);
        assert_eq!(policy.backoff(3), Duration::from_millis(25));
    }

    #[test]
    fn oversized_attempt_counts_are_ignored() {
        assert_eq!(parse_number::<u32>(ENV_MAX_ATTEMPTS, " 7 "), Some(7));
        assert_eq!(parse_number::<u32>(ENV_MAX_ATTEMPTS, "4294967296"), None);
        assert_eq!(parse_number::<u32>(ENV_MAX_ATTEMPTS, "-1"), None);
        assert_eq!(parse_number::<u64>(ENV_BACKOFF_MS, "4294967296"), Some(4_294_967_296));
    }

    #[test]
    fn validation_reports_each_problem() {
        let mut config = Config::default();
        config.retry.max_attempts = 0;
        config.max_candidates = 0;
        assert_eq!(config.validate().len(), 2);
    }
}
