//! Client configuration.
//!
//! Configuration is read once and carried by value into every client. Nothing
//! in Quarry reads the environment after construction.

use std::fmt;
use std::time::Duration;

use crate::backoff::{BackoffPolicy, RetryBudget};
use crate::error::{Error, Result};

/// Error code the platform returns while a new connection's access policies propagate.
pub const DEFAULT_TRANSIENT_AUTH_CODE: &str = "ATLAS-403-00-001";

/// Default maximum number of items in one batch mutation.
pub const DEFAULT_MAX_BATCH_SIZE: usize = 20;

/// Default per-request timeout for HTTP backends.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Default base URL for a locally running catalog.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8080";

const ENV_BASE_URL: &str = "QUARRY_BASE_URL";
const ENV_API_TOKEN: &str = "QUARRY_API_TOKEN";
const ENV_MAX_RETRIES: &str = "QUARRY_MAX_RETRIES";
const ENV_RETRY_INITIAL_MS: &str = "QUARRY_RETRY_INITIAL_MS";
const ENV_RETRY_MAX_MS: &str = "QUARRY_RETRY_MAX_MS";
const ENV_REQUEST_TIMEOUT_SECS: &str = "QUARRY_REQUEST_TIMEOUT_SECS";
const ENV_MAX_BATCH_SIZE: &str = "QUARRY_MAX_BATCH_SIZE";
const ENV_TRANSIENT_AUTH_CODES: &str = "QUARRY_TRANSIENT_AUTH_CODES";

/// Retry settings shared by the transient-auth retry and the consistency poller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryConfig {
    /// Maximum attempts.
    pub budget: RetryBudget,
    /// Delay curve between attempts.
    pub backoff: BackoffPolicy,
    /// Server error codes treated as transient authorization failures.
    pub transient_auth_codes: Vec<String>,
}

impl RetryConfig {
    /// Returns true if `code` names a transient authorization failure.
    #[must_use]
    pub fn is_transient_auth_code(&self, code: &str) -> bool {
        self.transient_auth_codes.iter().any(|c| c == code)
    }

    /// Replaces the budget.
    #[must_use]
    pub fn with_budget(mut self, budget: RetryBudget) -> Self {
        self.budget = budget;
        self
    }

    /// Replaces the backoff policy.
    #[must_use]
    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            budget: RetryBudget::default(),
            backoff: BackoffPolicy::default(),
            transient_auth_codes: vec![DEFAULT_TRANSIENT_AUTH_CODE.to_string()],
        }
    }
}

/// Configuration for a catalog client.
#[derive(Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Base URL of the catalog (without the API path).
    pub base_url: String,
    /// Bearer token sent with every HTTP request.
    pub api_token: Option<String>,
    /// Retry settings.
    pub retry: RetryConfig,
    /// Per-request timeout.
    pub request_timeout: Duration,
    /// Maximum number of items in one batch mutation.
    pub max_batch_size: usize,
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("base_url", &self.base_url)
            .field("api_token", &self.api_token.as_ref().map(|_| "[REDACTED]"))
            .field("retry", &self.retry)
            .field("request_timeout", &self.request_timeout)
            .field("max_batch_size", &self.max_batch_size)
            .finish()
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_token: None,
            retry: RetryConfig::default(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
        }
    }
}

impl ClientConfig {
    /// Loads configuration from `QUARRY_*` environment variables.
    ///
    /// Unset or blank variables keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if a variable is present but cannot be
    /// parsed, or if the resulting configuration fails [`Self::validate`].
    pub fn from_env() -> Result<Self> {
        Self::from_env_with(|key| std::env::var(key).ok())
    }

    /// Loads configuration with a custom environment source.
    ///
    /// # Errors
    ///
    /// See [`Self::from_env`].
    pub fn from_env_with<F>(get_env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let env_string = |name: &str| non_blank(get_env(name));

        if let Some(url) = env_string(ENV_BASE_URL) {
            config.base_url = url;
        }
        config.api_token = env_string(ENV_API_TOKEN);

        if let Some(attempts) = parse_u64(ENV_MAX_RETRIES, env_string(ENV_MAX_RETRIES))? {
            let attempts = u32::try_from(attempts).map_err(|_| {
                Error::InvalidInput(format!("{ENV_MAX_RETRIES} value {attempts} is too large"))
            })?;
            config.retry.budget = RetryBudget::new(attempts);
        }

        let initial = parse_u64(ENV_RETRY_INITIAL_MS, env_string(ENV_RETRY_INITIAL_MS))?
            .map_or(config.retry.backoff.initial(), Duration::from_millis);
        let max = parse_u64(ENV_RETRY_MAX_MS, env_string(ENV_RETRY_MAX_MS))?
            .map_or(config.retry.backoff.max(), Duration::from_millis);
        config.retry.backoff = BackoffPolicy::new(initial, max);

        if let Some(secs) = parse_u64(
            ENV_REQUEST_TIMEOUT_SECS,
            env_string(ENV_REQUEST_TIMEOUT_SECS),
        )? {
            config.request_timeout = Duration::from_secs(secs);
        }

        if let Some(size) = parse_u64(ENV_MAX_BATCH_SIZE, env_string(ENV_MAX_BATCH_SIZE))? {
            config.max_batch_size = usize::try_from(size).map_err(|_| {
                Error::InvalidInput(format!("{ENV_MAX_BATCH_SIZE} value {size} is too large"))
            })?;
        }

        if let Some(codes) = env_string(ENV_TRANSIENT_AUTH_CODES) {
            config.retry.transient_auth_codes = parse_code_list(&codes);
        }

        config.validate()?;
        Ok(config)
    }

    /// Checks that the configuration is usable.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] describing the first problem found.
    pub fn validate(&self) -> Result<()> {
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(Error::InvalidInput(format!(
                "base url must start with http:// or https://, got '{}'",
                self.base_url
            )));
        }
        if self.max_batch_size == 0 {
            return Err(Error::InvalidInput(
                "max batch size must be at least 1".to_string(),
            ));
        }
        if self.request_timeout.is_zero() {
            return Err(Error::InvalidInput(
                "request timeout must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Base URL with any trailing slash removed.
    #[must_use]
    pub fn trimmed_base_url(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }

    /// Replaces the base URL.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Replaces the retry settings.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Replaces the batch limit.
    #[must_use]
    pub fn with_max_batch_size(mut self, max_batch_size: usize) -> Self {
        self.max_batch_size = max_batch_size;
        self
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.and_then(|v| {
        let trimmed = v.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

fn parse_u64(name: &str, value: Option<String>) -> Result<Option<u64>> {
    let Some(v) = value else {
        return Ok(None);
    };
    v.parse::<u64>()
        .map(Some)
        .map_err(|e| Error::InvalidInput(format!("{name} must be a u64: {e}")))
}

fn parse_code_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|code| !code.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_env_empty() {
        let config = ClientConfig::from_env_with(env(&[])).unwrap();
        assert_eq!(config, ClientConfig::default());
        assert!(config.retry.is_transient_auth_code(DEFAULT_TRANSIENT_AUTH_CODE));
        assert_eq!(config.max_batch_size, DEFAULT_MAX_BATCH_SIZE);
    }

    #[test]
    fn reads_every_variable() {
        let config = ClientConfig::from_env_with(env(&[
            (ENV_BASE_URL, "https://tenant.example.com/"),
            (ENV_API_TOKEN, "secret"),
            (ENV_MAX_RETRIES, "4"),
            (ENV_RETRY_INITIAL_MS, "50"),
            (ENV_RETRY_MAX_MS, "800"),
            (ENV_REQUEST_TIMEOUT_SECS, "5"),
            (ENV_MAX_BATCH_SIZE, "3"),
            (ENV_TRANSIENT_AUTH_CODES, "A-1, B-2,,"),
        ]))
        .unwrap();

        assert_eq!(config.trimmed_base_url(), "https://tenant.example.com");
        assert_eq!(config.api_token.as_deref(), Some("secret"));
        assert_eq!(config.retry.budget.max_attempts(), 4);
        assert_eq!(config.retry.backoff.initial(), Duration::from_millis(50));
        assert_eq!(config.retry.backoff.max(), Duration::from_millis(800));
        assert_eq!(config.request_timeout, Duration::from_secs(5));
        assert_eq!(config.max_batch_size, 3);
        assert_eq!(config.retry.transient_auth_codes, vec!["A-1", "B-2"]);
        assert!(!config.retry.is_transient_auth_code(DEFAULT_TRANSIENT_AUTH_CODE));
    }

    #[test]
    fn blank_values_are_ignored() {
        let config = ClientConfig::from_env_with(env(&[(ENV_MAX_RETRIES, "   ")])).unwrap();
        assert_eq!(config.retry.budget, RetryBudget::default());
    }

    #[test]
    fn rejects_unparseable_numbers() {
        let err = ClientConfig::from_env_with(env(&[(ENV_MAX_RETRIES, "many")])).unwrap_err();
        assert!(err.to_string().contains(ENV_MAX_RETRIES));
    }

    #[test]
    fn rejects_zero_batch_size_and_bad_url() {
        assert!(ClientConfig::from_env_with(env(&[(ENV_MAX_BATCH_SIZE, "0")])).is_err());
        assert!(ClientConfig::from_env_with(env(&[(ENV_BASE_URL, "ftp://x")])).is_err());
    }

    #[test]
    fn debug_redacts_token() {
        let config = ClientConfig {
            api_token: Some("super-secret".into()),
            ..ClientConfig::default()
        };
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("super-secret"));
        assert!(rendered.contains("[REDACTED]"));
    }
}
