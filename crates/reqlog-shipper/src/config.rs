// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::constants;
use crate::error::ShipperError;
use std::env;
use std::time::Duration;

const VALID_LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Values supplied explicitly by the host. They win over the environment.
///
/// An empty string counts as "not supplied".
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub debug: Option<bool>,
}

/// Resolved shipper configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Credential sent as `Authorization: Bearer <api_key>`
    pub api_key: String,
    /// Collector base URL, without the ingest path
    pub base_url: String,
    /// Forces debug-level diagnostics
    pub debug: bool,
    /// Log level used when `debug` is off (trace, debug, info, warn, error)
    pub log_level: String,
    pub queue_capacity: usize,
    pub batch_size: usize,
    pub flush_interval: Duration,
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub backoff_multiplier: u32,
    pub max_body_bytes: usize,
    pub request_timeout: Duration,
    /// HTTPS proxy URL
    pub https_proxy: Option<String>,
    /// Field names redacted in addition to the built-in sensitive names
    pub sensitive_fields: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: String::new(),
            debug: false,
            log_level: "info".to_string(),
            queue_capacity: constants::DEFAULT_QUEUE_CAPACITY,
            batch_size: constants::DEFAULT_BATCH_SIZE,
            flush_interval: constants::DEFAULT_FLUSH_INTERVAL,
            max_attempts: constants::DEFAULT_MAX_ATTEMPTS,
            initial_backoff: constants::DEFAULT_INITIAL_BACKOFF,
            backoff_multiplier: constants::DEFAULT_BACKOFF_MULTIPLIER,
            max_body_bytes: constants::DEFAULT_MAX_BODY_BYTES,
            request_timeout: constants::DEFAULT_REQUEST_TIMEOUT,
            https_proxy: None,
            sensitive_fields: Vec::new(),
        }
    }
}

impl Config {
    /// Create configuration from environment variables only
    pub fn from_env() -> Result<Self, ShipperError> {
        Self::resolve(ConfigOverrides::default())
    }

    /// Resolve configuration with precedence override > environment > default
    pub fn resolve(overrides: ConfigOverrides) -> Result<Self, ShipperError> {
        let defaults = Self::default();

        let api_key = non_empty(overrides.api_key)
            .or_else(|| env_string("REQLOG_API_KEY"))
            .unwrap_or_default();
        let base_url = non_empty(overrides.base_url)
            .or_else(|| env_string("REQLOG_BASE_URL"))
            .map(|url| url.trim_end_matches('/').to_string())
            .unwrap_or_default();
        let debug = overrides
            .debug
            .or_else(|| env_string("REQLOG_DEBUG").map(|val| parse_bool(&val)))
            .unwrap_or(false);
        let log_level = env_string("REQLOG_LOG_LEVEL")
            .map(|val| val.to_lowercase())
            .unwrap_or(defaults.log_level);

        let https_proxy = env_string("REQLOG_PROXY_HTTPS").or_else(|| env_string("HTTPS_PROXY"));
        let sensitive_fields = env_string("REQLOG_SENSITIVE_FIELDS")
            .map(|val| {
                val.split(',')
                    .map(str::trim)
                    .filter(|field| !field.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let config = Self {
            api_key,
            base_url,
            debug,
            log_level,
            queue_capacity: env_parse("REQLOG_QUEUE_CAPACITY").unwrap_or(defaults.queue_capacity),
            batch_size: env_parse("REQLOG_BATCH_SIZE").unwrap_or(defaults.batch_size),
            flush_interval: env_parse("REQLOG_FLUSH_INTERVAL_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.flush_interval),
            max_attempts: env_parse("REQLOG_MAX_ATTEMPTS").unwrap_or(defaults.max_attempts),
            initial_backoff: env_parse("REQLOG_INITIAL_BACKOFF_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.initial_backoff),
            backoff_multiplier: env_parse("REQLOG_BACKOFF_MULTIPLIER")
                .unwrap_or(defaults.backoff_multiplier),
            max_body_bytes: env_parse("REQLOG_MAX_BODY_BYTES").unwrap_or(defaults.max_body_bytes),
            request_timeout: env_parse("REQLOG_REQUEST_TIMEOUT_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.request_timeout),
            https_proxy,
            sensitive_fields,
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ShipperError> {
        if self.queue_capacity == 0 {
            return Err(ShipperError::ConfigInvalid(
                "queue capacity must be greater than 0".to_string(),
            ));
        }
        if self.batch_size == 0 {
            return Err(ShipperError::ConfigInvalid(
                "batch size must be greater than 0".to_string(),
            ));
        }
        if self.batch_size > self.queue_capacity {
            return Err(ShipperError::ConfigInvalid(format!(
                "batch size {} exceeds queue capacity {}",
                self.batch_size, self.queue_capacity
            )));
        }
        if self.flush_interval.is_zero() {
            return Err(ShipperError::ConfigInvalid(
                "flush interval must be greater than 0".to_string(),
            ));
        }
        if self.max_attempts == 0 {
            return Err(ShipperError::ConfigInvalid(
                "max attempts must be at least 1".to_string(),
            ));
        }
        if self.backoff_multiplier == 0 {
            return Err(ShipperError::ConfigInvalid(
                "backoff multiplier must be at least 1".to_string(),
            ));
        }
        if self.max_body_bytes == 0 {
            return Err(ShipperError::ConfigInvalid(
                "max body bytes must be greater than 0".to_string(),
            ));
        }
        if self.request_timeout.is_zero() {
            return Err(ShipperError::ConfigInvalid(
                "request timeout must be greater than 0".to_string(),
            ));
        }
        if !VALID_LOG_LEVELS.contains(&self.log_level.as_str()) {
            return Err(ShipperError::ConfigInvalid(format!(
                "Invalid log level '{}'. Must be one of: trace, debug, info, warn, error",
                self.log_level
            )));
        }
        Ok(())
    }

    /// Whether both a credential and an endpoint are present.
    #[must_use]
    pub fn transmission_enabled(&self) -> bool {
        !self.api_key.is_empty() && !self.base_url.is_empty()
    }

    /// Level the diagnostic subscriber should run at.
    #[must_use]
    pub fn effective_log_level(&self) -> &str {
        if self.debug {
            "debug"
        } else {
            &self.log_level
        }
    }

    /// Full URL a wire event is posted to.
    #[must_use]
    pub fn ingest_url(&self) -> String {
        format!(
            "{}{}",
            self.base_url.trim_end_matches('/'),
            constants::INGEST_PATH
        )
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|val| !val.is_empty())
}

fn env_string(key: &str) -> Option<String> {
    env::var(key).ok().filter(|val| !val.is_empty())
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env_string(key).and_then(|val| val.trim().parse::<T>().ok())
}

fn parse_bool(value: &str) -> bool {
    matches!(
        value.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
