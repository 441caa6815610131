//! Layered configuration
//!
//! Defaults, then an optional TOML file, then `DATAGATE_*` environment
//! variables. `validate` runs last and rejects limits that would stall the
//! workflow.

use crate::errors::{AccessError, AccessResult};
use crate::identifiers::PrincipalId;
use crate::notification::Feature;
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration as StdDuration;

/// Prefix of environment overrides
pub const ENV_PREFIX: &str = "DATAGATE_";

/// Longest accepted window, in days, for any day- or hour-based setting
pub const MAX_WINDOW_DAYS: u64 = 3_650;

/// Keys accepted by [`AccessConfig::set_from_string`]
pub const CONFIG_KEYS: [&str; 15] = [
    "draft.max_accessors",
    "notification.change_timeout_hours",
    "notification.resend_cooldown_days",
    "notification.max_request_recipients",
    "notification.retry.max_attempts",
    "notification.retry.initial_delay_ms",
    "notification.retry.max_delay_ms",
    "notification.retry.redelivery_delay_ms",
    "sweep.enabled",
    "sweep.interval_secs",
    "sweep.lookback_days",
    "sweep.batch_size",
    "sweep.max_batches_per_run",
    "environment.production_stack",
    "environment.testing_group",
];

/// Complete datagate configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccessConfig {
    /// Draft limits
    pub draft: DraftConfig,
    /// Notification engine settings
    pub notification: NotificationConfig,
    /// Revocation sweep schedule
    pub sweep: SweepConfig,
    /// Deployment environment
    pub environment: EnvironmentConfig,
}

/// Draft limits
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DraftConfig {
    /// Maximum number of accessor changes on one draft
    pub max_accessors: usize,
}

impl Default for DraftConfig {
    fn default() -> Self {
        Self { max_accessors: 500 }
    }
}

/// Notification engine settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    /// Change messages older than this are discarded
    pub change_timeout_hours: u64,
    /// Minimum spacing between two sends of the same notification
    pub resend_cooldown_days: u64,
    /// Maximum recipients in one listing query
    pub max_request_recipients: usize,
    /// Retry schedule for transient failures
    pub retry: RetryConfig,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            change_timeout_hours: 24,
            resend_cooldown_days: 7,
            max_request_recipients: 25,
            retry: RetryConfig::default(),
        }
    }
}

impl NotificationConfig {
    /// Age after which change messages are discarded
    pub fn change_timeout(&self) -> Duration {
        Duration::try_hours(saturating_i64(self.change_timeout_hours)).unwrap_or(Duration::MAX)
    }

    /// Minimum spacing between two sends
    pub fn resend_cooldown(&self) -> Duration {
        Duration::try_days(saturating_i64(self.resend_cooldown_days)).unwrap_or(Duration::MAX)
    }
}

/// Retry schedule for transient failures
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Attempts including the first one
    pub max_attempts: u32,
    /// Delay before the first retry
    pub initial_delay_ms: u64,
    /// Upper bound on any delay
    pub max_delay_ms: u64,
    /// Wait before a message whose retries ran out is processed again
    pub redelivery_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay_ms: 500,
            max_delay_ms: 30_000,
            redelivery_delay_ms: 60_000,
        }
    }
}

/// Revocation sweep schedule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepConfig {
    /// Run the sweep at all
    pub enabled: bool,
    /// Seconds between runs
    pub interval_secs: u64,
    /// Only approvals that expired within this many days are revoked
    pub lookback_days: u64,
    /// Approvals revoked per batch
    pub batch_size: usize,
    /// Upper bound on batches drained in one run
    pub max_batches_per_run: usize,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 300,
            lookback_days: 60,
            batch_size: 100,
            max_batches_per_run: 10,
        }
    }
}

impl SweepConfig {
    /// Time between runs
    pub fn interval(&self) -> StdDuration {
        StdDuration::from_secs(self.interval_secs)
    }

    /// Lookback window
    pub fn lookback(&self) -> Duration {
        Duration::try_days(saturating_i64(self.lookback_days)).unwrap_or(Duration::MAX)
    }
}

/// Deployment environment
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvironmentConfig {
    /// Whether this is the production stack; `None` when undetermined
    pub production_stack: Option<bool>,
    /// Principals that receive notifications on every stack
    pub testing_group: Vec<PrincipalId>,
    /// Enabled feature flags
    pub features: Vec<Feature>,
}

impl AccessConfig {
    /// Parse a TOML document
    pub fn from_toml_str(content: &str) -> AccessResult<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Load a TOML file
    pub fn load_from_file(path: &Path) -> AccessResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            AccessError::internal(format!(
                "Failed to read config file {}: {e}",
                path.display()
            ))
        })?;
        Self::from_toml_str(&content)
    }

    /// Apply `DATAGATE_*` overrides from the process environment
    pub fn merge_with_env(&mut self) -> AccessResult<()> {
        self.merge_from_vars(std::env::vars())
    }

    /// Apply `DATAGATE_*` overrides from the given variables
    ///
    /// `DATAGATE_SWEEP_BATCH_SIZE` maps to `sweep.batch_size`; unknown
    /// variables with the prefix are ignored.
    pub fn merge_from_vars<I>(&mut self, vars: I) -> AccessResult<()>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (name, value) in vars {
            let Some(suffix) = name.strip_prefix(ENV_PREFIX) else {
                continue;
            };
            if let Some(key) = CONFIG_KEYS
                .iter()
                .find(|key| env_name_of(key) == suffix)
            {
                self.set_from_string(key, &value)?;
            } else if suffix == "ENVIRONMENT_FEATURES" {
                self.environment.features = parse_features(&value)?;
            }
        }
        Ok(())
    }

    /// Set one value by dotted key
    pub fn set_from_string(&mut self, key: &str, value: &str) -> AccessResult<()> {
        match key {
            "draft.max_accessors" => self.draft.max_accessors = parse(key, value)?,
            "notification.change_timeout_hours" => {
                self.notification.change_timeout_hours = parse(key, value)?;
            }
            "notification.resend_cooldown_days" => {
                self.notification.resend_cooldown_days = parse(key, value)?;
            }
            "notification.max_request_recipients" => {
                self.notification.max_request_recipients = parse(key, value)?;
            }
            "notification.retry.max_attempts" => {
                self.notification.retry.max_attempts = parse(key, value)?;
            }
            "notification.retry.initial_delay_ms" => {
                self.notification.retry.initial_delay_ms = parse(key, value)?;
            }
            "notification.retry.max_delay_ms" => {
                self.notification.retry.max_delay_ms = parse(key, value)?;
            }
            "notification.retry.redelivery_delay_ms" => {
                self.notification.retry.redelivery_delay_ms = parse(key, value)?;
            }
            "sweep.enabled" => self.sweep.enabled = parse(key, value)?,
            "sweep.interval_secs" => self.sweep.interval_secs = parse(key, value)?,
            "sweep.lookback_days" => self.sweep.lookback_days = parse(key, value)?,
            "sweep.batch_size" => self.sweep.batch_size = parse(key, value)?,
            "sweep.max_batches_per_run" => self.sweep.max_batches_per_run = parse(key, value)?,
            "environment.production_stack" => {
                self.environment.production_stack = match value.trim() {
                    "" | "unknown" => None,
                    other => Some(parse(key, other)?),
                };
            }
            "environment.testing_group" => {
                self.environment.testing_group = value
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::parse::<PrincipalId>)
                    .collect::<AccessResult<_>>()?;
            }
            other => {
                return Err(AccessError::validation(format!(
                    "Unknown configuration key: {other}"
                )))
            }
        }
        Ok(())
    }

    /// Reject limits that would stall the workflow
    pub fn validate(&self) -> AccessResult<()> {
        let checks = [
            (self.draft.max_accessors == 0, "draft.max_accessors"),
            (
                self.notification.change_timeout_hours == 0,
                "notification.change_timeout_hours",
            ),
            (
                self.notification.max_request_recipients == 0,
                "notification.max_request_recipients",
            ),
            (
                self.notification.retry.max_attempts == 0,
                "notification.retry.max_attempts",
            ),
            (
                self.notification.retry.redelivery_delay_ms == 0,
                "notification.retry.redelivery_delay_ms",
            ),
            (self.sweep.interval_secs == 0, "sweep.interval_secs"),
            (self.sweep.lookback_days == 0, "sweep.lookback_days"),
            (self.sweep.batch_size == 0, "sweep.batch_size"),
            (self.sweep.max_batches_per_run == 0, "sweep.max_batches_per_run"),
        ];
        if let Some((_, key)) = checks.iter().find(|(failed, _)| *failed) {
            return Err(AccessError::validation(format!(
                "{key} must be greater than 0"
            )));
        }
        let windows = [
            (
                self.notification.change_timeout_hours > MAX_WINDOW_DAYS * 24,
                "notification.change_timeout_hours",
            ),
            (
                self.notification.resend_cooldown_days > MAX_WINDOW_DAYS,
                "notification.resend_cooldown_days",
            ),
            (self.sweep.lookback_days > MAX_WINDOW_DAYS, "sweep.lookback_days"),
            (
                self.sweep.interval_secs > MAX_WINDOW_DAYS * 24 * 60 * 60,
                "sweep.interval_secs",
            ),
        ];
        if let Some((_, key)) = windows.iter().find(|(failed, _)| *failed) {
            return Err(AccessError::validation(format!(
                "{key} must not exceed {MAX_WINDOW_DAYS} days"
            )));
        }
        if self.notification.retry.initial_delay_ms > self.notification.retry.max_delay_ms {
            return Err(AccessError::validation(
                "notification.retry.initial_delay_ms must not exceed max_delay_ms",
            ));
        }
        Ok(())
    }
}

fn env_name_of(key: &str) -> String {
    key.to_uppercase().replace('.', "_")
}

fn parse<T: std::str::FromStr>(key: &str, value: &str) -> AccessResult<T> {
    value
        .trim()
        .parse()
        .map_err(|_| AccessError::validation(format!("Invalid value for {key}: {value}")))
}

fn parse_features(value: &str) -> AccessResult<Vec<Feature>> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|name| {
            serde_json::from_value(serde_json::Value::String(name.to_string()))
                .map_err(|_| AccessError::validation(format!("Unknown feature: {name}")))
        })
        .collect()
}

fn saturating_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}
