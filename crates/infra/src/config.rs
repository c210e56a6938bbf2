//! Dispatch settings sourced from the process environment.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use relay_events::ProcessorError;

use crate::retry::RetryPolicy;

pub const ENV_PROCESSOR_CONFIG: &str = "RELAY_PROCESSOR_CONFIG";
pub const ENV_PROCESSOR_EAGER: &str = "RELAY_PROCESSOR_EAGER";
pub const ENV_MAX_RETRIES: &str = "RELAY_PROCESSOR_MAX_RETRIES";
pub const ENV_INITIAL_DELAY: &str = "RELAY_PROCESSOR_INITIAL_DELAY";
pub const ENV_BACKOFF_MULTIPLIER: &str = "RELAY_PROCESSOR_BACKOFF_MULTIPLIER";
pub const ENV_DELAY_UNIT: &str = "RELAY_PROCESSOR_DELAY_UNIT";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value '{value}' for {key}: {reason}")]
    Invalid {
        key: String,
        value: String,
        reason: String,
    },

    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed processor config document: {0}")]
    Parse(#[from] serde_json::Error),

    #[error(transparent)]
    Processor(#[from] ProcessorError),
}

/// Time unit the initial retry delay is expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DelayUnit {
    Millis,
    #[default]
    Seconds,
    Minutes,
}

impl DelayUnit {
    pub fn to_duration(self, amount: u64) -> Duration {
        match self {
            DelayUnit::Millis => Duration::from_millis(amount),
            DelayUnit::Seconds => Duration::from_secs(amount),
            DelayUnit::Minutes => Duration::from_secs(amount.saturating_mul(60)),
        }
    }
}

impl FromStr for DelayUnit {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ms" | "millis" | "milliseconds" => Ok(DelayUnit::Millis),
            "s" | "secs" | "seconds" => Ok(DelayUnit::Seconds),
            "m" | "mins" | "minutes" => Ok(DelayUnit::Minutes),
            other => Err(format!("unknown delay unit '{other}' (expected ms, s or m)")),
        }
    }
}

/// Everything the dispatch pipeline reads from its environment.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchSettings {
    /// JSON file holding the processor records loaded at startup.
    pub processor_config: Option<PathBuf>,
    /// Build every configured handler at startup instead of on first use.
    pub eager: bool,
    pub retry: RetryPolicy,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            processor_config: None,
            eager: false,
            retry: RetryPolicy::default(),
        }
    }
}

impl DispatchSettings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`DispatchSettings::from_env`], reading variables through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let processor_config = get(ENV_PROCESSOR_CONFIG).map(PathBuf::from);
        let eager = match get(ENV_PROCESSOR_EAGER) {
            Some(v) => parse_bool(ENV_PROCESSOR_EAGER, &v)?,
            None => false,
        };

        let defaults = RetryPolicy::default();
        let max_retries = match get(ENV_MAX_RETRIES) {
            Some(v) => parse_num::<u32>(ENV_MAX_RETRIES, &v)?,
            None => defaults.max_retries,
        };
        let unit = match get(ENV_DELAY_UNIT) {
            Some(v) => v.parse::<DelayUnit>().map_err(|reason| invalid(ENV_DELAY_UNIT, &v, reason))?,
            None => DelayUnit::default(),
        };
        let initial_delay = match get(ENV_INITIAL_DELAY) {
            Some(v) => unit.to_duration(parse_num::<u64>(ENV_INITIAL_DELAY, &v)?),
            None => unit.to_duration(1),
        };
        let backoff_multiplier = match get(ENV_BACKOFF_MULTIPLIER) {
            Some(v) => {
                let m = parse_num::<f64>(ENV_BACKOFF_MULTIPLIER, &v)?;
                if !m.is_finite() || m < 1.0 {
                    return Err(invalid(ENV_BACKOFF_MULTIPLIER, &v, "must be a finite number >= 1"));
                }
                m
            }
            None => defaults.backoff_multiplier,
        };

        Ok(Self {
            processor_config,
            eager,
            retry: RetryPolicy::new(max_retries, initial_delay, backoff_multiplier),
        })
    }
}

fn invalid(key: &str, value: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.into(),
    }
}

fn parse_num<T>(key: &str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value.parse::<T>().map_err(|e| invalid(key, value, e.to_string()))
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(invalid(key, value, "expected a boolean")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let settings = DispatchSettings::from_lookup(lookup(&[])).unwrap();
        assert_eq!(settings, DispatchSettings::default());
        assert_eq!(settings.retry.initial_delay, Duration::from_secs(1));
    }

    #[test]
    fn reads_every_variable() {
        let settings = DispatchSettings::from_lookup(lookup(&[
            (ENV_PROCESSOR_CONFIG, "/etc/relay/processors.json"),
            (ENV_PROCESSOR_EAGER, "true"),
            (ENV_MAX_RETRIES, "5"),
            (ENV_INITIAL_DELAY, "250"),
            (ENV_DELAY_UNIT, "ms"),
            (ENV_BACKOFF_MULTIPLIER, "1.5"),
        ]))
        .unwrap();

        assert_eq!(
            settings.processor_config,
            Some(PathBuf::from("/etc/relay/processors.json"))
        );
        assert!(settings.eager);
        assert_eq!(
            settings.retry,
            RetryPolicy::new(5, Duration::from_millis(250), 1.5)
        );
    }

    #[test]
    fn minutes_scale_the_initial_delay() {
        let settings = DispatchSettings::from_lookup(lookup(&[
            (ENV_INITIAL_DELAY, "2"),
            (ENV_DELAY_UNIT, "m"),
        ]))
        .unwrap();
        assert_eq!(settings.retry.initial_delay, Duration::from_secs(120));
    }

    #[test]
    fn rejects_malformed_values() {
        for (key, value) in [
            (ENV_MAX_RETRIES, "-1"),
            (ENV_PROCESSOR_EAGER, "maybe"),
            (ENV_DELAY_UNIT, "fortnights"),
            (ENV_BACKOFF_MULTIPLIER, "0.5"),
            (ENV_BACKOFF_MULTIPLIER, "NaN"),
        ] {
            let err = DispatchSettings::from_lookup(lookup(&[(key, value)])).unwrap_err();
            match err {
                ConfigError::Invalid { key: k, .. } => assert_eq!(k, key),
                other => panic!("expected Invalid for {key}={value}, got {other:?}"),
            }
        }
    }
}
