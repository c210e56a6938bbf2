//! Tracing subscriber initialization.
//!
//! The filter comes from `RUST_LOG` (default `info`); the output format from
//! `RELAY_LOG_FORMAT` (`json`, the default, or `compact`).

use std::str::FromStr;

use tracing_subscriber::EnvFilter;

pub const ENV_LOG_FORMAT: &str = "RELAY_LOG_FORMAT";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// One JSON object per line, for log shippers.
    #[default]
    Json,
    /// Human-readable single-line output.
    Compact,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(LogFormat::Json),
            "compact" | "text" => Ok(LogFormat::Compact),
            other => Err(format!("unknown log format '{other}'")),
        }
    }
}

/// Initialize tracing/logging for the process.
///
/// Safe to call multiple times (subsequent calls are no-ops).
pub fn init() {
    let format = std::env::var(ENV_LOG_FORMAT)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or_default();
    init_with(format, "info");
}

/// Initialize with an explicit format; `default_filter` applies when `RUST_LOG` is unset.
///
/// Returns `false` if a global subscriber was already installed.
pub fn init_with(format: LogFormat, default_filter: &str) -> bool {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(tracing_subscriber::fmt::time::SystemTime)
        .with_target(false);

    match format {
        LogFormat::Json => builder.json().try_init().is_ok(),
        LogFormat::Compact => builder.compact().try_init().is_ok(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_formats() {
        assert_eq!("JSON".parse::<LogFormat>(), Ok(LogFormat::Json));
        assert_eq!("text".parse::<LogFormat>(), Ok(LogFormat::Compact));
        assert!("xml".parse::<LogFormat>().is_err());
    }

    #[test]
    fn repeated_initialization_is_harmless() {
        init();
        assert!(!init_with(LogFormat::Compact, "debug"));
        init();
    }
}
