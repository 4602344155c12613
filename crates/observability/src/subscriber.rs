//! Tracing subscriber initialization.
//!
//! Filtering follows `RUST_LOG` (default `info`). Output is JSON unless
//! `CAMPUSDESK_LOG_FORMAT=plain`.

use tracing_subscriber::EnvFilter;

const FORMAT_VAR: &str = "CAMPUSDESK_LOG_FORMAT";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Json,
    Plain,
}

impl LogFormat {
    pub fn from_env() -> Self {
        Self::parse(std::env::var(FORMAT_VAR).ok().as_deref())
    }

    /// Anything other than `plain` (case-insensitive) falls back to JSON.
    pub fn parse(value: Option<&str>) -> Self {
        match value {
            Some(v) if v.trim().eq_ignore_ascii_case("plain") => LogFormat::Plain,
            _ => LogFormat::Json,
        }
    }
}

/// Install the global subscriber. A second call leaves the first in place.
pub fn init(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let installed = match format {
        LogFormat::Json => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .with_timer(tracing_subscriber::fmt::time::SystemTime)
            .with_target(false)
            .try_init(),
        LogFormat::Plain => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .try_init(),
    };

    if installed.is_ok() {
        tracing::debug!(?format, "logging initialized");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_is_the_default() {
        assert_eq!(LogFormat::parse(None), LogFormat::Json);
        assert_eq!(LogFormat::parse(Some("pretty")), LogFormat::Json);
    }

    #[test]
    fn plain_is_case_insensitive() {
        assert_eq!(LogFormat::parse(Some("Plain")), LogFormat::Plain);
        assert_eq!(LogFormat::parse(Some(" plain ")), LogFormat::Plain);
    }

    #[test]
    fn repeated_init_is_harmless() {
        init(LogFormat::Plain);
        init(LogFormat::Json);
    }
}
