//! Tracing subscriber setup for the command-line tool.
//!
//! Filter precedence: `RUST_LOG`, then the level requested on the command
//! line, then `logging.level` from the configuration. Output always goes to
//! stderr so rendered documentation can be piped from stdout.

use crate::config::{LogFormat, LoggingConfig};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Level implied by `-v`/`-q` counts, if any were given.
pub fn verbosity_level(verbose: u8, quiet: bool) -> Option<&'static str> {
    if quiet {
        return Some("error");
    }
    match verbose {
        0 => None,
        1 => Some("debug"),
        _ => Some("trace"),
    }
}

fn env_filter(config: &LoggingConfig, level_override: Option<&str>) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = level_override.unwrap_or(&config.level);
        EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"))
    })
}

/// Install the global subscriber. Calling it twice is harmless; the second
/// call leaves the first subscriber in place.
pub fn initialize(config: &LoggingConfig, level_override: Option<&str>) {
    let filter = env_filter(config, level_override);
    let result = match config.format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init(),
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .without_time()
                    .with_writer(std::io::stderr),
            )
            .try_init(),
    };
    if result.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_flags() {
        assert_eq!(verbosity_level(0, false), None);
        assert_eq!(verbosity_level(1, false), Some("debug"));
        assert_eq!(verbosity_level(3, false), Some("trace"));
        assert_eq!(verbosity_level(2, true), Some("error"));
    }

    #[test]
    fn initialize_twice_is_harmless() {
        let config = LoggingConfig::default();
        initialize(&config, Some("warn"));
        initialize(&config, None);
    }
}
