//! Log setup for the cmdpack binary.
//!
//! `CMDPACK_LOGLEVEL` (1 error up to 5 trace) wins over `RUST_LOG`. Logs
//! always go to stderr so they never mix with relayed output.

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_FILTER: &str = "cmdpack=warn";

/// Log line layouts selectable with `CMDPACK_LOGFMT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Full,
    Compact,
    Pretty,
}

impl LogFormat {
    /// Unknown names fall back to [`LogFormat::Full`].
    pub fn parse(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "compact" => LogFormat::Compact,
            "pretty" => LogFormat::Pretty,
            _ => LogFormat::Full,
        }
    }
}

/// Map a numeric verbosity to a level name.
pub fn level_directive(level: &str) -> Option<&'static str> {
    let level: i64 = level.trim().parse().ok()?;
    Some(match level {
        i64::MIN..=1 => "error",
        2 => "warn",
        3 => "info",
        4 => "debug",
        _ => "trace",
    })
}

fn env_filter() -> EnvFilter {
    let level = std::env::var("CMDPACK_LOGLEVEL").ok();
    if let Some(level) = level.as_deref().and_then(level_directive) {
        return EnvFilter::new(format!("cmdpack={level}"));
    }
    EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_FILTER.into())
}

/// Install the global subscriber.
pub fn init() {
    let format = std::env::var("CMDPACK_LOGFMT")
        .map(|name| LogFormat::parse(&name))
        .unwrap_or(LogFormat::Full);
    let registry = tracing_subscriber::registry().with(env_filter());
    let layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    match format {
        LogFormat::Full => registry.with(layer).init(),
        LogFormat::Compact => registry.with(layer.compact()).init(),
        LogFormat::Pretty => registry.with(layer.pretty()).init(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_levels() {
        assert_eq!(level_directive("0"), Some("error"));
        assert_eq!(level_directive("1"), Some("error"));
        assert_eq!(level_directive(" 3 "), Some("info"));
        assert_eq!(level_directive("4"), Some("debug"));
        assert_eq!(level_directive("9"), Some("trace"));
        assert_eq!(level_directive("loud"), None);
    }

    #[test]
    fn formats() {
        assert_eq!(LogFormat::parse("Compact"), LogFormat::Compact);
        assert_eq!(LogFormat::parse("pretty"), LogFormat::Pretty);
        assert_eq!(LogFormat::parse("json"), LogFormat::Full);
    }
}
