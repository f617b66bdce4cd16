//! Logging setup and span constructors.
//!
//! Library code only emits `tracing` events; binaries and tests decide where
//! they go by calling [`init_logging`] once.

use std::str::FromStr;
use std::sync::Once;

use tracing::Span;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::error::Error;
use crate::id::QualifiedName;

static INIT: Once = Once::new();

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// One JSON object per event.
    Json,
    /// Human-readable multi-line output.
    #[default]
    Pretty,
}

impl FromStr for LogFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "pretty" | "text" => Ok(Self::Pretty),
            other => Err(Error::InvalidInput(format!(
                "unknown log format '{other}' (expected json or pretty)"
            ))),
        }
    }
}

/// Installs the global subscriber.
///
/// `RUST_LOG` controls levels and defaults to `info`. Later calls are no-ops,
/// as is a call made after some other subscriber was already installed.
///
/// ```rust
/// use quarry_core::observability::{init_logging, LogFormat};
///
/// init_logging(LogFormat::Pretty);
/// ```
pub fn init_logging(format: LogFormat) {
    INIT.call_once(|| {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        let installed = match format {
            LogFormat::Json => tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json())
                .try_init(),
            LogFormat::Pretty => tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().pretty())
                .try_init(),
        };
        if installed.is_err() {
            tracing::debug!("subscriber already installed; keeping it");
        }
    });
}

/// Span wrapping one mutating call.
#[must_use]
pub fn mutation_span(operation: &str, type_name: &str, qualified_name: &QualifiedName) -> Span {
    tracing::info_span!(
        "mutation",
        op = operation,
        type_name = type_name,
        qualified_name = %qualified_name,
    )
}

/// Span wrapping one consistency poll. `kind` is `search` or `audit`.
#[must_use]
pub fn poll_span(kind: &str, expected: u64, max_attempts: u32) -> Span {
    tracing::info_span!(
        "poll",
        kind = kind,
        expected = expected,
        max_attempts = max_attempts,
        attempts = tracing::field::Empty,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_logging_twice_is_harmless() {
        init_logging(LogFormat::Pretty);
        init_logging(LogFormat::Json);
    }

    #[test]
    fn parses_formats() {
        assert_eq!("JSON".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!("text".parse::<LogFormat>().unwrap(), LogFormat::Pretty);
        assert!("xml".parse::<LogFormat>().is_err());
    }

    #[test]
    fn spans_accept_late_fields() {
        let qn = QualifiedName::new("glossary/finance").unwrap();
        let _outer = mutation_span("create", "Glossary", &qn).entered();
        let span = poll_span("search", 2, 5);
        span.record("attempts", 3);
        let _guard = span.enter();
        tracing::info!("inside poll");
    }
}
